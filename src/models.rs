use serde::{Deserialize, Serialize};

/// Manual boosts at or above this value pin an event like the `is_elite` flag does.
pub const ELITE_BOOST: f64 = 100.0;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Event {
    pub id: String,
    pub external_id: Option<String>,
    pub source: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub venue_name: Option<String>,
    pub address_city: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub category_main_id: Option<i64>,
    pub category_sub_id: Option<i64>,
    pub tags: Vec<String>,
    pub buzz_score: Option<f64>,
    pub buzz_boost: Option<f64>, // from vibe_overrides, never stored on the row
    pub relevance_score: Option<f64>,
    pub favorite_count: i64,
    pub is_elite: bool,
    pub price_from: Option<f64>,
    pub price_to: Option<f64>,
    pub ticket_url: Option<String>,
}

impl Event {
    /// Both coordinates or nothing; a half-located event is treated as unlocated.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }

    /// Popularity used for ranking: manual boost, then buzz, then relevance.
    pub fn score(&self) -> f64 {
        self.buzz_boost
            .or(self.buzz_score)
            .or(self.relevance_score)
            .unwrap_or(0.0)
    }

    pub fn is_pinned(&self) -> bool {
        self.is_elite || self.buzz_boost.is_some_and(|boost| boost >= ELITE_BOOST)
    }

    pub fn category_key(&self) -> CategoryKey {
        match (self.category_sub_id, self.category_main_id) {
            (Some(sub), _) => CategoryKey::Sub(sub),
            (None, Some(main)) => CategoryKey::Main(main),
            (None, None) => CategoryKey::Uncategorized,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CategoryKey {
    Sub(i64),
    Main(i64),
    Uncategorized,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaxonomyKind {
    Main,
    Sub,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TaxonomyEntry {
    pub id: i64,
    pub slug: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TaxonomyKind,
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct VibeOverride {
    pub external_id: String,
    pub buzz_boost: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Pagination {
    pub has_more: bool,
    pub next_offset: usize,
    pub total: Option<usize>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct EventPage {
    pub events: Vec<Event>,
    pub pagination: Pagination,
}

/// Applies manual boosts by `external_id`. Later overrides for the same id win.
pub fn apply_overrides(events: &mut [Event], overrides: &[VibeOverride]) -> usize {
    let mut applied = 0;
    for event in events.iter_mut() {
        let Some(external_id) = event.external_id.as_deref() else {
            continue;
        };
        if let Some(found) = overrides
            .iter()
            .rev()
            .find(|item| item.external_id == external_id)
        {
            event.buzz_boost = Some(found.buzz_boost);
            applied += 1;
        }
    }
    applied
}
