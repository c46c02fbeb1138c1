//! Client-side narrowing and ordering of an event collection.

pub mod dedupe;
pub mod diversify;
pub mod rank;
pub mod temporal;

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geo::{self, Gazetteer};
use crate::models::Event;

pub use temporal::TimeWindow;

pub const DEFAULT_RADIUS_KM: f64 = 25.0;
pub const NEARBY_RADIUS_KM: f64 = 10.0;
pub const MIN_SEARCH_CHARS: usize = 3;

/// Tag the UI offers that upstream data spells several ways.
pub const FAMILY_TAG: &str = "family-friendly";
pub const FAMILY_SYNONYMS: [&str; 3] = ["family", "kids", "family-kids"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "eventId")]
pub enum OverrideFilter {
    /// Events within the nearby radius of the referenced event.
    Nearby(String),
    /// Events sharing the referenced event's main category.
    Similar(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteCorridor {
    pub from_city: String,
    pub to_city: String,
    pub width_km: f64,
}

/// One user interaction's worth of filters. Build a new value per
/// interaction instead of mutating the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterCriteria {
    pub category_id: Option<i64>,
    pub subcategory_id: Option<i64>,
    pub city: Option<String>,
    pub radius_km: f64,
    pub time_window: Option<TimeWindow>,
    pub explicit_date: Option<NaiveDate>,
    pub search_term: Option<String>,
    pub tags: BTreeSet<String>,
    pub source: Option<String>,
    pub override_filter: Option<OverrideFilter>,
    pub corridor: Option<RouteCorridor>,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            category_id: None,
            subcategory_id: None,
            city: None,
            radius_km: DEFAULT_RADIUS_KM,
            time_window: None,
            explicit_date: None,
            search_term: None,
            tags: BTreeSet::new(),
            source: None,
            override_filter: None,
            corridor: None,
        }
    }
}

impl FilterCriteria {
    /// Lowercased search term, or `None` when it is too short to search on.
    pub fn effective_search(&self) -> Option<String> {
        let term = self.search_term.as_deref()?.trim();
        if term.chars().count() < MIN_SEARCH_CHARS {
            return None;
        }
        Some(term.to_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    pub nearby_radius_km: f64,
    /// Grid and carousel views diversify; plain lists do not.
    pub diversify: bool,
    pub diversify_cap: usize,
    pub diversify_relaxed_cap: usize,
    pub diversify_target: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            nearby_radius_km: NEARBY_RADIUS_KM,
            diversify: false,
            diversify_cap: diversify::DEFAULT_CAP,
            diversify_relaxed_cap: diversify::RELAXED_CAP,
            diversify_target: crate::paging::DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    gazetteer: Arc<Gazetteer>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(gazetteer: Arc<Gazetteer>, options: PipelineOptions) -> Self {
        Self { gazetteer, options }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn gazetteer(&self) -> &Gazetteer {
        &self.gazetteer
    }

    pub fn run(&self, events: &[Event], criteria: &FilterCriteria) -> Vec<Event> {
        self.run_at(events, criteria, Utc::now())
    }

    /// Same as [`Pipeline::run`] with an explicit clock for date windows.
    pub fn run_at(
        &self,
        events: &[Event],
        criteria: &FilterCriteria,
        now: DateTime<Utc>,
    ) -> Vec<Event> {
        let unique = dedupe::dedupe(events);

        let mut out = match &criteria.override_filter {
            Some(filter) => self.apply_override(unique, filter),
            None => self.narrow(unique, criteria, now),
        };

        rank::rank(&mut out);
        debug!(input = events.len(), output = out.len(), "event pipeline finished");
        out
    }

    fn apply_override(&self, events: Vec<Event>, filter: &OverrideFilter) -> Vec<Event> {
        match filter {
            OverrideFilter::Nearby(reference_id) => {
                let Some((ref_lat, ref_lng)) = events
                    .iter()
                    .find(|event| &event.id == reference_id)
                    .and_then(Event::coordinates)
                else {
                    debug!(reference_id = %reference_id, "nearby reference missing or unlocated");
                    return Vec::new();
                };
                let radius = self.options.nearby_radius_km;
                events
                    .into_iter()
                    .filter(|event| &event.id != reference_id)
                    .filter(|event| {
                        event.coordinates().is_some_and(|(lat, lng)| {
                            geo::distance_km(ref_lat, ref_lng, lat, lng) <= radius
                        })
                    })
                    .collect()
            }
            OverrideFilter::Similar(reference_id) => {
                let Some(main) = events
                    .iter()
                    .find(|event| &event.id == reference_id)
                    .and_then(|event| event.category_main_id)
                else {
                    debug!(reference_id = %reference_id, "similar reference missing or uncategorized");
                    return Vec::new();
                };
                events
                    .into_iter()
                    .filter(|event| &event.id != reference_id)
                    .filter(|event| event.category_main_id == Some(main))
                    .collect()
            }
        }
    }

    fn narrow(&self, events: Vec<Event>, criteria: &FilterCriteria, now: DateTime<Utc>) -> Vec<Event> {
        let mut out = filter_category(events, criteria);
        out = filter_source(out, criteria.source.as_deref());
        out = self.filter_city(out, criteria);
        out = self.filter_corridor(out, criteria.corridor.as_ref());
        out = filter_dates(out, criteria, temporal::today_in(now));
        out = filter_tags(out, &criteria.tags);
        if let Some(term) = criteria.effective_search() {
            out.retain(|event| matches_search(event, &term));
        }

        if self.options.diversify {
            out = diversify::diversify(
                &out,
                self.options.diversify_cap,
                self.options.diversify_relaxed_cap,
                self.options.diversify_target,
            );
        }
        out
    }

    fn filter_city(&self, events: Vec<Event>, criteria: &FilterCriteria) -> Vec<Event> {
        let Some(city) = criteria.city.as_deref().filter(|c| !c.trim().is_empty()) else {
            return events;
        };
        let Some(place) = self.gazetteer.resolve(city) else {
            debug!(city = %city, "unknown city, no events match");
            return Vec::new();
        };
        let radius = criteria.radius_km;
        events
            .into_iter()
            .filter(|event| {
                event.coordinates().is_some_and(|(lat, lng)| {
                    geo::distance_km(place.latitude, place.longitude, lat, lng) <= radius
                })
            })
            .collect()
    }

    fn filter_corridor(&self, events: Vec<Event>, corridor: Option<&RouteCorridor>) -> Vec<Event> {
        let Some(corridor) = corridor else {
            return events;
        };
        let (Some(from), Some(to)) = (
            self.gazetteer.resolve(&corridor.from_city),
            self.gazetteer.resolve(&corridor.to_city),
        ) else {
            debug!(
                from = %corridor.from_city,
                to = %corridor.to_city,
                "unknown corridor endpoint, no events match"
            );
            return Vec::new();
        };
        events
            .into_iter()
            .filter(|event| {
                event.coordinates().is_some_and(|(lat, lng)| {
                    geo::distance_to_segment(
                        lat,
                        lng,
                        from.latitude,
                        from.longitude,
                        to.latitude,
                        to.longitude,
                    ) <= corridor.width_km
                })
            })
            .collect()
    }
}

fn filter_category(events: Vec<Event>, criteria: &FilterCriteria) -> Vec<Event> {
    if criteria.category_id.is_none() && criteria.subcategory_id.is_none() {
        return events;
    }
    events
        .into_iter()
        .filter(|event| {
            criteria
                .category_id
                .map_or(true, |id| event.category_main_id == Some(id))
                && criteria
                    .subcategory_id
                    .map_or(true, |id| event.category_sub_id == Some(id))
        })
        .collect()
}

fn filter_source(events: Vec<Event>, source: Option<&str>) -> Vec<Event> {
    let Some(source) = source.map(str::trim).filter(|s| !s.is_empty()) else {
        return events;
    };
    events
        .into_iter()
        .filter(|event| {
            event
                .source
                .as_deref()
                .is_some_and(|value| value.trim().eq_ignore_ascii_case(source))
        })
        .collect()
}

/// An explicit date wins over the named window.
fn filter_dates(events: Vec<Event>, criteria: &FilterCriteria, today: NaiveDate) -> Vec<Event> {
    if let Some(date) = criteria.explicit_date {
        return events
            .into_iter()
            .filter(|event| temporal::start_day(event) == Some(date))
            .collect();
    }
    let Some(window) = criteria.time_window else {
        return events;
    };
    events
        .into_iter()
        .filter(|event| temporal::start_day(event).is_some_and(|day| window.contains(day, today)))
        .collect()
}

fn filter_tags(events: Vec<Event>, wanted: &BTreeSet<String>) -> Vec<Event> {
    if wanted.is_empty() {
        return events;
    }
    let expanded = expand_tags(wanted);
    events
        .into_iter()
        .filter(|event| {
            event.tags.iter().any(|tag| {
                let tag = tag.trim();
                expanded.iter().any(|want| want.eq_ignore_ascii_case(tag))
            })
        })
        .collect()
}

fn expand_tags(wanted: &BTreeSet<String>) -> Vec<String> {
    let mut expanded: Vec<String> = Vec::with_capacity(wanted.len() + FAMILY_SYNONYMS.len());
    for tag in wanted {
        let tag = tag.trim();
        if tag.is_empty() {
            continue;
        }
        expanded.push(tag.to_string());
        if tag.eq_ignore_ascii_case(FAMILY_TAG) {
            expanded.extend(FAMILY_SYNONYMS.iter().map(|s| s.to_string()));
        }
    }
    expanded
}

/// `term` must already be lowercased.
fn matches_search(event: &Event, term: &str) -> bool {
    let fields = [
        Some(event.title.as_str()),
        event.description.as_deref(),
        event.short_description.as_deref(),
        event.venue_name.as_deref(),
        event.location.as_deref(),
        event.address_city.as_deref(),
    ];
    fields
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(term))
}
