//! Initial filters from page URLs such as
//! `/events?category=music&city=Bern&radius=15&time=thisWeekend`.

use chrono::NaiveDate;
use reqwest::Url;
use tracing::warn;

use crate::filter::{FilterCriteria, TimeWindow};
use crate::models::{TaxonomyEntry, TaxonomyKind};

const PLACEHOLDER_BASE: &str = "http://localhost/";

pub fn parse_criteria(link: &str, taxonomy: &[TaxonomyEntry], default_radius_km: f64) -> FilterCriteria {
    let mut criteria = FilterCriteria {
        radius_km: default_radius_km,
        ..FilterCriteria::default()
    };

    let Some(url) = to_url(link) else {
        warn!("unparseable filter link: {link}");
        return criteria;
    };

    for (key, value) in url.query_pairs() {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.as_ref() {
            "category" => apply_category(&mut criteria, value, taxonomy),
            "subcategory" => match value.parse::<i64>() {
                Ok(id) => criteria.subcategory_id = Some(id),
                Err(_) => apply_category(&mut criteria, value, taxonomy),
            },
            "quickFilter" => {
                criteria.tags.insert(value.to_lowercase());
            }
            "city" => criteria.city = Some(value.to_string()),
            "radius" => match value.trim_end_matches("km").trim().parse::<f64>() {
                Ok(radius) if radius.is_finite() && radius > 0.0 => criteria.radius_km = radius,
                _ => warn!("ignoring radius parameter: {value}"),
            },
            "time" => match TimeWindow::parse(value) {
                Some(window) => criteria.time_window = Some(window),
                None => warn!("ignoring time parameter: {value}"),
            },
            "date" => match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
                Ok(date) => criteria.explicit_date = Some(date),
                Err(err) => warn!("ignoring date parameter {value}: {err}"),
            },
            "search" => criteria.search_term = Some(value.to_string()),
            "tags" => criteria.tags.extend(
                value
                    .split(',')
                    .map(|tag| tag.trim().to_lowercase())
                    .filter(|tag| !tag.is_empty()),
            ),
            "source" => criteria.source = Some(value.to_string()),
            _ => {}
        }
    }

    criteria
}

/// Inverse of [`parse_criteria`] for share links. Override filters and
/// corridors are view state and are not encoded.
pub fn to_query_string(criteria: &FilterCriteria, taxonomy: &[TaxonomyEntry]) -> String {
    let mut url = match Url::parse(PLACEHOLDER_BASE) {
        Ok(url) => url,
        Err(_) => return String::new(),
    };
    {
        let mut pairs = url.query_pairs_mut();
        // A sub slug carries its parent; a bare sub id does not.
        match criteria.subcategory_id.map(|id| (id, slug_for(taxonomy, id))) {
            Some((_, Some(slug))) => {
                pairs.append_pair("category", slug);
            }
            unmatched => {
                if let Some(id) = criteria.category_id {
                    let label = slug_for(taxonomy, id)
                        .map(str::to_string)
                        .unwrap_or_else(|| id.to_string());
                    pairs.append_pair("category", &label);
                }
                if let Some((id, None)) = unmatched {
                    pairs.append_pair("subcategory", &id.to_string());
                }
            }
        }
        if let Some(city) = &criteria.city {
            pairs.append_pair("city", city);
            pairs.append_pair("radius", &criteria.radius_km.to_string());
        }
        if let Some(window) = criteria.time_window {
            let name = match window {
                TimeWindow::Today => "today",
                TimeWindow::ThisWeek => "thisWeek",
                TimeWindow::ThisWeekend => "thisWeekend",
                TimeWindow::ThisMonth => "thisMonth",
            };
            pairs.append_pair("time", name);
        }
        if let Some(date) = criteria.explicit_date {
            pairs.append_pair("date", &date.format("%Y-%m-%d").to_string());
        }
        if let Some(term) = &criteria.search_term {
            pairs.append_pair("search", term);
        }
        if !criteria.tags.is_empty() {
            let tags: Vec<&str> = criteria.tags.iter().map(String::as_str).collect();
            pairs.append_pair("tags", &tags.join(","));
        }
        if let Some(source) = &criteria.source {
            pairs.append_pair("source", source);
        }
    }
    url.query().unwrap_or_default().to_string()
}

fn slug_for(taxonomy: &[TaxonomyEntry], id: i64) -> Option<&str> {
    taxonomy
        .iter()
        .find(|entry| entry.id == id)
        .map(|entry| entry.slug.as_str())
}

fn to_url(link: &str) -> Option<Url> {
    let link = link.trim();
    if let Ok(url) = Url::parse(link) {
        return Some(url);
    }
    let base = Url::parse(PLACEHOLDER_BASE).ok()?;
    if link.starts_with('/') || link.starts_with('?') {
        return base.join(link).ok();
    }
    base.join(&format!("?{link}")).ok()
}

/// Numeric ids are taken as given; slugs go through the taxonomy so a
/// subcategory slug also pins its parent.
fn apply_category(criteria: &mut FilterCriteria, value: &str, taxonomy: &[TaxonomyEntry]) {
    if let Ok(id) = value.parse::<i64>() {
        criteria.category_id = Some(id);
        return;
    }
    let Some(entry) = taxonomy
        .iter()
        .find(|entry| entry.is_active && entry.slug.eq_ignore_ascii_case(value))
    else {
        warn!("unknown category slug: {value}");
        return;
    };
    match entry.kind {
        TaxonomyKind::Main => criteria.category_id = Some(entry.id),
        TaxonomyKind::Sub => {
            criteria.category_id = entry.parent_id;
            criteria.subcategory_id = Some(entry.id);
        }
    }
}
