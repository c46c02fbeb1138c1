use std::collections::HashSet;

use sha2::{Digest, Sha256};

use super::temporal;
use crate::models::Event;

/// Drops repeated rows, keeping the first occurrence.
///
/// Rows repeat by `id` when pages overlap, and by content when two upstream
/// sources publish the same show under different ids.
pub fn dedupe(events: &[Event]) -> Vec<Event> {
    let mut seen_ids: HashSet<&str> = HashSet::with_capacity(events.len());
    let mut seen_fingerprints: HashSet<String> = HashSet::with_capacity(events.len());
    let mut out = Vec::with_capacity(events.len());

    for event in events {
        if !seen_ids.insert(event.id.as_str()) {
            continue;
        }
        if let Some(fingerprint) = fingerprint(event) {
            if !seen_fingerprints.insert(fingerprint) {
                continue;
            }
        }
        out.push(event.clone());
    }

    out
}

/// Stable hash of title | start day | venue. Events without a start day or
/// title are never merged by content.
pub fn fingerprint(event: &Event) -> Option<String> {
    let title = normalize(&event.title);
    if title.is_empty() {
        return None;
    }
    let day = temporal::start_day(event)?;
    let venue = event.venue_name.as_deref().map(normalize).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b"|");
    hasher.update(day.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(venue.as_bytes());
    Some(format!("{:x}", hasher.finalize()))
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
