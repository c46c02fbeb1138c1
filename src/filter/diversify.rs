use std::collections::HashMap;

use crate::models::{CategoryKey, Event};

pub const DEFAULT_CAP: usize = 2;
pub const RELAXED_CAP: usize = 3;

/// Keeps at most `cap` events per category key, preserving input order.
pub fn cap_per_category(events: &[Event], cap: usize) -> Vec<Event> {
    let mut taken: HashMap<CategoryKey, usize> = HashMap::new();
    events
        .iter()
        .filter(|event| {
            let count = taken.entry(event.category_key()).or_insert(0);
            if *count >= cap {
                return false;
            }
            *count += 1;
            true
        })
        .cloned()
        .collect()
}

/// Caps categories so one venue type cannot fill a grid. When the strict cap
/// leaves fewer than `target` events, the relaxed cap is used instead.
pub fn diversify(events: &[Event], cap: usize, relaxed_cap: usize, target: usize) -> Vec<Event> {
    let strict = cap_per_category(events, cap);
    if strict.len() >= target || relaxed_cap <= cap {
        return strict;
    }
    tracing::debug!(
        kept = strict.len(),
        target,
        relaxed_cap,
        "diversification below target, relaxing cap"
    );
    cap_per_category(events, relaxed_cap)
}
