use std::cmp::Ordering;

use crate::models::Event;

/// Pinned events first, then score descending, then favorites descending.
/// `sort_by` is stable, so anything tied on all three keeps its input order.
pub fn rank(events: &mut [Event]) {
    events.sort_by(compare);
}

pub fn compare(a: &Event, b: &Event) -> Ordering {
    b.is_pinned()
        .cmp(&a.is_pinned())
        .then_with(|| b.score().total_cmp(&a.score()))
        .then_with(|| b.favorite_count.cmp(&a.favorite_count))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, elite: bool, buzz: Option<f64>, favorites: i64) -> Event {
        Event {
            id: id.to_string(),
            is_elite: elite,
            buzz_score: buzz,
            favorite_count: favorites,
            ..Event::default()
        }
    }

    #[test]
    fn orders_by_pin_then_score_then_favorites() {
        let mut events = vec![
            event("low", false, Some(10.0), 0),
            event("fav", false, Some(50.0), 9),
            event("pinned", true, Some(1.0), 0),
            event("plain", false, Some(50.0), 2),
        ];
        rank(&mut events);
        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["pinned", "fav", "plain", "low"]);

        for pair in events.windows(2) {
            assert_ne!(compare(&pair[0], &pair[1]), Ordering::Greater);
        }
    }

    #[test]
    fn full_ties_keep_input_order() {
        let mut events = vec![
            event("first", false, Some(30.0), 1),
            event("second", false, Some(30.0), 1),
            event("third", false, Some(30.0), 1),
        ];
        rank(&mut events);
        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn relevance_stands_in_for_missing_buzz() {
        let mut events = vec![
            event("buzz", false, Some(20.0), 0),
            Event {
                id: "relevance".into(),
                relevance_score: Some(35.0),
                ..Event::default()
            },
        ];
        rank(&mut events);
        assert_eq!(events[0].id, "relevance");
    }
}
