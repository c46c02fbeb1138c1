use serde::Serialize;
use tracing::debug;

use crate::models::Event;

pub const DEFAULT_PAGE_SIZE: usize = 120;
pub const DEFAULT_INCREMENT: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ScrollIntent {
    Top,
    ToEvent(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JumpOutcome {
    pub page: usize,
    pub page_changed: bool,
}

#[derive(Debug, Clone)]
pub struct Pager {
    page_size: usize,
    increment: usize,
    page: usize,
    displayed: usize,
    pending_scroll: Option<String>,
}

impl Default for Pager {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE, DEFAULT_INCREMENT)
    }
}

impl Pager {
    pub fn new(page_size: usize, increment: usize) -> Self {
        let page_size = page_size.max(1);
        let increment = increment.clamp(1, page_size);
        Self {
            page_size,
            increment,
            page: 1,
            displayed: increment,
            pending_scroll: None,
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn displayed_count(&self) -> usize {
        self.displayed
    }

    pub fn page_count(&self, total: usize) -> usize {
        total.div_ceil(self.page_size).max(1)
    }

    pub fn page_items<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = ((self.page - 1) * self.page_size).min(items.len());
        let end = (start + self.page_size).min(items.len());
        &items[start..end]
    }

    pub fn visible<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let page = self.page_items(items);
        &page[..self.displayed.min(page.len())]
    }

    pub fn has_more(&self, total: usize) -> bool {
        self.displayed < self.page_len(total)
    }

    /// Grows the window by one increment. Returns false when nothing more
    /// of the current page is hidden.
    pub fn load_more(&mut self, total: usize) -> bool {
        if !self.has_more(total) {
            return false;
        }
        self.displayed = (self.displayed + self.increment).min(self.page_size);
        true
    }

    pub fn go_to_page(&mut self, page: usize, total: usize) -> ScrollIntent {
        self.page = page.clamp(1, self.page_count(total));
        self.displayed = self.increment;
        self.pending_scroll = None;
        ScrollIntent::Top
    }

    /// Moves to the page holding `event_id` and queues a scroll to it.
    ///
    /// The element only exists after the view re-renders, so the scroll is
    /// not returned here; call [`Pager::after_render`] on the next render
    /// pass to collect it.
    pub fn jump_to_event(&mut self, events: &[Event], event_id: &str) -> Option<JumpOutcome> {
        let index = events.iter().position(|event| event.id == event_id)?;
        let page = index / self.page_size + 1;
        let page_changed = page != self.page;
        self.page = page;

        // Reset the window, but far enough to include the target.
        let offset = index % self.page_size;
        let needed = (offset / self.increment + 1) * self.increment;
        self.displayed = needed.min(self.page_size);
        self.pending_scroll = Some(event_id.to_string());

        Some(JumpOutcome { page, page_changed })
    }

    pub fn pending_scroll(&self) -> Option<&str> {
        self.pending_scroll.as_deref()
    }

    /// Resolves a queued jump once the ids that actually rendered are known.
    /// Missing targets are dropped without error.
    pub fn after_render<'a, I>(&mut self, rendered_ids: I) -> Option<ScrollIntent>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let target = self.pending_scroll.take()?;
        if rendered_ids.into_iter().any(|id| id == target) {
            Some(ScrollIntent::ToEvent(target))
        } else {
            debug!(event_id = %target, "jump target not rendered, skipping scroll");
            None
        }
    }

    pub fn reset(&mut self) {
        self.page = 1;
        self.displayed = self.increment;
        self.pending_scroll = None;
    }

    fn page_len(&self, total: usize) -> usize {
        let start = (self.page - 1) * self.page_size;
        total.saturating_sub(start).min(self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(count: usize) -> Vec<Event> {
        (0..count)
            .map(|i| Event {
                id: format!("e{i}"),
                ..Event::default()
            })
            .collect()
    }

    #[test]
    fn window_grows_until_page_is_exhausted() {
        let items = events(100);
        let mut pager = Pager::new(120, 30);
        assert_eq!(pager.visible(&items).len(), 30);
        assert!(pager.load_more(items.len()));
        assert!(pager.load_more(items.len()));
        assert!(pager.load_more(items.len()));
        assert_eq!(pager.visible(&items).len(), 100);
        assert!(!pager.has_more(items.len()));
        assert!(!pager.load_more(items.len()));
    }

    #[test]
    fn window_never_exceeds_page_size() {
        let items = events(300);
        let mut pager = Pager::new(50, 40);
        pager.load_more(items.len());
        assert_eq!(pager.displayed_count(), 50);
        assert_eq!(pager.visible(&items).len(), 50);
        assert!(!pager.load_more(items.len()));
    }

    #[test]
    fn page_navigation_resets_window_and_scrolls_up() {
        let items = events(300);
        let mut pager = Pager::default();
        pager.load_more(items.len());
        assert_eq!(pager.go_to_page(3, items.len()), ScrollIntent::Top);
        assert_eq!(pager.page(), 3);
        assert_eq!(pager.displayed_count(), DEFAULT_INCREMENT);
        assert_eq!(pager.page_items(&items).len(), 60);
        assert_eq!(pager.visible(&items)[0].id, "e240");

        pager.go_to_page(99, items.len());
        assert_eq!(pager.page(), 3);
        pager.go_to_page(0, items.len());
        assert_eq!(pager.page(), 1);
    }

    #[test]
    fn jump_switches_page_then_scrolls_after_render() {
        let items = events(300);
        let mut pager = Pager::default();
        let outcome = pager.jump_to_event(&items, "e130").expect("known event");
        assert_eq!(
            outcome,
            JumpOutcome {
                page: 2,
                page_changed: true
            }
        );
        assert_eq!(pager.pending_scroll(), Some("e130"));
        assert!(pager.visible(&items).iter().any(|e| e.id == "e130"));

        let rendered: Vec<&str> = pager.visible(&items).iter().map(|e| e.id.as_str()).collect();
        assert_eq!(
            pager.after_render(rendered),
            Some(ScrollIntent::ToEvent("e130".into()))
        );
        assert_eq!(pager.pending_scroll(), None);
    }

    #[test]
    fn jump_within_page_reports_no_change() {
        let items = events(50);
        let mut pager = Pager::default();
        let outcome = pager.jump_to_event(&items, "e5").expect("known event");
        assert!(!outcome.page_changed);
        assert_eq!(outcome.page, 1);
    }

    #[test]
    fn missing_scroll_target_is_a_silent_no_op() {
        let items = events(10);
        let mut pager = Pager::default();
        pager.jump_to_event(&items, "e3").expect("known event");
        assert_eq!(pager.after_render(["e1", "e2"]), None);
        assert_eq!(pager.after_render(["e3"]), None);
        assert!(pager.jump_to_event(&items, "missing").is_none());
    }

    #[test]
    fn page_count_for_empty_results_is_one() {
        let pager = Pager::default();
        assert_eq!(pager.page_count(0), 1);
        assert_eq!(pager.page_count(120), 1);
        assert_eq!(pager.page_count(121), 2);
        assert!(pager.visible::<Event>(&[]).is_empty());
    }
}
