//! Paged window over an ordered list, sized by viewport width.
//!
//! Windows start on multiples of the page size and the last one is clipped to
//! the list length, so seven items three at a time show `0..3`, `3..6`, `6..7`.

use serde::Serialize;
use std::ops::Range;

/// Horizontal travel, in pixels, a touch must exceed to count as a swipe.
pub const SWIPE_THRESHOLD_PX: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Viewport {
    Narrow,
    Medium,
    Wide,
}

impl Viewport {
    pub const fn from_width(width: u32) -> Self {
        if width < 640 {
            Self::Narrow
        } else if width < 1024 {
            Self::Medium
        } else {
            Self::Wide
        }
    }

    pub const fn page_size(self) -> usize {
        match self {
            Self::Narrow => 1,
            Self::Medium => 2,
            Self::Wide => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwipeDirection {
    Next,
    Previous,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Carousel {
    len: usize,
    viewport: Viewport,
    start: usize,
    selected: Option<usize>,
    touch_origin: Option<f64>,
}

impl Carousel {
    pub fn new(len: usize, width: u32) -> Self {
        let mut carousel = Self {
            len,
            viewport: Viewport::from_width(width),
            start: 0,
            selected: None,
            touch_origin: None,
        };
        carousel.sync_selection();
        carousel
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn page_size(&self) -> usize {
        self.viewport.page_size()
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn select(&mut self, index: usize) {
        if index < self.len {
            self.selected = Some(index);
        }
    }

    pub fn visible_range(&self) -> Range<usize> {
        self.start..(self.start + self.page_size()).min(self.len)
    }

    pub fn visible<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let range = self.visible_range();
        &items[range.start.min(items.len())..range.end.min(items.len())]
    }

    pub fn can_go_next(&self) -> bool {
        self.start + self.page_size() < self.len
    }

    pub fn can_go_previous(&self) -> bool {
        self.start > 0
    }

    pub fn next(&mut self) -> bool {
        if !self.can_go_next() {
            return false;
        }
        self.start += self.page_size();
        self.sync_selection();
        true
    }

    pub fn previous(&mut self) -> bool {
        if !self.can_go_previous() {
            return false;
        }
        self.start = self.start.saturating_sub(self.page_size());
        self.sync_selection();
        true
    }

    /// Recompute the page size after a viewport change, keeping the first
    /// visible item on screen.
    pub fn resize(&mut self, width: u32) {
        let viewport = Viewport::from_width(width);
        if viewport == self.viewport {
            return;
        }
        self.viewport = viewport;
        self.start = self.aligned(self.start);
        self.sync_selection();
    }

    pub fn set_len(&mut self, len: usize) {
        self.len = len;
        self.start = self.aligned(self.start);
        if self.selected.is_some_and(|index| index >= len) {
            self.selected = None;
        }
        self.sync_selection();
    }

    pub fn touch_start(&mut self, x: f64) {
        self.touch_origin = Some(x);
    }

    /// Finish a touch gesture, navigating when it was a swipe.
    pub fn touch_end(&mut self, x: f64) -> Option<SwipeDirection> {
        let delta = x - self.touch_origin.take()?;
        if delta.abs() <= SWIPE_THRESHOLD_PX {
            return None;
        }

        if delta < 0.0 {
            self.next().then_some(SwipeDirection::Next)
        } else {
            self.previous().then_some(SwipeDirection::Previous)
        }
    }

    fn last_start(&self) -> usize {
        match self.len {
            0 => 0,
            len => ((len - 1) / self.page_size()) * self.page_size(),
        }
    }

    fn aligned(&self, start: usize) -> usize {
        ((start / self.page_size()) * self.page_size()).min(self.last_start())
    }

    fn sync_selection(&mut self) {
        if self.viewport == Viewport::Narrow && self.len > 0 {
            self.selected = Some(self.start);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDE: u32 = 1280;
    const MEDIUM: u32 = 800;
    const NARROW: u32 = 375;

    #[test]
    fn page_size_follows_viewport_width() {
        assert_eq!(Viewport::from_width(NARROW).page_size(), 1);
        assert_eq!(Viewport::from_width(MEDIUM).page_size(), 2);
        assert_eq!(Viewport::from_width(WIDE).page_size(), 3);
    }

    #[test]
    fn last_window_is_clipped_to_the_list() {
        let mut carousel = Carousel::new(7, WIDE);
        assert_eq!(carousel.visible_range(), 0..3);
        assert!(!carousel.can_go_previous());
        assert!(carousel.can_go_next());

        assert!(carousel.next());
        assert_eq!(carousel.visible_range(), 3..6);
        assert!(carousel.can_go_previous());
        assert!(carousel.can_go_next());

        assert!(carousel.next());
        assert_eq!(carousel.visible_range(), 6..7);
        assert!(!carousel.can_go_next());
        assert!(!carousel.next());
        assert_eq!(carousel.start(), 6);

        assert!(carousel.previous());
        assert!(carousel.previous());
        assert_eq!(carousel.start(), 0);
        assert!(!carousel.previous());
    }

    #[test]
    fn swipes_below_threshold_are_ignored() {
        let mut carousel = Carousel::new(7, WIDE);
        carousel.touch_start(300.0);
        assert_eq!(carousel.touch_end(260.0), None);
        assert_eq!(carousel.start(), 0);

        carousel.touch_start(300.0);
        assert_eq!(carousel.touch_end(200.0), Some(SwipeDirection::Next));
        assert_eq!(carousel.start(), 3);

        carousel.touch_start(100.0);
        assert_eq!(carousel.touch_end(220.0), Some(SwipeDirection::Previous));
        assert_eq!(carousel.start(), 0);

        carousel.touch_start(100.0);
        assert_eq!(carousel.touch_end(220.0), None);
        assert_eq!(carousel.touch_end(400.0), None);
    }

    #[test]
    fn narrow_viewport_selects_first_visible_item() {
        let mut carousel = Carousel::new(4, NARROW);
        assert_eq!(carousel.selected(), Some(0));
        carousel.next();
        assert_eq!(carousel.selected(), Some(1));

        let mut wide = Carousel::new(4, WIDE);
        wide.next();
        assert_eq!(wide.selected(), None);
    }

    #[test]
    fn resize_realigns_window() {
        let mut carousel = Carousel::new(7, NARROW);
        for _ in 0..5 {
            carousel.next();
        }
        assert_eq!(carousel.start(), 5);

        carousel.resize(WIDE);
        assert_eq!(carousel.start(), 3);
        assert_eq!(carousel.visible_range(), 3..6);

        carousel.set_len(2);
        assert_eq!(carousel.start(), 0);
        let items = ["a", "b"];
        assert_eq!(carousel.visible(&items).to_vec(), vec!["a", "b"]);
    }

    #[test]
    fn empty_list_has_no_navigation() {
        let mut carousel = Carousel::new(0, NARROW);
        assert_eq!(carousel.visible_range(), 0..0);
        assert!(!carousel.can_go_next());
        assert!(!carousel.next());
        assert_eq!(carousel.selected(), None);
    }
}
