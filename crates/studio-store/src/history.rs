//! Undo/redo history for one canvas document.
//!
//! Every change produces a full snapshot of the canvas state; a
//! [`ThrottleFilter`] decides which changes open a new undo step. Changes
//! the filter skips still update `present`, so a burst of same-type edits
//! (dragging a slider, nudging the bbox) undoes as one step back to the
//! state before the burst.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Action types recorded individually regardless of timing: each freehand
/// stroke or shape is its own edit.
pub const THROTTLE_EXEMPT_TYPES: &[&str] = &[
    "canvas/entityBrushLineAdded",
    "canvas/entityEraserLineAdded",
    "canvas/entityRectAdded",
];

/// Only actions of this slice are ever recorded.
pub const RECORDED_SLICE_PREFIX: &str = "canvas/";

// ─── Time ─────────────────────────────────────────────────────────────────

/// Monotonic time source, injected so throttling is testable.
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

// ─── Filter ───────────────────────────────────────────────────────────────

/// Decides whether a state-changing action opens a new undo step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleFilter {
    last_action_type: Option<&'static str>,
    ignore_until: Duration,
    window: Duration,
}

impl ThrottleFilter {
    pub fn new(window: Duration) -> Self {
        Self {
            last_action_type: None,
            ignore_until: Duration::ZERO,
            window,
        }
    }

    pub fn should_record(&mut self, action_type: &'static str, now: Duration) -> bool {
        if !action_type.starts_with(RECORDED_SLICE_PREFIX) {
            return false;
        }
        if THROTTLE_EXEMPT_TYPES.contains(&action_type) {
            self.last_action_type = Some(action_type);
            self.ignore_until = Duration::ZERO;
            return true;
        }
        if self.last_action_type == Some(action_type) && now < self.ignore_until {
            log::trace!("coalescing {action_type} into the current undo step");
            return false;
        }
        self.last_action_type = Some(action_type);
        self.ignore_until = now + self.window;
        true
    }

    /// Forget the current burst; the next change always records.
    pub fn reset(&mut self) {
        self.last_action_type = None;
        self.ignore_until = Duration::ZERO;
    }
}

// ─── History ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct History<S> {
    past: VecDeque<S>,
    present: S,
    future: Vec<S>,
    limit: usize,
    filter: ThrottleFilter,
}

impl<S: Clone + PartialEq> History<S> {
    pub fn new(present: S, limit: usize, window: Duration) -> Self {
        Self {
            past: VecDeque::with_capacity(limit.min(64)),
            present,
            future: Vec::new(),
            limit,
            filter: ThrottleFilter::new(window),
        }
    }

    pub fn present(&self) -> &S {
        &self.present
    }

    pub fn past_len(&self) -> usize {
        self.past.len()
    }

    pub fn future_len(&self) -> usize {
        self.future.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Run `reduce` against a copy of `present` and keep the result. Returns
    /// whether the state changed. Unchanged results are dropped without
    /// touching the filter.
    pub fn apply(&mut self, action_type: &'static str, now: Duration, reduce: impl FnOnce(&mut S)) -> bool {
        let mut next = self.present.clone();
        reduce(&mut next);
        if next == self.present {
            return false;
        }

        if self.filter.should_record(action_type, now) {
            let previous = std::mem::replace(&mut self.present, next);
            self.push_past(previous);
            self.future.clear();
        } else {
            self.present = next;
        }
        true
    }

    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.past.pop_back() else {
            return false;
        };
        let current = std::mem::replace(&mut self.present, previous);
        self.future.push(current);
        self.filter.reset();
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(next) = self.future.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.present, next);
        self.push_past(current);
        self.filter.reset();
        true
    }

    /// Drop every undo/redo step; `present` is untouched.
    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
        self.filter.reset();
    }

    /// Replace `present` without recording, clearing all steps.
    pub fn reset_to(&mut self, present: S) {
        self.present = present;
        self.clear();
    }

    /// Change the bound and throttle window, evicting steps beyond the new bound.
    pub fn configure(&mut self, limit: usize, window: Duration) {
        self.limit = limit;
        while self.past.len() > self.limit {
            self.past.pop_front();
        }
        self.filter = ThrottleFilter::new(window);
    }

    fn push_past(&mut self, snapshot: S) {
        if self.limit == 0 {
            return;
        }
        self.past.push_back(snapshot);
        if self.past.len() > self.limit {
            self.past.pop_front();
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    fn history() -> History<i32> {
        History::new(0, 64, Duration::from_millis(1000))
    }

    #[test]
    fn burst_of_same_type_is_one_step() {
        let mut h = history();
        for i in 1..=10 {
            h.apply("canvas/entityOpacityChanged", MS * (20 * i), |s| *s = i as i32);
        }
        assert_eq!(h.past_len(), 1);
        assert_eq!(*h.present(), 10);

        assert!(h.undo());
        assert_eq!(*h.present(), 0);
        assert!(h.redo());
        assert_eq!(*h.present(), 10);
    }

    #[test]
    fn exempt_types_record_every_time() {
        let mut h = history();
        for i in 1..=10 {
            h.apply("canvas/entityBrushLineAdded", MS * (20 * i), |s| *s += 1);
        }
        assert_eq!(h.past_len(), 10);
    }

    #[test]
    fn type_change_and_window_expiry_record() {
        let mut h = history();
        h.apply("canvas/bboxWidthChanged", MS * 0, |s| *s = 1);
        h.apply("canvas/bboxHeightChanged", MS * 10, |s| *s = 2);
        h.apply("canvas/bboxHeightChanged", MS * 500, |s| *s = 3);
        h.apply("canvas/bboxHeightChanged", MS * 1500, |s| *s = 4);
        assert_eq!(h.past_len(), 3);
    }

    #[test]
    fn other_slices_never_record() {
        let mut h = history();
        assert!(h.apply("params/modelChanged", MS, |s| *s = 5));
        assert_eq!(*h.present(), 5);
        assert!(!h.can_undo());
    }

    #[test]
    fn noop_changes_do_not_open_a_window() {
        let mut h = history();
        assert!(!h.apply("canvas/entityMoved", MS, |_| {}));
        h.apply("canvas/entityMoved", MS * 2, |s| *s = 1);
        assert_eq!(h.past_len(), 1);
    }

    #[test]
    fn limit_evicts_oldest() {
        let mut h = History::new(0, 3, Duration::ZERO);
        for i in 1..=5 {
            h.apply("canvas/entityRectAdded", MS * i, |s| *s = i as i32);
        }
        assert_eq!(h.past_len(), 3);
        let mut undos = 0;
        while h.undo() {
            undos += 1;
        }
        assert_eq!(undos, 3);
        assert_eq!(*h.present(), 2);
    }

    #[test]
    fn new_change_truncates_redo_and_ends_are_noops() {
        let mut h = history();
        assert!(!h.undo());
        h.apply("canvas/entityRectAdded", MS, |s| *s = 1);
        h.apply("canvas/entityRectAdded", MS * 2, |s| *s = 2);
        h.undo();
        assert!(h.can_redo());
        h.apply("canvas/entityRectAdded", MS * 3, |s| *s = 7);
        assert!(!h.can_redo());
        assert!(!h.redo());
    }

    #[test]
    fn clear_keeps_present() {
        let mut h = history();
        h.apply("canvas/entityRectAdded", MS, |s| *s = 4);
        h.clear();
        assert_eq!(*h.present(), 4);
        assert!(!h.can_undo() && !h.can_redo());
    }

    #[test]
    fn shrinking_the_bound_drops_oldest_steps() {
        let mut h = history();
        for i in 1..=6 {
            h.apply("canvas/entityRectAdded", MS * i, |s| *s = i as i32);
        }
        h.configure(2, Duration::ZERO);
        assert_eq!(h.past_len(), 2);
        h.undo();
        h.undo();
        assert_eq!(*h.present(), 4);
    }

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let clock = ManualClock::default();
        let other = clock.clone();
        clock.advance(Duration::from_millis(250));
        assert_eq!(other.now(), Duration::from_millis(250));
    }
}
