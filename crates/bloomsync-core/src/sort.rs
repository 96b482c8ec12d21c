//! Card sort-key construction.
//!
//! The UI orders work cards by `(time window, store, label priority)`. The
//! direction of the label-priority component is owned by the label CRUD
//! service's stored convention, so it is injected as configuration rather
//! than hardcoded.

use crate::tags::TimeWindow;

/// Which way the external label service's `priority` column sorts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelPriorityDirection {
    /// Lower priority numbers sort earlier (the observed convention).
    #[default]
    LowerFirst,
    /// Higher priority numbers sort earlier.
    HigherFirst,
}

/// A lexicographically comparable sort key for one card.
pub type CardSortKey = (u32, i32, i64);

/// Builds the sort key for a card.
///
/// Cards with no label priority (unknown products) sort after prioritized
/// cards within the same window and store.
#[must_use]
pub fn card_sort_key(
    window: TimeWindow,
    store_rank: i32,
    label_priority: Option<i32>,
    direction: LabelPriorityDirection,
) -> CardSortKey {
    let priority_component = match (label_priority, direction) {
        (Some(p), LabelPriorityDirection::LowerFirst) => i64::from(p),
        (Some(p), LabelPriorityDirection::HigherFirst) => -i64::from(p),
        (None, _) => i64::MAX,
    };

    (window.rank(), store_rank, priority_component)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;

    fn window(start_h: u32, end_h: u32) -> TimeWindow {
        TimeWindow::Window {
            start: NaiveTime::from_hms_opt(start_h, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(end_h, 0, 0).unwrap(),
        }
    }

    #[test]
    fn earlier_window_sorts_first() {
        let a = card_sort_key(window(8, 10), 0, Some(1), LabelPriorityDirection::LowerFirst);
        let b = card_sort_key(window(14, 16), 0, Some(1), LabelPriorityDirection::LowerFirst);
        assert!(a < b);
    }

    #[test]
    fn unscheduled_sorts_last_regardless_of_priority() {
        let scheduled = card_sort_key(
            window(18, 20),
            5,
            None,
            LabelPriorityDirection::LowerFirst,
        );
        let unscheduled = card_sort_key(
            TimeWindow::Unscheduled,
            0,
            Some(0),
            LabelPriorityDirection::LowerFirst,
        );
        assert!(scheduled < unscheduled);
    }

    #[test]
    fn lower_first_prefers_small_priority_numbers() {
        let high = card_sort_key(window(8, 10), 0, Some(1), LabelPriorityDirection::LowerFirst);
        let low = card_sort_key(window(8, 10), 0, Some(9), LabelPriorityDirection::LowerFirst);
        assert!(high < low);
    }

    #[test]
    fn higher_first_inverts_priority_ordering() {
        let high = card_sort_key(window(8, 10), 0, Some(9), LabelPriorityDirection::HigherFirst);
        let low = card_sort_key(window(8, 10), 0, Some(1), LabelPriorityDirection::HigherFirst);
        assert!(high < low);
    }

    #[test]
    fn missing_priority_sorts_after_any_priority() {
        let known = card_sort_key(window(8, 10), 0, Some(999), LabelPriorityDirection::LowerFirst);
        let unknown = card_sort_key(window(8, 10), 0, None, LabelPriorityDirection::LowerFirst);
        assert!(known < unknown);
    }
}
