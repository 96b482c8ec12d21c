//! Delivery-date and time-window token extraction from Shopify order tags.
//!
//! Florists tag orders with a `dd/mm/yyyy` token naming the delivery day and
//! optionally an `HH:MM-HH:MM` token naming a delivery window. Both live in
//! the order's free-form tag list alongside arbitrary other tags
//! (`["25/01/2025", "10:00-14:00", "birthday"]`).

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;

/// Scans tags for the first `dd/mm/yyyy` token and parses it as
/// day/month/year.
///
/// Only shape and range are validated (day 1–31, month 1–12); the convention
/// is lenient by design and day≤12 tags are inherently ambiguous upstream.
/// Tokens that pass the shape check but name an impossible calendar date
/// (e.g. `31/02/2025`) are skipped and the scan continues, so a later valid
/// tag can still win.
///
/// Returns `None` when no tag yields a date. Callers must fall back to the
/// order's creation date and log a warning; an untagged order is never
/// dropped.
#[must_use]
pub fn extract_delivery_date(tags: &[String]) -> Option<NaiveDate> {
    let re = Regex::new(r"^(\d{2})/(\d{2})/(\d{4})$").expect("valid date tag regex");

    for tag in tags {
        let Some(caps) = re.captures(tag.trim()) else {
            continue;
        };
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;

        if !(1..=31).contains(&day) || !(1..=12).contains(&month) {
            continue;
        }

        // from_ymd_opt rejects impossible dates the range check lets through.
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }

    None
}

/// A delivery time window extracted from an order's tags.
///
/// `Unscheduled` is the sentinel for orders with no window tag; the derived
/// ordering places every concrete window before it, so unscheduled orders
/// sort last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TimeWindow {
    Window { start: NaiveTime, end: NaiveTime },
    Unscheduled,
}

impl TimeWindow {
    /// Rank used in card sort keys: minutes-from-midnight of the window
    /// start, with `Unscheduled` mapped past the last minute of the day.
    #[must_use]
    pub fn rank(&self) -> u32 {
        match self {
            TimeWindow::Window { start, .. } => {
                chrono::Timelike::hour(start) * 60 + chrono::Timelike::minute(start)
            }
            TimeWindow::Unscheduled => 24 * 60,
        }
    }

    /// The raw `HH:MM-HH:MM` form, for persistence alongside the order.
    #[must_use]
    pub fn as_tag(&self) -> Option<String> {
        match self {
            TimeWindow::Window { start, end } => Some(format!(
                "{}-{}",
                start.format("%H:%M"),
                end.format("%H:%M")
            )),
            TimeWindow::Unscheduled => None,
        }
    }
}

/// Scans tags for the first `HH:MM-HH:MM` token.
///
/// Absence of a window tag (or an unparseable one) yields
/// [`TimeWindow::Unscheduled`] rather than an error.
#[must_use]
pub fn extract_time_window(tags: &[String]) -> TimeWindow {
    let re = Regex::new(r"^(\d{2}):(\d{2})-(\d{2}):(\d{2})$").expect("valid time window regex");

    for tag in tags {
        let Some(caps) = re.captures(tag.trim()) else {
            continue;
        };
        let parse_time = |h: &str, m: &str| -> Option<NaiveTime> {
            NaiveTime::from_hms_opt(h.parse().ok()?, m.parse().ok()?, 0)
        };
        if let (Some(start), Some(end)) = (
            parse_time(&caps[1], &caps[2]),
            parse_time(&caps[3], &caps[4]),
        ) {
            return TimeWindow::Window { start, end };
        }
    }

    TimeWindow::Unscheduled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn extracts_date_from_mixed_tags() {
        let date = extract_delivery_date(&tags(&["25/01/2025", "birthday"]));
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 1, 25));
    }

    #[test]
    fn returns_none_when_no_date_tag() {
        assert!(extract_delivery_date(&tags(&["birthday"])).is_none());
    }

    #[test]
    fn returns_none_for_empty_tags() {
        assert!(extract_delivery_date(&[]).is_none());
    }

    #[test]
    fn skips_impossible_calendar_date_and_takes_later_tag() {
        let date = extract_delivery_date(&tags(&["31/02/2025", "01/03/2025"]));
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 3, 1));
    }

    #[test]
    fn rejects_out_of_range_month() {
        assert!(extract_delivery_date(&tags(&["25/13/2025"])).is_none());
    }

    #[test]
    fn rejects_loose_shapes() {
        assert!(extract_delivery_date(&tags(&["5/1/2025"])).is_none());
        assert!(extract_delivery_date(&tags(&["25/01/25"])).is_none());
        assert!(extract_delivery_date(&tags(&["deliver 25/01/2025 am"])).is_none());
    }

    #[test]
    fn first_matching_date_tag_wins() {
        let date = extract_delivery_date(&tags(&["01/02/2025", "03/04/2025"]));
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 2, 1));
    }

    #[test]
    fn trims_whitespace_around_tag() {
        let date = extract_delivery_date(&tags(&["  25/01/2025  "]));
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 1, 25));
    }

    #[test]
    fn extracts_time_window() {
        let window = extract_time_window(&tags(&["25/01/2025", "10:00-14:00"]));
        assert_eq!(
            window,
            TimeWindow::Window {
                start: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                end: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            }
        );
        assert_eq!(window.as_tag().as_deref(), Some("10:00-14:00"));
    }

    #[test]
    fn missing_window_is_unscheduled() {
        assert_eq!(
            extract_time_window(&tags(&["25/01/2025"])),
            TimeWindow::Unscheduled
        );
    }

    #[test]
    fn unscheduled_sorts_after_any_window() {
        let morning = extract_time_window(&tags(&["08:00-10:00"]));
        let evening = extract_time_window(&tags(&["18:00-20:00"]));
        assert!(morning < evening);
        assert!(evening < TimeWindow::Unscheduled);
        assert!(morning.rank() < evening.rank());
        assert!(evening.rank() < TimeWindow::Unscheduled.rank());
    }

    #[test]
    fn invalid_window_hours_are_unscheduled() {
        assert_eq!(
            extract_time_window(&tags(&["25:00-27:00"])),
            TimeWindow::Unscheduled
        );
    }
}
