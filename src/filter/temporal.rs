use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::models::Event;

pub const LOCAL_TZ: Tz = chrono_tz::Europe::Zurich;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeWindow {
    Today,
    ThisWeek,
    ThisWeekend,
    ThisMonth,
}

impl TimeWindow {
    /// Accepts the values used in `?time=` links.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "today" => Some(Self::Today),
            "thisweek" | "this-week" | "this_week" | "week" => Some(Self::ThisWeek),
            "thisweekend" | "this-weekend" | "this_weekend" | "weekend" => Some(Self::ThisWeekend),
            "thismonth" | "this-month" | "this_month" | "month" => Some(Self::ThisMonth),
            _ => None,
        }
    }

    pub fn contains(&self, day: NaiveDate, today: NaiveDate) -> bool {
        match self {
            Self::Today => day == today,
            Self::ThisWeek => {
                let to_sunday = 6 - i64::from(today.weekday().num_days_from_monday());
                day >= today && day <= today + Duration::days(to_sunday)
            }
            Self::ThisWeekend => {
                let (first, last) = weekend_span(today);
                day >= first && day <= last
            }
            Self::ThisMonth => day.year() == today.year() && day.month() == today.month(),
        }
    }
}

/// Saturday and Sunday of the coming weekend, clipped to today when the
/// weekend has already started.
fn weekend_span(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let offset = i64::from(today.weekday().num_days_from_monday());
    match offset {
        5 => (today, today + Duration::days(1)),
        6 => (today, today),
        _ => {
            let saturday = today + Duration::days(5 - offset);
            (saturday, saturday + Duration::days(1))
        }
    }
}

/// Local calendar day an event starts on, or `None` when the start is
/// missing or unreadable.
pub fn start_day(event: &Event) -> Option<NaiveDate> {
    event.start_date.as_deref().and_then(local_day)
}

pub fn local_day(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&LOCAL_TZ).date_naive());
    }
    // Postgres timestamptz text uses a space and a short offset.
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%#z") {
        return Some(dt.with_timezone(&LOCAL_TZ).date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(naive.date());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

pub fn today_in(now: DateTime<Utc>) -> NaiveDate {
    LOCAL_TZ.from_utc_datetime(&now.naive_utc()).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn parses_common_start_formats_into_local_days() {
        assert_eq!(local_day("2026-10-21T19:30:00+02:00"), Some(day(2026, 10, 21)));
        // 23:30 UTC is already the next day in Zürich.
        assert_eq!(local_day("2026-10-21T23:30:00Z"), Some(day(2026, 10, 22)));
        assert_eq!(local_day("2026-10-21 19:30:00+02"), Some(day(2026, 10, 21)));
        assert_eq!(local_day("2026-10-21T19:30:00"), Some(day(2026, 10, 21)));
        assert_eq!(local_day("2026-10-21"), Some(day(2026, 10, 21)));
        assert_eq!(local_day("next tuesday"), None);
        assert_eq!(local_day(""), None);
    }

    #[test]
    fn this_week_runs_from_today_to_sunday() {
        let wednesday = day(2026, 10, 21);
        assert!(TimeWindow::ThisWeek.contains(wednesday, wednesday));
        assert!(TimeWindow::ThisWeek.contains(day(2026, 10, 25), wednesday));
        assert!(!TimeWindow::ThisWeek.contains(day(2026, 10, 26), wednesday));
        assert!(!TimeWindow::ThisWeek.contains(day(2026, 10, 20), wednesday));
    }

    #[test]
    fn weekend_is_the_coming_saturday_and_sunday() {
        let wednesday = day(2026, 10, 21);
        assert!(!TimeWindow::ThisWeekend.contains(day(2026, 10, 23), wednesday));
        assert!(TimeWindow::ThisWeekend.contains(day(2026, 10, 24), wednesday));
        assert!(TimeWindow::ThisWeekend.contains(day(2026, 10, 25), wednesday));

        let saturday = day(2026, 10, 24);
        assert!(TimeWindow::ThisWeekend.contains(saturday, saturday));
        assert!(TimeWindow::ThisWeekend.contains(day(2026, 10, 25), saturday));

        let sunday = day(2026, 10, 25);
        assert!(TimeWindow::ThisWeekend.contains(sunday, sunday));
        assert!(!TimeWindow::ThisWeekend.contains(day(2026, 10, 31), sunday));
    }

    #[test]
    fn month_matches_calendar_month_and_year() {
        let today = day(2026, 10, 21);
        assert!(TimeWindow::ThisMonth.contains(day(2026, 10, 1), today));
        assert!(!TimeWindow::ThisMonth.contains(day(2025, 10, 21), today));
        assert!(!TimeWindow::ThisMonth.contains(day(2026, 11, 1), today));
    }

    #[test]
    fn window_names_parse_loosely() {
        assert_eq!(TimeWindow::parse("thisWeekend"), Some(TimeWindow::ThisWeekend));
        assert_eq!(TimeWindow::parse("this-week"), Some(TimeWindow::ThisWeek));
        assert_eq!(TimeWindow::parse("TODAY"), Some(TimeWindow::Today));
        assert_eq!(TimeWindow::parse("someday"), None);
    }
}
