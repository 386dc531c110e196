use chrono::{Duration, NaiveDateTime, Utc};

/// Format of timestamps stored by SQLite's `datetime('now')`.
pub const DB_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const KST_OFFSET_HOURS: i64 = 9;

/// Relative time for a stored UTC timestamp. Unparseable input is returned as-is.
pub fn parse_and_format_time(db_time: &str) -> String {
    NaiveDateTime::parse_from_str(db_time, DB_TIME_FORMAT)
        .map(|dt| format_relative_time(&dt))
        .unwrap_or_else(|_| db_time.to_string())
}

pub fn format_relative_time(dt: &NaiveDateTime) -> String {
    format_relative_time_at(dt, &Utc::now().naive_utc())
}

pub fn format_relative_time_at(dt: &NaiveDateTime, now: &NaiveDateTime) -> String {
    let diff = now.signed_duration_since(*dt);

    let seconds = diff.num_seconds();
    if seconds < 60 {
        return "방금 전".to_string();
    }

    let minutes = diff.num_minutes();
    if minutes < 60 {
        return format!("{}분 전", minutes);
    }

    let hours = diff.num_hours();
    if hours < 24 {
        return format!("{}시간 전", hours);
    }

    let days = diff.num_days();
    if days < 7 {
        return format!("{}일 전", days);
    }

    // Calendar date as seen in Korea
    (*dt + Duration::hours(KST_OFFSET_HOURS))
        .format("%Y. %-m. %-d.")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn just_now() {
        let now = at(2025, 3, 1, 12, 0);
        assert_eq!(format_relative_time_at(&now, &now), "방금 전");
    }

    #[test]
    fn future_timestamps_read_as_just_now() {
        let now = at(2025, 3, 1, 12, 0);
        let later = at(2025, 3, 1, 13, 0);
        assert_eq!(format_relative_time_at(&later, &now), "방금 전");
    }

    #[test]
    fn minutes_hours_days() {
        let now = at(2025, 3, 10, 12, 0);
        assert_eq!(format_relative_time_at(&at(2025, 3, 10, 11, 55), &now), "5분 전");
        assert_eq!(format_relative_time_at(&at(2025, 3, 10, 9, 0), &now), "3시간 전");
        assert_eq!(format_relative_time_at(&at(2025, 3, 8, 12, 0), &now), "2일 전");
    }

    #[test]
    fn old_dates_use_korean_calendar_date() {
        let now = at(2025, 3, 10, 12, 0);
        // 20:00 UTC on Jan 15 is already Jan 16 in Korea
        assert_eq!(
            format_relative_time_at(&at(2025, 1, 15, 20, 0), &now),
            "2025. 1. 16."
        );
    }

    #[test]
    fn parse_and_format_bad_input_returns_raw() {
        assert_eq!(parse_and_format_time("not-a-date"), "not-a-date");
        assert_eq!(parse_and_format_time(""), "");
    }

    #[test]
    fn parse_and_format_handles_db_format() {
        let stored = (Utc::now().naive_utc() - Duration::minutes(10))
            .format(DB_TIME_FORMAT)
            .to_string();
        assert_eq!(parse_and_format_time(&stored), "10분 전");
    }
}
