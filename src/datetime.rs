//! Date/time utilities for lineupbot.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

/// Format an elapsed duration as "<n> <unit>" using the largest unit that is
/// at least one (seconds, minutes, hours, days), rounded to one decimal.
///
/// ```
/// use chrono::Duration;
/// use lineupbot::datetime::format_time_ago;
///
/// assert_eq!(format_time_ago(Duration::seconds(90)), "1.5 minutes");
/// assert_eq!(format_time_ago(Duration::hours(1)), "1.0 hour");
/// ```
pub fn format_time_ago(elapsed: Duration) -> String {
    let mut value = elapsed.num_milliseconds().max(0) as f64 / 1000.0;
    let mut unit = ("second", "seconds");

    if value / 60.0 >= 1.0 {
        value /= 60.0;
        unit = ("minute", "minutes");

        if value / 60.0 >= 1.0 {
            value /= 60.0;
            unit = ("hour", "hours");

            if value / 24.0 >= 1.0 {
                value /= 24.0;
                unit = ("day", "days");
            }
        }
    }

    let rounded = (value * 10.0).round() / 10.0;
    let unit = if rounded == 1.0 { unit.0 } else { unit.1 };
    format!("{rounded:.1} {unit}")
}

/// Format a DateTime<Utc> in the specified timezone.
///
/// Falls back to UTC when the timezone name is unknown.
pub fn format_utc_datetime(dt: &DateTime<Utc>, timezone: &str, format: &str) -> String {
    match timezone.parse::<Tz>() {
        Ok(tz) => dt.with_timezone(&tz).format(format).to_string(),
        Err(_) => dt.format(format).to_string(),
    }
}

/// Format a DateTime<Utc> with the default "%Y/%m/%d %H:%M" format.
pub fn format_datetime_default(dt: &DateTime<Utc>, timezone: &str) -> String {
    format_utc_datetime(dt, timezone, "%Y/%m/%d %H:%M")
}
