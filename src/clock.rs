//! Calendar dates as seen by a visitor in their own timezone.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// The `YYYY-MM-DD` date of `now` in `tz`, zero padded.
pub fn date_string(now: DateTime<Utc>, tz: Tz) -> String {
    now.with_timezone(&tz).format("%Y-%m-%d").to_string()
}

/// Today's date string in `tz`.
pub fn today_in(tz: Tz) -> String {
    date_string(Utc::now(), tz)
}

/// Parse an IANA timezone name such as `Europe/London`.
pub fn parse_timezone(name: &str) -> Result<Tz, String> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| format!("unknown timezone '{name}'"))
}
