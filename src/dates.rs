//! commit timestamp parsing
//!
//! Git stores author/committer dates as `<unix_seconds> <±HHMM>`. The
//! dataset carries plenty of garbage in these fields (non-digit
//! timestamps, overflow, dates from the future), all of which is
//! reported as an absent date rather than an error.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};

/// parse a `unix_seconds ±HHMM` pair into a fixed-offset instant
///
/// returns None for non-digit or overflowing timestamps, malformed
/// timezones, and instants strictly in the future
pub fn parse_commit_date(timestamp: &[u8], tz: &[u8]) -> Option<DateTime<FixedOffset>> {
    let seconds: u32 = std::str::from_utf8(timestamp).ok()?.parse().ok()?;

    let sign = match tz.first() {
        Some(b'-') => -1i32,
        _ => 1i32,
    };
    if tz.len() < 4 {
        return None;
    }
    let digits = &tz[tz.len() - 4..];
    let hours: i32 = std::str::from_utf8(&digits[..2]).ok()?.parse().ok()?;
    let minutes: i32 = std::str::from_utf8(&digits[2..]).ok()?.parse().ok()?;
    let offset = FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))?;

    let instant = Utc.timestamp_opt(i64::from(seconds), 0).single()?;
    if instant > Utc::now() {
        return None;
    }
    Some(instant.with_timezone(&offset))
}
