use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

/// Parse a stored id, logging instead of failing on corruption so one
/// bad row cannot take down a whole listing.
pub(crate) fn parse_uuid(raw: &str, context: &'static str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", context, raw, e);
        Uuid::default()
    })
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
/// Try RFC 3339 first, then fall back to parsing as naive UTC.
pub(crate) fn parse_created_at(raw: &str, context: &'static str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt {} timestamp '{}': {}", context, raw, e);
            DateTime::default()
        })
}
