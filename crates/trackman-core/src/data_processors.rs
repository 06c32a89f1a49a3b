use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::warn;

// ── TimestampProcessor ────────────────────────────────────────────────────────

/// Offset-less date-time as some provider exports write `StrokeTime`.
const NAIVE_DATE_TIME: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Bare `GroupDate` values.
const DATE_ONLY: &str = "%Y-%m-%d";

/// Reads capture times from provider reports and from saved dataset files.
///
/// Accepted: RFC 3339 with `Z` or an offset (also what the dataset writer
/// emits), offset-less date-times and bare dates, both taken as UTC, and
/// integer Unix seconds.
pub struct TimestampProcessor;

impl TimestampProcessor {
    pub fn parse(value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::String(s) => Self::parse_str(s),
            Value::Number(n) => DateTime::from_timestamp(n.as_i64()?, 0),
            _ => None,
        }
    }

    /// Blank text is `None` without a warning.
    pub fn parse_str(raw: &str) -> Option<DateTime<Utc>> {
        let text = raw.trim();
        if text.is_empty() {
            return None;
        }

        let parsed = match DateTime::parse_from_rfc3339(text) {
            Ok(dt) => Some(dt.with_timezone(&Utc)),
            Err(_) => NaiveDateTime::parse_from_str(text, NAIVE_DATE_TIME)
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(text, DATE_ONLY)
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
                .map(|naive| Utc.from_utc_datetime(&naive)),
        };

        if parsed.is_none() {
            warn!(value = %text, "ignoring unrecognised timestamp");
        }
        parsed
    }
}

// ── FieldExtractor ────────────────────────────────────────────────────────────

/// Looks up identity fields in raw entries that spell the same thing with
/// different keys.
pub struct FieldExtractor;

impl FieldExtractor {
    /// First key among `keys` holding a non-empty string or a number,
    /// rendered as text.
    pub fn first_text(data: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|&key| match data.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    /// First key among `keys` whose value parses as a timestamp.
    pub fn first_timestamp(
        data: &serde_json::Map<String, Value>,
        keys: &[&str],
    ) -> Option<DateTime<Utc>> {
        keys.iter()
            .find_map(|&key| data.get(key).and_then(TimestampProcessor::parse))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
