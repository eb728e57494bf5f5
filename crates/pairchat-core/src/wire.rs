//! Decoding of backend rows and wire timestamps
//!
//! The backend emits ISO-8601 timestamps in more than one shape: history
//! rows carry an offset (`2025-01-01T10:00:00Z`), realtime payloads may add
//! sub-second precision (`2025-01-01T10:00:00.500000Z`) or omit the offset
//! entirely. The decoder tries the offset-bearing form first and falls back
//! to a naive parse interpreted as UTC; only when both fail is the value
//! rejected.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};

use crate::error::{ChatError, ChatResult};
use crate::types::Message;

/// Naive fallback format; `%.f` matches an optional fractional part.
const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Parse a wire timestamp, accepting both fractional and whole-second forms.
pub fn parse_timestamp(s: &str) -> ChatResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, NAIVE_FORMAT) {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    Err(ChatError::Decode(format!(
        "cannot decode timestamp {:?}",
        s
    )))
}

/// Serde adapter over [`parse_timestamp`] for row deserialization.
pub fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_timestamp(&s).map_err(serde::de::Error::custom)
}

/// Decode a message row from a raw JSON record.
///
/// Used for realtime insert payloads, which arrive as untyped records for
/// the whole messages table.
pub fn decode_message(record: serde_json::Value) -> ChatResult<Message> {
    serde_json::from_value(record).map_err(|e| ChatError::Decode(e.to_string()))
}
