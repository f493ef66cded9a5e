//! Raw history records as delivered by the coordination service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::EventKind;

/// One history record, exactly as it comes off the wire
///
/// ```json
/// {
///   "eventId": 5,
///   "eventTimestamp": 1700000000.25,
///   "eventType": "ActivityTaskScheduled",
///   "activityTaskScheduledEventAttributes": { "activityId": "fetch", ... }
/// }
/// ```
///
/// The kind-specific attribute object is kept as untyped JSON; turning it into
/// something the decider can reason about is the job of
/// [`normalize`](super::normalize).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawHistoryEvent {
    /// Service-assigned id, unique and increasing within a run
    pub event_id: i64,

    /// When the service recorded the event
    #[serde(with = "timestamp_serde")]
    pub event_timestamp: DateTime<Utc>,

    /// Wire-level event type
    pub event_type: EventKind,

    /// Remaining fields, including the `<kind>EventAttributes` object
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawHistoryEvent {
    /// Create a record with its attribute object stored under the kind's key
    pub fn new(
        event_id: i64,
        event_timestamp: DateTime<Utc>,
        event_type: EventKind,
        attributes: Value,
    ) -> Self {
        let mut extra = Map::new();
        if !attributes.is_null() {
            extra.insert(event_type.attributes_key(), attributes);
        }
        Self {
            event_id,
            event_timestamp,
            event_type,
            extra,
        }
    }

    /// The kind-specific attribute object, if present
    pub fn attributes(&self) -> Option<&Map<String, Value>> {
        self.extra
            .get(&self.event_type.attributes_key())
            .and_then(Value::as_object)
    }
}

/// Accepts epoch seconds (the JSON API's format) or RFC 3339 strings
mod timestamp_serde {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Timestamp {
        Epoch(f64),
        Text(String),
    }

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&ts.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Timestamp::deserialize(deserializer)? {
            Timestamp::Epoch(secs) => {
                let whole = secs.trunc() as i64;
                let nanos = ((secs - secs.trunc()) * 1e9).round() as u32;
                Utc.timestamp_opt(whole, nanos.min(999_999_999))
                    .single()
                    .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {secs}")))
            }
            Timestamp::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(D::Error::custom),
        }
    }
}
