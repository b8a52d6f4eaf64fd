//! Delivery envelope construction.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use super::PayloadError;

/// The JSON body sent to a webhook.
///
/// Field order is fixed (`event`, `timestamp`, `data`) so the serialized
/// bytes are stable for a given input.
#[derive(Debug, Serialize)]
struct Envelope<'a> {
    event: &'a str,
    timestamp: String,
    data: Value,
}

/// A serialized envelope: the exact bytes that are signed and sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    bytes: Vec<u8>,
}

impl Payload {
    /// Builds the envelope for `event` at time `now`.
    ///
    /// Absent or `null` data becomes `{}` so that receivers can always
    /// parse `data` as an object.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] if the event name is empty, if `data`
    /// cannot be serialized, or if it serializes to a non-object.
    pub fn build<T>(event: &str, data: Option<&T>, now: DateTime<Utc>) -> Result<Self, PayloadError>
    where
        T: Serialize + ?Sized,
    {
        if event.is_empty() {
            return Err(PayloadError::EmptyEvent);
        }

        let data = match data {
            Some(data) => serde_json::to_value(data)?,
            None => Value::Null,
        };
        let data = match data {
            Value::Null => Value::Object(serde_json::Map::new()),
            Value::Object(map) => Value::Object(map),
            other => {
                return Err(PayloadError::NotAnObject {
                    kind: json_kind(&other),
                });
            }
        };

        let envelope = Envelope {
            event,
            timestamp: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            data,
        };

        Ok(Self {
            bytes: serde_json::to_vec(&envelope)?,
        })
    }

    /// Returns the payload bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the payload, returning its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
