/*
[INPUT]:  Raw WebSocket text frames
[OUTPUT]: Decoded Event values and outbound control frames
[POS]:    WebSocket layer - Pusher message format
[UPDATE]: When adding new control frames or changing the envelope format
*/

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::{BitstampError, Result};

pub const SUBSCRIBE_EVENT: &str = "pusher:subscribe";
pub const PING_EVENT: &str = "pusher:ping";
pub const PONG_EVENT: &str = "pusher:pong";

/// One `{event, data}` frame of the Pusher protocol, inbound or outbound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Event {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn subscribe(channel: &str) -> Self {
        Self::new(SUBSCRIBE_EVENT, serde_json::json!({ "channel": channel }))
    }

    pub fn ping() -> Self {
        Self::new(PING_EVENT, Value::Null)
    }

    pub fn pong() -> Self {
        Self::new(PONG_EVENT, Value::Null)
    }

    /// Decode one text frame
    pub fn from_frame(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|err| BitstampError::Decode {
            message: err.to_string(),
            frame: text.to_string(),
        })
    }

    pub fn to_frame(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|err| BitstampError::malformed(err, self.event.clone()))
    }

    /// Decode the payload into `T`.
    ///
    /// Relay payloads are usually a JSON document encoded as a string; inline
    /// objects are accepted as well.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T> {
        match &self.data {
            Value::String(encoded) => serde_json::from_str(encoded)
                .map_err(|err| BitstampError::malformed(err, encoded.clone())),
            other => serde_json::from_value(other.clone())
                .map_err(|err| BitstampError::malformed(err, other.to_string())),
        }
    }
}
