//! Session message envelope
//!
//! All inbound and outbound session traffic shares one JSON shape:
//! `{"_t": <kind>, ...fields}`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::telemetry::TelemetryValue;

/// Tagged message envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message kind tag
    #[serde(rename = "_t")]
    pub kind: String,

    /// Remaining fields, flattened alongside the tag
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Envelope {
    /// Create an envelope with no fields
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    /// Add a field
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Look up a field
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Parse an inbound text message
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Capability/version announcement sent in reply to `auth`
pub fn meta(version: &str) -> Envelope {
    Envelope::new("meta").with("ver", version)
}

/// Static-content digest sent in reply to `auth`, so clients can detect
/// stale cached assets
pub fn hash(digest: &str) -> Envelope {
    Envelope::new("hash").with("data", digest)
}

/// Close notice broadcast before sessions are torn down
pub fn close(reason: &str) -> Envelope {
    Envelope::new("close").with("reason", reason)
}

/// Telemetry delta relay: `{"_t": <label>, "data": <value>}`
pub fn data(label: &str, value: TelemetryValue) -> Envelope {
    let value = serde_json::to_value(&value).unwrap_or(Value::Null);
    Envelope::new(label).with("data", value)
}

/// Raw frame-rate report: frames processed (`n`) over `t` seconds on
/// camera `cam`
pub fn rate(cam: u32, elapsed_secs: f64, frames: u64) -> Envelope {
    Envelope::new("fps")
        .with("cam", cam)
        .with("t", elapsed_secs)
        .with("n", frames)
}
