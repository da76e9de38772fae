//! Edge-triggered telemetry change monitor
//!
//! One poll per capture iteration; a watched topic is forwarded to the sink
//! only when its value differs from the last forwarded one (or was never
//! forwarded). No hysteresis or deadband is applied.

use tracing::trace;

use super::bus::{TelemetryBus, TelemetryValue};

struct WatchedTopic {
    topic: String,
    /// Short name used in outbound session messages ("dist1", "beam1")
    label: String,
    last: Option<TelemetryValue>,
}

/// Tracks the last forwarded value per watched topic
pub struct ChangeMonitor {
    watched: Vec<WatchedTopic>,
}

impl ChangeMonitor {
    /// Create a monitor with no watched topics
    pub fn new() -> Self {
        Self { watched: Vec::new() }
    }

    /// Watch a bus topic, forwarding deltas under `label`
    pub fn watch(mut self, topic: impl Into<String>, label: impl Into<String>) -> Self {
        self.watched.push(WatchedTopic {
            topic: topic.into(),
            label: label.into(),
            last: None,
        });
        self
    }

    /// Read every watched topic once; invoke `sink` for each value that
    /// changed since it was last forwarded
    pub fn poll(&mut self, bus: &dyn TelemetryBus, sink: &mut dyn FnMut(&str, TelemetryValue)) {
        for watched in &mut self.watched {
            let Some(value) = bus.read(&watched.topic) else {
                continue;
            };
            if watched.last.as_ref() != Some(&value) {
                trace!(topic = %watched.topic, value = ?value, "telemetry edge");
                watched.last = Some(value.clone());
                sink(&watched.label, value);
            }
        }
    }
}

impl Default for ChangeMonitor {
    fn default() -> Self {
        Self::new()
    }
}
