//! Telemetry bus collaborator interface

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

/// Well-known topic names published or consumed by the pipeline
pub mod topics {
    /// Boolean: pipeline alive flag, set true at startup and false at shutdown
    pub const RUNNING: &str = "/Vision/running";
    /// String: device serial, published once at startup
    pub const SERIAL: &str = "/Vision/serial";
    /// Integer: X position of the primary detection (frame center on miss)
    pub const TAG_X: &str = "/Vision/tag-x";
    /// Integer: Y position of the primary detection (frame center on miss)
    pub const TAG_Y: &str = "/Vision/tag-y";
    /// Float: frames processed per second over the last reporting interval
    pub const FPS: &str = "/Vision/fps";
    /// Integer: external rangefinder reading, watched by the change monitor
    pub const DIST1: &str = "/Vision/Dist1";
    /// Boolean: external beam-break sensor, watched by the change monitor
    pub const BEAM1: &str = "/Shuffleboard/Digital/beam-break";
}

/// A telemetry value; compared by exact value equality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TelemetryValue {
    /// Boolean flag
    Bool(bool),
    /// Integer reading or position
    Int(i64),
    /// Float metric
    Float(f64),
    /// Free-form string (serial numbers and the like)
    Text(String),
}

/// Pluggable publish/subscribe key-value bus.
///
/// Called from both the worker thread and the event loop, so implementations
/// must be `Send + Sync` and non-blocking.
pub trait TelemetryBus: Send + Sync {
    /// Publish a value to a topic
    fn publish(&self, topic: &str, value: TelemetryValue);

    /// Read the latest value of a topic, if any
    fn read(&self, topic: &str) -> Option<TelemetryValue>;
}

/// In-memory bus used by tests and the demo.
///
/// Records every publish so edge-triggering can be asserted.
#[derive(Default)]
pub struct MemoryBus {
    inner: Mutex<MemoryBusInner>,
}

#[derive(Default)]
struct MemoryBusInner {
    values: HashMap<String, TelemetryValue>,
    log: Vec<(String, TelemetryValue)>,
}

impl MemoryBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryBusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set a topic value without recording a publish, simulating an
    /// external writer on the bus (a robot-side sensor)
    pub fn set(&self, topic: &str, value: TelemetryValue) {
        self.lock().values.insert(topic.to_string(), value);
    }

    /// Number of publishes recorded for a topic
    pub fn publish_count(&self, topic: &str) -> usize {
        self.lock().log.iter().filter(|(t, _)| t == topic).count()
    }

    /// All recorded publishes for a topic, in order
    pub fn published(&self, topic: &str) -> Vec<TelemetryValue> {
        self.lock()
            .log
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, v)| v.clone())
            .collect()
    }
}

impl TelemetryBus for MemoryBus {
    fn publish(&self, topic: &str, value: TelemetryValue) {
        let mut inner = self.lock();
        inner.values.insert(topic.to_string(), value.clone());
        inner.log.push((topic.to_string(), value));
    }

    fn read(&self, topic: &str) -> Option<TelemetryValue> {
        self.lock().values.get(topic).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_bus_publish_and_read() {
        let bus = MemoryBus::new();
        bus.publish(topics::TAG_X, TelemetryValue::Int(120));

        assert_eq!(bus.read(topics::TAG_X), Some(TelemetryValue::Int(120)));
        assert_eq!(bus.publish_count(topics::TAG_X), 1);
        assert_eq!(bus.read(topics::TAG_Y), None);
    }

    #[test]
    fn test_set_does_not_count_as_publish() {
        let bus = MemoryBus::new();
        bus.set(topics::DIST1, TelemetryValue::Int(42));

        assert_eq!(bus.read(topics::DIST1), Some(TelemetryValue::Int(42)));
        assert_eq!(bus.publish_count(topics::DIST1), 0);
    }

    #[test]
    fn test_value_json_shape() {
        // Envelope fields carry bare JSON values, not tagged variants
        assert_eq!(
            serde_json::to_string(&TelemetryValue::Bool(true)).unwrap(),
            "true"
        );
        assert_eq!(serde_json::to_string(&TelemetryValue::Int(-3)).unwrap(), "-3");
    }
}
