//! Telemetry bus interface and edge-triggered change monitoring
//!
//! The robot-side bus (NetworkTables or similar) is consumed through the
//! pluggable [`TelemetryBus`] key-value interface. Outbound traffic is kept
//! quiet by publishing only on state transitions, not at the polling rate.

pub mod bus;
pub mod monitor;

pub use bus::{topics, MemoryBus, TelemetryBus, TelemetryValue};
pub use monitor::ChangeMonitor;
