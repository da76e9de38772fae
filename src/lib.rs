//! # tagcam
//!
//! A camera sensing coprocessor for mobile robots. A blocking capture loop
//! grabs frames, runs fiducial-tag detection, and reports target positions
//! over a pluggable telemetry bus, while an HTTP front end serves the
//! annotated feed as MJPEG and pushes event notifications to WebSocket
//! control sessions.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tagcam::server::ServerConfig;
//! use tagcam::telemetry::MemoryBus;
//! use tagcam::Pipeline;
//!
//! # use bytes::Bytes;
//! # use tagcam::capture::{Camera, DetectOutcome, Detector, FrameEncoder, RawFrame};
//! # struct MyCamera;
//! # impl Camera for MyCamera {
//! #     fn grab(&mut self) -> tagcam::Result<RawFrame> { unimplemented!() }
//! # }
//! # struct MyDetector;
//! # impl Detector for MyDetector {
//! #     fn detect(&mut self, _: &RawFrame) -> tagcam::Result<DetectOutcome> { unimplemented!() }
//! # }
//! # struct MyEncoder;
//! # impl FrameEncoder for MyEncoder {
//! #     fn encode(&mut self, _: &RawFrame) -> tagcam::Result<Bytes> { unimplemented!() }
//! # }
//! #[tokio::main]
//! async fn main() -> tagcam::Result<()> {
//!     let config = ServerConfig::default().bind("0.0.0.0:8000".parse().unwrap());
//!     let bus = Arc::new(MemoryBus::new());
//!     let pipeline = Pipeline::new(config, MyCamera, MyDetector, MyEncoder, bus);
//!     let outcome = pipeline.run().await?;
//!     std::process::exit(outcome.exit_code());
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//!  camera thread                     tokio runtime
//!  ┌─────────────┐   FrameCell    ┌──────────────────────────┐
//!  │ CaptureLoop │ ─────────────► │ /stream  MJPEG viewers   │
//!  │ grab/detect │   EventSender  │ /ws      control sessions│
//!  │ encode      │ ─────────────► │ SessionRegistry fan-out  │
//!  └─────────────┘                └──────────────────────────┘
//!        │ positions, rates, sensor edges
//!        ▼
//!   TelemetryBus (robot side)
//! ```

pub mod capture;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod stream;
pub mod telemetry;

pub use error::{Error, Result};
pub use frame::FrameCell;
pub use pipeline::Pipeline;
pub use server::ServerConfig;
pub use session::SessionRegistry;
pub use shutdown::{Outcome, ShutdownCoordinator, ShutdownState};
