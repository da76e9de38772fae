//! Capture-side pipeline: camera/detector/encoder collaborators and the
//! blocking capture loop
//!
//! Camera I/O is blocking and runs on its own worker context
//! (`tokio::task::spawn_blocking`), never on the cooperative scheduler. The
//! only crossing back into the event loop is through the thread-safe
//! [`FrameCell`](crate::frame::FrameCell) and the session event channel.

pub mod camera;
pub mod detect;
pub mod worker;

pub use camera::{Camera, FrameEncoder, RawFrame};
pub use detect::{DetectOutcome, Detection, Detector};
pub use worker::{CaptureLoop, EventSender};
