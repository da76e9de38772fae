//! Crate error types
//!
//! Transient per-iteration faults (a single camera read or encode failure)
//! are logged and skipped by the capture loop; only repeated failures are
//! surfaced as `PipelineFault` and escalate to shutdown.

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for pipeline operations
#[derive(Debug)]
pub enum Error {
    /// I/O error (listener bind, signal registration)
    Io(std::io::Error),
    /// Camera collaborator failed to produce a frame
    Camera(String),
    /// Detection collaborator failed on a frame
    Detect(String),
    /// Frame encoding failed
    Encode(String),
    /// Repeated consecutive capture failures; the pipeline cannot make progress
    PipelineFault {
        /// Number of consecutive failed iterations
        failures: u32,
        /// Description of the last failure
        last: String,
    },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Camera(msg) => write!(f, "Camera error: {}", msg),
            Error::Detect(msg) => write!(f, "Detection error: {}", msg),
            Error::Encode(msg) => write!(f, "Encode error: {}", msg),
            Error::PipelineFault { failures, last } => {
                write!(f, "Pipeline fault after {} consecutive failures: {}", failures, last)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
