//! Camera and encoder collaborator interfaces

use bytes::Bytes;

use crate::error::Result;

/// An unencoded frame as produced by the camera or annotated by the detector
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel data (layout is a contract between camera, detector, encoder)
    pub data: Bytes,
}

impl RawFrame {
    /// Create a frame
    pub fn new(width: u32, height: u32, data: Bytes) -> Self {
        Self { width, height, data }
    }

    /// Center point of the frame, used as the position fallback when no
    /// detection is present
    pub fn center(&self) -> (i64, i64) {
        (i64::from(self.width) / 2, i64::from(self.height) / 2)
    }
}

/// Blocking frame source. `grab` is called from the dedicated worker
/// context and may block until the device delivers a frame.
pub trait Camera: Send {
    /// Acquire the next frame from the device
    fn grab(&mut self) -> Result<RawFrame>;
}

/// Encodes an annotated frame into the wire format served to stream clients
/// (JPEG in production)
pub trait FrameEncoder: Send {
    /// Encode a frame
    fn encode(&mut self, frame: &RawFrame) -> Result<Bytes>;
}
