//! Detection collaborator interface and result types
//!
//! The detection algorithm itself is opaque to this crate: it consumes a
//! raw frame and returns an annotated frame plus structured results.

use std::cmp::Ordering;

use super::camera::RawFrame;
use crate::error::Result;

/// A single detected target
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Tag/target identifier
    pub id: u32,
    /// Center X in image coordinates
    pub x: i64,
    /// Center Y in image coordinates
    pub y: i64,
    /// Decision-quality margin; higher means a more confident detection
    pub margin: f32,
}

/// Result of one detection pass
#[derive(Debug, Clone)]
pub struct DetectOutcome {
    /// Frame with detection overlays drawn
    pub annotated: RawFrame,
    /// All detections found in the frame
    pub detections: Vec<Detection>,
}

impl DetectOutcome {
    /// Outcome with no detections
    pub fn empty(annotated: RawFrame) -> Self {
        Self {
            annotated,
            detections: Vec::new(),
        }
    }

    /// Sort detections by descending margin, stable on ties, so the primary
    /// detection comes first and annotation order is deterministic
    pub fn sort_by_margin(&mut self) {
        self.detections
            .sort_by(|a, b| b.margin.partial_cmp(&a.margin).unwrap_or(Ordering::Equal));
    }

    /// The detection whose position is reported: highest margin wins,
    /// earlier detection wins ties
    pub fn primary(&self) -> Option<&Detection> {
        self.detections.iter().reduce(|best, d| {
            if d.margin > best.margin {
                d
            } else {
                best
            }
        })
    }
}

/// Opaque detection collaborator: `detect(frame) -> (annotated, results)`
pub trait Detector: Send {
    /// Run detection on one frame
    fn detect(&mut self, frame: &RawFrame) -> Result<DetectOutcome>;
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn frame() -> RawFrame {
        RawFrame::new(640, 480, Bytes::new())
    }

    fn det(id: u32, margin: f32) -> Detection {
        Detection {
            id,
            x: 0,
            y: 0,
            margin,
        }
    }

    #[test]
    fn test_primary_is_highest_margin() {
        let outcome = DetectOutcome {
            annotated: frame(),
            detections: vec![det(1, 22.0), det(2, 48.5), det(3, 31.0)],
        };
        assert_eq!(outcome.primary().unwrap().id, 2);
    }

    #[test]
    fn test_primary_tie_prefers_first() {
        let outcome = DetectOutcome {
            annotated: frame(),
            detections: vec![det(7, 30.0), det(8, 30.0)],
        };
        assert_eq!(outcome.primary().unwrap().id, 7);
    }

    #[test]
    fn test_sort_is_descending_and_stable() {
        let mut outcome = DetectOutcome {
            annotated: frame(),
            detections: vec![det(1, 10.0), det(2, 50.0), det(3, 10.0)],
        };
        outcome.sort_by_margin();
        let ids: Vec<u32> = outcome.detections.iter().map(|d| d.id).collect();
        assert_eq!(ids, [2, 1, 3]);
    }

    #[test]
    fn test_empty_outcome_has_no_primary() {
        let outcome = DetectOutcome::empty(frame());
        assert!(outcome.primary().is_none());
    }
}
