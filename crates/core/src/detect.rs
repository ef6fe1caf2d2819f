//! Detections and the detector component contracts

use crate::error::{ComponentError, DetectorError};
use crate::video::Frame;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Axis-aligned box locating a detection within a frame, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One candidate label for a detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredLabel {
    /// Category name, e.g. "person" or "motion"
    pub name: String,

    /// Confidence in `[0, 1]`; detectors that cannot score report `None`
    pub score: Option<f32>,
}

impl ScoredLabel {
    pub fn new(name: impl Into<String>, score: Option<f32>) -> Self {
        Self {
            name: name.into(),
            score,
        }
    }
}

/// A single detected object: candidate labels plus its location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Candidate labels; at least one for a meaningful detection
    pub labels: Vec<ScoredLabel>,

    /// Location of the detection within the frame
    pub bbox: BoundingBox,
}

impl Detection {
    /// The most likely label. Absent scores rank lowest.
    #[must_use]
    pub fn best_label(&self) -> Option<&ScoredLabel> {
        self.labels.iter().max_by(|a, b| {
            a.score
                .unwrap_or(f32::NEG_INFINITY)
                .total_cmp(&b.score.unwrap_or(f32::NEG_INFINITY))
        })
    }
}

/// Output of one detector invocation over one frame.
///
/// An empty result means "nothing noteworthy" and produces no alert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub detections: Vec<Detection>,
}

impl DetectionResult {
    /// A result with no detections
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

/// A synchronous detector component.
///
/// Implementations may block (CPU-bound inference); the pipeline lifts them
/// onto the blocking worker pool via [`crate::adapter::BlockingDetector`].
pub trait SyncDetector: Send {
    /// Analyze one frame.
    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult, DetectorError>;

    /// Release all resources held by this component. Called exactly once by
    /// the pipeline during termination.
    fn clean_up(&mut self) -> Result<(), ComponentError>;
}

/// An asynchronous detector component.
///
/// The frame arrives as a shared handle: the pipeline fans the same frame out
/// to every detector without copying pixel data.
#[async_trait]
pub trait AsyncDetector: Send {
    /// Analyze one frame.
    async fn detect(&mut self, frame: Arc<Frame>) -> Result<DetectionResult, DetectorError>;

    /// Release all resources held by this component. Called exactly once by
    /// the pipeline during termination.
    async fn clean_up(&mut self) -> Result<(), ComponentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(x: u32) -> BoundingBox {
        BoundingBox {
            x,
            y: 0,
            width: 10,
            height: 10,
        }
    }

    #[test]
    fn test_best_label_picks_highest_score() {
        let detection = Detection {
            labels: vec![
                ScoredLabel::new("cat", Some(0.3)),
                ScoredLabel::new("person", Some(0.9)),
                ScoredLabel::new("dog", Some(0.5)),
            ],
            bbox: boxed(0),
        };

        assert_eq!(detection.best_label().map(|l| l.name.as_str()), Some("person"));
    }

    #[test]
    fn test_best_label_ranks_unscored_lowest() {
        let detection = Detection {
            labels: vec![
                ScoredLabel::new("unknown", None),
                ScoredLabel::new("car", Some(0.1)),
            ],
            bbox: boxed(0),
        };

        assert_eq!(detection.best_label().map(|l| l.name.as_str()), Some("car"));
    }

    #[test]
    fn test_best_label_on_empty_labels() {
        let detection = Detection {
            labels: vec![],
            bbox: boxed(0),
        };

        assert!(detection.best_label().is_none());
    }
}
