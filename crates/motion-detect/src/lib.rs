//! Motion detection by frame differencing
//!
//! This crate provides the built-in motion detector: a classical
//! frame-differencing algorithm that compares the luma plane of each frame
//! against the previous one. No models, no I/O, deterministic output.
//!
//! # Features
//! - Mean absolute luma difference with a configurable threshold
//! - Changed-area floor to ignore sensor noise and tiny flickers
//! - Bounding box around the changed region
//!
//! # Example
//! ```
//! use vigil_core::{Frame, PixelFormat, SyncDetector};
//! use vigil_motion_detect::{FrameDiffConfig, FrameDiffDetector};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut detector = FrameDiffDetector::new(FrameDiffConfig::default());
//! let dark = Frame::new(0.0, 16, 16, PixelFormat::Gray8, vec![0; 256]);
//! let bright = Frame::new(0.1, 16, 16, PixelFormat::Gray8, vec![200; 256]);
//!
//! assert!(detector.detect(&dark)?.is_empty());
//! let result = detector.detect(&bright)?;
//! assert!(!result.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod plugin;

pub use plugin::plugin;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use vigil_core::{
    BoundingBox, ComponentError, Detection, DetectionResult, DetectorError, Frame, PixelFormat,
    ScoredLabel, SyncDetector,
};

/// Errors specific to motion detection
#[derive(Error, Debug)]
pub enum MotionDetectError {
    #[error("Frame data does not match dimensions: {0}")]
    MalformedFrame(String),
}

impl From<MotionDetectError> for DetectorError {
    fn from(err: MotionDetectError) -> Self {
        DetectorError::Inference(err.to_string())
    }
}

/// Configuration for frame differencing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameDiffConfig {
    /// Mean absolute luma difference (0-255 scale) above which a frame pair
    /// counts as motion
    /// Lower values = more sensitive
    /// Default: 12.0
    pub threshold: f64,

    /// Per-pixel luma delta above which a pixel counts as changed
    /// Filters sensor noise out of the changed-area measurement.
    /// Default: 25.0
    pub pixel_delta: f64,

    /// Minimum number of changed pixels for a detection
    /// Keeps single hot pixels and tiny flickers from raising alerts.
    /// Default: 64
    pub min_area: usize,
}

impl Default for FrameDiffConfig {
    fn default() -> Self {
        Self {
            threshold: 12.0,
            pixel_delta: 25.0,
            min_area: 64,
        }
    }
}

/// Stateful frame-differencing detector.
///
/// Holds the previous frame's luma plane between calls; the first frame of a
/// stream (and the first frame after a dimension change) only seeds the
/// baseline and never reports motion.
pub struct FrameDiffDetector {
    config: FrameDiffConfig,
    previous: Option<Array2<f32>>,
}

impl FrameDiffDetector {
    #[must_use]
    pub fn new(config: FrameDiffConfig) -> Self {
        Self {
            config,
            previous: None,
        }
    }
}

impl Default for FrameDiffDetector {
    fn default() -> Self {
        Self::new(FrameDiffConfig::default())
    }
}

fn luma(r: u8, g: u8, b: u8) -> f32 {
    0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b)
}

/// Extract the luma plane of a frame as a row-major array.
fn luma_plane(frame: &Frame) -> Result<Array2<f32>, MotionDetectError> {
    let expected = frame.expected_len();
    if frame.data.len() != expected {
        return Err(MotionDetectError::MalformedFrame(format!(
            "{} byte(s) for {}x{} {:?}, expected {}",
            frame.data.len(),
            frame.width,
            frame.height,
            frame.format,
            expected
        )));
    }

    let width = frame.width as usize;
    let height = frame.height as usize;
    let plane = match frame.format {
        PixelFormat::Gray8 => {
            Array2::from_shape_fn((height, width), |(y, x)| f32::from(frame.data[y * width + x]))
        }
        PixelFormat::Rgb8 => Array2::from_shape_fn((height, width), |(y, x)| {
            let i = (y * width + x) * 3;
            luma(frame.data[i], frame.data[i + 1], frame.data[i + 2])
        }),
        PixelFormat::Rgba8 => Array2::from_shape_fn((height, width), |(y, x)| {
            let i = (y * width + x) * 4;
            luma(frame.data[i], frame.data[i + 1], frame.data[i + 2])
        }),
    };
    Ok(plane)
}

impl SyncDetector for FrameDiffDetector {
    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult, DetectorError> {
        let plane = luma_plane(frame)?;

        let Some(previous) = self.previous.take() else {
            self.previous = Some(plane);
            return Ok(DetectionResult::empty());
        };

        if previous.dim() != plane.dim() {
            debug!(
                "Frame dimensions changed ({:?} -> {:?}), resetting motion baseline",
                previous.dim(),
                plane.dim()
            );
            self.previous = Some(plane);
            return Ok(DetectionResult::empty());
        }

        let diff = (&plane - &previous).mapv(f32::abs);
        let mean = f64::from(diff.mean().unwrap_or(0.0));

        // Changed-pixel mask: area plus the bounding box of the change.
        let pixel_delta = self.config.pixel_delta as f32;
        let mut area: usize = 0;
        let (mut min_x, mut min_y) = (usize::MAX, usize::MAX);
        let (mut max_x, mut max_y) = (0usize, 0usize);
        for ((y, x), &delta) in diff.indexed_iter() {
            if delta > pixel_delta {
                area += 1;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }

        self.previous = Some(plane);

        // The box needs at least one changed pixel: a uniform drift can clear
        // the mean threshold while every per-pixel delta stays under
        // `pixel_delta`.
        if area == 0 || mean <= self.config.threshold || area < self.config.min_area {
            return Ok(DetectionResult::empty());
        }

        debug!(
            "Motion at {:.3}s: mean luma delta {:.2}, {} changed pixel(s)",
            frame.timestamp, mean, area
        );
        let score = (mean / 255.0).min(1.0) as f32;
        let detection = Detection {
            labels: vec![ScoredLabel::new("motion", Some(score))],
            bbox: BoundingBox {
                x: min_x as u32,
                y: min_y as u32,
                width: (max_x - min_x + 1) as u32,
                height: (max_y - min_y + 1) as u32,
            },
        };
        Ok(DetectionResult::new(vec![detection]))
    }

    fn clean_up(&mut self) -> Result<(), ComponentError> {
        self.previous = None;
        Ok(())
    }
}
