//! Video stream components: synthetic test pattern and image directory replay
//!
//! This crate provides the two built-in frame sources: a deterministic test
//! pattern generator for exercising pipelines without hardware, and a replay
//! stream that decodes still images from a directory in filename order.
//!
//! # Features
//! - Test pattern stream with a moving bright block, fully deterministic
//! - Image directory replay with lexicographic ordering (jpg/jpeg/png)
//! - Both streams stamp timestamps from a configurable frame rate
//!
//! # Example
//! ```no_run
//! use vigil_core::SyncVideoStream;
//! use vigil_frame_source::{ImageDirConfig, ImageDirStream};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut stream = ImageDirStream::open(ImageDirConfig {
//!     path: "clips/front-door".into(),
//!     fps: 2.0,
//! })?;
//! while let Some(frame) = stream.next_frame()? {
//!     println!("{}x{} at {:.2}s", frame.width, frame.height, frame.timestamp);
//! }
//! # Ok(())
//! # }
//! ```

pub mod plugin;

pub use plugin::plugin;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use vigil_core::{
    AsyncVideoStream, ComponentError, Frame, PixelFormat, StreamError, SyncVideoStream,
};

/// Errors specific to the built-in frame sources
#[derive(Error, Debug)]
pub enum FrameSourceError {
    #[error("Image directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<FrameSourceError> for StreamError {
    fn from(err: FrameSourceError) -> Self {
        match err {
            FrameSourceError::DirectoryNotFound(path) => {
                StreamError::Disconnected(format!("Image directory not found: {path}"))
            }
            FrameSourceError::Image(e) => StreamError::Decode(e.to_string()),
            FrameSourceError::Io(e) => StreamError::Io(e),
        }
    }
}

/// Configuration for the test pattern stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestPatternConfig {
    /// Frame width in pixels
    /// Default: 320
    pub width: u32,

    /// Frame height in pixels
    /// Default: 240
    pub height: u32,

    /// Nominal frame rate used to stamp timestamps
    /// The stream never sleeps; consumers pace it through back-pressure.
    /// Default: 10.0
    pub fps: f64,

    /// Number of frames to produce before reporting exhaustion
    /// 0 means unbounded.
    /// Default: 0
    pub frames: u64,
}

impl Default for TestPatternConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            fps: 10.0,
            frames: 0,
        }
    }
}

/// Deterministic synthetic stream: a bright block sweeping across a dark
/// background. Frame content depends only on the configuration and the frame
/// index, which makes pipeline behavior reproducible in tests and demos.
pub struct TestPatternStream {
    config: TestPatternConfig,
    produced: u64,
}

impl TestPatternStream {
    #[must_use]
    pub fn new(config: TestPatternConfig) -> Self {
        Self {
            config,
            produced: 0,
        }
    }
}

impl Default for TestPatternStream {
    fn default() -> Self {
        Self::new(TestPatternConfig::default())
    }
}

#[async_trait]
impl AsyncVideoStream for TestPatternStream {
    async fn next_frame(&mut self) -> Result<Option<Frame>, StreamError> {
        if self.config.frames > 0 && self.produced >= self.config.frames {
            return Ok(None);
        }
        let frame = render_pattern(&self.config, self.produced);
        self.produced += 1;
        Ok(Some(frame))
    }

    async fn clean_up(&mut self) -> Result<(), ComponentError> {
        debug!("Test pattern stream released after {} frame(s)", self.produced);
        Ok(())
    }
}

/// Render one RGB frame of the moving-block pattern.
fn render_pattern(config: &TestPatternConfig, index: u64) -> Frame {
    let width = config.width.max(1);
    let height = config.height.max(1);
    let mut data = vec![16u8; (width as usize) * (height as usize) * 3];

    let block_w = (width / 8).max(1);
    let block_h = (height / 8).max(1);
    let step = (width / 32).max(4) as u64;
    let span = (width - block_w).max(1) as u64;
    let x0 = ((index * step) % span) as u32;
    let y0 = (height - block_h) / 2;

    for y in y0..(y0 + block_h).min(height) {
        for x in x0..(x0 + block_w).min(width) {
            let offset = ((y as usize) * (width as usize) + x as usize) * 3;
            data[offset] = 235;
            data[offset + 1] = 235;
            data[offset + 2] = 235;
        }
    }

    let fps = if config.fps > 0.0 { config.fps } else { 10.0 };
    let timestamp = index as f64 / fps;
    Frame::new(timestamp, width, height, PixelFormat::Rgb8, data)
}

/// Configuration for the image directory stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageDirConfig {
    /// Directory holding the still images to replay
    pub path: PathBuf,

    /// Nominal frame rate used to stamp timestamps
    /// Default: 10.0
    pub fps: f64,
}

impl Default for ImageDirConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            fps: 10.0,
        }
    }
}

/// Replays the images of a directory as video frames, in filename order.
///
/// Decoding is blocking work, so this stream implements the sync contract
/// and rides the blocking adapter inside a pipeline. An empty directory is a
/// stream that is exhausted from the start, not an error.
#[derive(Debug)]
pub struct ImageDirStream {
    paths: Vec<PathBuf>,
    cursor: usize,
    produced: u64,
    fps: f64,
}

impl ImageDirStream {
    /// Scan the directory and build the replay order.
    pub fn open(config: ImageDirConfig) -> Result<Self, FrameSourceError> {
        if !config.path.is_dir() {
            return Err(FrameSourceError::DirectoryNotFound(
                config.path.display().to_string(),
            ));
        }

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&config.path)? {
            let path = entry?.path();
            if is_supported_image(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        info!(
            "Image directory stream over {}: {} frame(s)",
            config.path.display(),
            paths.len()
        );
        Ok(Self {
            paths,
            cursor: 0,
            produced: 0,
            fps: if config.fps > 0.0 { config.fps } else { 10.0 },
        })
    }
}

fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .is_some_and(|ext| matches!(ext.as_str(), "jpg" | "jpeg" | "png"))
}

impl SyncVideoStream for ImageDirStream {
    fn next_frame(&mut self) -> Result<Option<Frame>, StreamError> {
        if self.cursor >= self.paths.len() {
            return Ok(None);
        }
        let path = &self.paths[self.cursor];
        debug!("Decoding image frame: {}", path.display());

        let decoded = image::open(path).map_err(FrameSourceError::Image)?;
        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();
        let timestamp = self.produced as f64 / self.fps;

        self.cursor += 1;
        self.produced += 1;
        Ok(Some(Frame::new(
            timestamp,
            width,
            height,
            PixelFormat::Rgb8,
            rgb.into_raw(),
        )))
    }

    fn clean_up(&mut self) -> Result<(), ComponentError> {
        debug!("Image directory stream released after {} frame(s)", self.produced);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[tokio::test]
    async fn test_pattern_respects_frame_limit() {
        let mut stream = TestPatternStream::new(TestPatternConfig {
            width: 32,
            height: 32,
            fps: 5.0,
            frames: 3,
        });

        for index in 0..3 {
            let frame = stream.next_frame().await.unwrap().unwrap();
            assert_eq!(frame.width, 32);
            assert_eq!(frame.height, 32);
            assert_eq!(frame.format, PixelFormat::Rgb8);
            assert!((frame.timestamp - index as f64 / 5.0).abs() < 1e-9);
            assert_eq!(frame.data.len(), frame.expected_len());
        }
        assert!(stream.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pattern_unbounded_keeps_producing() {
        let mut stream = TestPatternStream::new(TestPatternConfig {
            frames: 0,
            ..TestPatternConfig::default()
        });
        for _ in 0..5 {
            assert!(stream.next_frame().await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_pattern_block_moves_between_frames() {
        let mut stream = TestPatternStream::new(TestPatternConfig {
            width: 64,
            height: 64,
            fps: 10.0,
            frames: 2,
        });
        let first = stream.next_frame().await.unwrap().unwrap();
        let second = stream.next_frame().await.unwrap().unwrap();
        assert_ne!(first.data, second.data, "pattern must move");
    }

    fn write_png(dir: &Path, name: &str, shade: u8) {
        let mut img = RgbImage::new(4, 3);
        for pixel in img.pixels_mut() {
            pixel.0 = [shade, shade, shade];
        }
        img.save(dir.join(name)).unwrap();
    }

    #[test]
    fn test_image_dir_replays_in_filename_order() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "b.png", 200);
        write_png(dir.path(), "a.png", 10);
        std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

        let mut stream = ImageDirStream::open(ImageDirConfig {
            path: dir.path().to_path_buf(),
            fps: 2.0,
        })
        .unwrap();

        let first = stream.next_frame().unwrap().unwrap();
        assert_eq!(first.width, 4);
        assert_eq!(first.height, 3);
        assert_eq!(first.data[0], 10, "a.png replays first");
        assert!((first.timestamp - 0.0).abs() < 1e-9);

        let second = stream.next_frame().unwrap().unwrap();
        assert_eq!(second.data[0], 200);
        assert!((second.timestamp - 0.5).abs() < 1e-9);

        assert!(stream.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_image_dir_empty_is_immediately_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let mut stream = ImageDirStream::open(ImageDirConfig {
            path: dir.path().to_path_buf(),
            fps: 10.0,
        })
        .unwrap();
        assert!(stream.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_image_dir_missing_directory_is_an_error() {
        let err = ImageDirStream::open(ImageDirConfig {
            path: PathBuf::from("/definitely/not/here"),
            fps: 10.0,
        })
        .unwrap_err();
        assert!(matches!(err, FrameSourceError::DirectoryNotFound(_)));
    }
}
