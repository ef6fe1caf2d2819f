//! Video frames and the stream component contracts

use crate::error::{ComponentError, StreamError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Pixel layout of a frame's raw data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 8-bit RGB, 3 bytes per pixel
    Rgb8,
    /// 8-bit RGBA, 4 bytes per pixel
    Rgba8,
    /// 8-bit grayscale, 1 byte per pixel
    Gray8,
}

impl PixelFormat {
    /// Bytes per pixel for this format
    #[must_use]
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// One unit of video data produced by a stream.
///
/// The `sequence` number is per-stream and monotonically increasing; it is
/// stamped by the pipeline as frames are pulled, so stream implementations can
/// leave it at the default. Once a frame is handed to the pipeline it is
/// shared read-only with every detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// Per-stream sequence number, assigned by the pipeline
    pub sequence: u64,

    /// Media timestamp in seconds, supplied by the stream
    pub timestamp: f64,

    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,

    /// Pixel layout of `data`
    pub format: PixelFormat,

    /// Raw pixel data, `width * height * bytes_per_pixel` bytes
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl Frame {
    /// Create a frame with an unassigned sequence number.
    pub fn new(timestamp: f64, width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            sequence: 0,
            timestamp,
            width,
            height,
            format,
            data,
        }
    }

    /// Expected byte length of `data` for the declared dimensions and format
    #[must_use]
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

/// A synchronous video stream component.
///
/// Implementations may block (camera reads, disk I/O); the pipeline lifts them
/// onto the blocking worker pool via [`crate::adapter::BlockingStream`] so the
/// async scheduler never stalls.
pub trait SyncVideoStream: Send {
    /// Produce the next frame.
    ///
    /// `Ok(None)` means the source is exhausted; exhaustion and failure are
    /// both terminal for this instance.
    fn next_frame(&mut self) -> Result<Option<Frame>, StreamError>;

    /// Release all resources held by this component. Called exactly once by
    /// the pipeline during termination.
    fn clean_up(&mut self) -> Result<(), ComponentError>;
}

/// An asynchronous video stream component.
///
/// The pipeline drives every stream through this contract; synchronous
/// implementations are adapted to it at attach time.
#[async_trait]
pub trait AsyncVideoStream: Send {
    /// Produce the next frame.
    ///
    /// `Ok(None)` means the source is exhausted; exhaustion and failure are
    /// both terminal for this instance.
    async fn next_frame(&mut self) -> Result<Option<Frame>, StreamError>;

    /// Release all resources held by this component. Called exactly once by
    /// the pipeline during termination.
    async fn clean_up(&mut self) -> Result<(), ComponentError>;
}
