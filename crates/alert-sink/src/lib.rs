//! Alert subscribers: structured log output and JSONL file sink
//!
//! This crate provides the two built-in alert subscribers: one that emits
//! each alert as a structured log event at a configurable level, and one that
//! appends alerts to a JSON Lines file for later ingestion.
//!
//! # Example
//! ```no_run
//! use vigil_core::SyncSubscriber;
//! use vigil_alert_sink::JsonlSubscriber;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut sink = JsonlSubscriber::open("alerts.jsonl")?;
//! # let alert = vigil_core::Alert::from_detections("door", "frame-diff", 0, 0.0, vec![]);
//! sink.notify(&alert)?;
//! # Ok(())
//! # }
//! ```

pub mod plugin;

pub use plugin::plugin;

use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn, Level};
use vigil_core::{Alert, AsyncSubscriber, ComponentError, SubscriberError, SyncSubscriber};

/// Errors specific to the built-in alert sinks
#[derive(Error, Debug)]
pub enum AlertSinkError {
    #[error("Failed to serialize alert: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<AlertSinkError> for SubscriberError {
    fn from(err: AlertSinkError) -> Self {
        match err {
            AlertSinkError::Serialize(e) => SubscriberError::Delivery(e.to_string()),
            AlertSinkError::Io(e) => SubscriberError::Io(e),
        }
    }
}

/// Emits each alert as a log event at a fixed level.
pub struct LogSubscriber {
    level: Level,
}

impl LogSubscriber {
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }
}

impl Default for LogSubscriber {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

#[async_trait]
impl AsyncSubscriber for LogSubscriber {
    async fn notify(&mut self, alert: Arc<Alert>) -> Result<(), SubscriberError> {
        if self.level == Level::ERROR {
            error!(
                "{}: {} (stream '{}', frame {})",
                alert.header, alert.description, alert.source, alert.sequence
            );
        } else if self.level == Level::WARN {
            warn!(
                "{}: {} (stream '{}', frame {})",
                alert.header, alert.description, alert.source, alert.sequence
            );
        } else {
            info!(
                "{}: {} (stream '{}', frame {})",
                alert.header, alert.description, alert.source, alert.sequence
            );
        }
        Ok(())
    }

    async fn clean_up(&mut self) -> Result<(), ComponentError> {
        Ok(())
    }
}

/// Appends each alert as one JSON line to a file.
///
/// The file is opened in append mode and flushed after every alert, so a
/// crashed pipeline loses at most the alert being written.
pub struct JsonlSubscriber {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonlSubscriber {
    /// Open (or create) the sink file for appending.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AlertSinkError> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl SyncSubscriber for JsonlSubscriber {
    fn notify(&mut self, alert: &Alert) -> Result<(), SubscriberError> {
        serde_json::to_writer(&mut self.writer, alert).map_err(AlertSinkError::Serialize)?;
        self.writer.write_all(b"\n").map_err(AlertSinkError::Io)?;
        self.writer.flush().map_err(AlertSinkError::Io)?;
        debug!("Alert {} appended to {}", alert.id, self.path.display());
        Ok(())
    }

    fn clean_up(&mut self) -> Result<(), ComponentError> {
        self.writer.flush().map_err(|e| {
            ComponentError::Release(format!("Failed to flush {}: {}", self.path.display(), e))
        })
    }
}
