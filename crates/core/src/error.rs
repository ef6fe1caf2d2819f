//! Error types for the component system

use crate::component::ComponentKind;
use crate::pipeline::PipelineState;
use thiserror::Error;

/// Errors raised by video stream components while producing frames.
///
/// A stream error is terminal for the stream that raised it and escalates to
/// pipeline failure.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Video source disconnected: {0}")]
    Disconnected(String),

    #[error("Frame decode failed: {0}")]
    Decode(String),

    #[error("Frame read timed out after {0:.1}s")]
    Timeout(f64),

    #[error("Stream call panicked: {0}")]
    Panic(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Errors raised by detector components.
///
/// A detector error is terminal for the pipeline: a security pipeline that
/// silently stops analyzing frames is worse than one that fails loudly.
#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Detector call timed out after {0:.1}s")]
    Timeout(f64),

    #[error("Detector call panicked: {0}")]
    Panic(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Errors raised by alert subscribers during delivery.
///
/// Subscriber errors are isolated per subscriber: they are logged and counted
/// by the dispatcher but never escalate to pipeline failure.
#[derive(Error, Debug)]
pub enum SubscriberError {
    #[error("Alert delivery failed: {0}")]
    Delivery(String),

    #[error("Subscriber call panicked: {0}")]
    Panic(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Errors raised by `clean_up`.
///
/// The pipeline collects these during termination and reports them; they are
/// never re-raised and never prevent the remaining clean-ups from running.
#[derive(Error, Debug)]
pub enum ComponentError {
    #[error("Resource release failed: {0}")]
    Release(String),

    #[error("Clean-up call panicked: {0}")]
    Panic(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Errors raised by the component registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Duplicate component descriptor: '{display_name}' ({kind})")]
    DuplicateDescriptor {
        display_name: String,
        kind: ComponentKind,
    },

    #[error("Missing required argument '{arg_name}' for component '{component}'")]
    MissingArgument { component: String, arg_name: String },

    #[error("Invalid value '{value}' for argument '{arg_name}' of component '{component}': {reason}")]
    InvalidArgument {
        component: String,
        arg_name: String,
        value: String,
        reason: String,
    },

    #[error("Argument transform failed for component '{component}': {source}")]
    ArgumentTransform {
        component: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to construct component '{component}': {source}")]
    Construction {
        component: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Errors raised by the pipeline orchestrator.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid pipeline state: expected {expected}, currently {actual}")]
    InvalidState {
        expected: &'static str,
        actual: PipelineState,
    },

    #[error("Component '{name}' is a {actual}, expected a {expected}")]
    WrongKind {
        name: String,
        expected: &'static str,
        actual: ComponentKind,
    },

    #[error("Pipeline '{name}' has no {what} attached")]
    Missing { name: String, what: &'static str },

    #[error("Video stream '{name}' failed: {source}")]
    Stream {
        name: String,
        #[source]
        source: StreamError,
    },

    #[error("Detector '{name}' failed: {source}")]
    Detector {
        name: String,
        #[source]
        source: DetectorError,
    },

    #[error("Pipeline task panicked: {task}")]
    Panic { task: String },
}

/// Errors raised while loading pipeline settings from disk.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
