//! Vigil Core - Plugin-based home security pipeline architecture
//!
//! This crate provides the component contracts, the sync-to-async adapter,
//! the descriptor registry, and the pipeline orchestrator that video stream,
//! detector, and alert subscriber plugins are built against.

pub mod adapter;
pub mod alert;
pub mod component;
pub mod detect;
pub mod dispatch;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod video;

pub use adapter::{BlockingDetector, BlockingStream, BlockingSubscriber};
pub use alert::{Alert, AsyncSubscriber, SyncSubscriber};
pub use component::{
    ArgDescriptor, ArgKind, ArgMap, ArgValidator, ArgsTransform, Choice, ComponentDescriptor,
    ComponentInstance, ComponentKind, Constructor, Plugin,
};
pub use detect::{
    AsyncDetector, BoundingBox, Detection, DetectionResult, ScoredLabel, SyncDetector,
};
pub use dispatch::{dispatch, Cooldown, DispatchReport, NamedSubscriber, SubscriberFailure};
pub use error::{
    ComponentError, DetectorError, PipelineError, RegistryError, SettingsError, StreamError,
    SubscriberError,
};
pub use pipeline::{
    Pipeline, PipelineBuilder, PipelineReport, PipelineSettings, PipelineState, StreamOptions,
    TerminationFailure,
};
pub use registry::Registry;
pub use video::{AsyncVideoStream, Frame, PixelFormat, SyncVideoStream};
