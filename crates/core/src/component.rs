//! Component descriptors and the six-kind component vocabulary
//!
//! A plugin describes each component it offers with a [`ComponentDescriptor`]:
//! what kind of component it is, which constructor arguments it takes, and how
//! to build an instance from raw string-typed argument values. The descriptors
//! carry enough metadata for a frontend to render a configuration form without
//! knowing anything about the component itself.

use crate::adapter::{BlockingDetector, BlockingStream, BlockingSubscriber};
use crate::alert::{AsyncSubscriber, SyncSubscriber};
use crate::detect::{AsyncDetector, SyncDetector};
use crate::error::RegistryError;
use crate::video::{AsyncVideoStream, SyncVideoStream};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// The complete component vocabulary: every registered descriptor and every
/// pipeline attachment is exactly one of these six kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    SyncVideoStream,
    AsyncVideoStream,
    SyncDetector,
    AsyncDetector,
    SyncSubscriber,
    AsyncSubscriber,
}

impl ComponentKind {
    /// Whether instances of this kind need the blocking adapter.
    #[must_use]
    pub fn is_sync(&self) -> bool {
        matches!(
            self,
            ComponentKind::SyncVideoStream
                | ComponentKind::SyncDetector
                | ComponentKind::SyncSubscriber
        )
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComponentKind::SyncVideoStream => "sync video stream",
            ComponentKind::AsyncVideoStream => "async video stream",
            ComponentKind::SyncDetector => "sync detector",
            ComponentKind::AsyncDetector => "async detector",
            ComponentKind::SyncSubscriber => "sync subscriber",
            ComponentKind::AsyncSubscriber => "async subscriber",
        };
        f.write_str(name)
    }
}

/// Value type of a constructor argument, for form rendering and validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgKind {
    String,
    Integer,
    Float,
    Boolean,
}

impl ArgKind {
    /// Check that a raw value conforms to this kind.
    pub(crate) fn check(&self, value: &str) -> Result<(), String> {
        match self {
            ArgKind::String => Ok(()),
            ArgKind::Integer => value
                .parse::<i64>()
                .map(|_| ())
                .map_err(|_| "expected an integer".to_string()),
            ArgKind::Float => value
                .parse::<f64>()
                .map(|_| ())
                .map_err(|_| "expected a number".to_string()),
            ArgKind::Boolean => {
                if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
                    Ok(())
                } else {
                    Err("expected true or false".to_string())
                }
            }
        }
    }
}

/// One entry of a fixed option list for an argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Label shown to the user
    pub display_name: String,

    /// Raw value passed to the constructor
    pub value: String,
}

impl Choice {
    pub fn new(display_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            value: value.into(),
        }
    }
}

/// Validation predicate for one argument value. Returns a human-readable
/// reason on rejection.
pub type ArgValidator = Arc<dyn Fn(&str) -> Result<(), String> + Send + Sync>;

/// Raw string-typed argument values as they arrive from a form or config
/// boundary, keyed by `arg_name`.
pub type ArgMap = BTreeMap<String, String>;

/// Declares one constructor argument of a component.
#[derive(Clone)]
pub struct ArgDescriptor {
    /// Label shown to the user, e.g. "Source"
    pub display_name: String,

    /// Key in the argument map, e.g. "source"
    pub arg_name: String,

    /// Declared value type
    pub kind: ArgKind,

    /// Whether instantiation fails when no value is supplied
    pub required: bool,

    /// Value used when the argument is absent. A default of `""` is a value,
    /// not an absence.
    pub default: Option<String>,

    /// Fixed option list; empty means free-form input
    pub choices: Vec<Choice>,

    /// Extra validation beyond the kind check
    pub validator: Option<ArgValidator>,
}

impl ArgDescriptor {
    /// A required argument with no default.
    pub fn new(
        display_name: impl Into<String>,
        arg_name: impl Into<String>,
        kind: ArgKind,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            arg_name: arg_name.into(),
            kind,
            required: true,
            default: None,
            choices: Vec::new(),
            validator: None,
        }
    }

    /// Mark the argument optional without a default; an absent value is
    /// simply omitted from the resolved argument map.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Set a default value; implies the argument is optional.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self.required = false;
        self
    }

    /// Restrict the argument to a fixed option list.
    #[must_use]
    pub fn with_choices(mut self, choices: impl IntoIterator<Item = Choice>) -> Self {
        self.choices = choices.into_iter().collect();
        self
    }

    /// Attach a validation predicate.
    #[must_use]
    pub fn with_validator(
        mut self,
        validator: impl Fn(&str) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }
}

impl fmt::Debug for ArgDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgDescriptor")
            .field("display_name", &self.display_name)
            .field("arg_name", &self.arg_name)
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("default", &self.default)
            .field("choices", &self.choices)
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}

/// A constructed component, one variant per [`ComponentKind`].
pub enum ComponentInstance {
    SyncVideoStream(Box<dyn SyncVideoStream>),
    AsyncVideoStream(Box<dyn AsyncVideoStream>),
    SyncDetector(Box<dyn SyncDetector>),
    AsyncDetector(Box<dyn AsyncDetector>),
    SyncSubscriber(Box<dyn SyncSubscriber>),
    AsyncSubscriber(Box<dyn AsyncSubscriber>),
}

impl ComponentInstance {
    /// The kind this instance was constructed as.
    #[must_use]
    pub fn kind(&self) -> ComponentKind {
        match self {
            ComponentInstance::SyncVideoStream(_) => ComponentKind::SyncVideoStream,
            ComponentInstance::AsyncVideoStream(_) => ComponentKind::AsyncVideoStream,
            ComponentInstance::SyncDetector(_) => ComponentKind::SyncDetector,
            ComponentInstance::AsyncDetector(_) => ComponentKind::AsyncDetector,
            ComponentInstance::SyncSubscriber(_) => ComponentKind::SyncSubscriber,
            ComponentInstance::AsyncSubscriber(_) => ComponentKind::AsyncSubscriber,
        }
    }

    /// Lift into the async stream contract, adapting sync instances onto the
    /// blocking pool. `None` when the instance is not a video stream.
    pub fn into_stream(self) -> Option<Box<dyn AsyncVideoStream>> {
        match self {
            ComponentInstance::AsyncVideoStream(stream) => Some(stream),
            ComponentInstance::SyncVideoStream(stream) => {
                Some(Box::new(BlockingStream::new(stream)))
            }
            _ => None,
        }
    }

    /// Lift into the async detector contract, adapting sync instances onto the
    /// blocking pool. `None` when the instance is not a detector.
    pub fn into_detector(self) -> Option<Box<dyn AsyncDetector>> {
        match self {
            ComponentInstance::AsyncDetector(detector) => Some(detector),
            ComponentInstance::SyncDetector(detector) => {
                Some(Box::new(BlockingDetector::new(detector)))
            }
            _ => None,
        }
    }

    /// Lift into the async subscriber contract, adapting sync instances onto
    /// the blocking pool. `None` when the instance is not a subscriber.
    pub fn into_subscriber(self) -> Option<Box<dyn AsyncSubscriber>> {
        match self {
            ComponentInstance::AsyncSubscriber(subscriber) => Some(subscriber),
            ComponentInstance::SyncSubscriber(subscriber) => {
                Some(Box::new(BlockingSubscriber::new(subscriber)))
            }
            _ => None,
        }
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentInstance").field(&self.kind()).finish()
    }
}

/// Constructor for a component, fed the resolved argument map.
pub type Constructor = Arc<dyn Fn(&ArgMap) -> anyhow::Result<ComponentInstance> + Send + Sync>;

/// Rewrite of the raw argument map applied before construction.
pub type ArgsTransform = Arc<dyn Fn(ArgMap) -> anyhow::Result<ArgMap> + Send + Sync>;

/// Describes one component a plugin offers.
///
/// Descriptor identity is `(display_name, kind)`; the registry rejects a
/// second registration of the same identity.
#[derive(Clone)]
pub struct ComponentDescriptor {
    display_name: String,
    kind: ComponentKind,
    args: Vec<ArgDescriptor>,
    args_transform: Option<ArgsTransform>,
    constructor: Constructor,
}

impl ComponentDescriptor {
    pub fn new(
        display_name: impl Into<String>,
        kind: ComponentKind,
        constructor: impl Fn(&ArgMap) -> anyhow::Result<ComponentInstance> + Send + Sync + 'static,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            kind,
            args: Vec::new(),
            args_transform: None,
            constructor: Arc::new(constructor),
        }
    }

    /// Declare the constructor arguments.
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = ArgDescriptor>) -> Self {
        self.args = args.into_iter().collect();
        self
    }

    /// Attach a transform applied to the resolved raw arguments before
    /// construction.
    #[must_use]
    pub fn with_args_transform(
        mut self,
        transform: impl Fn(ArgMap) -> anyhow::Result<ArgMap> + Send + Sync + 'static,
    ) -> Self {
        self.args_transform = Some(Arc::new(transform));
        self
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    #[must_use]
    pub fn args(&self) -> &[ArgDescriptor] {
        &self.args
    }

    pub(crate) fn args_transform(&self) -> Option<&ArgsTransform> {
        self.args_transform.as_ref()
    }

    pub(crate) fn constructor(&self) -> &Constructor {
        &self.constructor
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("display_name", &self.display_name)
            .field("kind", &self.kind)
            .field("args", &self.args)
            .field("has_args_transform", &self.args_transform.is_some())
            .finish()
    }
}

/// A named, immutable set of component descriptors contributed by one plugin.
pub struct Plugin {
    name: String,
    components: Vec<Arc<ComponentDescriptor>>,
}

impl Plugin {
    /// Build a plugin from its descriptors.
    ///
    /// Fails when two descriptors share an identity, before any registry is
    /// involved.
    pub fn new(
        name: impl Into<String>,
        components: impl IntoIterator<Item = ComponentDescriptor>,
    ) -> Result<Self, RegistryError> {
        let name = name.into();
        let components: Vec<Arc<ComponentDescriptor>> =
            components.into_iter().map(Arc::new).collect();

        for (i, descriptor) in components.iter().enumerate() {
            let duplicated = components[..i].iter().any(|other| {
                other.display_name() == descriptor.display_name()
                    && other.kind() == descriptor.kind()
            });
            if duplicated {
                return Err(RegistryError::DuplicateDescriptor {
                    display_name: descriptor.display_name().to_string(),
                    kind: descriptor.kind(),
                });
            }
        }

        Ok(Self { name, components })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn components(&self) -> &[Arc<ComponentDescriptor>] {
        &self.components
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::DetectionResult;
    use crate::error::{ComponentError, DetectorError};
    use crate::video::Frame;

    struct NoopDetector;

    impl SyncDetector for NoopDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<DetectionResult, DetectorError> {
            Ok(DetectionResult::empty())
        }

        fn clean_up(&mut self) -> Result<(), ComponentError> {
            Ok(())
        }
    }

    fn noop_descriptor(display_name: &str, kind: ComponentKind) -> ComponentDescriptor {
        ComponentDescriptor::new(display_name, kind, |_args| {
            Ok(ComponentInstance::SyncDetector(Box::new(NoopDetector)))
        })
    }

    #[test]
    fn test_arg_descriptor_builder() {
        let arg = ArgDescriptor::new("Source", "source", ArgKind::String)
            .with_default("0")
            .with_choices([Choice::new("Default Camera", "0")])
            .with_validator(|v| {
                if v.is_empty() {
                    Err("must not be empty".to_string())
                } else {
                    Ok(())
                }
            });

        assert!(!arg.required);
        assert_eq!(arg.default.as_deref(), Some("0"));
        assert_eq!(arg.choices.len(), 1);
        assert!(arg.validator.is_some());
    }

    #[test]
    fn test_kind_conformance_checks() {
        assert!(ArgKind::Integer.check("42").is_ok());
        assert!(ArgKind::Integer.check("4.2").is_err());
        assert!(ArgKind::Float.check("4.2").is_ok());
        assert!(ArgKind::Boolean.check("True").is_ok());
        assert!(ArgKind::Boolean.check("yes").is_err());
        assert!(ArgKind::String.check("anything").is_ok());
    }

    #[test]
    fn test_instance_kind_and_lift() {
        let instance = ComponentInstance::SyncDetector(Box::new(NoopDetector));
        assert_eq!(instance.kind(), ComponentKind::SyncDetector);
        assert!(instance.into_detector().is_some());

        let instance = ComponentInstance::SyncDetector(Box::new(NoopDetector));
        assert!(instance.into_stream().is_none());
    }

    #[test]
    fn test_plugin_rejects_duplicate_identity() {
        let result = Plugin::new(
            "Test",
            [
                noop_descriptor("Detector", ComponentKind::SyncDetector),
                noop_descriptor("Detector", ComponentKind::SyncDetector),
            ],
        );

        assert!(matches!(
            result,
            Err(RegistryError::DuplicateDescriptor { .. })
        ));
    }

    #[test]
    fn test_plugin_allows_same_name_across_kinds() {
        let plugin = Plugin::new(
            "Test",
            [
                noop_descriptor("Detector", ComponentKind::SyncDetector),
                noop_descriptor("Detector", ComponentKind::AsyncDetector),
            ],
        )
        .expect("distinct identities");

        assert_eq!(plugin.components().len(), 2);
    }
}
