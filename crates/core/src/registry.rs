//! Component registry: registration, lookup, and generic instantiation

use crate::component::{ArgMap, ComponentDescriptor, ComponentInstance, ComponentKind, Plugin};
use crate::error::RegistryError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Registry of every component descriptor contributed by the loaded plugins.
///
/// Plugins register at startup; afterwards the registry is read-mostly and a
/// shared `Arc<Registry>` serves concurrent lookups and instantiations.
pub struct Registry {
    /// Descriptors per kind, in registration order
    by_kind: HashMap<ComponentKind, Vec<Arc<ComponentDescriptor>>>,
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            by_kind: HashMap::with_capacity(6), // One bucket per component kind
        }
    }

    /// Register every descriptor of a plugin.
    ///
    /// Descriptor identity is `(display_name, kind)` and the first
    /// registration wins: if any descriptor of the plugin collides with one
    /// already present, the whole plugin is rejected and the registry is left
    /// unchanged.
    pub fn register(&mut self, plugin: Plugin) -> Result<(), RegistryError> {
        for descriptor in plugin.components() {
            if self.find(descriptor.kind(), descriptor.display_name()).is_some() {
                return Err(RegistryError::DuplicateDescriptor {
                    display_name: descriptor.display_name().to_string(),
                    kind: descriptor.kind(),
                });
            }
        }

        info!(
            "Registering plugin '{}' with {} component(s)",
            plugin.name(),
            plugin.components().len()
        );

        for descriptor in plugin.components() {
            debug!(
                "Registering component descriptor: '{}' ({})",
                descriptor.display_name(),
                descriptor.kind()
            );
            self.by_kind
                .entry(descriptor.kind())
                .or_default()
                .push(Arc::clone(descriptor));
        }

        Ok(())
    }

    /// All descriptors of a kind, in registration order.
    #[must_use]
    pub fn lookup(&self, kind: ComponentKind) -> &[Arc<ComponentDescriptor>] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Find a descriptor by identity.
    #[must_use]
    pub fn find(&self, kind: ComponentKind, display_name: &str) -> Option<&Arc<ComponentDescriptor>> {
        self.lookup(kind)
            .iter()
            .find(|descriptor| descriptor.display_name() == display_name)
    }

    /// Total number of registered descriptors
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.by_kind.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.component_count() == 0
    }

    /// Construct a component from a descriptor and raw argument values.
    ///
    /// Arguments are resolved against the descriptor (supplied value, else
    /// default), checked against their declared kind, choices, and validator,
    /// passed through the descriptor's transform, and handed to the
    /// constructor. Any failure constructs nothing; undeclared keys in
    /// `raw_args` are ignored.
    pub fn instantiate(
        &self,
        descriptor: &ComponentDescriptor,
        raw_args: &ArgMap,
    ) -> Result<ComponentInstance, RegistryError> {
        let component = descriptor.display_name().to_string();

        let mut resolved = ArgMap::new();
        for arg in descriptor.args() {
            let value = match raw_args.get(&arg.arg_name) {
                Some(value) => Some(value.clone()),
                None => arg.default.clone(),
            };

            match value {
                Some(value) => {
                    arg.kind
                        .check(&value)
                        .map_err(|reason| RegistryError::InvalidArgument {
                            component: component.clone(),
                            arg_name: arg.arg_name.clone(),
                            value: value.clone(),
                            reason,
                        })?;

                    if !arg.choices.is_empty()
                        && !arg.choices.iter().any(|choice| choice.value == value)
                    {
                        return Err(RegistryError::InvalidArgument {
                            component,
                            arg_name: arg.arg_name.clone(),
                            value,
                            reason: "not one of the declared choices".to_string(),
                        });
                    }

                    if let Some(validator) = &arg.validator {
                        validator(&value).map_err(|reason| RegistryError::InvalidArgument {
                            component: component.clone(),
                            arg_name: arg.arg_name.clone(),
                            value: value.clone(),
                            reason,
                        })?;
                    }

                    resolved.insert(arg.arg_name.clone(), value);
                }
                None if arg.required => {
                    return Err(RegistryError::MissingArgument {
                        component,
                        arg_name: arg.arg_name.clone(),
                    });
                }
                None => {}
            }
        }

        let resolved = match descriptor.args_transform() {
            Some(transform) => {
                transform(resolved).map_err(|source| RegistryError::ArgumentTransform {
                    component: component.clone(),
                    source,
                })?
            }
            None => resolved,
        };

        let instance = (descriptor.constructor())(&resolved).map_err(|source| {
            RegistryError::Construction {
                component: component.clone(),
                source,
            }
        })?;

        if instance.kind() != descriptor.kind() {
            return Err(RegistryError::Construction {
                component,
                source: anyhow::anyhow!(
                    "Constructor produced a {}, descriptor declares a {}",
                    instance.kind(),
                    descriptor.kind()
                ),
            });
        }

        debug!("Instantiated component '{}' ({})", component, descriptor.kind());
        Ok(instance)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
