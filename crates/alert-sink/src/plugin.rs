//! Component descriptors for the built-in alert sinks

use crate::{JsonlSubscriber, LogSubscriber};
use anyhow::anyhow;
use tracing::Level;
use vigil_core::{
    ArgDescriptor, ArgKind, ArgMap, Choice, ComponentDescriptor, ComponentInstance, ComponentKind,
    Plugin, RegistryError,
};

/// Name this plugin registers under.
pub const PLUGIN_NAME: &str = "alert-sink";

/// Build the alert sink plugin: the log subscriber and the JSONL file sink.
pub fn plugin() -> Result<Plugin, RegistryError> {
    Plugin::new(PLUGIN_NAME, [log_descriptor(), jsonl_descriptor()])
}

fn arg<'a>(args: &'a ArgMap, name: &str) -> anyhow::Result<&'a str> {
    args.get(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Missing argument: {}", name))
}

fn log_descriptor() -> ComponentDescriptor {
    ComponentDescriptor::new("log", ComponentKind::AsyncSubscriber, |args| {
        // The choices constrain the value; anything but error/warn is info.
        let level = match arg(args, "level")? {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            _ => Level::INFO,
        };
        Ok(ComponentInstance::AsyncSubscriber(Box::new(
            LogSubscriber::new(level),
        )))
    })
    .with_args([ArgDescriptor::new("Level", "level", ArgKind::String)
        .with_default("info")
        .with_choices([
            Choice::new("Error", "error"),
            Choice::new("Warning", "warn"),
            Choice::new("Info", "info"),
        ])])
}

fn jsonl_descriptor() -> ComponentDescriptor {
    ComponentDescriptor::new("jsonl", ComponentKind::SyncSubscriber, |args| {
        Ok(ComponentInstance::SyncSubscriber(Box::new(
            JsonlSubscriber::open(arg(args, "path")?)?,
        )))
    })
    .with_args([
        ArgDescriptor::new("Output File", "path", ArgKind::String).with_validator(|value| {
            if value.trim().is_empty() {
                Err("must not be empty".to_string())
            } else {
                Ok(())
            }
        }),
    ])
    .with_args_transform(|mut args| {
        if let Some(path) = args.get_mut("path") {
            let cleaned = path.trim().to_string();
            *path = cleaned;
        }
        Ok(args)
    })
}
