//! Component descriptors for the built-in frame sources

use crate::{ImageDirConfig, ImageDirStream, TestPatternConfig, TestPatternStream};
use anyhow::anyhow;
use std::path::PathBuf;
use vigil_core::{
    ArgDescriptor, ArgKind, ArgMap, ComponentDescriptor, ComponentInstance, ComponentKind, Plugin,
    RegistryError,
};

/// Name this plugin registers under.
pub const PLUGIN_NAME: &str = "frame-source";

/// Build the frame source plugin: the test pattern stream and the image
/// directory stream.
pub fn plugin() -> Result<Plugin, RegistryError> {
    Plugin::new(
        PLUGIN_NAME,
        [test_pattern_descriptor(), image_dir_descriptor()],
    )
}

fn arg<'a>(args: &'a ArgMap, name: &str) -> anyhow::Result<&'a str> {
    args.get(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Missing argument: {}", name))
}

fn parse_u32(args: &ArgMap, name: &str) -> anyhow::Result<u32> {
    let raw = arg(args, name)?;
    raw.parse().map_err(|_| anyhow!("Invalid {}: {}", name, raw))
}

fn parse_u64(args: &ArgMap, name: &str) -> anyhow::Result<u64> {
    let raw = arg(args, name)?;
    raw.parse().map_err(|_| anyhow!("Invalid {}: {}", name, raw))
}

fn parse_f64(args: &ArgMap, name: &str) -> anyhow::Result<f64> {
    let raw = arg(args, name)?;
    raw.parse().map_err(|_| anyhow!("Invalid {}: {}", name, raw))
}

fn positive_number(value: &str) -> Result<(), String> {
    match value.parse::<f64>() {
        Ok(parsed) if parsed > 0.0 => Ok(()),
        Ok(_) => Err("must be greater than zero".to_string()),
        Err(_) => Err(format!("not a number: {value}")),
    }
}

fn test_pattern_descriptor() -> ComponentDescriptor {
    ComponentDescriptor::new("test-pattern", ComponentKind::AsyncVideoStream, |args| {
        let config = TestPatternConfig {
            width: parse_u32(args, "width")?,
            height: parse_u32(args, "height")?,
            fps: parse_f64(args, "fps")?,
            frames: parse_u64(args, "frames")?,
        };
        Ok(ComponentInstance::AsyncVideoStream(Box::new(
            TestPatternStream::new(config),
        )))
    })
    .with_args([
        ArgDescriptor::new("Width", "width", ArgKind::Integer)
            .with_default("320")
            .with_validator(positive_number),
        ArgDescriptor::new("Height", "height", ArgKind::Integer)
            .with_default("240")
            .with_validator(positive_number),
        ArgDescriptor::new("Frame Rate", "fps", ArgKind::Float)
            .with_default("10")
            .with_validator(positive_number),
        ArgDescriptor::new("Frame Limit", "frames", ArgKind::Integer).with_default("0"),
    ])
}

fn image_dir_descriptor() -> ComponentDescriptor {
    ComponentDescriptor::new("image-dir", ComponentKind::SyncVideoStream, |args| {
        let config = ImageDirConfig {
            path: PathBuf::from(arg(args, "path")?),
            fps: parse_f64(args, "fps")?,
        };
        Ok(ComponentInstance::SyncVideoStream(Box::new(
            ImageDirStream::open(config)?,
        )))
    })
    .with_args([
        ArgDescriptor::new("Directory", "path", ArgKind::String).with_validator(|value| {
            if value.trim().is_empty() {
                Err("must not be empty".to_string())
            } else {
                Ok(())
            }
        }),
        ArgDescriptor::new("Frame Rate", "fps", ArgKind::Float)
            .with_default("10")
            .with_validator(positive_number),
    ])
    .with_args_transform(|mut args| {
        // Paths arrive from forms with stray whitespace and trailing slashes.
        if let Some(path) = args.get_mut("path") {
            let cleaned = path.trim().trim_end_matches('/').to_string();
            *path = cleaned;
        }
        Ok(args)
    })
}
