//! Component descriptor for the frame differencing detector

use crate::{FrameDiffConfig, FrameDiffDetector};
use anyhow::anyhow;
use vigil_core::{
    ArgDescriptor, ArgKind, ArgMap, ComponentDescriptor, ComponentInstance, ComponentKind, Plugin,
    RegistryError,
};

/// Name this plugin registers under.
pub const PLUGIN_NAME: &str = "motion-detect";

/// Build the motion detection plugin.
pub fn plugin() -> Result<Plugin, RegistryError> {
    Plugin::new(PLUGIN_NAME, [frame_diff_descriptor()])
}

fn parse_f64(args: &ArgMap, name: &str) -> anyhow::Result<f64> {
    let raw = args
        .get(name)
        .ok_or_else(|| anyhow!("Missing argument: {}", name))?;
    raw.parse().map_err(|_| anyhow!("Invalid {}: {}", name, raw))
}

fn parse_usize(args: &ArgMap, name: &str) -> anyhow::Result<usize> {
    let raw = args
        .get(name)
        .ok_or_else(|| anyhow!("Missing argument: {}", name))?;
    raw.parse().map_err(|_| anyhow!("Invalid {}: {}", name, raw))
}

fn non_negative(value: &str) -> Result<(), String> {
    match value.parse::<f64>() {
        Ok(parsed) if parsed >= 0.0 => Ok(()),
        Ok(_) => Err("must not be negative".to_string()),
        Err(_) => Err(format!("not a number: {value}")),
    }
}

fn frame_diff_descriptor() -> ComponentDescriptor {
    ComponentDescriptor::new("frame-diff", ComponentKind::SyncDetector, |args| {
        let config = FrameDiffConfig {
            threshold: parse_f64(args, "threshold")?,
            min_area: parse_usize(args, "min_area")?,
            ..FrameDiffConfig::default()
        };
        Ok(ComponentInstance::SyncDetector(Box::new(
            FrameDiffDetector::new(config),
        )))
    })
    .with_args([
        ArgDescriptor::new("Threshold", "threshold", ArgKind::Float)
            .with_default("12")
            .with_validator(non_negative),
        ArgDescriptor::new("Minimum Area", "min_area", ArgKind::Integer)
            .with_default("64")
            .with_validator(non_negative),
    ])
}
