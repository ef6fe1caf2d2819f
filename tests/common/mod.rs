//! Shared helpers for the integration suites

use std::sync::Once;
use vigil_core::{ArgMap, Registry};

static TRACING: Once = Once::new();

/// Install a test log subscriber once; later calls are no-ops.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A registry with every built-in plugin registered.
pub fn registry_with_builtins() -> Registry {
    let mut registry = Registry::new();
    registry
        .register(vigil_frame_source::plugin().expect("frame-source plugin"))
        .expect("register frame-source");
    registry
        .register(vigil_motion_detect::plugin().expect("motion-detect plugin"))
        .expect("register motion-detect");
    registry
        .register(vigil_alert_sink::plugin().expect("alert-sink plugin"))
        .expect("register alert-sink");
    registry
}

/// String-typed argument map, the way a form boundary would deliver it.
pub fn arg_map(pairs: &[(&str, &str)]) -> ArgMap {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}
