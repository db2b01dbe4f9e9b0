//! Runtime settings derived from the loaded configuration.

use std::time::Duration;

use tabhost_common::WindowId;
use tabhost_config::TabhostConfig;
use tabhost_surface::{HeadlessSettings, LifecycleSettings};

pub fn lifecycle_settings(config: &TabhostConfig) -> LifecycleSettings {
    LifecycleSettings {
        destroy_debounce: Duration::from_millis(config.lifecycle.destroy_debounce_ms),
        max_live_surfaces: config.lifecycle.max_live_surfaces as usize,
    }
}

/// Host settings for the in-process host. The live surface limit is
/// enforced by the host as well.
pub fn headless_settings(config: &TabhostConfig) -> HeadlessSettings {
    HeadlessSettings {
        load_latency: Duration::from_millis(config.headless.load_latency_ms),
        manual_loads: false,
        reparent_supported: config.headless.reparent_supported,
        max_surfaces: config.lifecycle.max_live_surfaces as usize,
    }
}

pub fn initial_windows(config: &TabhostConfig) -> Vec<WindowId> {
    config.headless.windows.iter().copied().map(WindowId).collect()
}
