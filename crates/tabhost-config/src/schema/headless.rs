//! Headless host configuration types.

use serde::{Deserialize, Serialize};

/// Settings for the in-process host used by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadlessConfig {
    /// Simulated page load time. 0 completes loads immediately.
    pub load_latency_ms: u64,
    /// Whether surfaces can move between windows without re-creation.
    pub reparent_supported: bool,
    /// Window ids registered at startup.
    pub windows: Vec<u32>,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            load_latency_ms: 0,
            reparent_supported: true,
            windows: vec![1],
        }
    }
}
