//! Surface lifecycle configuration types.

use serde::{Deserialize, Serialize};

/// Surface creation and teardown settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Delay before a requested destroy actually releases the surface.
    /// A create for the same tab inside this window cancels the destroy.
    /// (valid range: 0-10000)
    pub destroy_debounce_ms: u64,
    /// Upper bound on simultaneously live surfaces. 0 means unlimited.
    pub max_live_surfaces: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            destroy_debounce_ms: 50,
            max_live_surfaces: 0,
        }
    }
}
