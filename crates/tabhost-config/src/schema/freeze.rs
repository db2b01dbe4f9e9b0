//! Freeze/unfreeze configuration types.

use serde::{Deserialize, Serialize};

/// Controls when hidden tabs are swapped for a static snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FreezeConfig {
    pub enabled: bool,
    /// How long a tab must stay hidden before it is frozen.
    pub hidden_grace_ms: u64,
    /// Maximum time to wait for a capture before using a placeholder.
    /// (valid range: 1-10000)
    pub capture_timeout_ms: u64,
    /// Fill color of placeholder snapshots, `#rrggbb` or `#rrggbbaa`.
    pub placeholder_color: String,
    pub placeholder_width: u32,
    pub placeholder_height: u32,
}

impl Default for FreezeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hidden_grace_ms: 10_000,
            capture_timeout_ms: 500,
            placeholder_color: "#1e1e2e".into(),
            placeholder_width: 320,
            placeholder_height: 200,
        }
    }
}
