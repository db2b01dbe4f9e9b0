//! Configuration schema types for tabhost.
//!
//! All structs use `serde(default)` so partial configs work correctly.
//! Missing fields are filled with the defaults below.

mod freeze;
mod headless;
mod lifecycle;
mod system;

pub use freeze::*;
pub use headless::*;
pub use lifecycle::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Root configuration for tabhost.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct TabhostConfig {
    pub lifecycle: LifecycleConfig,
    pub freeze: FreezeConfig,
    pub headless: HeadlessConfig,
    pub logging: LoggingConfig,
}
