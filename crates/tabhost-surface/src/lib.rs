//! Native surface lifecycle for tabhost tabs.
//!
//! Provides:
//! - The [`SurfaceHost`] boundary to the host platform
//! - [`ViewLifecycleManager`], the sole owner of live surface handles
//! - Debounced destroy, idempotent create, freeze and re-parent
//! - Translation of host signals into typed bus events
//! - [`HeadlessHost`], an in-process host for the CLI and tests

pub mod events;
pub mod headless;
pub mod host;
pub mod manager;
pub mod png;

pub use events::{HostSignal, SignalSink};
pub use headless::{HeadlessHost, HeadlessSettings};
pub use host::{HostError, HostSurfaceId, SurfaceHost, SurfaceRequest};
pub use manager::{LifecycleSettings, ViewLifecycleManager};
