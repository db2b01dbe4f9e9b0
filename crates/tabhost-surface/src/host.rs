//! The boundary between the lifecycle manager and the platform that
//! actually owns native web surfaces.

use std::fmt;

use async_trait::async_trait;
use tabhost_common::{Rect, WindowId};

use crate::events::SignalSink;

/// Host-side identifier of one native surface. Allocated by the lifecycle
/// manager, never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostSurfaceId(pub u64);

impl fmt::Display for HostSurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HostError {
    #[error("unknown window {0}")]
    UnknownWindow(WindowId),

    #[error("host out of resources: {0}")]
    Exhausted(String),

    #[error("unknown surface {0}")]
    UnknownSurface(HostSurfaceId),

    #[error("operation not supported by this host")]
    Unsupported,

    #[error("{0}")]
    Failed(String),
}

/// Everything the host needs to build a surface.
#[derive(Debug, Clone)]
pub struct SurfaceRequest {
    pub id: HostSurfaceId,
    pub window_id: WindowId,
    pub url: String,
    pub bounds: Option<Rect>,
    pub visible: bool,
}

/// A platform that can create and drive native web surfaces.
///
/// Implementations report page activity through the [`SignalSink`] passed
/// to `create_surface`. The sink may be called from any thread.
#[async_trait]
pub trait SurfaceHost: Send + Sync {
    /// Whether `window` is a live application window on this host.
    fn has_window(&self, window: WindowId) -> bool;

    async fn create_surface(&self, request: SurfaceRequest, sink: SignalSink)
        -> Result<(), HostError>;

    async fn destroy_surface(&self, id: HostSurfaceId) -> Result<(), HostError>;

    async fn set_bounds(&self, id: HostSurfaceId, bounds: Rect) -> Result<(), HostError>;

    async fn set_visible(&self, id: HostSurfaceId, visible: bool) -> Result<(), HostError>;

    async fn bring_to_front(&self, id: HostSurfaceId) -> Result<(), HostError>;

    async fn send_to_back(&self, id: HostSurfaceId) -> Result<(), HostError>;

    async fn navigate(&self, id: HostSurfaceId, url: &str) -> Result<(), HostError>;

    async fn go_back(&self, id: HostSurfaceId) -> Result<(), HostError>;

    async fn go_forward(&self, id: HostSurfaceId) -> Result<(), HostError>;

    async fn reload(&self, id: HostSurfaceId) -> Result<(), HostError>;

    async fn focus(&self, id: HostSurfaceId) -> Result<(), HostError>;

    /// Render the current surface contents as PNG bytes.
    async fn capture(&self, id: HostSurfaceId) -> Result<Vec<u8>, HostError>;

    /// Move a surface into another window without reloading it.
    async fn reparent(&self, id: HostSurfaceId, target: WindowId) -> Result<(), HostError> {
        let _ = (id, target);
        Err(HostError::Unsupported)
    }
}
