use tabhost_common::WindowId;

use crate::host::HostSurfaceId;

/// Reference to an allocated native surface.
///
/// Never leaves this crate: everything outside the lifecycle manager
/// addresses surfaces by tab id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SurfaceHandle {
    surface: HostSurfaceId,
    window_id: WindowId,
}

impl SurfaceHandle {
    pub(crate) fn new(surface: HostSurfaceId, window_id: WindowId) -> Self {
        Self { surface, window_id }
    }

    pub(crate) fn surface(&self) -> HostSurfaceId {
        self.surface
    }

    pub(crate) fn window_id(&self) -> WindowId {
        self.window_id
    }

    pub(crate) fn moved_to(self, window_id: WindowId) -> Self {
        Self { window_id, ..self }
    }
}
