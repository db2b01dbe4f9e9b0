use std::time::Duration;

use tabhost_common::{Rect, SurfaceState, WindowId};
use tokio::task::AbortHandle;

use super::handle::SurfaceHandle;

/// Tunables for [`super::ViewLifecycleManager`].
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    /// Delay before a requested destroy actually releases the surface.
    pub destroy_debounce: Duration,
    /// Upper bound on concurrently allocated surfaces (0 = unlimited).
    pub max_live_surfaces: usize,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            destroy_debounce: Duration::from_millis(50),
            max_live_surfaces: 0,
        }
    }
}

/// Everything the manager knows about one tab's surface.
#[derive(Debug)]
pub(crate) struct SurfaceSlot {
    pub(crate) state: SurfaceState,
    pub(crate) window_id: WindowId,
    pub(crate) url: String,
    pub(crate) handle: Option<SurfaceHandle>,
    pub(crate) bounds: Option<Rect>,
    pub(crate) visible: bool,
    /// Bumped whenever an in-flight create is started or superseded.
    pub(crate) generation: u64,
    pub(crate) pending_destroy: Option<PendingDestroy>,
    /// The tab was closed: its destroy is final and no create may revive it.
    pub(crate) closing: bool,
}

impl SurfaceSlot {
    pub(crate) fn new(window_id: WindowId, url: &str) -> Self {
        Self {
            state: SurfaceState::Uninitialized,
            window_id,
            url: url.to_string(),
            handle: None,
            bounds: None,
            visible: false,
            generation: 0,
            pending_destroy: None,
            closing: false,
        }
    }

    /// Move to `next`, which must be allowed by the surface state table.
    pub(crate) fn set_state(&mut self, next: SurfaceState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal surface transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }

    /// Drop a scheduled destroy. Returns whether one was pending.
    pub(crate) fn cancel_destroy(&mut self) -> bool {
        match self.pending_destroy.take() {
            Some(pending) => {
                pending.abort.abort();
                true
            }
            None => false,
        }
    }

    /// Whether this slot currently counts against the surface budget.
    pub(crate) fn holds_allocation(&self) -> bool {
        self.handle.is_some()
            || matches!(self.state, SurfaceState::Creating | SurfaceState::Unfreezing)
    }
}

/// A scheduled, cancellable destroy.
#[derive(Debug)]
pub(crate) struct PendingDestroy {
    pub(crate) token: u64,
    pub(crate) abort: AbortHandle,
}
