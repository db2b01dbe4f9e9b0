//! View lifecycle management.
//!
//! `ViewLifecycleManager` creates, positions, freezes, re-parents and
//! destroys native surfaces, one per tab, and is the only owner of their
//! handles. Every transition is announced on the event bus.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tabhost_common::{Event, EventBus, OrchestratorError, SurfaceState, TabId, WindowId};
use tokio::sync::Notify;

use crate::host::{HostError, HostSurfaceId, SurfaceHost};

mod handle;
mod handlers;
mod lifecycle;
mod ops;
mod registry;
mod types;


pub use types::LifecycleSettings;

use registry::SurfaceRegistry;

/// Owns every native surface and its per-tab state machine.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct ViewLifecycleManager {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    host: Arc<dyn SurfaceHost>,
    bus: EventBus,
    settings: LifecycleSettings,
    registry: Mutex<SurfaceRegistry>,
    next_surface: AtomicU64,
    next_token: AtomicU64,
    /// Woken whenever an in-flight create resolves.
    settled: Notify,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SurfaceRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_all(&self, events: Vec<Event>) {
        for event in events {
            self.bus.publish(event);
        }
    }
}

impl ViewLifecycleManager {
    pub fn new(host: Arc<dyn SurfaceHost>, bus: EventBus, settings: LifecycleSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                host,
                bus,
                settings,
                registry: Mutex::new(SurfaceRegistry::default()),
                next_surface: AtomicU64::new(1),
                next_token: AtomicU64::new(1),
                settled: Notify::new(),
            }),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn settings(&self) -> &LifecycleSettings {
        &self.inner.settings
    }

    /// Whether the host knows `window_id`.
    pub fn has_window(&self, window_id: WindowId) -> bool {
        self.inner.host.has_window(window_id)
    }

    /// Current surface state, or `None` if the tab has no slot.
    pub fn state(&self, tab_id: &TabId) -> Option<SurfaceState> {
        self.inner.lock().get(tab_id).map(|s| s.state)
    }

    pub fn is_live(&self, tab_id: &TabId) -> bool {
        self.inner
            .lock()
            .get(tab_id)
            .is_some_and(|s| s.state.has_surface())
    }

    /// Last requested visibility, whether or not a surface exists.
    pub fn is_visible(&self, tab_id: &TabId) -> bool {
        self.inner.lock().get(tab_id).is_some_and(|s| s.visible)
    }

    pub fn window_of(&self, tab_id: &TabId) -> Option<WindowId> {
        self.inner.lock().get(tab_id).map(|s| s.window_id)
    }

    /// Last url the surface reported or was asked to load.
    pub fn last_url(&self, tab_id: &TabId) -> Option<String> {
        self.inner.lock().get(tab_id).map(|s| s.url.clone())
    }

    /// Tabs of `window_id` from back to front.
    pub fn z_order(&self, window_id: WindowId) -> Vec<TabId> {
        self.inner.lock().z_order(window_id)
    }

    /// Number of tabs that currently hold a native surface.
    pub fn live_count(&self) -> usize {
        self.inner.lock().live()
    }

    fn next_surface_id(&self) -> HostSurfaceId {
        HostSurfaceId(self.inner.next_surface.fetch_add(1, Ordering::Relaxed))
    }

    fn next_token(&self) -> u64 {
        self.inner.next_token.fetch_add(1, Ordering::Relaxed)
    }
}

pub(crate) fn map_host_error(err: HostError, tab_id: &TabId) -> OrchestratorError {
    match err {
        HostError::UnknownWindow(w) => OrchestratorError::InvalidWindow(w),
        HostError::Exhausted(reason) => OrchestratorError::ResourceExhausted(reason),
        HostError::UnknownSurface(_) => OrchestratorError::NoSuchSurface(tab_id.clone()),
        other @ (HostError::Unsupported | HostError::Failed(_)) => {
            OrchestratorError::Host(other.to_string())
        }
    }
}

fn state_changed(tab_id: &TabId, state: SurfaceState) -> Event {
    Event::SurfaceStateChanged {
        tab_id: tab_id.clone(),
        state,
    }
}
