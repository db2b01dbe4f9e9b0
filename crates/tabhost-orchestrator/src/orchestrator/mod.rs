//! The orchestrator facade: wires the services together and exposes the
//! UI command and event channels.

use std::sync::Arc;

use tabhost_common::{Event, EventBus, Subscription, Topic, WindowId};
use tabhost_config::TabhostConfig;
use tabhost_surface::{SurfaceHost, ViewLifecycleManager};
use tokio::sync::mpsc;
use tracing::info;

use crate::focus::FocusCoordinator;
use crate::freeze::{FreezeService, FreezeSettings};
use crate::protocol::UiEvent;
use crate::settings::lifecycle_settings;
use crate::state::{StateSynchronizer, WindowSnapshot};
use crate::transfer::TransferCoordinator;

mod dispatch;
mod router;


use router::Router;

/// One per process. Cheap to clone; clones share every service.
#[derive(Clone)]
pub struct Orchestrator {
    bus: EventBus,
    vlm: ViewLifecycleManager,
    sync: StateSynchronizer,
    freeze: FreezeService,
    focus: FocusCoordinator,
    transfer: TransferCoordinator,
    router: Arc<Router>,
    window_closed: Arc<Subscription>,
}

impl Orchestrator {
    /// Build every service on top of `host`. Must be called inside a tokio
    /// runtime.
    pub fn new(host: Arc<dyn SurfaceHost>, config: &TabhostConfig) -> Self {
        let bus = EventBus::new();
        let vlm = ViewLifecycleManager::new(host, bus.clone(), lifecycle_settings(config));
        let sync = StateSynchronizer::new(vlm.clone(), bus.clone());
        let freeze = FreezeService::new(
            vlm.clone(),
            bus.clone(),
            FreezeSettings::from(&config.freeze),
        );
        let focus = FocusCoordinator::new(vlm.clone(), bus.clone());
        let transfer = TransferCoordinator::new(sync.clone());
        let router = Arc::new(Router::default());

        let weak = Arc::downgrade(&router);
        let window_closed = bus.subscribe(Topic::WindowClosed, move |event| {
            if let (Some(router), Event::WindowClosed { window_id }) =
                (weak.upgrade(), event)
            {
                router.forget(*window_id);
            }
        });

        info!(
            debounce_ms = config.lifecycle.destroy_debounce_ms,
            freeze = config.freeze.enabled,
            "orchestrator ready"
        );
        Self {
            bus,
            vlm,
            sync,
            freeze,
            focus,
            transfer,
            router,
            window_closed: Arc::new(window_closed),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn surfaces(&self) -> &ViewLifecycleManager {
        &self.vlm
    }

    pub fn synchronizer(&self) -> &StateSynchronizer {
        &self.sync
    }

    pub fn freeze(&self) -> &FreezeService {
        &self.freeze
    }

    pub fn focus(&self) -> &FocusCoordinator {
        &self.focus
    }

    /// Current state of a window.
    pub fn state(&self, window_id: WindowId) -> Option<WindowSnapshot> {
        self.sync.get_state(window_id)
    }

    /// Number of windows with a live command queue.
    pub fn queue_count(&self) -> usize {
        self.router.len()
    }

    /// A new receiver for everything pushed to the UI layer.
    pub fn subscribe_ui(&self) -> mpsc::UnboundedReceiver<UiEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.sync.attach_ui(tx);
        rx
    }

    /// Stop all services and release every surface.
    pub async fn shutdown(&self) {
        self.router.clear();
        self.window_closed.unsubscribe();
        self.freeze.shutdown();
        self.focus.shutdown();
        self.sync.shutdown();
        self.vlm.destroy_all().await;
        info!("orchestrator stopped");
    }
}
