//! Input focus routing.
//!
//! Focus requests are advisory: they return at once and the host applies
//! them whenever it can. A request for a tab without a live surface is
//! dropped. The active tab of the focused window is followed, including
//! when its surface comes back after a freeze.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tabhost_common::{Event, EventBus, OrchestratorError, Subscription, TabId, Topic, WindowId};
use tabhost_surface::ViewLifecycleManager;
use tokio::runtime::Handle;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct FocusRecord {
    tab: Option<TabId>,
    window: Option<WindowId>,
    /// Active tab of the focused window.
    follow: Option<TabId>,
}

struct FocusInner {
    vlm: ViewLifecycleManager,
    bus: EventBus,
    record: Mutex<FocusRecord>,
}

/// Tracks the focused window and tab. Cheap to clone.
#[derive(Clone)]
pub struct FocusCoordinator {
    inner: Arc<FocusInner>,
    subscriptions: Arc<Mutex<Vec<Subscription>>>,
}

impl FocusCoordinator {
    pub fn new(vlm: ViewLifecycleManager, bus: EventBus) -> Self {
        let inner = Arc::new(FocusInner {
            vlm,
            bus: bus.clone(),
            record: Mutex::new(FocusRecord::default()),
        });

        let subscriptions: Vec<Subscription> = [
            Topic::ActiveTabChanged,
            Topic::TabClosed,
            Topic::SurfaceCreated,
            Topic::WindowClosed,
        ]
        .into_iter()
        .map(|topic| {
            let weak = Arc::downgrade(&inner);
            bus.subscribe(topic, move |event| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_event(event);
                }
            })
        })
        .collect();

        Self {
            inner,
            subscriptions: Arc::new(Mutex::new(subscriptions)),
        }
    }

    /// Route focus to the tab's live surface. Never blocks; a tab without
    /// a live surface is logged and ignored.
    pub fn request_focus(&self, tab_id: &TabId) {
        self.inner.request(tab_id.clone());
    }

    /// Record that `window_id` became the active application window.
    pub fn set_focused_window(&self, window_id: WindowId) {
        let mut record = lock(&self.inner.record);
        if record.window != Some(window_id) {
            record.follow = None;
        }
        record.window = Some(window_id);
    }

    /// Activate `window_id` and focus its active tab, now or once the tab's
    /// surface exists.
    pub fn focus_window(&self, window_id: WindowId, active_tab: Option<&TabId>) {
        self.set_focused_window(window_id);
        lock(&self.inner.record).follow = active_tab.cloned();
        if let Some(tab_id) = active_tab {
            self.request_focus(tab_id);
        }
    }

    pub fn focused_tab(&self) -> Option<TabId> {
        lock(&self.inner.record).tab.clone()
    }

    pub fn focused_window(&self) -> Option<WindowId> {
        lock(&self.inner.record).window
    }

    pub fn shutdown(&self) {
        for sub in lock(&self.subscriptions).drain(..) {
            sub.unsubscribe();
        }
    }
}

impl FocusInner {
    fn request(self: &Arc<Self>, tab_id: TabId) {
        let Ok(handle) = Handle::try_current() else {
            warn!(tab = %tab_id, "focus requested outside a runtime");
            return;
        };
        let inner = Arc::clone(self);
        handle.spawn(async move { inner.apply(tab_id).await });
    }

    async fn apply(&self, tab_id: TabId) {
        match self.vlm.focus(&tab_id).await {
            Ok(()) => {
                {
                    let mut record = lock(&self.record);
                    record.tab = Some(tab_id.clone());
                    if let Some(w) = self.vlm.window_of(&tab_id) {
                        if record.window != Some(w) {
                            record.follow = None;
                        }
                        record.window = Some(w);
                    }
                }
                debug!(tab = %tab_id, "focus applied");
                self.bus.publish(Event::FocusChanged { tab_id });
            }
            Err(OrchestratorError::NoSuchSurface(_)) => {
                debug!(tab = %tab_id, "no live surface, focus request ignored");
            }
            Err(e) => warn!(tab = %tab_id, error = %e, "focus failed"),
        }
    }

    fn on_event(self: &Arc<Self>, event: &Event) {
        match event {
            Event::ActiveTabChanged {
                window_id,
                tab_id: Some(tab_id),
            } => {
                let follows = {
                    let mut record = lock(&self.record);
                    let follows = record.window == Some(*window_id);
                    if follows {
                        record.follow = Some(tab_id.clone());
                    }
                    follows
                };
                if follows {
                    self.request(tab_id.clone());
                }
            }
            Event::TabClosed { tab_id, .. } => {
                let mut record = lock(&self.record);
                if record.tab.as_ref() == Some(tab_id) {
                    record.tab = None;
                }
                if record.follow.as_ref() == Some(tab_id) {
                    record.follow = None;
                }
            }
            Event::SurfaceCreated { tab_id, window_id } => {
                let follows = {
                    let record = lock(&self.record);
                    record.window == Some(*window_id) && record.follow.as_ref() == Some(tab_id)
                };
                if follows {
                    self.request(tab_id.clone());
                }
            }
            Event::WindowClosed { window_id } => {
                let mut record = lock(&self.record);
                if record.window == Some(*window_id) {
                    record.window = None;
                    record.follow = None;
                }
            }
            _ => {}
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
