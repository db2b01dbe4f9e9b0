//! Typed in-process publish/subscribe.
//!
//! Every [`Event`] variant belongs to exactly one [`Topic`]. Delivery is
//! synchronous, on the publisher's thread, in registration order. A handler
//! that panics is logged and skipped; the remaining handlers still run and
//! the publisher never sees the panic.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::id::{TabId, WindowId};
use crate::types::{SnapshotRef, SurfaceState};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    SurfaceCreated {
        tab_id: TabId,
        window_id: WindowId,
    },
    SurfaceDestroyed {
        tab_id: TabId,
    },
    SurfaceCreateFailed {
        tab_id: TabId,
        window_id: WindowId,
        reason: String,
    },
    SurfaceStateChanged {
        tab_id: TabId,
        state: SurfaceState,
    },
    LoadStarted {
        tab_id: TabId,
        url: String,
    },
    LoadFinished {
        tab_id: TabId,
        url: String,
        title: String,
    },
    UrlChanged {
        tab_id: TabId,
        url: String,
    },
    TitleChanged {
        tab_id: TabId,
        title: String,
    },
    FaviconChanged {
        tab_id: TabId,
        favicon_url: Option<String>,
    },
    NavigationFlagsChanged {
        tab_id: TabId,
        can_go_back: bool,
        can_go_forward: bool,
    },
    VisibilityChanged {
        tab_id: TabId,
        visible: bool,
    },
    /// A frozen tab was activated and needs its live surface back.
    SurfaceNeeded {
        tab_id: TabId,
        window_id: WindowId,
        url: String,
    },
    TabFrozen {
        tab_id: TabId,
        snapshot: SnapshotRef,
    },
    TabThawed {
        tab_id: TabId,
    },
    ActiveTabChanged {
        window_id: WindowId,
        tab_id: Option<TabId>,
    },
    TabClosed {
        tab_id: TabId,
        window_id: WindowId,
    },
    TabTransferred {
        tab_id: TabId,
        from: WindowId,
        to: WindowId,
    },
    WindowMarkedForClosure {
        window_id: WindowId,
    },
    WindowClosed {
        window_id: WindowId,
    },
    FocusChanged {
        tab_id: TabId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    SurfaceCreated,
    SurfaceDestroyed,
    SurfaceCreateFailed,
    SurfaceStateChanged,
    LoadStarted,
    LoadFinished,
    UrlChanged,
    TitleChanged,
    FaviconChanged,
    NavigationFlagsChanged,
    VisibilityChanged,
    SurfaceNeeded,
    TabFrozen,
    TabThawed,
    ActiveTabChanged,
    TabClosed,
    TabTransferred,
    WindowMarkedForClosure,
    WindowClosed,
    FocusChanged,
}

impl Topic {
    /// Topics announced by the view lifecycle manager.
    pub const SURFACE: &'static [Topic] = &[
        Topic::SurfaceCreated,
        Topic::SurfaceDestroyed,
        Topic::SurfaceCreateFailed,
        Topic::SurfaceStateChanged,
        Topic::LoadStarted,
        Topic::LoadFinished,
        Topic::UrlChanged,
        Topic::TitleChanged,
        Topic::FaviconChanged,
        Topic::NavigationFlagsChanged,
        Topic::VisibilityChanged,
    ];
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::SurfaceCreated { .. } => Topic::SurfaceCreated,
            Event::SurfaceDestroyed { .. } => Topic::SurfaceDestroyed,
            Event::SurfaceCreateFailed { .. } => Topic::SurfaceCreateFailed,
            Event::SurfaceStateChanged { .. } => Topic::SurfaceStateChanged,
            Event::LoadStarted { .. } => Topic::LoadStarted,
            Event::LoadFinished { .. } => Topic::LoadFinished,
            Event::UrlChanged { .. } => Topic::UrlChanged,
            Event::TitleChanged { .. } => Topic::TitleChanged,
            Event::FaviconChanged { .. } => Topic::FaviconChanged,
            Event::NavigationFlagsChanged { .. } => Topic::NavigationFlagsChanged,
            Event::VisibilityChanged { .. } => Topic::VisibilityChanged,
            Event::SurfaceNeeded { .. } => Topic::SurfaceNeeded,
            Event::TabFrozen { .. } => Topic::TabFrozen,
            Event::TabThawed { .. } => Topic::TabThawed,
            Event::ActiveTabChanged { .. } => Topic::ActiveTabChanged,
            Event::TabClosed { .. } => Topic::TabClosed,
            Event::TabTransferred { .. } => Topic::TabTransferred,
            Event::WindowMarkedForClosure { .. } => Topic::WindowMarkedForClosure,
            Event::WindowClosed { .. } => Topic::WindowClosed,
            Event::FocusChanged { .. } => Topic::FocusChanged,
        }
    }

    /// The tab this event is about, if any.
    pub fn tab_id(&self) -> Option<&TabId> {
        match self {
            Event::SurfaceCreated { tab_id, .. }
            | Event::SurfaceDestroyed { tab_id }
            | Event::SurfaceCreateFailed { tab_id, .. }
            | Event::SurfaceStateChanged { tab_id, .. }
            | Event::LoadStarted { tab_id, .. }
            | Event::LoadFinished { tab_id, .. }
            | Event::UrlChanged { tab_id, .. }
            | Event::TitleChanged { tab_id, .. }
            | Event::FaviconChanged { tab_id, .. }
            | Event::NavigationFlagsChanged { tab_id, .. }
            | Event::VisibilityChanged { tab_id, .. }
            | Event::SurfaceNeeded { tab_id, .. }
            | Event::TabFrozen { tab_id, .. }
            | Event::TabThawed { tab_id }
            | Event::TabClosed { tab_id, .. }
            | Event::TabTransferred { tab_id, .. }
            | Event::FocusChanged { tab_id } => Some(tab_id),
            Event::ActiveTabChanged { tab_id, .. } => tab_id.as_ref(),
            Event::WindowMarkedForClosure { .. } | Event::WindowClosed { .. } => None,
        }
    }
}

pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Registration {
    id: SubscriptionId,
    topic: Topic,
    handler: Handler,
}

#[derive(Default)]
struct BusInner {
    registrations: Mutex<Vec<Registration>>,
    next_id: AtomicU64,
}

impl BusInner {
    fn remove(&self, topic: Topic, id: SubscriptionId) -> bool {
        let mut regs = self
            .registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = regs.len();
        regs.retain(|r| !(r.topic == topic && r.id == id));
        regs.len() != before
    }
}

/// Cheap to clone; all clones share the same subscriber table.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

/// Returned by [`EventBus::subscribe`]. Dropping it leaves the handler
/// registered; call [`Subscription::unsubscribe`] to remove it.
pub struct Subscription {
    id: SubscriptionId,
    topic: Topic,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Remove the handler. Returns false if it was already gone.
    pub fn unsubscribe(&self) -> bool {
        match self.bus.upgrade() {
            Some(inner) => inner.remove(self.topic, self.id),
            None => false,
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribe_handler(topic, Arc::new(handler))
    }

    /// Register an already shared handler, e.g. one closure for many topics.
    pub fn subscribe_handler(&self, topic: Topic, handler: Handler) -> Subscription {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Registration { id, topic, handler });
        Subscription {
            id,
            topic,
            bus: Arc::downgrade(&self.inner),
        }
    }

    pub fn unsubscribe(&self, topic: Topic, id: SubscriptionId) -> bool {
        self.inner.remove(topic, id)
    }

    /// Remove every handler of `topic`, or of every topic when `None`.
    /// Returns how many handlers were removed.
    pub fn unsubscribe_all(&self, topic: Option<Topic>) -> usize {
        let mut regs = self
            .inner
            .registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = regs.len();
        match topic {
            Some(topic) => regs.retain(|r| r.topic != topic),
            None => regs.clear(),
        }
        before - regs.len()
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.inner
            .registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.topic == topic)
            .count()
    }

    /// Deliver `event` to the current subscribers of its topic.
    /// Returns how many handlers completed without panicking.
    pub fn publish(&self, event: Event) -> usize {
        let topic = event.topic();
        // Handlers run outside the lock so they can publish or (un)subscribe.
        let handlers: Vec<Handler> = self
            .inner
            .registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.topic == topic)
            .map(|r| Arc::clone(&r.handler))
            .collect();

        let mut delivered = 0;
        for handler in handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    let msg = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "non-string panic payload".to_string());
                    error!(?topic, panic = %msg, "event handler panicked");
                }
            }
        }
        delivered
    }
}
