//! Canonical per-window tab state.
//!
//! The `StateSynchronizer` owns every [`WindowState`](types::WindowState),
//! folds surface events from the bus into tab records, applies the tab
//! commands of the UI layer, and pushes a full [`WindowSnapshot`] to
//! listeners and the UI channel on every change.
//!
//! Locking: each window has a command lock (async, held for a whole
//! command) and a state lock (sync, never held across an await). The
//! directory lock may be taken while a state lock is held, never the
//! other way round.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tabhost_common::events::Handler;
use tabhost_common::{Event, EventBus, OrchestratorError, Result, Subscription, TabId, Topic, WindowId};
use tabhost_surface::ViewLifecycleManager;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::OwnedMutexGuard;
use tracing::error;

use crate::protocol::UiEvent;

mod commands;
mod fold;
mod moves;
mod strip;
mod types;

#[cfg(test)]
mod tests;

pub use strip::TabStrip;
pub(crate) use types::WindowState;
pub use types::{Applied, TabCommand, TabRecord, WindowSnapshot};

/// Push listener for one window's snapshots.
pub type Listener = Arc<dyn Fn(&WindowSnapshot) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub(crate) struct WindowSlot {
    pub(crate) window_id: WindowId,
    state: Mutex<WindowState>,
    commands: Arc<tokio::sync::Mutex<()>>,
}

impl WindowSlot {
    fn new(window_id: WindowId) -> Self {
        Self {
            window_id,
            state: Mutex::new(WindowState::new(window_id)),
            commands: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive right to issue commands against one window.
pub(crate) struct WindowLease {
    pub(crate) slot: Arc<WindowSlot>,
    _guard: OwnedMutexGuard<()>,
}

#[derive(Default)]
struct Directory {
    windows: HashMap<WindowId, Arc<WindowSlot>>,
    tabs: HashMap<TabId, WindowId>,
}

pub(crate) struct SyncInner {
    vlm: ViewLifecycleManager,
    bus: EventBus,
    directory: Mutex<Directory>,
    listeners: Mutex<HashMap<WindowId, Vec<(ListenerId, Listener)>>>,
    ui: Mutex<Vec<UnboundedSender<UiEvent>>>,
    next_listener: AtomicU64,
    subscriptions: Mutex<Vec<Subscription>>,
}

/// Owner of the UI-facing tab model. Cheap to clone.
#[derive(Clone)]
pub struct StateSynchronizer {
    inner: Arc<SyncInner>,
}

/// Bus topics folded into tab records.
const FOLDED_TOPICS: &[Topic] = &[Topic::TabFrozen, Topic::TabThawed];

impl StateSynchronizer {
    pub fn new(vlm: ViewLifecycleManager, bus: EventBus) -> Self {
        let inner = Arc::new(SyncInner {
            vlm,
            bus: bus.clone(),
            directory: Mutex::new(Directory::default()),
            listeners: Mutex::new(HashMap::new()),
            ui: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            subscriptions: Mutex::new(Vec::new()),
        });

        let weak = Arc::downgrade(&inner);
        let handler: Handler = Arc::new(move |event: &Event| {
            if let Some(inner) = weak.upgrade() {
                inner.fold(event);
            }
        });
        let subs = Topic::SURFACE
            .iter()
            .chain(FOLDED_TOPICS)
            .map(|topic| bus.subscribe_handler(*topic, Arc::clone(&handler)))
            .collect();
        *lock(&inner.subscriptions) = subs;

        Self { inner }
    }

    /// Current state of a window. Never blocks on I/O.
    pub fn get_state(&self, window_id: WindowId) -> Option<WindowSnapshot> {
        self.inner
            .slot(window_id)
            .map(|slot| slot.lock().snapshot())
    }

    pub fn window_ids(&self) -> Vec<WindowId> {
        let mut ids: Vec<WindowId> = lock(&self.inner.directory).windows.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn window_of_tab(&self, tab_id: &TabId) -> Option<WindowId> {
        lock(&self.inner.directory).tabs.get(tab_id).copied()
    }

    pub fn tab(&self, tab_id: &TabId) -> Option<TabRecord> {
        let slot = self.inner.slot_of_tab(tab_id)?;
        let state = slot.lock();
        state.records.get(tab_id).cloned()
    }

    pub fn tab_count(&self) -> usize {
        lock(&self.inner.directory).tabs.len()
    }

    /// Register `callback` for every snapshot of `window_id`.
    pub fn subscribe<F>(&self, window_id: WindowId, callback: F) -> ListenerId
    where
        F: Fn(&WindowSnapshot) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        lock(&self.inner.listeners)
            .entry(window_id)
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn unsubscribe(&self, window_id: WindowId, id: ListenerId) -> bool {
        let mut listeners = lock(&self.inner.listeners);
        let Some(list) = listeners.get_mut(&window_id) else {
            return false;
        };
        let before = list.len();
        list.retain(|(l, _)| *l != id);
        let removed = list.len() != before;
        if list.is_empty() {
            listeners.remove(&window_id);
        }
        removed
    }

    /// Forward UI events to `sender` from now on.
    pub fn attach_ui(&self, sender: UnboundedSender<UiEvent>) {
        lock(&self.inner.ui).push(sender);
    }

    /// Stop folding bus events.
    pub fn shutdown(&self) {
        for sub in lock(&self.inner.subscriptions).drain(..) {
            sub.unsubscribe();
        }
    }

    pub(crate) fn vlm(&self) -> &ViewLifecycleManager {
        &self.inner.vlm
    }

    pub(crate) fn emit_ui(&self, event: UiEvent) {
        self.inner.emit_ui(event);
    }

    /// Wait for the command lock of an existing window.
    pub(crate) async fn lease(&self, window_id: WindowId) -> Option<WindowLease> {
        let slot = self.inner.slot(window_id)?;
        let guard = Arc::clone(&slot.commands).lock_owned().await;
        self.inner.is_current(&slot).then(|| WindowLease {
            slot,
            _guard: guard,
        })
    }

    /// Like [`Self::lease`] but creates the window set if needed.
    pub(crate) async fn lease_or_create(&self, window_id: WindowId) -> WindowLease {
        loop {
            let slot = self.inner.ensure_slot(window_id);
            let guard = Arc::clone(&slot.commands).lock_owned().await;
            if self.inner.is_current(&slot) {
                return WindowLease {
                    slot,
                    _guard: guard,
                };
            }
        }
    }

    /// Lease both windows, in ascending id order.
    pub(crate) async fn lease_pair(
        &self,
        source: WindowId,
        target: WindowId,
    ) -> Option<(WindowLease, WindowLease)> {
        if source < target {
            let s = self.lease(source).await?;
            let t = self.lease_or_create(target).await;
            Some((s, t))
        } else {
            let t = self.lease_or_create(target).await;
            match self.lease(source).await {
                Some(s) => Some((s, t)),
                None => {
                    self.discard_if_empty(&t);
                    None
                }
            }
        }
    }

    /// Lease the window that currently owns `tab_id`, following the tab
    /// if it moves while we wait.
    pub(crate) async fn lease_tab(&self, tab_id: &TabId) -> Result<WindowLease> {
        for _ in 0..8 {
            let window_id = self
                .window_of_tab(tab_id)
                .ok_or_else(|| OrchestratorError::tab_not_found(tab_id))?;
            if let Some(lease) = self.lease(window_id).await {
                if self.window_of_tab(tab_id) == Some(window_id) {
                    return Ok(lease);
                }
            }
        }
        Err(OrchestratorError::tab_not_found(tab_id))
    }

    /// Drop a window set that is empty and was never shown to anyone.
    pub(crate) fn discard_if_empty(&self, lease: &WindowLease) {
        if !lease.slot.lock().strip.is_empty() {
            return;
        }
        let mut dir = lock(&self.inner.directory);
        if dir
            .windows
            .get(&lease.slot.window_id)
            .is_some_and(|s| Arc::ptr_eq(s, &lease.slot))
        {
            dir.windows.remove(&lease.slot.window_id);
        }
    }
}

impl SyncInner {
    fn slot(&self, window_id: WindowId) -> Option<Arc<WindowSlot>> {
        lock(&self.directory).windows.get(&window_id).cloned()
    }

    fn slot_of_tab(&self, tab_id: &TabId) -> Option<Arc<WindowSlot>> {
        let dir = lock(&self.directory);
        let window_id = dir.tabs.get(tab_id)?;
        dir.windows.get(window_id).cloned()
    }

    fn ensure_slot(&self, window_id: WindowId) -> Arc<WindowSlot> {
        Arc::clone(
            lock(&self.directory)
                .windows
                .entry(window_id)
                .or_insert_with(|| Arc::new(WindowSlot::new(window_id))),
        )
    }

    fn is_current(&self, slot: &Arc<WindowSlot>) -> bool {
        lock(&self.directory)
            .windows
            .get(&slot.window_id)
            .is_some_and(|s| Arc::ptr_eq(s, slot))
    }

    fn index_tab(&self, tab_id: &TabId, window_id: WindowId) {
        lock(&self.directory).tabs.insert(tab_id.clone(), window_id);
    }

    fn unindex_tab(&self, tab_id: &TabId) {
        lock(&self.directory).tabs.remove(tab_id);
    }

    fn forget_window(&self, window_id: WindowId) {
        let mut dir = lock(&self.directory);
        dir.windows.remove(&window_id);
        dir.tabs.retain(|_, w| *w != window_id);
    }

    /// Deliver a snapshot to the window's listeners and the UI channel.
    fn push(&self, snapshot: WindowSnapshot) {
        let listeners: Vec<Listener> = lock(&self.listeners)
            .get(&snapshot.window_id)
            .map(|list| list.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();
        for listener in listeners {
            if panic::catch_unwind(AssertUnwindSafe(|| listener(&snapshot))).is_err() {
                error!(window = %snapshot.window_id, "state listener panicked");
            }
        }
        self.emit_ui(UiEvent::WindowStateChanged {
            window_id: snapshot.window_id,
            snapshot,
        });
    }

    fn emit_ui(&self, event: UiEvent) {
        lock(&self.ui).retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn window_closed(&self, window_id: WindowId) {
        self.emit_ui(UiEvent::WindowClosed { window_id });
        self.bus.publish(Event::WindowClosed { window_id });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
