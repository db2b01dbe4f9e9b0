//! Snapshot/freeze service.
//!
//! Bounds resource usage by swapping hidden tabs for a PNG snapshot and
//! releasing their native surface, then restoring a live surface when the
//! tab is needed again. The UI switches back to the live surface only once
//! the replacement has finished loading.
//!
//! Bus handlers only enqueue; a single worker task processes the queue in
//! order, so freeze and thaw of the same tab never interleave.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tabhost_common::{
    Color, Event, EventBus, OrchestratorError, Result, SnapshotRef, Subscription, TabId, Topic,
    WindowId,
};
use tabhost_config::schema::FreezeConfig;
use tabhost_surface::{png, ViewLifecycleManager};
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

mod store;

pub use store::{SnapshotImage, SnapshotStore};

const DEFAULT_PLACEHOLDER: Color = Color {
    r: 0x1e,
    g: 0x1e,
    b: 0x2e,
    a: 0xff,
};

#[derive(Debug, Clone)]
pub struct FreezeSettings {
    pub enabled: bool,
    /// Time a tab must stay hidden before it is frozen.
    pub hidden_grace: Duration,
    pub capture_timeout: Duration,
    pub placeholder_color: Color,
    pub placeholder_size: (u32, u32),
}

impl Default for FreezeSettings {
    fn default() -> Self {
        Self::from(&FreezeConfig::default())
    }
}

impl From<&FreezeConfig> for FreezeSettings {
    fn from(config: &FreezeConfig) -> Self {
        Self {
            enabled: config.enabled,
            hidden_grace: Duration::from_millis(config.hidden_grace_ms),
            capture_timeout: Duration::from_millis(config.capture_timeout_ms),
            placeholder_color: Color::from_hex(&config.placeholder_color)
                .unwrap_or(DEFAULT_PLACEHOLDER),
            placeholder_size: (config.placeholder_width, config.placeholder_height),
        }
    }
}

enum Signal {
    Hidden(TabId),
    Shown(TabId),
    Needed {
        tab_id: TabId,
        window_id: WindowId,
        url: String,
    },
    LoadFinished(TabId),
    CreateFailed(TabId),
    Closed(TabId),
    GraceElapsed {
        tab_id: TabId,
        token: u64,
    },
    FreezeNow(TabId, oneshot::Sender<Result<()>>),
    ThawNow(TabId, oneshot::Sender<Result<()>>),
}

struct Timer {
    token: u64,
    abort: AbortHandle,
}

struct FreezeInner {
    vlm: ViewLifecycleManager,
    bus: EventBus,
    settings: FreezeSettings,
    store: Mutex<SnapshotStore>,
    timers: Mutex<HashMap<TabId, Timer>>,
    thawing: Mutex<HashSet<TabId>>,
    /// Tabs closed on the bus whose `Closed` signal the worker has not
    /// reached yet. Queued work for them is skipped.
    closed: Mutex<HashSet<TabId>>,
    tx: mpsc::UnboundedSender<Signal>,
    next_token: AtomicU64,
}

/// Cheap to clone. Must be created inside a tokio runtime.
#[derive(Clone)]
pub struct FreezeService {
    inner: Arc<FreezeInner>,
    subscriptions: Arc<Mutex<Vec<Subscription>>>,
    worker: Arc<Mutex<Option<AbortHandle>>>,
}

impl FreezeService {
    pub fn new(vlm: ViewLifecycleManager, bus: EventBus, settings: FreezeSettings) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(FreezeInner {
            vlm,
            bus: bus.clone(),
            settings,
            store: Mutex::new(SnapshotStore::default()),
            timers: Mutex::new(HashMap::new()),
            thawing: Mutex::new(HashSet::new()),
            closed: Mutex::new(HashSet::new()),
            tx: tx.clone(),
            next_token: AtomicU64::new(1),
        });

        let subscriptions: Vec<Subscription> = [
            Topic::VisibilityChanged,
            Topic::SurfaceNeeded,
            Topic::LoadFinished,
            Topic::SurfaceCreateFailed,
            Topic::TabClosed,
        ]
        .into_iter()
        .map(|topic| {
            let tx = tx.clone();
            let inner = Arc::clone(&inner);
            bus.subscribe(topic, move |event| {
                if let Event::TabClosed { tab_id, .. } = event {
                    lock(&inner.closed).insert(tab_id.clone());
                }
                if let Some(signal) = signal_for(event) {
                    let _ = tx.send(signal);
                }
            })
        })
        .collect();

        let worker = tokio::spawn(run(Arc::clone(&inner), rx));
        Self {
            inner,
            subscriptions: Arc::new(Mutex::new(subscriptions)),
            worker: Arc::new(Mutex::new(Some(worker.abort_handle()))),
        }
    }

    pub fn settings(&self) -> &FreezeSettings {
        &self.inner.settings
    }

    /// Freeze a live tab now, skipping the grace period.
    pub async fn freeze_now(&self, tab_id: &TabId) -> Result<()> {
        self.request(|reply| Signal::FreezeNow(tab_id.clone(), reply))
            .await
    }

    /// Start restoring a frozen tab. The swap back to live happens when the
    /// new surface finishes loading.
    pub async fn thaw_now(&self, tab_id: &TabId) -> Result<()> {
        self.request(|reply| Signal::ThawNow(tab_id.clone(), reply))
            .await
    }

    async fn request(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<()>>) -> Signal,
    ) -> Result<()> {
        let stopped = || OrchestratorError::Host("freeze service stopped".into());
        let (reply, rx) = oneshot::channel();
        self.inner.tx.send(make(reply)).map_err(|_| stopped())?;
        rx.await.map_err(|_| stopped())?
    }

    pub fn is_frozen(&self, tab_id: &TabId) -> bool {
        self.inner.store().contains(tab_id)
    }

    /// A thaw has started and is waiting for the new surface to load.
    pub fn is_thawing(&self, tab_id: &TabId) -> bool {
        lock(&self.inner.thawing).contains(tab_id)
    }

    pub fn snapshot(&self, tab_id: &TabId) -> Option<SnapshotRef> {
        self.inner.store().get(tab_id).map(SnapshotImage::to_ref)
    }

    pub fn snapshot_png(&self, tab_id: &TabId) -> Option<Vec<u8>> {
        self.inner.store().get(tab_id).map(|i| i.png.clone())
    }

    pub fn frozen_count(&self) -> usize {
        self.inner.store().len()
    }

    /// Stop reacting to events and cancel every pending timer.
    pub fn shutdown(&self) {
        for sub in lock(&self.subscriptions).drain(..) {
            sub.unsubscribe();
        }
        if let Some(worker) = lock(&self.worker).take() {
            worker.abort();
        }
        for (_, timer) in lock(&self.inner.timers).drain() {
            timer.abort.abort();
        }
    }
}

fn signal_for(event: &Event) -> Option<Signal> {
    let signal = match event {
        Event::VisibilityChanged {
            tab_id,
            visible: false,
        } => Signal::Hidden(tab_id.clone()),
        Event::VisibilityChanged {
            tab_id,
            visible: true,
        } => Signal::Shown(tab_id.clone()),
        Event::SurfaceNeeded {
            tab_id,
            window_id,
            url,
        } => Signal::Needed {
            tab_id: tab_id.clone(),
            window_id: *window_id,
            url: url.clone(),
        },
        Event::LoadFinished { tab_id, .. } => Signal::LoadFinished(tab_id.clone()),
        Event::SurfaceCreateFailed { tab_id, .. } => Signal::CreateFailed(tab_id.clone()),
        Event::TabClosed { tab_id, .. } => Signal::Closed(tab_id.clone()),
        _ => return None,
    };
    Some(signal)
}

async fn run(inner: Arc<FreezeInner>, mut rx: mpsc::UnboundedReceiver<Signal>) {
    while let Some(signal) = rx.recv().await {
        inner.handle(signal).await;
    }
}

impl FreezeInner {
    fn store(&self) -> MutexGuard<'_, SnapshotStore> {
        lock(&self.store)
    }

    async fn handle(&self, signal: Signal) {
        match signal {
            Signal::Hidden(tab_id) => {
                if self.settings.enabled {
                    self.schedule(tab_id);
                }
            }
            Signal::Shown(tab_id) => {
                self.cancel(&tab_id);
                if self.store().contains(&tab_id) {
                    if let Err(e) = self.thaw(&tab_id, None).await {
                        warn!(tab = %tab_id, error = %e, "thaw on show failed");
                    }
                }
            }
            Signal::Needed {
                tab_id,
                window_id,
                url,
            } => {
                if let Err(e) = self.thaw(&tab_id, Some((window_id, url))).await {
                    warn!(tab = %tab_id, error = %e, "thaw on demand failed");
                }
            }
            Signal::LoadFinished(tab_id) => self.finish_thaw(&tab_id),
            Signal::CreateFailed(tab_id) => {
                if lock(&self.thawing).remove(&tab_id) {
                    debug!(tab = %tab_id, "thaw aborted, tab stays frozen");
                }
            }
            Signal::Closed(tab_id) => {
                self.cancel(&tab_id);
                lock(&self.thawing).remove(&tab_id);
                let bytes = {
                    let mut store = self.store();
                    store.remove(&tab_id);
                    store.total_bytes()
                };
                lock(&self.closed).remove(&tab_id);
                debug!(tab = %tab_id, store_bytes = bytes, "closed tab forgotten");
            }
            Signal::GraceElapsed { tab_id, token } => {
                {
                    let mut timers = lock(&self.timers);
                    match timers.get(&tab_id) {
                        Some(t) if t.token == token => {
                            timers.remove(&tab_id);
                        }
                        _ => return,
                    }
                }
                if self.vlm.is_visible(&tab_id) {
                    return;
                }
                if let Err(e) = self.freeze(&tab_id).await {
                    debug!(tab = %tab_id, error = %e, "grace freeze skipped");
                }
            }
            Signal::FreezeNow(tab_id, reply) => {
                self.cancel(&tab_id);
                let _ = reply.send(self.freeze(&tab_id).await);
            }
            Signal::ThawNow(tab_id, reply) => {
                let _ = reply.send(self.thaw(&tab_id, None).await);
            }
        }
    }

    fn schedule(&self, tab_id: TabId) {
        self.cancel(&tab_id);
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let delay = self.settings.hidden_grace;
        let tx = self.tx.clone();
        let tab = tab_id.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Signal::GraceElapsed { tab_id: tab, token });
        });
        lock(&self.timers).insert(
            tab_id,
            Timer {
                token,
                abort: task.abort_handle(),
            },
        );
    }

    fn cancel(&self, tab_id: &TabId) {
        if let Some(timer) = lock(&self.timers).remove(tab_id) {
            timer.abort.abort();
        }
    }

    async fn freeze(&self, tab_id: &TabId) -> Result<()> {
        if lock(&self.closed).contains(tab_id) {
            return Err(OrchestratorError::tab_not_found(tab_id));
        }
        if self.store().contains(tab_id) {
            return Ok(());
        }
        if !self.vlm.is_live(tab_id) {
            return Err(OrchestratorError::NoSuchSurface(tab_id.clone()));
        }

        let image = self.capture(tab_id).await?;
        let snapshot = image.to_ref();
        let placeholder = image.placeholder;
        let bytes = {
            let mut store = self.store();
            store.insert(tab_id.clone(), image);
            store.total_bytes()
        };

        // The UI swaps to the snapshot before the surface goes away.
        self.bus.publish(Event::TabFrozen {
            tab_id: tab_id.clone(),
            snapshot,
        });

        if let Err(e) = self.vlm.freeze_surface(tab_id).await {
            self.store().remove(tab_id);
            self.bus.publish(Event::TabThawed {
                tab_id: tab_id.clone(),
            });
            return Err(e);
        }
        info!(tab = %tab_id, placeholder, store_bytes = bytes, "tab frozen");
        Ok(())
    }

    /// Capture within the timeout, or fall back to a placeholder image.
    async fn capture(&self, tab_id: &TabId) -> Result<SnapshotImage> {
        match tokio::time::timeout(self.settings.capture_timeout, self.vlm.capture(tab_id)).await {
            Ok(Ok(png)) => return Ok(SnapshotImage::new(png, false)),
            Ok(Err(e)) => warn!(tab = %tab_id, error = %e, "capture failed, using placeholder"),
            Err(_) => {
                let timeout_ms = self.settings.capture_timeout.as_millis() as u64;
                warn!(tab = %tab_id, timeout_ms, "capture timed out, using placeholder");
            }
        }
        let (w, h) = self.settings.placeholder_size;
        png::solid_png(w, h, self.settings.placeholder_color.to_array())
            .map(|bytes| SnapshotImage::new(bytes, true))
            .map_err(|e| OrchestratorError::Host(format!("placeholder encode failed: {e}")))
    }

    async fn thaw(&self, tab_id: &TabId, hint: Option<(WindowId, String)>) -> Result<()> {
        if lock(&self.closed).contains(tab_id) {
            debug!(tab = %tab_id, "thaw skipped, tab was closed");
            return Err(OrchestratorError::tab_not_found(tab_id));
        }
        if !self.store().contains(tab_id) {
            return Err(OrchestratorError::NotFound(format!("snapshot for tab {tab_id}")));
        }
        if !lock(&self.thawing).insert(tab_id.clone()) {
            return Ok(());
        }

        let (window_id, url) = match hint {
            Some(hint) => hint,
            None => match (self.vlm.window_of(tab_id), self.vlm.last_url(tab_id)) {
                (Some(w), Some(url)) => (w, url),
                _ => {
                    lock(&self.thawing).remove(tab_id);
                    return Err(OrchestratorError::NoSuchSurface(tab_id.clone()));
                }
            },
        };

        debug!(tab = %tab_id, window = %window_id, %url, "thawing");
        if let Err(e) = self.vlm.create_surface(window_id, tab_id, &url).await {
            lock(&self.thawing).remove(tab_id);
            return Err(e);
        }
        Ok(())
    }

    /// The replacement surface has content: drop the snapshot and let the
    /// UI show the live surface again.
    fn finish_thaw(&self, tab_id: &TabId) {
        if !lock(&self.thawing).remove(tab_id) {
            return;
        }
        self.store().remove(tab_id);
        self.bus.publish(Event::TabThawed {
            tab_id: tab_id.clone(),
        });
        info!(tab = %tab_id, "tab thawed");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests;
