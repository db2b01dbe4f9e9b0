use std::time::Duration;

use tabhost_common::{Event, OrchestratorError, Rect, Result, SurfaceState, TabId, WindowId};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::host::{HostError, HostSurfaceId, SurfaceRequest};

use super::handle::SurfaceHandle;
use super::types::PendingDestroy;
use super::{map_host_error, state_changed, ViewLifecycleManager};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// What a create call decided under the registry lock.
enum CreatePlan {
    Done,
    Start {
        generation: u64,
        request: SurfaceRequest,
        thawing: bool,
        /// A scheduled destroy was cancelled to make way for this create.
        revived: bool,
    },
}

impl ViewLifecycleManager {
    /// Allocate a surface for `tab_id` in `window_id` and start loading `url`.
    ///
    /// Idempotent: a tab that is already live or being created is left
    /// alone. A pending debounced destroy is cancelled once the create is
    /// accepted; a create that fails validation leaves it scheduled. Tabs
    /// released with [`Self::close_surface`] are refused. A frozen tab goes
    /// through `Unfreezing` and keeps its slot if creation fails.
    pub async fn create_surface(&self, window_id: WindowId, tab_id: &TabId, url: &str) -> Result<()> {
        let inner = &self.inner;
        let mut events = Vec::new();

        let plan = {
            let mut reg = inner.lock();
            let over_budget = inner.settings.max_live_surfaces > 0
                && reg.allocated() >= inner.settings.max_live_surfaces;
            let slot = reg.entry(tab_id, window_id, url);
            if slot.closing {
                debug!(tab = %tab_id, "create refused, tab is closing");
                return Err(OrchestratorError::tab_not_found(tab_id));
            }

            let next = match slot.state {
                SurfaceState::Live
                | SurfaceState::Creating
                | SurfaceState::Freezing
                | SurfaceState::Unfreezing => None,
                SurfaceState::Frozen => Some(SurfaceState::Unfreezing),
                SurfaceState::Uninitialized
                | SurfaceState::Destroying
                | SurfaceState::Destroyed => Some(SurfaceState::Creating),
            };

            match next {
                None => {
                    if slot.cancel_destroy() {
                        debug!(tab = %tab_id, "pending destroy cancelled by create");
                    }
                    CreatePlan::Done
                }
                Some(next) => {
                    let fresh = slot.state == SurfaceState::Uninitialized;
                    if !inner.host.has_window(window_id) {
                        if fresh {
                            reg.remove(tab_id);
                        }
                        return Err(OrchestratorError::InvalidWindow(window_id));
                    }
                    if over_budget {
                        if fresh {
                            reg.remove(tab_id);
                        }
                        drop(reg);
                        let reason = format!(
                            "live surface limit {} reached",
                            inner.settings.max_live_surfaces
                        );
                        warn!(tab = %tab_id, %reason, "surface allocation refused");
                        inner.bus.publish(Event::SurfaceCreateFailed {
                            tab_id: tab_id.clone(),
                            window_id,
                            reason: reason.clone(),
                        });
                        return Err(OrchestratorError::ResourceExhausted(reason));
                    }

                    let revived = slot.cancel_destroy();
                    if revived {
                        debug!(tab = %tab_id, "pending destroy cancelled by create");
                    }
                    let id = self.next_surface_id();
                    slot.set_state(next);
                    slot.window_id = window_id;
                    slot.url = url.to_string();
                    slot.generation += 1;
                    let plan = CreatePlan::Start {
                        generation: slot.generation,
                        request: SurfaceRequest {
                            id,
                            window_id,
                            url: url.to_string(),
                            bounds: slot.bounds,
                            visible: slot.visible,
                        },
                        thawing: next == SurfaceState::Unfreezing,
                        revived,
                    };
                    reg.bind(id, tab_id);
                    events.push(state_changed(tab_id, next));
                    plan
                }
            }
        };

        let CreatePlan::Start {
            generation,
            request,
            thawing,
            revived,
        } = plan
        else {
            debug!(tab = %tab_id, "create ignored, surface already present");
            return Ok(());
        };
        inner.publish_all(std::mem::take(&mut events));

        let surface = request.id;
        debug!(tab = %tab_id, %surface, %window_id, url, "creating surface");
        let sink = self.sink_for(surface);
        let result = inner.host.create_surface(request, sink).await;

        let mut release = None;
        let outcome = {
            let mut reg = inner.lock();
            let superseded = reg
                .get(tab_id)
                .map_or(true, |slot| slot.generation != generation);

            if superseded {
                reg.unbind(surface);
                if result.is_ok() {
                    release = Some(surface);
                }
                // A destroy landed while we were creating: we finish it.
                let finalize = reg.get(tab_id).is_some_and(|slot| {
                    slot.state == SurfaceState::Destroying && slot.generation == generation + 1
                });
                if finalize {
                    reg.remove(tab_id);
                    events.push(state_changed(tab_id, SurfaceState::Destroyed));
                    events.push(Event::SurfaceDestroyed {
                        tab_id: tab_id.clone(),
                    });
                }
                Ok(())
            } else {
                match result {
                    Ok(()) => {
                        if let Some(slot) = reg.get_mut(tab_id) {
                            slot.handle = Some(SurfaceHandle::new(surface, window_id));
                            slot.set_state(SurfaceState::Live);
                        }
                        reg.stack(window_id, tab_id);
                        events.push(state_changed(tab_id, SurfaceState::Live));
                        events.push(Event::SurfaceCreated {
                            tab_id: tab_id.clone(),
                            window_id,
                        });
                        Ok(())
                    }
                    Err(err) => {
                        reg.unbind(surface);
                        let next = if thawing {
                            SurfaceState::Frozen
                        } else {
                            SurfaceState::Destroyed
                        };
                        if thawing {
                            if let Some(slot) = reg.get_mut(tab_id) {
                                slot.set_state(next);
                            }
                        } else {
                            reg.remove(tab_id);
                        }
                        events.push(state_changed(tab_id, next));
                        events.push(Event::SurfaceCreateFailed {
                            tab_id: tab_id.clone(),
                            window_id,
                            reason: err.to_string(),
                        });
                        Err(err)
                    }
                }
            }
        };

        if let Some(stale) = release {
            debug!(tab = %tab_id, surface = %stale, "releasing superseded surface");
            self.release(tab_id, stale).await;
        }
        inner.publish_all(events);
        inner.settled.notify_waiters();

        match outcome {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(tab = %tab_id, error = %err, "surface creation failed");
                if thawing && revived {
                    // The tab went back to Frozen; the destroy it displaced still applies.
                    self.destroy_surface(tab_id).await?;
                }
                Err(map_host_error(err, tab_id))
            }
        }
    }

    /// Schedule destruction of the tab's surface after the debounce delay.
    ///
    /// Idempotent: unknown tabs, tabs already going away and tabs with a
    /// destroy already scheduled are ignored. A create inside the delay
    /// cancels the destroy.
    pub async fn destroy_surface(&self, tab_id: &TabId) -> Result<()> {
        self.schedule_destroy(tab_id, false);
        Ok(())
    }

    /// Like [`Self::destroy_surface`], but final: the tab was closed, so no
    /// later create may bring its surface back.
    pub async fn close_surface(&self, tab_id: &TabId) -> Result<()> {
        self.schedule_destroy(tab_id, true);
        Ok(())
    }

    fn schedule_destroy(&self, tab_id: &TabId, closing: bool) {
        let mut reg = self.inner.lock();
        let Some(slot) = reg.get_mut(tab_id) else {
            debug!(tab = %tab_id, "destroy of unknown tab ignored");
            return;
        };
        slot.closing |= closing;
        if slot.pending_destroy.is_some()
            || matches!(slot.state, SurfaceState::Destroying | SurfaceState::Destroyed)
        {
            return;
        }

        let token = self.next_token();
        let delay = self.inner.settings.destroy_debounce;
        let manager = self.clone();
        let tab = tab_id.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            manager.finish_destroy(&tab, token).await;
        });
        slot.pending_destroy = Some(PendingDestroy {
            token,
            abort: task.abort_handle(),
        });
        let delay_ms = delay.as_millis() as u64;
        debug!(tab = %tab_id, delay_ms, closing, "destroy scheduled");
    }

    async fn finish_destroy(&self, tab_id: &TabId, token: u64) {
        let inner = &self.inner;
        let mut events = Vec::new();

        let release = {
            let mut reg = inner.lock();
            let Some(slot) = reg.get_mut(tab_id) else {
                return;
            };
            match &slot.pending_destroy {
                Some(pending) if pending.token == token => {}
                _ => return,
            }
            slot.pending_destroy = None;

            if matches!(slot.state, SurfaceState::Creating | SurfaceState::Unfreezing) {
                // The in-flight create sees the bumped generation and finishes the job.
                slot.set_state(SurfaceState::Destroying);
                slot.generation += 1;
                events.push(state_changed(tab_id, SurfaceState::Destroying));
                None
            } else {
                slot.set_state(SurfaceState::Destroying);
                let slot = reg.remove(tab_id);
                events.push(state_changed(tab_id, SurfaceState::Destroying));
                events.push(state_changed(tab_id, SurfaceState::Destroyed));
                events.push(Event::SurfaceDestroyed {
                    tab_id: tab_id.clone(),
                });
                slot.and_then(|s| s.handle)
            }
        };

        if let Some(handle) = release {
            self.release(tab_id, handle.surface()).await;
        }
        info!(tab = %tab_id, "surface destroyed");
        inner.publish_all(events);
    }

    /// Release the native surface now but keep the tab's slot (window,
    /// url, bounds, visibility) so it can be re-created later.
    pub async fn freeze_surface(&self, tab_id: &TabId) -> Result<()> {
        let (handle, events) = {
            let mut reg = self.inner.lock();
            let slot = reg
                .get_mut(tab_id)
                .ok_or_else(|| OrchestratorError::NoSuchSurface(tab_id.clone()))?;
            match slot.state {
                SurfaceState::Frozen => return Ok(()),
                SurfaceState::Live => {}
                _ => return Err(OrchestratorError::NoSuchSurface(tab_id.clone())),
            }
            let handle = slot.handle.take();
            slot.set_state(SurfaceState::Freezing);
            slot.set_state(SurfaceState::Frozen);
            if let Some(h) = &handle {
                reg.unbind(h.surface());
            }
            (
                handle,
                vec![
                    state_changed(tab_id, SurfaceState::Freezing),
                    state_changed(tab_id, SurfaceState::Frozen),
                ],
            )
        };

        self.inner.publish_all(events);
        if let Some(handle) = handle {
            self.release(tab_id, handle.surface()).await;
        }
        info!(tab = %tab_id, "surface frozen");
        Ok(())
    }

    /// Move the tab's surface into `target`.
    ///
    /// Falls back to re-creating the surface in the target window (same url)
    /// when the host cannot re-parent in place. A frozen tab only has its
    /// recorded window changed. A create still in flight is waited out first.
    pub async fn reparent(&self, tab_id: &TabId, target: WindowId) -> Result<()> {
        let inner = &self.inner;
        self.wait_settled(tab_id).await;
        let (handle, url, bounds, visible) = {
            let mut reg = inner.lock();
            let slot = reg
                .get_mut(tab_id)
                .ok_or_else(|| OrchestratorError::NoSuchSurface(tab_id.clone()))?;
            if !matches!(slot.state, SurfaceState::Live | SurfaceState::Frozen) {
                return Err(OrchestratorError::NoSuchSurface(tab_id.clone()));
            }
            if slot.window_id == target {
                return Ok(());
            }
            if !inner.host.has_window(target) {
                return Err(OrchestratorError::InvalidWindow(target));
            }
            match slot.handle {
                Some(handle) => (handle, slot.url.clone(), slot.bounds, slot.visible),
                None => {
                    let from = std::mem::replace(&mut slot.window_id, target);
                    reg.unstack(from, tab_id);
                    reg.stack(target, tab_id);
                    debug!(tab = %tab_id, %from, %target, "frozen tab re-homed");
                    return Ok(());
                }
            }
        };

        match inner.host.reparent(handle.surface(), target).await {
            Ok(()) => {
                self.commit_reparent(tab_id, handle, handle.moved_to(target));
                debug!(tab = %tab_id, from = %handle.window_id(), %target, "surface re-parented");
                Ok(())
            }
            Err(HostError::Unsupported) => {
                self.recreate_in(tab_id, handle, target, url, bounds, visible)
                    .await
            }
            Err(err) => Err(map_host_error(err, tab_id)),
        }
    }

    /// Wait until the tab is no longer `Creating` or `Unfreezing`, or give
    /// up after [`SETTLE_TIMEOUT`].
    async fn wait_settled(&self, tab_id: &TabId) {
        let deadline = Instant::now() + SETTLE_TIMEOUT;
        loop {
            let notified = self.inner.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let busy = self.inner.lock().get(tab_id).is_some_and(|slot| {
                matches!(slot.state, SurfaceState::Creating | SurfaceState::Unfreezing)
            });
            if !busy {
                return;
            }
            debug!(tab = %tab_id, "waiting for in-flight create");
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                warn!(tab = %tab_id, "create still in flight, giving up wait");
                return;
            }
        }
    }

    async fn recreate_in(
        &self,
        tab_id: &TabId,
        old: SurfaceHandle,
        target: WindowId,
        url: String,
        bounds: Option<Rect>,
        visible: bool,
    ) -> Result<()> {
        let inner = &self.inner;
        let id = self.next_surface_id();
        inner.lock().bind(id, tab_id);

        let request = SurfaceRequest {
            id,
            window_id: target,
            url,
            bounds,
            visible,
        };
        if let Err(err) = inner.host.create_surface(request, self.sink_for(id)).await {
            inner.lock().unbind(id);
            return Err(map_host_error(err, tab_id));
        }

        if !self.commit_reparent(tab_id, old, SurfaceHandle::new(id, target)) {
            inner.lock().unbind(id);
            self.release(tab_id, id).await;
            return Err(OrchestratorError::NoSuchSurface(tab_id.clone()));
        }
        self.release(tab_id, old.surface()).await;
        inner.bus.publish(Event::SurfaceCreated {
            tab_id: tab_id.clone(),
            window_id: target,
        });
        info!(tab = %tab_id, from = %old.window_id(), %target, "surface re-created in target window");
        Ok(())
    }

    /// Swap `old` for `new` if the slot still holds `old`.
    fn commit_reparent(&self, tab_id: &TabId, old: SurfaceHandle, new: SurfaceHandle) -> bool {
        let mut reg = self.inner.lock();
        let Some(slot) = reg.get_mut(tab_id) else {
            return false;
        };
        if slot.handle != Some(old) {
            return false;
        }
        slot.handle = Some(new);
        slot.window_id = new.window_id();
        if old.surface() != new.surface() {
            reg.unbind(old.surface());
        }
        reg.unstack(old.window_id(), tab_id);
        reg.stack(new.window_id(), tab_id);
        true
    }

    /// Tear down every surface immediately. Used during shutdown.
    pub async fn destroy_all(&self) {
        let drained = self.inner.lock().drain();
        let count = drained.len();
        for (tab_id, slot) in drained {
            if let Some(pending) = slot.pending_destroy {
                pending.abort.abort();
            }
            if let Some(handle) = slot.handle {
                self.release(&tab_id, handle.surface()).await;
            }
            self.inner.bus.publish(Event::SurfaceDestroyed { tab_id });
        }
        info!(count, "all surfaces destroyed");
    }

    /// Release a host surface, swallowing teardown errors.
    async fn release(&self, tab_id: &TabId, surface: HostSurfaceId) {
        if let Err(e) = self.inner.host.destroy_surface(surface).await {
            warn!(tab = %tab_id, %surface, error = %e, "surface release failed");
        }
    }
}
