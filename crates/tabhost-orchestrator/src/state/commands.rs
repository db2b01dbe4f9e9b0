use tabhost_common::{DisplayMode, Event, OrchestratorError, Result, TabId, WindowId};
use tracing::{debug, info, warn};

use crate::protocol::UiEvent;

use super::types::{Applied, TabCommand, TabRecord};
use super::{StateSynchronizer, WindowLease};

impl StateSynchronizer {
    /// Single entry point for externally initiated tab mutations.
    ///
    /// Commands for the same window are serialized; the window's command
    /// lock is held until the surface side effects have been issued.
    pub async fn apply_command(&self, command: TabCommand) -> Result<Applied> {
        match command {
            TabCommand::CreateTab { window_id, url } => {
                self.create_tab(window_id, &url).await.map(Applied::Created)
            }
            TabCommand::CloseTab { tab_id } => self.close_tab(&tab_id).await.map(|_| Applied::Done),
            TabCommand::SwitchActiveTab { window_id, tab_id } => self
                .switch_active_tab(window_id, &tab_id)
                .await
                .map(|_| Applied::Done),
            TabCommand::ReorderTab { tab_id, index } => {
                self.reorder_tab(&tab_id, index).await.map(|_| Applied::Done)
            }
            TabCommand::CloseWindow { window_id } => {
                self.close_window(window_id).await.map(|_| Applied::Done)
            }
        }
    }

    async fn create_tab(&self, window_id: WindowId, url: &str) -> Result<TabId> {
        let inner = &self.inner;
        if !inner.vlm.has_window(window_id) {
            return Err(OrchestratorError::InvalidWindow(window_id));
        }
        let lease = self.lease_or_create(window_id).await;
        let tab_id = TabId::new();

        let (previous, snapshot) = {
            let mut state = lease.slot.lock();
            let previous = state.active();
            state
                .records
                .insert(tab_id.clone(), TabRecord::new(tab_id.clone(), window_id, url));
            state.strip.push(tab_id.clone());
            state.strip.set_active(&tab_id);
            state.marked_for_closure = false;
            inner.index_tab(&tab_id, window_id);
            (previous, state.touch())
        };
        inner.push(snapshot);
        inner.emit_ui(UiEvent::TabCreated {
            tab_id: tab_id.clone(),
            window_id,
        });
        inner.bus.publish(Event::ActiveTabChanged {
            window_id,
            tab_id: Some(tab_id.clone()),
        });
        info!(tab = %tab_id, window = %window_id, url, "tab created");

        match inner.vlm.create_surface(window_id, &tab_id, url).await {
            Ok(()) => {}
            Err(err @ OrchestratorError::InvalidWindow(_)) => {
                self.undo_create(&lease, &tab_id, previous);
                return Err(err);
            }
            Err(err) => {
                warn!(tab = %tab_id, error = %err, "tab left in error state");
                self.mark_error(&lease, &tab_id, &err);
                if let Some(prev) = previous {
                    self.hide(&prev).await;
                }
                return Err(err);
            }
        }

        if let Some(prev) = previous {
            self.hide(&prev).await;
        }
        self.show(window_id, &tab_id).await;
        Ok(tab_id)
    }

    /// Take a just-created tab out again after the window turned out to be
    /// unknown to the host.
    fn undo_create(&self, lease: &WindowLease, tab_id: &TabId, previous: Option<TabId>) {
        let inner = &self.inner;
        let window_id = lease.slot.window_id;
        let (emptied, snapshot) = {
            let mut state = lease.slot.lock();
            state.strip.remove(tab_id);
            state.records.remove(tab_id);
            if let Some(prev) = &previous {
                state.strip.set_active(prev);
            }
            inner.unindex_tab(tab_id);
            (state.strip.is_empty(), state.touch())
        };
        if emptied {
            inner.forget_window(window_id);
            inner.window_closed(window_id);
        } else {
            inner.push(snapshot);
            inner.bus.publish(Event::ActiveTabChanged {
                window_id,
                tab_id: previous,
            });
        }
    }

    fn mark_error(&self, lease: &WindowLease, tab_id: &TabId, err: &OrchestratorError) {
        let snapshot = {
            let mut state = lease.slot.lock();
            let Some(record) = state.records.get_mut(tab_id) else {
                return;
            };
            record.error = Some(err.to_string());
            record.is_loading = false;
            state.touch()
        };
        self.inner.push(snapshot);
    }

    async fn close_tab(&self, tab_id: &TabId) -> Result<()> {
        let inner = &self.inner;
        let lease = self.lease_tab(tab_id).await?;
        let window_id = lease.slot.window_id;

        let (was_active, next_active, emptied, snapshot) = {
            let mut state = lease.slot.lock();
            let was_active = state.active().as_ref() == Some(tab_id);
            if state.strip.remove(tab_id).is_none() {
                return Err(OrchestratorError::tab_not_found(tab_id));
            }
            state.records.remove(tab_id);
            inner.unindex_tab(tab_id);
            (
                was_active,
                state.active(),
                state.strip.is_empty(),
                state.touch(),
            )
        };

        if emptied {
            inner.forget_window(window_id);
        } else {
            inner.push(snapshot);
        }
        inner.bus.publish(Event::TabClosed {
            tab_id: tab_id.clone(),
            window_id,
        });
        if was_active && !emptied {
            inner.bus.publish(Event::ActiveTabChanged {
                window_id,
                tab_id: next_active.clone(),
            });
        }
        if emptied {
            inner.window_closed(window_id);
        }
        info!(tab = %tab_id, window = %window_id, "tab closed");

        inner.vlm.close_surface(tab_id).await?;
        if was_active {
            if let Some(next) = next_active {
                self.show(window_id, &next).await;
            }
        }
        Ok(())
    }

    async fn switch_active_tab(&self, window_id: WindowId, tab_id: &TabId) -> Result<()> {
        let inner = &self.inner;
        let lease = self
            .lease(window_id)
            .await
            .ok_or_else(|| OrchestratorError::window_not_found(window_id))?;

        let (previous, snapshot) = {
            let mut state = lease.slot.lock();
            if !state.strip.contains(tab_id) {
                return Err(OrchestratorError::tab_not_found(tab_id));
            }
            let previous = state.active();
            if previous.as_ref() == Some(tab_id) {
                debug!(tab = %tab_id, "tab already active");
                return Ok(());
            }
            state.strip.set_active(tab_id);
            (previous, state.touch())
        };

        inner.push(snapshot);
        inner.bus.publish(Event::ActiveTabChanged {
            window_id,
            tab_id: Some(tab_id.clone()),
        });
        debug!(tab = %tab_id, window = %window_id, "active tab switched");

        if let Some(prev) = previous {
            self.hide(&prev).await;
        }
        self.show(window_id, tab_id).await;
        Ok(())
    }

    async fn reorder_tab(&self, tab_id: &TabId, index: usize) -> Result<()> {
        let lease = self.lease_tab(tab_id).await?;
        let snapshot = {
            let mut state = lease.slot.lock();
            if !state.strip.move_to(tab_id, index) {
                return Err(OrchestratorError::tab_not_found(tab_id));
            }
            state.touch()
        };
        self.inner.push(snapshot);
        Ok(())
    }

    async fn close_window(&self, window_id: WindowId) -> Result<()> {
        let inner = &self.inner;
        let lease = self
            .lease(window_id)
            .await
            .ok_or_else(|| OrchestratorError::window_not_found(window_id))?;

        let tabs: Vec<TabId> = {
            let mut state = lease.slot.lock();
            let tabs = state.strip.tab_ids().to_vec();
            state.records.clear();
            state.strip = Default::default();
            tabs
        };
        inner.forget_window(window_id);

        for tab_id in &tabs {
            inner.bus.publish(Event::TabClosed {
                tab_id: tab_id.clone(),
                window_id,
            });
        }
        inner.window_closed(window_id);
        info!(window = %window_id, tabs = tabs.len(), "window closed");

        for tab_id in &tabs {
            if let Err(e) = inner.vlm.close_surface(tab_id).await {
                warn!(tab = %tab_id, error = %e, "destroy on window close failed");
            }
        }
        Ok(())
    }

    /// Show a newly active tab and bring it forward. A frozen tab is
    /// announced as needing its surface back.
    pub(crate) async fn show(&self, window_id: WindowId, tab_id: &TabId) {
        let inner = &self.inner;
        if let Err(e) = inner.vlm.set_visible(tab_id, true).await {
            warn!(tab = %tab_id, error = %e, "show failed");
        }
        if let Err(e) = inner.vlm.bring_to_front(tab_id).await {
            warn!(tab = %tab_id, error = %e, "raise failed");
        }

        let frozen_url = inner.slot(window_id).and_then(|slot| {
            let state = slot.lock();
            state
                .records
                .get(tab_id)
                .filter(|r| r.display_mode == DisplayMode::Frozen)
                .map(|r| r.url.clone())
        });
        if let Some(url) = frozen_url {
            inner.bus.publish(Event::SurfaceNeeded {
                tab_id: tab_id.clone(),
                window_id,
                url,
            });
        }
    }

    pub(crate) async fn hide(&self, tab_id: &TabId) {
        if let Err(e) = self.inner.vlm.set_visible(tab_id, false).await {
            warn!(tab = %tab_id, error = %e, "hide failed");
        }
    }
}
