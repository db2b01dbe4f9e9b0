use tabhost_common::{Event, OrchestratorError, Rect, Result, TabId};
use tracing::debug;

use crate::host::HostSurfaceId;

use super::{map_host_error, ViewLifecycleManager};

impl ViewLifecycleManager {
    /// Record and apply new bounds. A tab without a live surface only has
    /// the value remembered for its next creation.
    pub async fn set_bounds(&self, tab_id: &TabId, bounds: Rect) -> Result<()> {
        let surface = {
            let mut reg = self.inner.lock();
            let Some(slot) = reg.get_mut(tab_id) else {
                return Ok(());
            };
            slot.bounds = Some(bounds);
            slot.handle.map(|h| h.surface())
        };
        match surface {
            Some(surface) => self
                .inner
                .host
                .set_bounds(surface, bounds)
                .await
                .map_err(|e| map_host_error(e, tab_id)),
            None => Ok(()),
        }
    }

    /// Record and apply visibility. `VisibilityChanged` is published only
    /// when the recorded value actually changes, live surface or not.
    pub async fn set_visible(&self, tab_id: &TabId, visible: bool) -> Result<()> {
        let (surface, changed) = {
            let mut reg = self.inner.lock();
            let Some(slot) = reg.get_mut(tab_id) else {
                return Ok(());
            };
            let changed = slot.visible != visible;
            slot.visible = visible;
            (slot.handle.map(|h| h.surface()), changed)
        };
        if let Some(surface) = surface {
            self.inner
                .host
                .set_visible(surface, visible)
                .await
                .map_err(|e| map_host_error(e, tab_id))?;
        }
        if changed {
            self.inner.bus.publish(Event::VisibilityChanged {
                tab_id: tab_id.clone(),
                visible,
            });
        }
        Ok(())
    }

    pub async fn bring_to_front(&self, tab_id: &TabId) -> Result<()> {
        let surface = {
            let mut reg = self.inner.lock();
            let Some(slot) = reg.get(tab_id) else {
                return Ok(());
            };
            let window_id = slot.window_id;
            let surface = slot.handle.map(|h| h.surface());
            reg.raise(window_id, tab_id);
            surface
        };
        match surface {
            Some(s) => self
                .inner
                .host
                .bring_to_front(s)
                .await
                .map_err(|e| map_host_error(e, tab_id)),
            None => Ok(()),
        }
    }

    pub async fn send_to_back(&self, tab_id: &TabId) -> Result<()> {
        let surface = {
            let mut reg = self.inner.lock();
            let Some(slot) = reg.get(tab_id) else {
                return Ok(());
            };
            let window_id = slot.window_id;
            let surface = slot.handle.map(|h| h.surface());
            reg.lower(window_id, tab_id);
            surface
        };
        match surface {
            Some(s) => self
                .inner
                .host
                .send_to_back(s)
                .await
                .map_err(|e| map_host_error(e, tab_id)),
            None => Ok(()),
        }
    }

    pub async fn navigate(&self, tab_id: &TabId, url: &str) -> Result<()> {
        let surface = self.live_surface(tab_id)?;
        debug!(tab = %tab_id, url, "navigate");
        self.inner
            .host
            .navigate(surface, url)
            .await
            .map_err(|e| map_host_error(e, tab_id))?;
        if let Some(slot) = self.inner.lock().get_mut(tab_id) {
            slot.url = url.to_string();
        }
        Ok(())
    }

    pub async fn go_back(&self, tab_id: &TabId) -> Result<()> {
        let surface = self.live_surface(tab_id)?;
        self.inner
            .host
            .go_back(surface)
            .await
            .map_err(|e| map_host_error(e, tab_id))
    }

    pub async fn go_forward(&self, tab_id: &TabId) -> Result<()> {
        let surface = self.live_surface(tab_id)?;
        self.inner
            .host
            .go_forward(surface)
            .await
            .map_err(|e| map_host_error(e, tab_id))
    }

    pub async fn reload(&self, tab_id: &TabId) -> Result<()> {
        let surface = self.live_surface(tab_id)?;
        self.inner
            .host
            .reload(surface)
            .await
            .map_err(|e| map_host_error(e, tab_id))
    }

    /// Give input focus to the tab's surface.
    pub async fn focus(&self, tab_id: &TabId) -> Result<()> {
        let surface = self.live_surface(tab_id)?;
        self.inner
            .host
            .focus(surface)
            .await
            .map_err(|e| map_host_error(e, tab_id))
    }

    /// Encoded PNG of the tab's current contents.
    pub async fn capture(&self, tab_id: &TabId) -> Result<Vec<u8>> {
        let surface = self.live_surface(tab_id)?;
        self.inner
            .host
            .capture(surface)
            .await
            .map_err(|e| map_host_error(e, tab_id))
    }

    fn live_surface(&self, tab_id: &TabId) -> Result<HostSurfaceId> {
        self.inner
            .lock()
            .get(tab_id)
            .and_then(|slot| slot.handle)
            .map(|h| h.surface())
            .ok_or_else(|| OrchestratorError::NoSuchSurface(tab_id.clone()))
    }
}
