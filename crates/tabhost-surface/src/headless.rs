//! In-process [`SurfaceHost`] with no native windowing.
//!
//! Windows are registered explicitly, every surface keeps a navigation
//! history, and loads finish after a configurable latency or on demand.
//! Capture renders a solid PNG. Allocation limits and failures can be
//! injected, which makes this the host of choice for the CLI and tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tabhost_common::{Rect, WindowId};
use tracing::debug;

use crate::events::{HostSignal, SignalSink};
use crate::host::{HostError, HostSurfaceId, SurfaceHost, SurfaceRequest};
use crate::png;

const DEFAULT_CAPTURE_SIZE: (u32, u32) = (64, 64);
const CAPTURE_FILL: [u8; 4] = [0x89, 0xb4, 0xfa, 0xff];

#[derive(Debug, Clone)]
pub struct HeadlessSettings {
    /// Delay between `LoadStarted` and `LoadFinished`.
    pub load_latency: Duration,
    /// When set, loads only finish through [`HeadlessHost::complete_pending_loads`].
    pub manual_loads: bool,
    pub reparent_supported: bool,
    /// 0 = unlimited.
    pub max_surfaces: usize,
}

impl Default for HeadlessSettings {
    fn default() -> Self {
        Self {
            load_latency: Duration::ZERO,
            manual_loads: false,
            reparent_supported: true,
            max_surfaces: 0,
        }
    }
}

#[derive(Debug)]
struct HeadlessSurface {
    window_id: WindowId,
    history: Vec<String>,
    index: usize,
    bounds: Option<Rect>,
    visible: bool,
    sink: SignalSink,
}

impl HeadlessSurface {
    fn current_url(&self) -> &str {
        self.history.get(self.index).map(String::as_str).unwrap_or("about:blank")
    }

    fn nav_flags(&self) -> HostSignal {
        HostSignal::NavigationFlags {
            can_go_back: self.index > 0,
            can_go_forward: self.index + 1 < self.history.len(),
        }
    }
}

#[derive(Debug, Default)]
struct HostState {
    windows: BTreeSet<WindowId>,
    surfaces: HashMap<HostSurfaceId, HeadlessSurface>,
    pending_loads: Vec<(HostSurfaceId, String)>,
    created_total: usize,
    destroyed_total: usize,
    focused: Option<HostSurfaceId>,
    raised: Option<HostSurfaceId>,
    fail_next_create: Option<HostError>,
    fail_next_reparent: Option<String>,
    capture_failure: bool,
    capture_delay: Duration,
}

/// Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct HeadlessHost {
    state: Arc<Mutex<HostState>>,
    settings: HeadlessSettings,
}

impl HeadlessHost {
    pub fn new(settings: HeadlessSettings) -> Self {
        Self {
            state: Arc::new(Mutex::new(HostState::default())),
            settings,
        }
    }

    pub fn with_windows(settings: HeadlessSettings, windows: impl IntoIterator<Item = WindowId>) -> Self {
        let host = Self::new(settings);
        for w in windows {
            host.open_window(w);
        }
        host
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn open_window(&self, window_id: WindowId) {
        self.lock().windows.insert(window_id);
    }

    /// Forget a window. Its surfaces are released without notice.
    pub fn close_window(&self, window_id: WindowId) {
        let mut state = self.lock();
        state.windows.remove(&window_id);
        let before = state.surfaces.len();
        state.surfaces.retain(|_, s| s.window_id != window_id);
        state.destroyed_total += before - state.surfaces.len();
    }

    pub fn windows(&self) -> Vec<WindowId> {
        self.lock().windows.iter().copied().collect()
    }

    pub fn surface_count(&self) -> usize {
        self.lock().surfaces.len()
    }

    pub fn surfaces_in(&self, window_id: WindowId) -> usize {
        self.lock()
            .surfaces
            .values()
            .filter(|s| s.window_id == window_id)
            .count()
    }

    pub fn created_total(&self) -> usize {
        self.lock().created_total
    }

    pub fn destroyed_total(&self) -> usize {
        self.lock().destroyed_total
    }

    pub fn focused_surface(&self) -> Option<HostSurfaceId> {
        self.lock().focused
    }

    pub fn front_surface(&self) -> Option<HostSurfaceId> {
        self.lock().raised
    }

    pub fn surface_url(&self, id: HostSurfaceId) -> Option<String> {
        self.lock()
            .surfaces
            .get(&id)
            .map(|s| s.current_url().to_string())
    }

    pub fn surface_window(&self, id: HostSurfaceId) -> Option<WindowId> {
        self.lock().surfaces.get(&id).map(|s| s.window_id)
    }

    pub fn surface_visible(&self, id: HostSurfaceId) -> Option<bool> {
        self.lock().surfaces.get(&id).map(|s| s.visible)
    }

    pub fn surface_bounds(&self, id: HostSurfaceId) -> Option<Rect> {
        self.lock().surfaces.get(&id).and_then(|s| s.bounds)
    }

    /// Make the next `create_surface` fail with `err`.
    pub fn fail_next_create(&self, err: HostError) {
        self.lock().fail_next_create = Some(err);
    }

    pub fn fail_next_reparent(&self, reason: impl Into<String>) {
        self.lock().fail_next_reparent = Some(reason.into());
    }

    pub fn set_capture_failure(&self, fail: bool) {
        self.lock().capture_failure = fail;
    }

    pub fn set_capture_delay(&self, delay: Duration) {
        self.lock().capture_delay = delay;
    }

    /// Finish every load started in manual mode. Returns how many finished.
    pub fn complete_pending_loads(&self) -> usize {
        let pending = std::mem::take(&mut self.lock().pending_loads);
        pending
            .into_iter()
            .filter(|(id, url)| self.finish_load(*id, url))
            .count()
    }

    pub fn pending_load_count(&self) -> usize {
        self.lock().pending_loads.len()
    }

    fn begin_load(&self, id: HostSurfaceId) -> Result<(), HostError> {
        let (sink, url, flags) = {
            let mut state = self.lock();
            let surface = state
                .surfaces
                .get(&id)
                .ok_or(HostError::UnknownSurface(id))?;
            let url = surface.current_url().to_string();
            let out = (surface.sink.clone(), url.clone(), surface.nav_flags());
            if self.settings.manual_loads {
                state.pending_loads.push((id, url));
            }
            out
        };

        sink.emit(HostSignal::LoadStarted { url: url.clone() });
        sink.emit(HostSignal::UrlChanged { url: url.clone() });
        sink.emit(flags);

        if !self.settings.manual_loads {
            let host = self.clone();
            let latency = self.settings.load_latency;
            tokio::spawn(async move {
                tokio::time::sleep(latency).await;
                host.finish_load(id, &url);
            });
        }
        Ok(())
    }

    /// Emit completion for `url` unless the surface is gone or moved on.
    fn finish_load(&self, id: HostSurfaceId, url: &str) -> bool {
        let sink = {
            let state = self.lock();
            match state.surfaces.get(&id) {
                Some(s) if s.current_url() == url => s.sink.clone(),
                _ => return false,
            }
        };
        let title = title_for(url);
        sink.emit(HostSignal::LoadFinished {
            url: url.to_string(),
            title: title.clone(),
        });
        sink.emit(HostSignal::TitleChanged { title });
        sink.emit(HostSignal::FaviconChanged {
            favicon_url: favicon_for(url),
        });
        true
    }

    fn with_surface<T>(
        &self,
        id: HostSurfaceId,
        f: impl FnOnce(&mut HeadlessSurface) -> T,
    ) -> Result<T, HostError> {
        let mut state = self.lock();
        state
            .surfaces
            .get_mut(&id)
            .map(f)
            .ok_or(HostError::UnknownSurface(id))
    }
}

#[async_trait]
impl SurfaceHost for HeadlessHost {
    fn has_window(&self, window: WindowId) -> bool {
        self.lock().windows.contains(&window)
    }

    async fn create_surface(&self, request: SurfaceRequest, sink: SignalSink) -> Result<(), HostError> {
        {
            let mut state = self.lock();
            if !state.windows.contains(&request.window_id) {
                return Err(HostError::UnknownWindow(request.window_id));
            }
            if let Some(err) = state.fail_next_create.take() {
                return Err(err);
            }
            let max = self.settings.max_surfaces;
            if max > 0 && state.surfaces.len() >= max {
                return Err(HostError::Exhausted(format!("surface limit {max} reached")));
            }
            state.surfaces.insert(
                request.id,
                HeadlessSurface {
                    window_id: request.window_id,
                    history: vec![request.url.clone()],
                    index: 0,
                    bounds: request.bounds,
                    visible: request.visible,
                    sink,
                },
            );
            state.created_total += 1;
        }
        debug!(surface = %request.id, window = %request.window_id, "headless surface created");
        self.begin_load(request.id)
    }

    async fn destroy_surface(&self, id: HostSurfaceId) -> Result<(), HostError> {
        let mut state = self.lock();
        state
            .surfaces
            .remove(&id)
            .ok_or(HostError::UnknownSurface(id))?;
        state.destroyed_total += 1;
        state.pending_loads.retain(|(s, _)| *s != id);
        if state.focused == Some(id) {
            state.focused = None;
        }
        if state.raised == Some(id) {
            state.raised = None;
        }
        Ok(())
    }

    async fn set_bounds(&self, id: HostSurfaceId, bounds: Rect) -> Result<(), HostError> {
        self.with_surface(id, |s| s.bounds = Some(bounds))
    }

    async fn set_visible(&self, id: HostSurfaceId, visible: bool) -> Result<(), HostError> {
        self.with_surface(id, |s| s.visible = visible)
    }

    async fn bring_to_front(&self, id: HostSurfaceId) -> Result<(), HostError> {
        self.with_surface(id, |_| ())?;
        self.lock().raised = Some(id);
        Ok(())
    }

    async fn send_to_back(&self, id: HostSurfaceId) -> Result<(), HostError> {
        self.with_surface(id, |_| ())?;
        let mut state = self.lock();
        if state.raised == Some(id) {
            state.raised = None;
        }
        Ok(())
    }

    async fn navigate(&self, id: HostSurfaceId, url: &str) -> Result<(), HostError> {
        self.with_surface(id, |s| {
            s.history.truncate(s.index + 1);
            s.history.push(url.to_string());
            s.index = s.history.len() - 1;
        })?;
        self.begin_load(id)
    }

    async fn go_back(&self, id: HostSurfaceId) -> Result<(), HostError> {
        let moved = self.with_surface(id, |s| {
            if s.index > 0 {
                s.index -= 1;
                true
            } else {
                false
            }
        })?;
        if moved {
            self.begin_load(id)?;
        }
        Ok(())
    }

    async fn go_forward(&self, id: HostSurfaceId) -> Result<(), HostError> {
        let moved = self.with_surface(id, |s| {
            if s.index + 1 < s.history.len() {
                s.index += 1;
                true
            } else {
                false
            }
        })?;
        if moved {
            self.begin_load(id)?;
        }
        Ok(())
    }

    async fn reload(&self, id: HostSurfaceId) -> Result<(), HostError> {
        self.begin_load(id)
    }

    async fn focus(&self, id: HostSurfaceId) -> Result<(), HostError> {
        self.with_surface(id, |_| ())?;
        self.lock().focused = Some(id);
        Ok(())
    }

    async fn capture(&self, id: HostSurfaceId) -> Result<Vec<u8>, HostError> {
        let (delay, fail, bounds) = {
            let state = self.lock();
            let surface = state
                .surfaces
                .get(&id)
                .ok_or(HostError::UnknownSurface(id))?;
            (state.capture_delay, state.capture_failure, surface.bounds)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(HostError::Failed("capture failed".into()));
        }
        let (w, h) = bounds
            .filter(|b| !b.is_empty())
            .map(|b| (b.width.round() as u32, b.height.round() as u32))
            .unwrap_or(DEFAULT_CAPTURE_SIZE);
        png::solid_png(w.min(4096), h.min(4096), CAPTURE_FILL)
            .map_err(|e| HostError::Failed(format!("png encode: {e}")))
    }

    async fn reparent(&self, id: HostSurfaceId, target: WindowId) -> Result<(), HostError> {
        if !self.settings.reparent_supported {
            return Err(HostError::Unsupported);
        }
        let mut state = self.lock();
        if let Some(reason) = state.fail_next_reparent.take() {
            return Err(HostError::Failed(reason));
        }
        if !state.windows.contains(&target) {
            return Err(HostError::UnknownWindow(target));
        }
        let surface = state
            .surfaces
            .get_mut(&id)
            .ok_or(HostError::UnknownSurface(id))?;
        surface.window_id = target;
        Ok(())
    }
}

/// Title a page would report: its host name, or the url itself.
fn title_for(url: &str) -> String {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() {
        url.to_string()
    } else {
        host.to_string()
    }
}

fn favicon_for(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    if !matches!(scheme, "http" | "https") {
        return None;
    }
    let host = rest.split(['/', '?', '#']).next().filter(|h| !h.is_empty())?;
    Some(format!("{scheme}://{host}/favicon.ico"))
}
