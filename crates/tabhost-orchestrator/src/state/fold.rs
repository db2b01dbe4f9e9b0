//! Folding bus events into tab records.

use tabhost_common::{DisplayMode, Event, SurfaceState};
use tracing::trace;

use super::types::TabRecord;
use super::SyncInner;

impl SyncInner {
    pub(super) fn fold(&self, event: &Event) {
        let Some(tab_id) = event.tab_id() else {
            return;
        };
        let Some(slot) = self.slot_of_tab(tab_id) else {
            trace!(tab = %tab_id, topic = ?event.topic(), "event for untracked tab");
            return;
        };
        let snapshot = {
            let mut state = slot.lock();
            let Some(record) = state.records.get_mut(tab_id) else {
                return;
            };
            if !apply(record, event) {
                return;
            }
            state.touch()
        };
        self.push(snapshot);
    }
}

/// Apply one event to a record. Returns whether anything changed.
fn apply(record: &mut TabRecord, event: &Event) -> bool {
    let before = record.clone();
    match event {
        Event::SurfaceCreated { .. } => {
            record.error = None;
        }
        Event::SurfaceDestroyed { .. } => {
            record.lifecycle = SurfaceState::Destroyed;
            record.is_loading = false;
        }
        Event::SurfaceCreateFailed { reason, .. } => {
            record.error = Some(reason.clone());
            record.is_loading = false;
        }
        Event::SurfaceStateChanged { state, .. } => {
            record.lifecycle = *state;
        }
        Event::LoadStarted { url, .. } => {
            record.url.clone_from(url);
            record.is_loading = true;
            record.error = None;
        }
        Event::LoadFinished { url, title, .. } => {
            record.url.clone_from(url);
            if !title.is_empty() {
                record.title.clone_from(title);
            }
            record.is_loading = false;
        }
        Event::UrlChanged { url, .. } => {
            record.url.clone_from(url);
        }
        Event::TitleChanged { title, .. } => {
            record.title.clone_from(title);
        }
        Event::FaviconChanged { favicon_url, .. } => {
            record.favicon_url.clone_from(favicon_url);
        }
        Event::NavigationFlagsChanged {
            can_go_back,
            can_go_forward,
            ..
        } => {
            record.can_go_back = *can_go_back;
            record.can_go_forward = *can_go_forward;
        }
        // The snapshot reference and the display mode always change together.
        Event::TabFrozen { snapshot, .. } => {
            record.display_mode = DisplayMode::Frozen;
            record.snapshot = Some(snapshot.clone());
        }
        Event::TabThawed { .. } => {
            record.display_mode = DisplayMode::Live;
            record.snapshot = None;
        }
        _ => return false,
    }
    *record != before
}
