use serde::{Deserialize, Serialize};
use tabhost_common::{DisplayMode, SnapshotRef, SurfaceState, TabId, WindowId};

use super::strip::TabStrip;

/// UI-facing state of one tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabRecord {
    pub tab_id: TabId,
    pub window_id: WindowId,
    pub url: String,
    pub title: String,
    pub favicon_url: Option<String>,
    pub can_go_back: bool,
    pub can_go_forward: bool,
    pub is_loading: bool,
    pub lifecycle: SurfaceState,
    pub display_mode: DisplayMode,
    /// Present exactly while `display_mode` is `Frozen`.
    pub snapshot: Option<SnapshotRef>,
    /// Inline error shown instead of the surface when creation failed.
    pub error: Option<String>,
}

impl TabRecord {
    pub fn new(tab_id: TabId, window_id: WindowId, url: &str) -> Self {
        Self {
            tab_id,
            window_id,
            url: url.to_string(),
            title: String::new(),
            favicon_url: None,
            can_go_back: false,
            can_go_forward: false,
            is_loading: true,
            lifecycle: SurfaceState::Uninitialized,
            display_mode: DisplayMode::Live,
            snapshot: None,
            error: None,
        }
    }
}

/// Full, self-contained state of one window as pushed to the UI.
///
/// `version` grows with every change of the window; a consumer that sees
/// an older version than one it already applied can drop it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    pub window_id: WindowId,
    pub version: u64,
    pub active_tab_id: Option<TabId>,
    pub marked_for_closure: bool,
    /// In tab order.
    pub tabs: Vec<TabRecord>,
}

impl WindowSnapshot {
    pub fn tab_ids(&self) -> Vec<TabId> {
        self.tabs.iter().map(|t| t.tab_id.clone()).collect()
    }

    pub fn tab(&self, tab_id: &TabId) -> Option<&TabRecord> {
        self.tabs.iter().find(|t| &t.tab_id == tab_id)
    }
}

/// Externally initiated mutations of the tab model.
#[derive(Debug, Clone, PartialEq)]
pub enum TabCommand {
    CreateTab { window_id: WindowId, url: String },
    CloseTab { tab_id: TabId },
    SwitchActiveTab { window_id: WindowId, tab_id: TabId },
    ReorderTab { tab_id: TabId, index: usize },
    CloseWindow { window_id: WindowId },
}

/// Result of a successfully applied [`TabCommand`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Created(TabId),
    Done,
}

/// Mutable state of one window, guarded by its slot's state lock.
#[derive(Debug)]
pub(crate) struct WindowState {
    pub(crate) window_id: WindowId,
    pub(crate) strip: TabStrip,
    pub(crate) records: std::collections::HashMap<TabId, TabRecord>,
    pub(crate) marked_for_closure: bool,
    pub(crate) version: u64,
}

impl WindowState {
    pub(crate) fn new(window_id: WindowId) -> Self {
        Self {
            window_id,
            strip: TabStrip::new(),
            records: Default::default(),
            marked_for_closure: false,
            version: 0,
        }
    }

    /// Record a change and return the snapshot to push.
    pub(crate) fn touch(&mut self) -> WindowSnapshot {
        self.version += 1;
        self.snapshot()
    }

    pub(crate) fn snapshot(&self) -> WindowSnapshot {
        WindowSnapshot {
            window_id: self.window_id,
            version: self.version,
            active_tab_id: self.strip.active().cloned(),
            marked_for_closure: self.marked_for_closure,
            tabs: self
                .strip
                .tab_ids()
                .iter()
                .filter_map(|id| self.records.get(id).cloned())
                .collect(),
        }
    }

    pub(crate) fn active(&self) -> Option<TabId> {
        self.strip.active().cloned()
    }
}
