//! Core type for a window's ordered tab list.

use serde::{Deserialize, Serialize};
use tabhost_common::TabId;

/// Ordered tab ids of one window plus the active one. Tab order is what
/// the UI renders; the active index, if set, always points into `tabs`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TabStrip {
    pub(super) tabs: Vec<TabId>,
    pub(super) active: Option<usize>,
}

impl TabStrip {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn contains(&self, tab_id: &TabId) -> bool {
        self.tabs.contains(tab_id)
    }

    pub fn tab_ids(&self) -> &[TabId] {
        &self.tabs
    }

    pub fn position(&self, tab_id: &TabId) -> Option<usize> {
        self.tabs.iter().position(|t| t == tab_id)
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active(&self) -> Option<&TabId> {
        self.active.and_then(|i| self.tabs.get(i))
    }
}
