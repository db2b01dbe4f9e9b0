//! Mutating operations on TabStrip: insert, remove, activate, move.

use tabhost_common::TabId;

use super::TabStrip;

impl TabStrip {
    /// Insert at `index` (clamped; `None` appends). The active tab stays
    /// the same tab. Returns the index used.
    pub fn insert(&mut self, index: Option<usize>, tab_id: TabId) -> usize {
        let idx = index.unwrap_or(self.tabs.len()).min(self.tabs.len());
        self.tabs.insert(idx, tab_id);
        if let Some(active) = self.active.as_mut() {
            if *active >= idx {
                *active += 1;
            }
        }
        idx
    }

    pub fn push(&mut self, tab_id: TabId) -> usize {
        self.insert(None, tab_id)
    }

    /// Remove a tab. Returns the index it occupied.
    ///
    /// Removing the active tab activates its right-hand neighbour, or the
    /// new last tab when it was the last one.
    pub fn remove(&mut self, tab_id: &TabId) -> Option<usize> {
        let idx = self.position(tab_id)?;
        self.tabs.remove(idx);
        self.active = match self.active {
            _ if self.tabs.is_empty() => None,
            Some(active) if active == idx => Some(idx.min(self.tabs.len() - 1)),
            Some(active) if active > idx => Some(active - 1),
            other => other,
        };
        Some(idx)
    }

    /// Make `tab_id` active. Returns `false` if it is not in the strip.
    pub fn set_active(&mut self, tab_id: &TabId) -> bool {
        match self.position(tab_id) {
            Some(idx) => {
                self.active = Some(idx);
                true
            }
            None => false,
        }
    }

    /// Move a tab to `index` (clamped to the end), keeping the active tab.
    pub fn move_to(&mut self, tab_id: &TabId, index: usize) -> bool {
        let Some(from) = self.position(tab_id) else {
            return false;
        };
        let active = self.active().cloned();
        let tab = self.tabs.remove(from);
        let to = index.min(self.tabs.len());
        self.tabs.insert(to, tab);
        self.active = active.and_then(|a| self.position(&a));
        true
    }
}
