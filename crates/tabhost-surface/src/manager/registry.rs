use std::collections::HashMap;

use tabhost_common::{TabId, WindowId};

use crate::host::HostSurfaceId;

use super::types::SurfaceSlot;

/// Slot table of the lifecycle manager. Always accessed under the
/// manager's registry lock.
#[derive(Debug, Default)]
pub(crate) struct SurfaceRegistry {
    slots: HashMap<TabId, SurfaceSlot>,
    /// Host surface -> owning tab. Signals from unmapped surfaces are stale.
    by_surface: HashMap<HostSurfaceId, TabId>,
    /// Per-window stacking order, back to front.
    z_order: HashMap<WindowId, Vec<TabId>>,
}

impl SurfaceRegistry {
    pub(crate) fn get(&self, tab_id: &TabId) -> Option<&SurfaceSlot> {
        self.slots.get(tab_id)
    }

    pub(crate) fn get_mut(&mut self, tab_id: &TabId) -> Option<&mut SurfaceSlot> {
        self.slots.get_mut(tab_id)
    }

    /// Slot for `tab_id`, created in `Uninitialized` if absent.
    pub(crate) fn entry(&mut self, tab_id: &TabId, window_id: WindowId, url: &str) -> &mut SurfaceSlot {
        self.slots
            .entry(tab_id.clone())
            .or_insert_with(|| SurfaceSlot::new(window_id, url))
    }

    /// Drop a slot together with its surface mapping and stacking entry.
    pub(crate) fn remove(&mut self, tab_id: &TabId) -> Option<SurfaceSlot> {
        let slot = self.slots.remove(tab_id)?;
        if let Some(handle) = &slot.handle {
            self.by_surface.remove(&handle.surface());
        }
        self.unstack(slot.window_id, tab_id);
        Some(slot)
    }

    pub(crate) fn drain(&mut self) -> Vec<(TabId, SurfaceSlot)> {
        self.by_surface.clear();
        self.z_order.clear();
        self.slots.drain().collect()
    }

    pub(crate) fn bind(&mut self, surface: HostSurfaceId, tab_id: &TabId) {
        self.by_surface.insert(surface, tab_id.clone());
    }

    pub(crate) fn unbind(&mut self, surface: HostSurfaceId) {
        self.by_surface.remove(&surface);
    }

    pub(crate) fn tab_for(&self, surface: HostSurfaceId) -> Option<&TabId> {
        self.by_surface.get(&surface)
    }

    /// Put `tab_id` on top of its window's stack.
    pub(crate) fn raise(&mut self, window_id: WindowId, tab_id: &TabId) {
        let stack = self.z_order.entry(window_id).or_default();
        stack.retain(|t| t != tab_id);
        stack.push(tab_id.clone());
    }

    pub(crate) fn lower(&mut self, window_id: WindowId, tab_id: &TabId) {
        let stack = self.z_order.entry(window_id).or_default();
        stack.retain(|t| t != tab_id);
        stack.insert(0, tab_id.clone());
    }

    /// Add `tab_id` on top unless it is already stacked.
    pub(crate) fn stack(&mut self, window_id: WindowId, tab_id: &TabId) {
        let stack = self.z_order.entry(window_id).or_default();
        if !stack.contains(tab_id) {
            stack.push(tab_id.clone());
        }
    }

    pub(crate) fn unstack(&mut self, window_id: WindowId, tab_id: &TabId) {
        if let Some(stack) = self.z_order.get_mut(&window_id) {
            stack.retain(|t| t != tab_id);
            if stack.is_empty() {
                self.z_order.remove(&window_id);
            }
        }
    }

    pub(crate) fn z_order(&self, window_id: WindowId) -> Vec<TabId> {
        self.z_order.get(&window_id).cloned().unwrap_or_default()
    }

    pub(crate) fn allocated(&self) -> usize {
        self.slots.values().filter(|s| s.holds_allocation()).count()
    }

    pub(crate) fn live(&self) -> usize {
        self.slots.values().filter(|s| s.handle.is_some()).count()
    }
}
