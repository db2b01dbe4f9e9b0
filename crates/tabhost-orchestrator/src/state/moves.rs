//! Moving a tab record between two windows in one step.

use std::sync::MutexGuard;

use tabhost_common::{Event, OrchestratorError, Result, TabId};
use tracing::debug;

use super::types::WindowState;
use super::{StateSynchronizer, WindowLease, WindowSlot};

/// What a committed transfer changed, for the follow-up surface calls.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TransferCommit {
    pub(crate) source_was_active: bool,
    pub(crate) source_next_active: Option<TabId>,
    pub(crate) source_emptied: bool,
    pub(crate) target_previous_active: Option<TabId>,
}

impl StateSynchronizer {
    /// Move `tab_id` from the source window to the target window at
    /// `position` (default: end) and make it the target's active tab.
    ///
    /// Both state locks are held together, so no observer can see the tab
    /// in zero or two windows. An emptied source is marked for closure.
    pub(crate) fn commit_transfer(
        &self,
        tab_id: &TabId,
        source: &WindowLease,
        target: &WindowLease,
        position: Option<usize>,
    ) -> Result<TransferCommit> {
        let inner = &self.inner;
        let from = source.slot.window_id;
        let to = target.slot.window_id;

        let (commit, source_snapshot, target_snapshot) = {
            let (mut src, mut dst) = lock_pair(&source.slot, &target.slot);
            let Some(mut record) = src.records.remove(tab_id) else {
                return Err(OrchestratorError::tab_not_found(tab_id));
            };
            let source_was_active = src.active().as_ref() == Some(tab_id);
            src.strip.remove(tab_id);
            let source_emptied = src.strip.is_empty();
            if source_emptied {
                src.marked_for_closure = true;
            }

            record.window_id = to;
            let target_previous_active = dst.active();
            dst.strip.insert(position, tab_id.clone());
            dst.strip.set_active(tab_id);
            dst.records.insert(tab_id.clone(), record);
            dst.marked_for_closure = false;
            inner.index_tab(tab_id, to);

            (
                TransferCommit {
                    source_was_active,
                    source_next_active: src.active(),
                    source_emptied,
                    target_previous_active,
                },
                src.touch(),
                dst.touch(),
            )
        };

        inner.push(source_snapshot);
        inner.push(target_snapshot);
        inner.bus.publish(Event::TabTransferred {
            tab_id: tab_id.clone(),
            from,
            to,
        });
        inner.bus.publish(Event::ActiveTabChanged {
            window_id: to,
            tab_id: Some(tab_id.clone()),
        });
        if commit.source_was_active {
            inner.bus.publish(Event::ActiveTabChanged {
                window_id: from,
                tab_id: commit.source_next_active.clone(),
            });
        }
        if commit.source_emptied {
            inner.bus.publish(Event::WindowMarkedForClosure { window_id: from });
        }
        debug!(tab = %tab_id, %from, %to, "transfer committed");
        Ok(commit)
    }

    /// Whether `tab_id` is currently listed in the leased window.
    pub(crate) fn holds_tab(&self, lease: &WindowLease, tab_id: &TabId) -> bool {
        lease.slot.lock().strip.contains(tab_id)
    }
}

/// Lock two distinct windows in ascending id order.
fn lock_pair<'a>(
    source: &'a WindowSlot,
    target: &'a WindowSlot,
) -> (MutexGuard<'a, WindowState>, MutexGuard<'a, WindowState>) {
    if source.window_id < target.window_id {
        let src = source.lock();
        let dst = target.lock();
        (src, dst)
    } else {
        let dst = target.lock();
        let src = source.lock();
        (src, dst)
    }
}
