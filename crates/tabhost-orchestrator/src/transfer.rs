//! Moving a tab between windows.

use tabhost_common::{new_correlation_id, OrchestratorError, Result, TabId, WindowId};
use tracing::{debug, info, warn};

use crate::state::{StateSynchronizer, TabCommand};

/// Moves tabs between windows with rollback: a failed transfer leaves the
/// tab in its source window, never in zero or two windows.
#[derive(Clone)]
pub struct TransferCoordinator {
    sync: StateSynchronizer,
}

impl TransferCoordinator {
    pub fn new(sync: StateSynchronizer) -> Self {
        Self { sync }
    }

    /// Move `tab_id` from `source` to `target` at `position` (default: end).
    ///
    /// The target's tab set is created on demand, but the host must know the
    /// window. The surface is re-parented before the records move, so a
    /// host failure leaves the model untouched. Moving within the same
    /// window is a reorder.
    pub async fn transfer_tab(
        &self,
        tab_id: &TabId,
        source: WindowId,
        target: WindowId,
        position: Option<usize>,
    ) -> Result<()> {
        let vlm = self.sync.vlm();
        if self.sync.window_of_tab(tab_id) != Some(source) {
            return Err(OrchestratorError::tab_not_found(tab_id));
        }
        if !vlm.has_window(target) {
            return Err(OrchestratorError::InvalidWindow(target));
        }
        if source == target {
            self.sync
                .apply_command(TabCommand::ReorderTab {
                    tab_id: tab_id.clone(),
                    index: position.unwrap_or(usize::MAX),
                })
                .await?;
            return Ok(());
        }

        let cid = new_correlation_id();
        debug!(cid, tab = %tab_id, %source, %target, "transfer requested");

        let Some((source_lease, target_lease)) = self.sync.lease_pair(source, target).await else {
            return Err(OrchestratorError::window_not_found(source));
        };
        if !self.sync.holds_tab(&source_lease, tab_id) {
            self.sync.discard_if_empty(&target_lease);
            return Err(OrchestratorError::tab_not_found(tab_id));
        }

        let has_surface = vlm.state(tab_id).is_some();
        if has_surface {
            if let Err(e) = vlm.reparent(tab_id, target).await {
                warn!(cid, tab = %tab_id, error = %e, "re-parent failed, tab stays in source");
                self.sync.discard_if_empty(&target_lease);
                return Err(OrchestratorError::transfer_failed(tab_id.clone(), e));
            }
        }

        let commit = match self
            .sync
            .commit_transfer(tab_id, &source_lease, &target_lease, position)
        {
            Ok(commit) => commit,
            Err(e) => {
                if has_surface {
                    if let Err(back) = vlm.reparent(tab_id, source).await {
                        warn!(cid, tab = %tab_id, error = %back, "re-parent back to source failed");
                    }
                }
                self.sync.discard_if_empty(&target_lease);
                return Err(OrchestratorError::transfer_failed(tab_id.clone(), e));
            }
        };

        if let Some(previous) = &commit.target_previous_active {
            self.sync.hide(previous).await;
        }
        self.sync.show(target, tab_id).await;
        if commit.source_was_active {
            if let Some(next) = &commit.source_next_active {
                self.sync.show(source, next).await;
            }
        }

        info!(
            cid,
            tab = %tab_id,
            %source,
            %target,
            source_emptied = commit.source_emptied,
            "tab transferred"
        );
        Ok(())
    }
}
