//! Command execution: routes each UI command to the service that owns it.

use tabhost_common::{OrchestratorError, Result, TabId};
use tracing::{debug, warn};

use crate::protocol::{Command, Target, UiEvent};
use crate::state::{Applied, TabCommand};

use super::router::Job;
use super::Orchestrator;

impl Orchestrator {
    /// Run one command to completion. Returns the new tab's id for
    /// `CreateTab`.
    ///
    /// Commands for the same window are serialized by the synchronizer;
    /// callers that want fire-and-forget use [`Self::dispatch`].
    pub async fn execute(&self, command: Command) -> Result<Option<TabId>> {
        debug!(?command, "executing command");
        match command {
            Command::CreateTab { window_id, url } => {
                match self
                    .sync
                    .apply_command(TabCommand::CreateTab { window_id, url })
                    .await?
                {
                    Applied::Created(tab_id) => Ok(Some(tab_id)),
                    Applied::Done => Ok(None),
                }
            }
            Command::CloseTab { tab_id } => self.apply(TabCommand::CloseTab { tab_id }).await,
            Command::SwitchActiveTab { window_id, tab_id } => {
                self.apply(TabCommand::SwitchActiveTab { window_id, tab_id })
                    .await
            }
            Command::ReorderTab { tab_id, index } => {
                self.apply(TabCommand::ReorderTab { tab_id, index }).await
            }
            Command::CloseWindow { window_id } => {
                self.apply(TabCommand::CloseWindow { window_id }).await
            }
            Command::Navigate { tab_id, url } => {
                self.known(&tab_id)?;
                self.vlm.navigate(&tab_id, &url).await?;
                Ok(None)
            }
            Command::GoBack { tab_id } => {
                self.known(&tab_id)?;
                self.vlm.go_back(&tab_id).await?;
                Ok(None)
            }
            Command::GoForward { tab_id } => {
                self.known(&tab_id)?;
                self.vlm.go_forward(&tab_id).await?;
                Ok(None)
            }
            Command::Reload { tab_id } => {
                self.known(&tab_id)?;
                self.vlm.reload(&tab_id).await?;
                Ok(None)
            }
            Command::SetBounds { tab_id, rect } => {
                self.known(&tab_id)?;
                self.vlm.set_bounds(&tab_id, rect).await?;
                Ok(None)
            }
            Command::TransferTab {
                tab_id,
                target_window_id,
                target_position,
            } => {
                let source = self
                    .sync
                    .window_of_tab(&tab_id)
                    .ok_or_else(|| OrchestratorError::tab_not_found(&tab_id))?;
                self.transfer
                    .transfer_tab(&tab_id, source, target_window_id, target_position)
                    .await?;
                Ok(None)
            }
            Command::RequestFocus { tab_id } => {
                self.known(&tab_id)?;
                self.focus.request_focus(&tab_id);
                Ok(None)
            }
            Command::FocusWindow { window_id } => {
                let state = self
                    .sync
                    .get_state(window_id)
                    .ok_or_else(|| OrchestratorError::window_not_found(window_id))?;
                self.focus
                    .focus_window(window_id, state.active_tab_id.as_ref());
                Ok(None)
            }
        }
    }

    /// Queue `command` on its window's worker and return at once. Failures
    /// are reported on the UI channel as `CommandFailed`.
    pub fn dispatch(&self, command: Command) {
        let window_id = match command.target() {
            Target::Window(window_id) => window_id,
            Target::Tab(tab_id) => match self.sync.window_of_tab(&tab_id) {
                Some(window_id) => window_id,
                None => {
                    let err = OrchestratorError::tab_not_found(&tab_id);
                    self.sync.emit_ui(UiEvent::command_failed(&command, &err));
                    return;
                }
            },
        };

        self.router.enqueue(window_id, command, |id, mut rx| {
            let this = self.clone();
            tokio::spawn(async move {
                while let Some(job) = rx.recv().await {
                    match job {
                        Job::Run(command) => this.run_queued(command).await,
                        Job::Barrier(done) => {
                            let _ = done.send(());
                        }
                    }
                    // Unknown or emptied windows do not keep a worker around.
                    if this.sync.get_state(window_id).is_none()
                        && this.router.retire(window_id, id, &rx)
                    {
                        break;
                    }
                }
                debug!(window = %window_id, "command queue closed");
            });
        });
    }

    /// Wait until every command dispatched so far has finished.
    pub async fn flush(&self) {
        for barrier in self.router.barriers() {
            let _ = barrier.await;
        }
    }

    async fn run_queued(&self, command: Command) {
        if let Err(err) = self.execute(command.clone()).await {
            warn!(kind = err.kind(), error = %err, "command failed");
            self.sync.emit_ui(UiEvent::command_failed(&command, &err));
        }
    }

    async fn apply(&self, command: TabCommand) -> Result<Option<TabId>> {
        self.sync.apply_command(command).await?;
        Ok(None)
    }

    fn known(&self, tab_id: &TabId) -> Result<()> {
        match self.sync.window_of_tab(tab_id) {
            Some(_) => Ok(()),
            None => Err(OrchestratorError::tab_not_found(tab_id)),
        }
    }
}
