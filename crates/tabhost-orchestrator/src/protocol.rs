//! Wire messages between the UI layer and the orchestrator.
//!
//! Both directions are JSON objects tagged by a snake_case `type` field.

use serde::{Deserialize, Serialize};
use tabhost_common::{OrchestratorError, Rect, TabId, WindowId};

use crate::state::WindowSnapshot;

/// A command from the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    CreateTab {
        window_id: WindowId,
        url: String,
    },
    CloseTab {
        tab_id: TabId,
    },
    SwitchActiveTab {
        window_id: WindowId,
        tab_id: TabId,
    },
    Navigate {
        tab_id: TabId,
        url: String,
    },
    GoBack {
        tab_id: TabId,
    },
    GoForward {
        tab_id: TabId,
    },
    Reload {
        tab_id: TabId,
    },
    SetBounds {
        tab_id: TabId,
        rect: Rect,
    },
    TransferTab {
        tab_id: TabId,
        target_window_id: WindowId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_position: Option<usize>,
    },
    RequestFocus {
        tab_id: TabId,
    },
    ReorderTab {
        tab_id: TabId,
        index: usize,
    },
    CloseWindow {
        window_id: WindowId,
    },
    FocusWindow {
        window_id: WindowId,
    },
}

/// What a command addresses, which decides the queue it runs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Window(WindowId),
    Tab(TabId),
}

impl Command {
    pub fn target(&self) -> Target {
        match self {
            Command::CreateTab { window_id, .. }
            | Command::SwitchActiveTab { window_id, .. }
            | Command::CloseWindow { window_id }
            | Command::FocusWindow { window_id } => Target::Window(*window_id),
            Command::CloseTab { tab_id }
            | Command::Navigate { tab_id, .. }
            | Command::GoBack { tab_id }
            | Command::GoForward { tab_id }
            | Command::Reload { tab_id }
            | Command::SetBounds { tab_id, .. }
            | Command::TransferTab { tab_id, .. }
            | Command::RequestFocus { tab_id }
            | Command::ReorderTab { tab_id, .. } => Target::Tab(tab_id.clone()),
        }
    }

    pub fn tab_id(&self) -> Option<&TabId> {
        match self {
            Command::CreateTab { .. } | Command::CloseWindow { .. } | Command::FocusWindow { .. } => {
                None
            }
            Command::SwitchActiveTab { tab_id, .. }
            | Command::CloseTab { tab_id }
            | Command::Navigate { tab_id, .. }
            | Command::GoBack { tab_id }
            | Command::GoForward { tab_id }
            | Command::Reload { tab_id }
            | Command::SetBounds { tab_id, .. }
            | Command::TransferTab { tab_id, .. }
            | Command::RequestFocus { tab_id }
            | Command::ReorderTab { tab_id, .. } => Some(tab_id),
        }
    }

    pub fn window_id(&self) -> Option<WindowId> {
        match self.target() {
            Target::Window(w) => Some(w),
            Target::Tab(_) => None,
        }
    }
}

/// An event pushed to the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    WindowStateChanged {
        window_id: WindowId,
        snapshot: WindowSnapshot,
    },
    WindowClosed {
        window_id: WindowId,
    },
    TabCreated {
        tab_id: TabId,
        window_id: WindowId,
    },
    CommandFailed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tab_id: Option<TabId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        window_id: Option<WindowId>,
        kind: String,
        error: String,
    },
}

impl UiEvent {
    pub fn command_failed(command: &Command, err: &OrchestratorError) -> Self {
        UiEvent::CommandFailed {
            tab_id: command.tab_id().cloned(),
            window_id: command.window_id(),
            kind: err.kind().to_string(),
            error: err.to_string(),
        }
    }
}
