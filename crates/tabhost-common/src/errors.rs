use std::path::PathBuf;

use crate::id::{TabId, WindowId};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Failures of the tab/surface orchestration layer.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("invalid window: {0}")]
    InvalidWindow(WindowId),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("no live surface for tab {0}")]
    NoSuchSurface(TabId),

    #[error("transfer of tab {tab_id} failed: {source}")]
    TransferFailed {
        tab_id: TabId,
        #[source]
        source: Box<OrchestratorError>,
    },

    #[error("host error: {0}")]
    Host(String),
}

impl OrchestratorError {
    pub fn tab_not_found(tab_id: &TabId) -> Self {
        Self::NotFound(format!("tab {tab_id}"))
    }

    pub fn window_not_found(window_id: WindowId) -> Self {
        Self::NotFound(window_id.to_string())
    }

    pub fn transfer_failed(tab_id: TabId, cause: OrchestratorError) -> Self {
        Self::TransferFailed {
            tab_id,
            source: Box::new(cause),
        }
    }

    /// Stable machine-readable name, used on the UI event channel.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidWindow(_) => "invalid_window",
            Self::NotFound(_) => "not_found",
            Self::ResourceExhausted(_) => "resource_exhausted",
            Self::NoSuchSurface(_) => "no_such_surface",
            Self::TransferFailed { .. } => "transfer_failed",
            Self::Host(_) => "host",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TabhostError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
