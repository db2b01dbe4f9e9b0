//! Tab orchestration for tabhost.
//!
//! Provides:
//! - [`StateSynchronizer`], the canonical per-window tab model
//! - [`FreezeService`], snapshot-and-release of hidden tabs
//! - [`TransferCoordinator`], moving tabs between windows with rollback
//! - [`FocusCoordinator`], advisory input focus routing
//! - [`Orchestrator`], the facade behind the UI command and event channels

pub mod focus;
pub mod freeze;
pub mod orchestrator;
pub mod protocol;
pub mod settings;
pub mod state;
pub mod transfer;

pub use focus::FocusCoordinator;
pub use freeze::{FreezeService, FreezeSettings};
pub use orchestrator::Orchestrator;
pub use protocol::{Command, Target, UiEvent};
pub use state::{Applied, StateSynchronizer, TabCommand, TabRecord, WindowSnapshot};
pub use transfer::TransferCoordinator;
