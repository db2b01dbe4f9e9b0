//! Shared building blocks for the tabhost workspace: ids, value types, the
//! error taxonomy, and the typed in-process event bus.

pub mod errors;
pub mod events;
pub mod id;
pub mod types;

pub use errors::{ConfigError, OrchestratorError, TabhostError};
pub use events::{Event, EventBus, Subscription, SubscriptionId, Topic};
pub use id::{new_correlation_id, new_id, TabId, WindowId};
pub use types::{Color, DisplayMode, Rect, SnapshotRef, SurfaceState};

pub type Result<T> = std::result::Result<T, OrchestratorError>;
