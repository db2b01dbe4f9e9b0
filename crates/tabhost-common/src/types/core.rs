use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// What the UI should paint for a tab: the live surface or its snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Live,
    Frozen,
}

/// Surface-level lifecycle of one tab.
///
/// `Uninitialized -> Creating -> Live -> (Freezing -> Frozen -> Unfreezing -> Live)*
/// -> Destroying -> Destroyed`. `Destroying` is reachable from every state
/// except `Destroyed`. A create arriving while the old surface is still
/// being torn down goes `Destroying -> Creating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceState {
    #[default]
    Uninitialized,
    Creating,
    Live,
    Freezing,
    Frozen,
    Unfreezing,
    Destroying,
    Destroyed,
}

impl SurfaceState {
    /// Whether a native surface is allocated in this state.
    pub fn has_surface(self) -> bool {
        matches!(self, SurfaceState::Live | SurfaceState::Freezing)
    }

    pub fn can_transition_to(self, next: SurfaceState) -> bool {
        use SurfaceState::*;
        if next == Destroying {
            return self != Destroyed;
        }
        matches!(
            (self, next),
            (Uninitialized, Creating)
                | (Creating, Live)
                | (Creating, Destroyed)
                | (Live, Freezing)
                | (Freezing, Frozen)
                | (Freezing, Live)
                | (Frozen, Unfreezing)
                | (Unfreezing, Live)
                | (Unfreezing, Frozen)
                | (Destroying, Destroyed)
                | (Destroying, Creating)
                | (Destroyed, Creating)
        )
    }
}

/// UI-facing reference to a stored snapshot image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRef {
    pub captured_at: DateTime<Utc>,
    /// True when capture failed and a synthesized image stands in.
    pub placeholder: bool,
    /// `data:image/png;base64,...`
    pub data_uri: String,
}
