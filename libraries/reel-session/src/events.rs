/// Session events emitted to the embedding shell
use serde::{Deserialize, Serialize};

/// Coarse session state, as reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No item loaded yet
    Idle,
    /// A transition is in flight
    Loading,
    /// An item is attached and playing (or paused by the user)
    Playing,
    /// The current item finished and nothing replaced it
    Ended,
    /// The last transition failed
    Failed,
}

/// Events emitted by the session controller.
///
/// The shell renders these however it likes (widgets, speech output,
/// logs); the controller never talks to a UI directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The session state machine moved
    StateChanged { state: SessionState },

    /// A new item became current
    TrackChanged {
        identity: String,
        title: String,
        /// Identity of the item that was current before, if any
        previous: Option<String>,
    },

    /// A short user-facing message (debounced at the source)
    Notice { message: String },

    /// A transition failed and will not be retried automatically
    TransitionFailed { identity: String, message: String },

    /// The smart-mode suggestion list was refreshed
    SuggestedListChanged { count: usize },

    /// Periodic position report while media is attached
    PositionUpdate {
        position_ms: u64,
        duration_ms: Option<u64>,
    },

    /// Volume changed (echoed so the shell can persist it)
    VolumeChanged { level: u8 },

    /// An alternate audio track was selected, `label` `None` for default
    AudioTrackSwitched { label: Option<String> },

    /// The session shut down and saved its final state
    SessionEnded,
}
