/// Shared playback vocabulary for the Reel workspace
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// A playable item as the session sees it.
///
/// `identity` is the stable key (canonical URL or service id) used for
/// cache entries, resume records, and the seen set. Everything else is
/// presentation metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Stable identity of the item (canonical URL or id)
    pub identity: String,
    /// Display title
    pub title: String,
    /// Channel or uploader name, when known
    pub channel: Option<String>,
    /// Whether this is a live stream (live items skip trim analysis and resume)
    pub is_live: bool,
}

impl Item {
    /// Convenience constructor for a plain on-demand item
    pub fn new(identity: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            title: title.into(),
            channel: None,
            is_live: false,
        }
    }
}

/// A resolved, directly playable stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Direct playback URL handed to the engine
    pub playback_url: String,
    /// HTTP headers the engine must send when fetching the stream
    #[serde(default)]
    pub http_headers: HashMap<String, String>,
    /// Reported media duration, when the resolver knows it
    pub duration: Option<Duration>,
    /// Separate audio stream to attach alongside a video-only URL
    pub secondary_audio_url: Option<String>,
}

/// Lead-in / trailing silence boundaries from the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrimHints {
    /// Offset of the first non-silent audio; seek here after playback starts
    pub lead_in: Duration,
    /// Position at which trailing silence begins; treat reaching it as
    /// end-of-media
    pub trailing_cut: Option<Duration>,
}

impl TrimHints {
    /// No trimming at all
    pub const NONE: Self = Self {
        lead_in: Duration::ZERO,
        trailing_cut: None,
    };

    /// Whether these hints change playback in any way
    pub fn is_none(&self) -> bool {
        self.lead_in.is_zero() && self.trailing_cut.is_none()
    }
}

/// A selectable alternate audio track (dubs, audio descriptions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioTrack {
    /// Human-readable label, unique within one item's track list
    pub label: String,
    /// BCP-47-ish language tag, when the service provides one
    pub language: Option<String>,
    /// Direct URL of the audio-only stream
    pub url: String,
}

/// Persisted per-item resume state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeRecord {
    /// Last playback position
    pub position: Duration,
    /// Preferred alternate audio track label, `None` for the default track
    pub audio_track: Option<String>,
}

/// Coarse engine transport state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    /// Nothing loaded
    Idle,
    /// Media attached, not yet decoding
    Opening,
    /// Actively playing
    Playing,
    /// Paused mid-item
    Paused,
    /// Reached end of media
    Ended,
    /// Stopped by command
    Stopped,
    /// Unrecoverable engine-side failure
    Error,
}

impl EngineState {
    /// Whether media is attached and seekable (playing or paused)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }
}

/// An audio track as the engine reports it after media load.
///
/// Engine ids are only meaningful for the currently loaded media;
/// id `-1` conventionally means "disabled".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineAudioTrack {
    /// Engine-internal track id
    pub id: i32,
    /// Engine-provided description (codec, language, label)
    pub description: String,
}
