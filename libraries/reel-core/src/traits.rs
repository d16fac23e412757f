/// Collaborator traits for the Reel session controller
use crate::error::{AnalyzeError, EngineError, ResolveError, StoreError};
use crate::types::{AudioTrack, EngineAudioTrack, EngineState, Item, ResumeRecord, StreamDescriptor, TrimHints};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

/// Stream resolver trait
///
/// Implementers turn an item identity into directly playable stream URLs,
/// typically by shelling out to an extractor. All calls may block for
/// seconds and are only ever made from background tasks.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    /// Resolve the best combined (or video + secondary audio) stream
    ///
    /// # Errors
    /// Returns `ResolveError::AuthRequired` when the service demands
    /// sign-in, `Transient` for retryable network failures, `NotFound`
    /// for gone/private items.
    async fn resolve(&self, identity: &str) -> Result<StreamDescriptor, ResolveError>;

    /// Resolve an audio-only stream for the same item
    ///
    /// # Errors
    /// Same taxonomy as [`StreamResolver::resolve`].
    async fn resolve_audio(&self, identity: &str) -> Result<StreamDescriptor, ResolveError>;

    /// List alternate audio tracks (dubs, audio descriptions) for an item
    ///
    /// An empty list means the item only has its default track.
    ///
    /// # Errors
    /// Same taxonomy as [`StreamResolver::resolve`].
    async fn audio_tracks(&self, identity: &str) -> Result<Vec<AudioTrack>, ResolveError>;

    /// List items related to the given one, best first
    ///
    /// Feeds the smart-mode suggestion frontier.
    ///
    /// # Errors
    /// Same taxonomy as [`StreamResolver::resolve`].
    async fn related(&self, identity: &str) -> Result<Vec<Item>, ResolveError>;
}

/// Silence analyzer trait
///
/// Implementers inspect the head and tail of a stream and report where
/// the actual content starts and where trailing silence begins. Results
/// are advisory: any failure means "play untrimmed".
#[async_trait]
pub trait SilenceAnalyzer: Send + Sync {
    /// Analyze a resolved stream for lead-in and trailing silence
    ///
    /// # Errors
    /// Returns an error when the probe times out or the tool fails;
    /// callers fall back to [`TrimHints::NONE`].
    async fn analyze(
        &self,
        stream: &StreamDescriptor,
    ) -> Result<TrimHints, AnalyzeError>;
}

/// Resume record backend trait
///
/// A small async key-value store keyed by item identity. The session
/// never touches storage directly; it goes through this seam.
#[async_trait]
pub trait ResumeBackend: Send + Sync {
    /// Fetch the resume record for an item, if any
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    async fn get(&self, identity: &str) -> Result<Option<ResumeRecord>, StoreError>;

    /// Write or replace the resume record for an item
    ///
    /// # Errors
    /// Returns an error if the store cannot be written.
    async fn put(&self, identity: &str, record: &ResumeRecord) -> Result<(), StoreError>;

    /// Delete the resume record for an item (no-op when absent)
    ///
    /// # Errors
    /// Returns an error if the store cannot be written.
    async fn delete(&self, identity: &str) -> Result<(), StoreError>;
}

/// Events the engine pushes back to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// Playback reached the end of the loaded media
    EndOfMedia,
}

/// Playback engine trait
///
/// A thin transport facade over the real media backend. Commands are
/// synchronous and cheap (they enqueue work inside the engine);
/// asynchronous facts come back through the event sink registered with
/// [`PlaybackEngine::set_event_sink`].
pub trait PlaybackEngine: Send {
    /// Attach media and prepare it for playback
    ///
    /// Replaces any previously loaded media. `secondary_audio_url`
    /// attaches a separate audio stream as an input slave;
    /// `trailing_cut` is informational (the session enforces it).
    ///
    /// # Errors
    /// Returns an error if the engine rejects the media.
    fn load_media(
        &mut self,
        url: &str,
        http_headers: &std::collections::HashMap<String, String>,
        secondary_audio_url: Option<&str>,
        trailing_cut: Option<Duration>,
    ) -> Result<(), EngineError>;

    /// Start or resume playback
    ///
    /// # Errors
    /// Returns an error if no media is loaded or the command fails.
    fn play(&mut self) -> Result<(), EngineError>;

    /// Pause playback
    ///
    /// # Errors
    /// Returns an error if the command fails.
    fn pause(&mut self) -> Result<(), EngineError>;

    /// Stop playback and detach media
    ///
    /// # Errors
    /// Returns an error if the command fails.
    fn stop(&mut self) -> Result<(), EngineError>;

    /// Seek to an absolute position
    ///
    /// # Errors
    /// Returns an error if no media is loaded or the media is unseekable.
    fn seek(&mut self, position: Duration) -> Result<(), EngineError>;

    /// Current playback position (zero when nothing is loaded)
    fn position(&self) -> Duration;

    /// Duration of the loaded media, when the engine knows it
    fn duration(&self) -> Option<Duration>;

    /// Current transport state
    fn state(&self) -> EngineState;

    /// Set volume, 0–100
    ///
    /// # Errors
    /// Returns an error if the command fails.
    fn set_volume(&mut self, level: u8) -> Result<(), EngineError>;

    /// Set playback rate (1.0 = normal)
    ///
    /// # Errors
    /// Returns an error if the command fails.
    fn set_rate(&mut self, rate: f32) -> Result<(), EngineError>;

    /// Audio tracks of the currently loaded media
    ///
    /// Empty until the engine has parsed the media; callers poll.
    fn audio_tracks(&self) -> Vec<EngineAudioTrack>;

    /// Select an audio track by engine id
    ///
    /// # Errors
    /// Returns an error if the id is unknown to the loaded media.
    fn select_audio_track(&mut self, id: i32) -> Result<(), EngineError>;

    /// Register the channel the engine reports events on
    ///
    /// Called once before any media is loaded.
    fn set_event_sink(&mut self, sink: mpsc::UnboundedSender<EngineEvent>);
}
