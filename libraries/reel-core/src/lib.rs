//! Core types and collaborator traits for Reel
//!
//! This crate defines the shared vocabulary of the workspace: playable
//! items, resolved streams, trim hints, resume records, the error
//! taxonomy, and the traits the session controller drives its
//! collaborators through. It contains no session logic.

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types at the crate root
pub use error::{AnalyzeError, EngineError, ResolveError, StoreError};
pub use traits::{EngineEvent, PlaybackEngine, ResumeBackend, SilenceAnalyzer, StreamResolver};
pub use types::{
    AudioTrack, EngineAudioTrack, EngineState, Item, ResumeRecord, StreamDescriptor, TrimHints,
};
