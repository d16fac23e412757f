/// Session-level errors
use reel_core::{EngineError, ResolveError, StoreError};
use thiserror::Error;

/// Result type alias using `SessionError`
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors surfaced by the session controller itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The playback engine rejected a command
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Stream resolution failed
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The resume store failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A session cannot start without at least one item
    #[error("Cannot start a session with no items")]
    EmptySource,

    /// The sequential start index points outside the item list
    #[error("Start index {index} out of range for {len} items")]
    StartIndexOutOfRange { index: usize, len: usize },
}
