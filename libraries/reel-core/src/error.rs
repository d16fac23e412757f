/// Error taxonomy shared across the Reel workspace
use thiserror::Error;

/// Errors from the stream resolver.
///
/// The distinction between variants drives session behaviour: transient
/// failures are retried, auth failures halt automation, and the rest are
/// reported and (optionally) skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The backing service demands sign-in or cookies (bot checks,
    /// age gates). Never retried automatically.
    #[error("Sign-in required: {0}")]
    AuthRequired(String),

    /// Network hiccups, timeouts, throttling. Worth retrying.
    #[error("Temporary failure: {0}")]
    Transient(String),

    /// The item is gone, private, or region-locked.
    #[error("Unavailable: {0}")]
    NotFound(String),
}

impl ResolveError {
    /// Whether the session may retry the same resolution.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Create a transient error
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    /// Create a not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an auth-required error
    pub fn auth_required(msg: impl Into<String>) -> Self {
        Self::AuthRequired(msg.into())
    }
}

/// Errors from the playback engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine process or library could not be initialized
    #[error("Engine initialization failed: {0}")]
    Init(String),

    /// A transport command was rejected or failed mid-flight
    #[error("Engine command failed: {0}")]
    Command(String),
}

impl EngineError {
    /// Create a command error
    pub fn command(msg: impl Into<String>) -> Self {
        Self::Command(msg.into())
    }
}

/// Errors from the silence analyzer.
///
/// Analysis is always best-effort; callers fall back to untrimmed
/// playback on any of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyzeError {
    /// The analysis run exceeded its deadline
    #[error("Analysis timed out")]
    Timeout,

    /// The analysis tool failed or produced unparseable output
    #[error("Analysis failed: {0}")]
    Tool(String),
}

/// Errors from the resume key-value backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store rejected or failed the operation
    #[error("Resume store error: {0}")]
    Backend(String),

    /// A stored record could not be decoded
    #[error("Corrupt resume record: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Create a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}
