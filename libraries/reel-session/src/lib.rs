//! Playback session controller for Reel
//!
//! This crate drives continuous playback over remotely resolved media:
//! it owns the navigation model (sequential lists and the
//! suggestion-following smart mode), preloads and caches neighbor
//! streams, runs the transition state machine that keeps rapid
//! navigation and noisy engine events from corrupting playback, and
//! persists per-item resume state.
//!
//! The controller is an actor: [`PlaybackSession::start`] spawns the
//! event loop and returns a [`SessionHandle`] plus a stream of
//! [`SessionEvent`]s. All collaborators (stream resolver, silence
//! analyzer, playback engine, resume backend) are supplied as trait
//! objects from `reel-core`.

mod cache;
mod config;
mod controller;
mod error;
mod events;
mod navigation;
mod preload;
mod resume;

pub use cache::{ResolvedMedia, TrackCache};
pub use config::SessionConfig;
pub use controller::{PlaybackSession, SessionDeps, SessionHandle, TransitionRequest};
pub use error::{Result, SessionError};
pub use events::{SessionEvent, SessionState};
pub use navigation::{Direction, NavigationSource, SequentialList, SmartFrontier};
pub use resume::ResumeStore;
