/// Resume record façade
use reel_core::{ResumeBackend, ResumeRecord, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Policy wrapper around the resume backend.
///
/// Encapsulates the save rules: a position at (or within the threshold
/// of) the start means "watched from the beginning next time" and
/// clears the record, as does a position at the very end. Everything
/// else is persisted together with the preferred audio track.
#[derive(Clone)]
pub struct ResumeStore {
    backend: Arc<dyn ResumeBackend>,
    clear_threshold: Duration,
}

impl ResumeStore {
    pub fn new(backend: Arc<dyn ResumeBackend>, clear_threshold: Duration) -> Self {
        Self {
            backend,
            clear_threshold,
        }
    }

    /// Load the record for an item.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be read.
    pub async fn load(&self, identity: &str) -> Result<Option<ResumeRecord>, StoreError> {
        self.backend.get(identity).await
    }

    /// Save or clear the record depending on where playback stopped.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be written.
    pub async fn save(
        &self,
        identity: &str,
        position: Duration,
        duration: Option<Duration>,
        audio_track: Option<String>,
    ) -> Result<(), StoreError> {
        let at_start = position <= self.clear_threshold;
        let at_end = duration
            .is_some_and(|d| d > self.clear_threshold && position >= d - self.clear_threshold);

        if at_start || at_end {
            debug!(identity, ?position, "clearing resume record");
            return self.backend.delete(identity).await;
        }

        let record = ResumeRecord {
            position,
            audio_track,
        };
        debug!(identity, ?position, "saving resume record");
        self.backend.put(identity, &record).await
    }

    /// Drop the record for an item outright.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be written.
    pub async fn clear(&self, identity: &str) -> Result<(), StoreError> {
        self.backend.delete(identity).await
    }
}
