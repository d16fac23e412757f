/// Session configuration
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunable behaviour and timing for a playback session.
///
/// The timing fields exist because the media backends this sits on are
/// noisy: end-of-media can fire during media swaps and right after
/// seeks, and track lists populate asynchronously after load. The
/// defaults are the values that proved stable in practice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Resolve audio-only streams instead of video
    pub audio_only: bool,
    /// Automatically advance to the next item when one ends
    pub auto_advance: bool,
    /// Restart the current item when it ends (mutually exclusive with
    /// `auto_advance`)
    pub repeat_one: bool,
    /// Load and apply per-item resume records
    pub resume_enabled: bool,
    /// Run the silence analyzer and honor its trim hints
    pub skip_silence: bool,
    /// Initial volume, 0–100
    pub volume: u8,

    /// Minimum gap between repeated "still loading" notices
    pub loading_notice_interval: Duration,
    /// Minimum gap between repeated failure notices while skipping
    pub error_notice_interval: Duration,
    /// Window after a media swap (or seek) during which end-of-media
    /// events are treated as engine noise and dropped
    pub end_settle_window: Duration,
    /// End-suppression window armed around every seek
    pub seek_guard_window: Duration,
    /// Minimum gap between automatic advances
    pub auto_advance_debounce: Duration,
    /// Pause before auto-skipping past a failed item
    pub skip_grace: Duration,
    /// Resolution attempts for transient failures
    pub resolve_attempts: u32,
    /// Interval between engine-readiness polls
    pub engine_poll_interval: Duration,
    /// Readiness polls before giving up on a deferred action
    pub engine_poll_attempts: u32,
    /// Polls for the engine's audio-track list to populate
    pub track_poll_attempts: u32,
    /// Positions at or below this are "effectively at the start" and
    /// clear the resume record instead of saving it
    pub resume_clear_threshold: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            audio_only: false,
            auto_advance: true,
            repeat_one: false,
            resume_enabled: true,
            skip_silence: false,
            volume: 80,
            loading_notice_interval: Duration::from_millis(1500),
            error_notice_interval: Duration::from_millis(1500),
            end_settle_window: Duration::from_millis(1500),
            seek_guard_window: Duration::from_millis(700),
            auto_advance_debounce: Duration::from_millis(2000),
            skip_grace: Duration::from_millis(1000),
            resolve_attempts: 3,
            engine_poll_interval: Duration::from_millis(500),
            engine_poll_attempts: 20,
            track_poll_attempts: 10,
            resume_clear_threshold: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let config = SessionConfig::default();
        assert!(config.auto_advance);
        assert!(!config.repeat_one);
        assert_eq!(config.volume, 80);
        assert_eq!(config.resolve_attempts, 3);
        assert!(config.end_settle_window > config.seek_guard_window);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = SessionConfig {
            audio_only: true,
            volume: 55,
            ..SessionConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: SessionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
