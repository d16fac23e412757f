/// The playback session controller: a single-consumer event loop that
/// owns navigation, the track cache, the transition state machine, and
/// the engine.
///
/// All background work (resolution, preloading, related fetches, resume
/// loads, readiness polls) runs in spawned tasks that report back
/// through the outcome channel. Nothing outside this loop mutates
/// session state, so every race collapses to message ordering plus the
/// fence check.
use crate::cache::{ResolvedMedia, TrackCache};
use crate::config::SessionConfig;
use crate::events::{SessionEvent, SessionState};
use crate::navigation::{Direction, NavigationSource};
use crate::preload;
use crate::resume::ResumeStore;
use reel_core::{
    AudioTrack, EngineEvent, EngineState, Item, PlaybackEngine, ResolveError, ResumeBackend,
    ResumeRecord, SilenceAnalyzer, StreamResolver,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// External collaborators a session is built from.
pub struct SessionDeps {
    pub engine: Box<dyn PlaybackEngine>,
    pub resolver: Arc<dyn StreamResolver>,
    pub analyzer: Option<Arc<dyn SilenceAnalyzer>>,
    pub resume: Arc<dyn ResumeBackend>,
}

/// What the user asked to play.
#[derive(Debug, Clone)]
pub enum TransitionRequest {
    /// The next item from the navigation source
    Next,
    /// The previous item from the navigation source
    Previous,
    /// A specific item, e.g. picked from the suggestion list.
    /// Unlike `Next`/`Previous`, an explicit pick supersedes an
    /// in-flight load instead of being rejected.
    Explicit(Item),
}

/// Commands accepted by a running session.
#[derive(Debug)]
pub(crate) enum SessionCommand {
    Transition(TransitionRequest),
    TogglePause,
    SeekTo(Duration),
    SetVolume(u8),
    StepVolume(i8),
    SetRate(f32),
    SetRepeatOne(bool),
    SetAutoAdvance(bool),
    SetShuffle(bool),
    SelectAudioTrack(Option<String>),
    Shutdown,
}

/// Cheap, cloneable remote control for a running session.
///
/// All methods are fire-and-forget; results come back on the event
/// stream. Sends to a finished session are silently dropped.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    pub fn request_transition(&self, request: TransitionRequest) {
        self.send(SessionCommand::Transition(request));
    }

    pub fn toggle_pause(&self) {
        self.send(SessionCommand::TogglePause);
    }

    pub fn seek_to(&self, position: Duration) {
        self.send(SessionCommand::SeekTo(position));
    }

    pub fn set_volume(&self, level: u8) {
        self.send(SessionCommand::SetVolume(level));
    }

    /// Nudge the volume by a signed amount, clamped to 0..=100.
    pub fn step_volume(&self, delta: i8) {
        self.send(SessionCommand::StepVolume(delta));
    }

    pub fn set_rate(&self, rate: f32) {
        self.send(SessionCommand::SetRate(rate));
    }

    pub fn set_repeat_one(&self, enabled: bool) {
        self.send(SessionCommand::SetRepeatOne(enabled));
    }

    pub fn set_auto_advance(&self, enabled: bool) {
        self.send(SessionCommand::SetAutoAdvance(enabled));
    }

    /// Toggle shuffled order on a sequential source.
    pub fn set_shuffle(&self, enabled: bool) {
        self.send(SessionCommand::SetShuffle(enabled));
    }

    /// Select an alternate audio track by label; `None` restores the
    /// default track.
    pub fn select_audio_track(&self, label: Option<String>) {
        self.send(SessionCommand::SelectAudioTrack(label));
    }

    /// Stop playback, save resume state, and end the session.
    pub fn shutdown(&self) {
        self.send(SessionCommand::Shutdown);
    }

    fn send(&self, command: SessionCommand) {
        let _ = self.commands.send(command);
    }
}

/// Results posted back to the loop by background tasks.
#[derive(Debug)]
pub(crate) enum TaskOutcome {
    /// Foreground resolution finished (successfully or not)
    Resolved {
        item: Item,
        result: Result<ResolvedMedia, ResolveError>,
    },
    /// A preload sweep prepared one neighbor
    Preloaded {
        origin: String,
        identity: String,
        media: ResolvedMedia,
    },
    /// A preload sweep ended (its guard is already released)
    PreloadFinished { origin: String },
    /// The smart-mode suggestion fetch finished
    RelatedFetched {
        origin: String,
        result: Result<Vec<Item>, ResolveError>,
    },
    /// The alternate-audio-track listing finished
    AudioTracksFetched {
        identity: String,
        label: String,
        result: Result<Vec<AudioTrack>, ResolveError>,
    },
    /// A resume record was found for the current item
    ResumeLoaded { identity: String, record: ResumeRecord },
    /// Engine readiness re-check for a deferred action
    EnginePoll {
        identity: String,
        action: DeferredAction,
        attempts_left: u32,
    },
    /// The grace period after a failure elapsed; skip forward
    AutoSkip { identity: String },
}

/// Work that must wait until the engine has actually attached media.
///
/// The engine reports `Playing` asynchronously after `load_media`;
/// these actions are retried on a poll interval until it does (or the
/// attempt budget runs out).
#[derive(Debug, Clone)]
pub(crate) enum DeferredAction {
    /// Jump over leading silence once playback starts
    LeadInSeek { lead_in: Duration },
    /// Apply a resume record: seek, then restore the audio track
    ApplyResume { record: ResumeRecord },
    /// Plain deferred seek (restart-then-seek, repeat-one)
    SeekTo { position: Duration },
    /// Restore position and pause state after an audio hot-swap,
    /// then select the named engine track
    FinishAudioSwap {
        position: Duration,
        was_playing: bool,
        label: Option<String>,
        language: Option<String>,
    },
    /// Wait for the engine track list to populate and pick a track
    SelectEngineTrack {
        label: String,
        language: Option<String>,
    },
}

/// Internal state of the transition machine.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ControlState {
    Idle,
    Loading { target: String },
    Playing,
    Ended,
    Failed,
}

impl ControlState {
    fn public(&self) -> SessionState {
        match self {
            Self::Idle => SessionState::Idle,
            Self::Loading { .. } => SessionState::Loading,
            Self::Playing => SessionState::Playing,
            Self::Ended => SessionState::Ended,
            Self::Failed => SessionState::Failed,
        }
    }
}

/// Rate limiter for repeatable user-facing notices.
struct NoticeGate {
    interval: Duration,
    last: Option<Instant>,
}

impl NoticeGate {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    fn allow(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Entry point for running a playback session.
pub struct PlaybackSession;

impl PlaybackSession {
    /// Spawn a session over the given navigation source.
    ///
    /// Playback of the source's current item begins immediately. The
    /// returned handle controls the session; the receiver carries its
    /// events. The session ends on [`SessionHandle::shutdown`] or when
    /// every handle is dropped.
    pub fn start(
        mut deps: SessionDeps,
        source: NavigationSource,
        config: SessionConfig,
    ) -> (SessionHandle, mpsc::UnboundedReceiver<SessionEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();

        deps.engine.set_event_sink(engine_tx);

        let controller = SessionController {
            volume: config.volume.min(100),
            loading_gate: NoticeGate::new(config.loading_notice_interval),
            error_gate: NoticeGate::new(config.error_notice_interval),
            resume: ResumeStore::new(deps.resume, config.resume_clear_threshold),
            nav: source,
            cache: TrackCache::new(),
            engine: deps.engine,
            resolver: deps.resolver,
            analyzer: deps.analyzer,
            config,
            events: event_tx,
            outcomes: outcome_tx,
            state: ControlState::Idle,
            fence: None,
            current_item: None,
            current_media: None,
            trailing_cut: None,
            current_audio_label: None,
            suppress_end_until: None,
            last_auto_advance: None,
            fetching_related: false,
            preload_guard: Arc::new(AtomicBool::new(false)),
        };
        tokio::spawn(controller.run(command_rx, engine_rx, outcome_rx));

        (
            SessionHandle {
                commands: command_tx,
            },
            event_rx,
        )
    }
}

struct SessionController {
    nav: NavigationSource,
    cache: TrackCache,
    engine: Box<dyn PlaybackEngine>,
    resolver: Arc<dyn StreamResolver>,
    analyzer: Option<Arc<dyn SilenceAnalyzer>>,
    resume: ResumeStore,
    config: SessionConfig,
    events: mpsc::UnboundedSender<SessionEvent>,
    outcomes: mpsc::UnboundedSender<TaskOutcome>,

    state: ControlState,
    /// Identity of the most recently requested target. Any task result
    /// tagged with a different identity is stale and gets dropped.
    fence: Option<String>,
    /// The item whose media is attached to the engine. Lags behind
    /// `nav.current()` while a transition is resolving.
    current_item: Option<Item>,
    /// The stream currently attached to the engine (kept for hot-swaps)
    current_media: Option<ResolvedMedia>,
    /// Trailing-silence boundary enforced by the tick watchdog
    trailing_cut: Option<Duration>,
    /// Label of the selected alternate audio track, `None` for default
    current_audio_label: Option<String>,
    /// End-of-media events before this instant are engine noise
    suppress_end_until: Option<Instant>,
    last_auto_advance: Option<Instant>,
    loading_gate: NoticeGate,
    error_gate: NoticeGate,
    fetching_related: bool,
    volume: u8,
    preload_guard: Arc<AtomicBool>,
}

impl SessionController {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        mut engine_events: mpsc::UnboundedReceiver<EngineEvent>,
        mut outcomes: mpsc::UnboundedReceiver<TaskOutcome>,
    ) {
        let mut tick = time::interval(Duration::from_secs(1));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let first = self.nav.current().clone();
        info!(identity = %first.identity, "session started");
        self.start_loading(first);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                event = engine_events.recv() => {
                    if let Some(event) = event {
                        self.handle_engine_event(event);
                    }
                }
                outcome = outcomes.recv() => {
                    if let Some(outcome) = outcome {
                        self.handle_outcome(outcome);
                    }
                }
                _ = tick.tick() => self.on_tick(),
            }
        }

        self.finalize().await;
    }

    // === command handling ===

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Transition(request) => self.request_transition(request, false),
            SessionCommand::TogglePause => self.toggle_pause(),
            SessionCommand::SeekTo(position) => self.seek_command(position),
            SessionCommand::SetVolume(level) => self.set_volume(level),
            SessionCommand::StepVolume(delta) => self.step_volume(delta),
            SessionCommand::SetRate(rate) => {
                if let Err(err) = self.engine.set_rate(rate) {
                    warn!(error = %err, "rate change failed");
                }
            }
            SessionCommand::SetRepeatOne(enabled) => {
                self.config.repeat_one = enabled;
                if enabled {
                    self.config.auto_advance = false;
                }
                debug!(enabled, "repeat-one toggled");
            }
            SessionCommand::SetAutoAdvance(enabled) => {
                self.config.auto_advance = enabled;
                if enabled {
                    self.config.repeat_one = false;
                }
                debug!(enabled, "auto-advance toggled");
            }
            SessionCommand::SetShuffle(enabled) => {
                self.nav.set_shuffled(enabled);
                debug!(enabled, "shuffle toggled");
                // the upcoming neighbor changed
                self.cache.invalidate();
                self.start_preload();
            }
            SessionCommand::SelectAudioTrack(label) => self.select_audio_track(label),
            // handled in the run loop
            SessionCommand::Shutdown => {}
        }
    }

    fn toggle_pause(&mut self) {
        match self.engine.state() {
            EngineState::Playing => {
                if let Err(err) = self.engine.pause() {
                    warn!(error = %err, "pause failed");
                } else {
                    self.notice("Paused");
                }
            }
            EngineState::Paused | EngineState::Stopped | EngineState::Ended => {
                if let Err(err) = self.engine.play() {
                    warn!(error = %err, "resume failed");
                } else {
                    self.notice("Playing");
                }
            }
            _ => {}
        }
    }

    fn set_volume(&mut self, level: u8) {
        let level = level.min(100);
        if let Err(err) = self.engine.set_volume(level) {
            warn!(error = %err, "volume change failed");
            return;
        }
        self.volume = level;
        self.emit(SessionEvent::VolumeChanged { level });
    }

    fn step_volume(&mut self, delta: i8) {
        let level = (i16::from(self.volume) + i16::from(delta)).clamp(0, 100);
        self.set_volume(level as u8);
    }

    fn seek_command(&mut self, position: Duration) {
        match self.engine.state() {
            state if state.is_active() => self.guarded_seek(position),
            EngineState::Ended | EngineState::Stopped => {
                // restart first, seek once the engine is ready again
                if self.engine.play().is_ok() {
                    self.defer(
                        DeferredAction::SeekTo { position },
                        self.config.engine_poll_attempts,
                    );
                }
            }
            _ => {}
        }
    }

    /// Seek with the two protections every seek needs: clamp the target
    /// short of the absolute end (seeking onto the end fires a spurious
    /// end-of-media) and arm the end-suppression window while buffers
    /// settle.
    fn guarded_seek(&mut self, position: Duration) {
        let target = match self.engine.duration() {
            Some(duration) if !duration.is_zero() => position.min(duration.mul_f64(0.99)),
            _ => position,
        };
        self.arm_suppression(self.config.seek_guard_window);
        if let Err(err) = self.engine.seek(target) {
            warn!(error = %err, "seek failed");
        }
    }

    fn arm_suppression(&mut self, window: Duration) {
        let until = Instant::now() + window;
        self.suppress_end_until = Some(match self.suppress_end_until {
            Some(existing) => existing.max(until),
            None => until,
        });
    }

    // === transitions ===

    fn request_transition(&mut self, request: TransitionRequest, auto: bool) {
        if auto {
            if let Some(last) = self.last_auto_advance {
                if last.elapsed() < self.config.auto_advance_debounce {
                    debug!("auto-advance debounced");
                    return;
                }
            }
            self.last_auto_advance = Some(Instant::now());
        }

        if matches!(self.state, ControlState::Loading { .. })
            && !matches!(request, TransitionRequest::Explicit(_))
        {
            if self.loading_gate.allow() {
                self.notice("Please wait, the video is still loading");
            }
            return;
        }

        let target = match request {
            TransitionRequest::Next => match self.nav.advance(Direction::Next) {
                Some(item) => item,
                None => {
                    self.no_next_available(auto);
                    return;
                }
            },
            TransitionRequest::Previous => match self.nav.advance(Direction::Previous) {
                Some(item) => item,
                None => {
                    self.notice("No previous video");
                    return;
                }
            },
            TransitionRequest::Explicit(item) => {
                if !self.nav.jump_to(&item) {
                    warn!(identity = %item.identity, "requested item is not in the list");
                    return;
                }
                item
            }
        };
        self.start_loading(target);
    }

    fn no_next_available(&mut self, auto: bool) {
        if self.nav.is_smart() && self.fetching_related {
            if self.loading_gate.allow() {
                self.notice("Fetching suggested videos, please wait");
            }
            return;
        }
        self.notice(if self.nav.is_smart() {
            "No more suggestions"
        } else {
            "No more videos"
        });
        if auto {
            if let Err(err) = self.engine.stop() {
                warn!(error = %err, "stop failed");
            }
            self.set_state(ControlState::Ended);
        }
    }

    fn start_loading(&mut self, item: Item) {
        info!(identity = %item.identity, title = %item.title, "loading track");
        self.fence = Some(item.identity.clone());
        self.set_state(ControlState::Loading {
            target: item.identity.clone(),
        });

        if let Some(media) = self.cache.try_take(&item.identity) {
            self.attach(item, media);
            return;
        }

        self.notice("Loading...");
        let resolver = Arc::clone(&self.resolver);
        let analyzer = self.active_analyzer();
        let audio_only = self.config.audio_only;
        let attempts = self.config.resolve_attempts;
        let outcomes = self.outcomes.clone();
        tokio::spawn(async move {
            let result = preload::resolve_with_retry(
                resolver.as_ref(),
                analyzer.as_deref(),
                audio_only,
                &item,
                attempts,
            )
            .await;
            let _ = outcomes.send(TaskOutcome::Resolved { item, result });
        });
    }

    /// Hand a prepared stream to the engine and make its item current.
    fn attach(&mut self, item: Item, media: ResolvedMedia) {
        // neighbor entries were computed relative to the previous item
        self.cache.invalidate();
        // the swap itself can fire a bogus end-of-media
        self.arm_suppression(self.config.end_settle_window);

        let descriptor = &media.descriptor;
        if let Err(err) = self.engine.load_media(
            &descriptor.playback_url,
            &descriptor.http_headers,
            descriptor.secondary_audio_url.as_deref(),
            media.trim.trailing_cut,
        ) {
            self.transition_failed(&item, err.to_string(), true);
            return;
        }
        if let Err(err) = self.engine.play() {
            self.transition_failed(&item, err.to_string(), true);
            return;
        }
        if let Err(err) = self.engine.set_volume(self.volume) {
            warn!(error = %err, "volume restore failed");
        }

        let lead_in = media.trim.lead_in;
        self.trailing_cut = media.trim.trailing_cut;
        self.current_media = Some(media);
        self.current_audio_label = None;

        let previous = self.current_item.replace(item.clone()).map(|i| i.identity);
        self.set_state(ControlState::Playing);
        self.emit(SessionEvent::TrackChanged {
            identity: item.identity.clone(),
            title: item.title.clone(),
            previous,
        });

        if !lead_in.is_zero() {
            self.defer(
                DeferredAction::LeadInSeek { lead_in },
                self.config.engine_poll_attempts,
            );
        }

        if self.config.resume_enabled && !item.is_live {
            let store = self.resume.clone();
            let identity = item.identity.clone();
            let outcomes = self.outcomes.clone();
            tokio::spawn(async move {
                match store.load(&identity).await {
                    Ok(Some(record)) => {
                        let _ = outcomes.send(TaskOutcome::ResumeLoaded { identity, record });
                    }
                    Ok(None) => {}
                    Err(err) => warn!(identity, error = %err, "resume load failed"),
                }
            });
        }

        if self.nav.is_smart() {
            self.fetch_related(&item.identity);
        }
        self.start_preload();
    }

    fn fetch_related(&mut self, identity: &str) {
        self.fetching_related = true;
        let resolver = Arc::clone(&self.resolver);
        let origin = identity.to_string();
        let outcomes = self.outcomes.clone();
        tokio::spawn(async move {
            let result = resolver.related(&origin).await;
            let _ = outcomes.send(TaskOutcome::RelatedFetched { origin, result });
        });
    }

    fn transition_failed(&mut self, item: &Item, message: String, skippable: bool) {
        warn!(identity = %item.identity, message, "transition failed");
        self.set_state(ControlState::Failed);

        let can_skip = skippable
            && self.config.auto_advance
            && self.nav.peek(Direction::Next).is_some();
        if can_skip {
            if self.error_gate.allow() {
                self.notice(format!("{message}. Skipping"));
            }
            let outcomes = self.outcomes.clone();
            let identity = item.identity.clone();
            let grace = self.config.skip_grace;
            tokio::spawn(async move {
                time::sleep(grace).await;
                let _ = outcomes.send(TaskOutcome::AutoSkip { identity });
            });
        } else {
            self.emit(SessionEvent::TransitionFailed {
                identity: item.identity.clone(),
                message,
            });
        }
    }

    // === task outcomes ===

    fn handle_outcome(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Resolved { item, result } => {
                if self.fence.as_deref() != Some(item.identity.as_str()) {
                    debug!(identity = %item.identity, "discarding stale resolution");
                    return;
                }
                match result {
                    Ok(media) => self.attach(item, media),
                    Err(err) => {
                        let skippable = !matches!(err, ResolveError::AuthRequired(_));
                        self.transition_failed(&item, err.to_string(), skippable);
                    }
                }
            }
            TaskOutcome::Preloaded {
                origin,
                identity,
                media,
            } => {
                if self.current_identity() == origin {
                    self.cache.insert(identity, media);
                } else {
                    debug!(identity, "discarding preload from a stale sweep");
                }
            }
            TaskOutcome::PreloadFinished { origin } => {
                debug!(origin, "preload sweep finished");
            }
            TaskOutcome::RelatedFetched { origin, result } => {
                self.related_fetched(&origin, result);
            }
            TaskOutcome::AudioTracksFetched {
                identity,
                label,
                result,
            } => self.audio_tracks_fetched(&identity, &label, result),
            TaskOutcome::ResumeLoaded { identity, record } => {
                if self.current_identity() == identity && self.state == ControlState::Playing {
                    debug!(identity, position = ?record.position, "resume record found");
                    self.defer(
                        DeferredAction::ApplyResume { record },
                        self.config.engine_poll_attempts,
                    );
                }
            }
            TaskOutcome::EnginePoll {
                identity,
                action,
                attempts_left,
            } => self.engine_poll(identity, action, attempts_left),
            TaskOutcome::AutoSkip { identity } => {
                if self.current_identity() == identity
                    && self.state == ControlState::Failed
                    && self.config.auto_advance
                {
                    self.request_transition(TransitionRequest::Next, false);
                }
            }
        }
    }

    fn related_fetched(&mut self, origin: &str, result: Result<Vec<Item>, ResolveError>) {
        self.fetching_related = false;
        if self.current_identity() != origin {
            debug!(origin, "discarding stale suggestion list");
            return;
        }
        match result {
            Ok(items) if !items.is_empty() => {
                let count = items.len();
                if let NavigationSource::Smart(frontier) = &mut self.nav {
                    frontier.set_frontier(items);
                }
                self.emit(SessionEvent::SuggestedListChanged { count });
                // the upcoming neighbor may only be known now
                self.start_preload();
            }
            Ok(_) => debug!(origin, "empty suggestion list"),
            Err(err) => warn!(origin, error = %err, "suggestion fetch failed"),
        }
    }

    // === audio hot-swap ===

    fn select_audio_track(&mut self, label: Option<String>) {
        match label {
            None => self.hot_swap(None),
            Some(label) => {
                let identity = self.current_identity();
                self.notice("Fetching audio tracks, please wait");
                let resolver = Arc::clone(&self.resolver);
                let outcomes = self.outcomes.clone();
                tokio::spawn(async move {
                    let result = resolver.audio_tracks(&identity).await;
                    let _ = outcomes.send(TaskOutcome::AudioTracksFetched {
                        identity,
                        label,
                        result,
                    });
                });
            }
        }
    }

    fn audio_tracks_fetched(
        &mut self,
        identity: &str,
        label: &str,
        result: Result<Vec<AudioTrack>, ResolveError>,
    ) {
        if self.current_identity() != identity {
            debug!(identity, "discarding stale audio track list");
            return;
        }
        match result {
            Ok(tracks) => match tracks.into_iter().find(|t| t.label == label) {
                Some(track) => self.hot_swap(Some(track)),
                None => self.notice(format!("No audio track named {label}")),
            },
            Err(err) => self.notice(format!("Could not fetch audio tracks: {err}")),
        }
    }

    /// Re-attach the current media with a different audio slave, then
    /// restore position and pause state once the engine comes back.
    fn hot_swap(&mut self, track: Option<AudioTrack>) {
        let Some(media) = self.current_media.clone() else {
            return;
        };
        let position = self.engine.position();
        let duration = self.engine.duration();
        let was_playing = self.engine.state() == EngineState::Playing;

        // the stop/load pair below fires end-of-media noise
        self.arm_suppression(self.config.end_settle_window);
        if let Err(err) = self.engine.stop() {
            warn!(error = %err, "stop before audio swap failed");
        }
        let secondary = match &track {
            Some(t) => Some(t.url.as_str()),
            None => media.descriptor.secondary_audio_url.as_deref(),
        };
        if let Err(err) = self.engine.load_media(
            &media.descriptor.playback_url,
            &media.descriptor.http_headers,
            secondary,
            self.trailing_cut,
        ) {
            warn!(error = %err, "audio swap reload failed");
            self.notice("Audio track switch failed");
            return;
        }
        if let Err(err) = self.engine.play() {
            warn!(error = %err, "restart after audio swap failed");
            return;
        }
        if let Err(err) = self.engine.set_volume(self.volume) {
            warn!(error = %err, "volume restore failed");
        }

        let (label, language) = match &track {
            Some(t) => (Some(t.label.clone()), t.language.clone()),
            None => (None, None),
        };
        self.current_audio_label = label.clone();
        self.defer(
            DeferredAction::FinishAudioSwap {
                position,
                was_playing,
                label: label.clone(),
                language,
            },
            self.config.engine_poll_attempts,
        );

        // remember the preference together with the position, keyed by
        // the attached item (navigation may already be mid-transition)
        if self.config.resume_enabled {
            let store = self.resume.clone();
            let identity = self
                .current_item
                .as_ref()
                .map_or_else(|| self.current_identity(), |i| i.identity.clone());
            let preference = label.clone();
            tokio::spawn(async move {
                if let Err(err) = store.save(&identity, position, duration, preference).await {
                    warn!(identity, error = %err, "resume save failed");
                }
            });
        }
        self.emit(SessionEvent::AudioTrackSwitched { label });
    }

    // === deferred actions ===

    fn defer(&self, action: DeferredAction, attempts: u32) {
        self.retry_poll(self.current_identity(), action, attempts);
    }

    fn retry_poll(&self, identity: String, action: DeferredAction, attempts_left: u32) {
        if attempts_left == 0 {
            debug!(identity, ?action, "gave up waiting for the engine");
            return;
        }
        let outcomes = self.outcomes.clone();
        let interval = self.config.engine_poll_interval;
        tokio::spawn(async move {
            time::sleep(interval).await;
            let _ = outcomes.send(TaskOutcome::EnginePoll {
                identity,
                action,
                attempts_left: attempts_left - 1,
            });
        });
    }

    fn engine_poll(&mut self, identity: String, action: DeferredAction, attempts_left: u32) {
        if self.current_identity() != identity {
            debug!(identity, ?action, "dropping deferred action for a stale item");
            return;
        }
        let ready = self.engine.state().is_active();
        match action {
            DeferredAction::LeadInSeek { lead_in } => {
                if !ready {
                    self.retry_poll(identity, DeferredAction::LeadInSeek { lead_in }, attempts_left);
                } else if self.engine.position() < lead_in {
                    debug!(?lead_in, "skipping lead-in silence");
                    self.guarded_seek(lead_in);
                }
            }
            DeferredAction::ApplyResume { record } => {
                if ready {
                    debug!(position = ?record.position, "resuming from saved position");
                    self.guarded_seek(record.position);
                    if let Some(label) = record.audio_track {
                        self.select_audio_track(Some(label));
                    }
                } else {
                    self.retry_poll(identity, DeferredAction::ApplyResume { record }, attempts_left);
                }
            }
            DeferredAction::SeekTo { position } => {
                if ready {
                    self.guarded_seek(position);
                } else {
                    self.retry_poll(identity, DeferredAction::SeekTo { position }, attempts_left);
                }
            }
            DeferredAction::FinishAudioSwap {
                position,
                was_playing,
                label,
                language,
            } => {
                if ready {
                    if !position.is_zero() {
                        self.guarded_seek(position);
                    }
                    if !was_playing {
                        if let Err(err) = self.engine.pause() {
                            warn!(error = %err, "pause restore failed");
                        }
                    }
                    if let Some(label) = label {
                        self.defer(
                            DeferredAction::SelectEngineTrack { label, language },
                            self.config.track_poll_attempts,
                        );
                    }
                } else {
                    self.retry_poll(
                        identity,
                        DeferredAction::FinishAudioSwap {
                            position,
                            was_playing,
                            label,
                            language,
                        },
                        attempts_left,
                    );
                }
            }
            DeferredAction::SelectEngineTrack { label, language } => {
                self.select_engine_track(identity, label, language, attempts_left);
            }
        }
    }

    /// Find the freshly attached slave in the engine's track list.
    ///
    /// The list populates asynchronously after load, so misses are
    /// retried. Matching is by language tag or label substring against
    /// the engine's free-form description; when neither matches but an
    /// extra track appeared, the last one is the attached slave.
    fn select_engine_track(
        &mut self,
        identity: String,
        label: String,
        language: Option<String>,
        attempts_left: u32,
    ) {
        let tracks: Vec<_> = self
            .engine
            .audio_tracks()
            .into_iter()
            .filter(|t| t.id >= 0)
            .collect();

        let matched = tracks
            .iter()
            .find(|t| {
                let description = t.description.to_lowercase();
                language
                    .as_ref()
                    .is_some_and(|l| description.contains(&l.to_lowercase()))
                    || description.contains(&label.to_lowercase())
            })
            .or_else(|| if tracks.len() > 1 { tracks.last() } else { None });

        match matched {
            Some(track) => {
                let id = track.id;
                debug!(id, label, "selecting engine audio track");
                if let Err(err) = self.engine.select_audio_track(id) {
                    warn!(error = %err, "audio track selection failed");
                }
            }
            None => self.retry_poll(
                identity,
                DeferredAction::SelectEngineTrack { label, language },
                attempts_left,
            ),
        }
    }

    // === engine events and the tick ===

    fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::EndOfMedia => {
                if let Some(until) = self.suppress_end_until {
                    if Instant::now() < until {
                        debug!("end-of-media suppressed inside the settle window");
                        return;
                    }
                }
                if matches!(self.state, ControlState::Loading { .. }) {
                    debug!("end-of-media ignored while loading");
                    return;
                }
                self.media_ended();
            }
        }
    }

    fn media_ended(&mut self) {
        debug!("end of media");
        if self.config.repeat_one {
            if self.engine.state().is_active() {
                self.guarded_seek(Duration::ZERO);
            } else {
                if let Err(err) = self.engine.play() {
                    warn!(error = %err, "repeat restart failed");
                    return;
                }
                self.defer(
                    DeferredAction::SeekTo {
                        position: Duration::ZERO,
                    },
                    self.config.engine_poll_attempts,
                );
            }
            // the watchdog boundary still applies to the replay
            self.trailing_cut = self
                .current_media
                .as_ref()
                .and_then(|m| m.trim.trailing_cut);
            return;
        }

        if self.config.auto_advance {
            self.request_transition(TransitionRequest::Next, true);
        } else {
            if let Err(err) = self.engine.stop() {
                warn!(error = %err, "stop at end of media failed");
            }
            self.set_state(ControlState::Ended);
        }
    }

    fn on_tick(&mut self) {
        if let Some(cut) = self.trailing_cut {
            if self.engine.state() == EngineState::Playing && self.engine.position() >= cut {
                debug!(?cut, "trailing silence reached, ending early");
                self.trailing_cut = None;
                self.media_ended();
                return;
            }
        }
        if self.engine.state().is_active() {
            self.emit(SessionEvent::PositionUpdate {
                position_ms: self.engine.position().as_millis() as u64,
                duration_ms: self.engine.duration().map(|d| d.as_millis() as u64),
            });
        }
    }

    // === preloading ===

    fn start_preload(&mut self) {
        let mut neighbors: Vec<Item> = Vec::new();
        for direction in [Direction::Next, Direction::Previous] {
            if let Some(item) = self.nav.peek(direction) {
                if !self.cache.contains(&item.identity)
                    && neighbors.iter().all(|n| n.identity != item.identity)
                {
                    neighbors.push(item.clone());
                }
            }
        }
        if neighbors.is_empty() {
            return;
        }
        if self
            .preload_guard
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("preload sweep already running");
            return;
        }
        preload::spawn_sweep(
            self.current_identity(),
            neighbors,
            Arc::clone(&self.resolver),
            self.active_analyzer(),
            self.config.audio_only,
            Arc::clone(&self.preload_guard),
            self.outcomes.clone(),
        );
    }

    fn active_analyzer(&self) -> Option<Arc<dyn SilenceAnalyzer>> {
        if self.config.skip_silence {
            self.analyzer.clone()
        } else {
            None
        }
    }

    // === shutdown ===

    async fn finalize(&mut self) {
        // the engine position belongs to the item whose media is
        // attached, not the navigation target a shutdown mid-load may
        // already point at; with nothing attached there is no position
        // worth recording
        if let Some(current) = self.current_item.clone() {
            if self.config.resume_enabled && !current.is_live {
                let position = self.engine.position();
                let duration = self.engine.duration();
                if let Err(err) = self
                    .resume
                    .save(
                        &current.identity,
                        position,
                        duration,
                        self.current_audio_label.clone(),
                    )
                    .await
                {
                    warn!(identity = %current.identity, error = %err, "final resume save failed");
                }
            }
        }
        if let Err(err) = self.engine.stop() {
            warn!(error = %err, "stop on shutdown failed");
        }
        self.emit(SessionEvent::SessionEnded);
        info!("session ended");
    }

    // === helpers ===

    fn current_identity(&self) -> String {
        self.nav.current().identity.clone()
    }

    fn set_state(&mut self, state: ControlState) {
        if state != self.state {
            debug!(from = ?self.state, to = ?state, "state changed");
            self.state = state;
            self.emit(SessionEvent::StateChanged {
                state: self.state.public(),
            });
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn notice(&mut self, message: impl Into<String>) {
        self.emit(SessionEvent::Notice {
            message: message.into(),
        });
    }
}
