/// Background resolution: foreground retry loop and neighbor sweeps
use crate::cache::ResolvedMedia;
use crate::controller::TaskOutcome;
use reel_core::{Item, ResolveError, SilenceAnalyzer, StreamResolver, TrimHints};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Resolve one item and, when an analyzer is supplied, annotate it with
/// trim hints. Analysis is best-effort: failures degrade to no trimming.
/// Live streams are never analyzed.
pub(crate) async fn resolve_one(
    resolver: &dyn StreamResolver,
    analyzer: Option<&dyn SilenceAnalyzer>,
    audio_only: bool,
    item: &Item,
) -> Result<ResolvedMedia, ResolveError> {
    let descriptor = if audio_only {
        resolver.resolve_audio(&item.identity).await?
    } else {
        resolver.resolve(&item.identity).await?
    };

    let trim = match analyzer {
        Some(analyzer) if !item.is_live => match analyzer.analyze(&descriptor).await {
            Ok(hints) => hints,
            Err(err) => {
                debug!(identity = %item.identity, error = %err, "silence analysis failed, playing untrimmed");
                TrimHints::NONE
            }
        },
        _ => TrimHints::NONE,
    };

    Ok(ResolvedMedia::new(descriptor, trim))
}

/// Resolve an item for immediate playback, retrying transient failures.
///
/// Only `Transient` errors are retried; auth and not-found failures
/// return on the first attempt.
pub(crate) async fn resolve_with_retry(
    resolver: &dyn StreamResolver,
    analyzer: Option<&dyn SilenceAnalyzer>,
    audio_only: bool,
    item: &Item,
    attempts: u32,
) -> Result<ResolvedMedia, ResolveError> {
    let attempts = attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match resolve_one(resolver, analyzer, audio_only, item).await {
            Ok(media) => return Ok(media),
            Err(err) if err.is_retryable() && attempt < attempts => {
                warn!(
                    identity = %item.identity,
                    attempt,
                    error = %err,
                    "resolution failed, retrying"
                );
            }
            Err(err) => return Err(err),
        }
    }
}

/// Spawn a preload sweep over the given neighbors.
///
/// The caller has already acquired `guard` (one sweep at a time); the
/// sweep releases it when it finishes or aborts. Each prepared stream
/// is posted as a `Preloaded` outcome tagged with the sweep's origin so
/// the controller can discard results that arrive after the session has
/// moved on.
///
/// Failures are per-item and non-fatal, with one exception: an
/// auth-required failure aborts the whole sweep, because every
/// remaining request would hit the same wall and hammer the service.
pub(crate) fn spawn_sweep(
    origin: String,
    neighbors: Vec<Item>,
    resolver: Arc<dyn StreamResolver>,
    analyzer: Option<Arc<dyn SilenceAnalyzer>>,
    audio_only: bool,
    guard: Arc<AtomicBool>,
    outcomes: mpsc::UnboundedSender<TaskOutcome>,
) {
    tokio::spawn(async move {
        debug!(origin, count = neighbors.len(), "preload sweep started");
        for item in neighbors {
            match resolve_one(resolver.as_ref(), analyzer.as_deref(), audio_only, &item).await {
                Ok(media) => {
                    debug!(identity = %item.identity, "preloaded");
                    let _ = outcomes.send(TaskOutcome::Preloaded {
                        origin: origin.clone(),
                        identity: item.identity,
                        media,
                    });
                }
                Err(err @ ResolveError::AuthRequired(_)) => {
                    warn!(
                        identity = %item.identity,
                        error = %err,
                        "sign-in required, aborting preload sweep"
                    );
                    break;
                }
                Err(err) => {
                    debug!(identity = %item.identity, error = %err, "preload failed, skipping");
                }
            }
        }
        guard.store(false, Ordering::Release);
        let _ = outcomes.send(TaskOutcome::PreloadFinished { origin });
    });
}
