use super::stats::{SessionPhase, SessionStats};
use crate::analyze::Enricher;
use crate::audio::{AudioCapture, CaptureConfig, FragmentSource};
use crate::config::RecordingConfig;
use crate::db::{NewNote, NoteRecord, NoteStore};
use crate::error::SessionError;
use crate::transcribe::TranscriptionDispatcher;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Why the stop routine ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    User,
    AutoStop,
}

/// Downstream collaborators of the pipeline.
pub struct SessionDeps {
    pub dispatcher: Arc<TranscriptionDispatcher>,
    pub enricher: Arc<dyn Enricher>,
    pub notes: Arc<dyn NoteStore>,
}

/// Produces a fresh fragment source for each recording.
pub type SourceFactory = Box<dyn Fn() -> Box<dyn FragmentSource> + Send + Sync>;

struct Inner {
    phase: SessionPhase,
    /// Monotonic session counter; delayed tasks check it so a stale reset or
    /// auto-stop never touches a newer session.
    generation: u64,
    started_at: Option<chrono::DateTime<Utc>>,
    deadline: Option<Instant>,
    capture: Option<AudioCapture>,
    last_transcript: Option<String>,
    auto_stop: Option<JoinHandle<()>>,
}

/// Owns the session state machine and drives the pipeline
/// capture -> transcribe -> analyze (best-effort) -> persist (mandatory).
///
/// Stages within one session run strictly in order; the only built-in
/// cancellation source is the auto-stop timer, which routes through the same
/// stop path as a user stop. Once the pipeline is past the stop point no
/// stage is cancellable mid-flight (known limitation).
pub struct RecordingSessionController {
    policy: RecordingConfig,
    capture_config: CaptureConfig,
    deps: SessionDeps,
    owner_id: String,
    source_factory: SourceFactory,
    inner: Arc<Mutex<Inner>>,
}

impl RecordingSessionController {
    pub fn new(
        policy: RecordingConfig,
        capture_config: CaptureConfig,
        deps: SessionDeps,
        owner_id: String,
        source_factory: SourceFactory,
    ) -> Arc<Self> {
        Arc::new(Self {
            policy,
            capture_config,
            deps,
            owner_id,
            source_factory,
            inner: Arc::new(Mutex::new(Inner {
                phase: SessionPhase::Idle,
                generation: 0,
                started_at: None,
                deadline: None,
                capture: None,
                last_transcript: None,
                auto_stop: None,
            })),
        })
    }

    /// Begin a recording. Returns `Ok(false)` without side effects when a
    /// session is already recording or processing (re-entrancy rule); a
    /// stale completed/failed session is reset and replaced immediately.
    pub async fn start(self: &Arc<Self>) -> Result<bool, SessionError> {
        let mut inner = self.inner.lock().await;

        match inner.phase {
            SessionPhase::Recording | SessionPhase::Processing => {
                warn!(phase = ?inner.phase, "start ignored, session already active");
                return Ok(false);
            }
            SessionPhase::Completed | SessionPhase::Failed => {
                debug!("starting over a terminal session, resetting");
                inner.phase = SessionPhase::Idle;
            }
            SessionPhase::Idle => {}
        }

        inner.generation += 1;
        let generation = inner.generation;
        inner.last_transcript = None;

        // Capture errors surface before any session state is created.
        let mut capture =
            AudioCapture::new((self.source_factory)(), self.capture_config.clone());
        capture.start().await?;

        let max_duration = self.policy.max_duration();
        inner.phase = SessionPhase::Recording;
        inner.started_at = Some(Utc::now());
        inner.deadline = Some(Instant::now() + max_duration);
        inner.capture = Some(capture);

        let controller = Arc::clone(self);
        inner.auto_stop = Some(tokio::spawn(async move {
            tokio::time::sleep(max_duration).await;
            {
                let mut inner = controller.inner.lock().await;
                if inner.generation != generation {
                    return;
                }
                // Clear our own handle so the stop path does not abort the
                // very task that is about to run it.
                inner.auto_stop = None;
            }
            info!("max recording duration reached, auto-stopping");
            if let Err(e) = controller.stop(StopReason::AutoStop).await {
                warn!(kind = e.kind(), "auto-stop pipeline failed: {}", e);
            }
        }));

        info!(max_secs = max_duration.as_secs(), owner = %self.owner_id, "recording started");
        Ok(true)
    }

    /// The single stop routine shared by user stop and timer expiry.
    ///
    /// A no-op unless the session is recording (idempotent, so duplicate
    /// stops cannot race). On success the note record is returned and the
    /// phase is `Completed`; any stage failure lands in `Failed`. Either
    /// terminal phase resets to idle after its display delay.
    pub async fn stop(
        self: &Arc<Self>,
        reason: StopReason,
    ) -> Result<Option<NoteRecord>, SessionError> {
        let (capture, generation) = {
            let mut inner = self.inner.lock().await;
            if inner.phase != SessionPhase::Recording {
                debug!(phase = ?inner.phase, "stop ignored, not recording");
                return Ok(None);
            }

            inner.phase = SessionPhase::Processing;
            inner.deadline = None;
            if let Some(timer) = inner.auto_stop.take() {
                timer.abort();
            }

            let Some(capture) = inner.capture.take() else {
                debug_assert!(false, "recording phase without a capture");
                return Ok(None);
            };
            (capture, inner.generation)
        };

        info!(?reason, "stopping recording");

        // Grace interval so a fragment already in flight can still land.
        tokio::time::sleep(self.policy.stop_grace()).await;

        let artifact = match capture.stop().await {
            Ok(artifact) => artifact,
            Err(e) => return Err(self.fail(generation, e.into()).await),
        };

        let text = match self.deps.dispatcher.transcribe(&artifact).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => return Err(self.fail(generation, e.into()).await),
        };

        if text.is_empty() {
            return Err(self.fail(generation, SessionError::EmptyTranscript).await);
        }

        // Best-effort: a failed analysis must never block persistence.
        let annotation = self.deps.enricher.analyze(&text).await;
        if annotation.is_none() {
            warn!("continuing without annotation");
        }

        let note = match self
            .deps
            .notes
            .insert(NewNote {
                owner_id: self.owner_id.clone(),
                content: text.clone(),
                annotation,
            })
            .await
        {
            Ok(note) => note,
            Err(e) => return Err(self.fail(generation, e.into()).await),
        };

        {
            let mut inner = self.inner.lock().await;
            if inner.generation == generation {
                inner.phase = SessionPhase::Completed;
                inner.last_transcript = Some(text);
            }
        }
        self.schedule_reset(generation, self.policy.completed_reset());

        info!(note_id = note.id, "session completed");
        Ok(Some(note))
    }

    pub async fn stats(&self) -> SessionStats {
        let inner = self.inner.lock().await;
        let fragment_count = match &inner.capture {
            Some(capture) => capture.fragment_count().await,
            None => 0,
        };

        SessionStats {
            phase: inner.phase,
            started_at: inner.started_at,
            remaining_seconds: inner
                .deadline
                .map(|d| d.saturating_duration_since(Instant::now()).as_secs()),
            fragment_count,
        }
    }

    /// Transcript of the last completed session, if any.
    pub async fn transcript(&self) -> Option<String> {
        self.inner.lock().await.last_transcript.clone()
    }

    async fn fail(&self, generation: u64, error: SessionError) -> SessionError {
        error!(kind = error.kind(), "session failed: {}", error);
        {
            let mut inner = self.inner.lock().await;
            if inner.generation == generation {
                inner.phase = SessionPhase::Failed;
            }
        }
        self.schedule_reset(generation, self.policy.failed_reset());
        error
    }

    fn schedule_reset(&self, generation: u64, delay: Duration) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut inner = inner.lock().await;
            if inner.generation == generation
                && matches!(
                    inner.phase,
                    SessionPhase::Completed | SessionPhase::Failed
                )
            {
                inner.phase = SessionPhase::Idle;
            }
        });
    }
}
