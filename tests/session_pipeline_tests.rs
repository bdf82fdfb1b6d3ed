//! End-to-end session pipeline tests against in-memory collaborators.
//!
//! All tests run under a paused tokio clock so the stop-grace interval, the
//! auto-stop timer, and the terminal-phase reset delays elapse virtually.

mod common;

use common::{
    stub_dispatcher, test_policy, MemoryBlobStore, MemoryNoteStore, StubEnricher, StubProvider,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use voicenote::audio::{scripted_source, CaptureConfig};
use voicenote::config::SttMode;
use voicenote::session::{RecordingSessionController, SessionDeps, SessionPhase, StopReason};
use voicenote::SessionError;

fn controller_with(
    mode: SttMode,
    provider: Arc<StubProvider>,
    enricher: Arc<StubEnricher>,
    notes: Arc<MemoryNoteStore>,
) -> Arc<RecordingSessionController> {
    let deps = SessionDeps {
        dispatcher: stub_dispatcher(mode, provider, Arc::new(MemoryBlobStore::default())),
        enricher,
        notes,
    };

    // Three 4-byte fragments at a 10ms cadence per recording.
    let fragments = vec![vec![1u8; 4], vec![2u8; 4], vec![3u8; 4]];
    RecordingSessionController::new(
        test_policy(mode),
        CaptureConfig::default(),
        deps,
        "tiger-0001".to_string(),
        Box::new(move || scripted_source(fragments.clone(), Duration::from_millis(10))),
    )
}

#[tokio::test(start_paused = true)]
async fn manual_stop_runs_full_pipeline_and_persists_note() {
    let provider = Arc::new(StubProvider::returning("hello world"));
    let enricher = Arc::new(StubEnricher::fixed("greeting"));
    let notes = Arc::new(MemoryNoteStore::default());
    let controller = controller_with(
        SttMode::Sync,
        provider,
        Arc::clone(&enricher),
        Arc::clone(&notes),
    );

    assert!(controller.start().await.unwrap());
    tokio::time::sleep(Duration::from_millis(50)).await;

    let stats = controller.stats().await;
    assert_eq!(stats.phase, SessionPhase::Recording);
    assert_eq!(stats.fragment_count, 3);
    assert!(stats.started_at.is_some());

    let note = controller
        .stop(StopReason::User)
        .await
        .unwrap()
        .expect("a note record");

    assert_eq!(note.content, "hello world");
    assert_eq!(note.summary.as_deref(), Some("greeting"));
    assert_eq!(note.owner_id, "tiger-0001");
    assert_eq!(notes.len(), 1);
    assert_eq!(enricher.calls.load(Ordering::SeqCst), 1);

    assert_eq!(controller.stats().await.phase, SessionPhase::Completed);
    assert_eq!(controller.transcript().await.as_deref(), Some("hello world"));

    // After the display delay the session returns to idle on its own.
    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert_eq!(controller.stats().await.phase, SessionPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn start_is_a_no_op_while_a_session_is_active() {
    let provider = Arc::new(StubProvider::returning("once"));
    let notes = Arc::new(MemoryNoteStore::default());
    let controller = controller_with(
        SttMode::Sync,
        provider,
        Arc::new(StubEnricher::fixed("s")),
        Arc::clone(&notes),
    );

    assert!(controller.start().await.unwrap());
    assert!(!controller.start().await.unwrap());
    assert!(!controller.start().await.unwrap());
    assert_eq!(controller.stats().await.phase, SessionPhase::Recording);

    tokio::time::sleep(Duration::from_millis(50)).await;
    controller.stop(StopReason::User).await.unwrap();
    assert_eq!(notes.len(), 1);

    // A terminal session does not block the next one; starting over resets it.
    assert!(controller.start().await.unwrap());
    assert_eq!(controller.stats().await.phase, SessionPhase::Recording);
}

#[tokio::test(start_paused = true)]
async fn duplicate_stop_is_idempotent() {
    let provider = Arc::new(StubProvider::returning("only note"));
    let notes = Arc::new(MemoryNoteStore::default());
    let controller = controller_with(
        SttMode::Sync,
        provider,
        Arc::new(StubEnricher::fixed("s")),
        Arc::clone(&notes),
    );

    controller.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(controller.stop(StopReason::User).await.unwrap().is_some());
    assert!(controller.stop(StopReason::User).await.unwrap().is_none());
    assert_eq!(notes.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn auto_stop_fires_at_max_duration() {
    let provider = Arc::new(StubProvider::returning("timed out talking"));
    let notes = Arc::new(MemoryNoteStore::default());
    let controller = controller_with(
        SttMode::Sync,
        provider,
        Arc::new(StubEnricher::fixed("monologue")),
        Arc::clone(&notes),
    );

    controller.start().await.unwrap();

    // No manual stop: the 5s policy ceiling plus the stop grace must drive
    // the pipeline to completion by itself.
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(controller.stats().await.phase, SessionPhase::Completed);
    assert_eq!(notes.len(), 1);
    assert_eq!(notes.first().unwrap().content, "timed out talking");

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(controller.stats().await.phase, SessionPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn remaining_seconds_counts_down_while_recording() {
    let provider = Arc::new(StubProvider::returning("tick"));
    let controller = controller_with(
        SttMode::Sync,
        provider,
        Arc::new(StubEnricher::fixed("s")),
        Arc::new(MemoryNoteStore::default()),
    );

    controller.start().await.unwrap();
    let before = controller.stats().await.remaining_seconds.unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;
    let after = controller.stats().await.remaining_seconds.unwrap();
    assert!(after < before, "countdown must decrease: {} -> {}", before, after);

    controller.stop(StopReason::User).await.unwrap();
    assert!(controller.stats().await.remaining_seconds.is_none());
}

#[tokio::test(start_paused = true)]
async fn empty_transcript_never_reaches_analysis_or_the_store() {
    let provider = Arc::new(StubProvider::empty());
    let enricher = Arc::new(StubEnricher::fixed("never"));
    let notes = Arc::new(MemoryNoteStore::default());
    let controller = controller_with(
        SttMode::Sync,
        provider,
        Arc::clone(&enricher),
        Arc::clone(&notes),
    );

    controller.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = controller.stop(StopReason::User).await.unwrap_err();
    assert!(matches!(err, SessionError::EmptyTranscript));
    assert_eq!(enricher.calls.load(Ordering::SeqCst), 0);
    assert_eq!(notes.len(), 0);
    assert_eq!(controller.stats().await.phase, SessionPhase::Failed);

    // Failed sessions use their own, longer display delay.
    tokio::time::sleep(Duration::from_millis(2900)).await;
    assert_eq!(controller.stats().await.phase, SessionPhase::Failed);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(controller.stats().await.phase, SessionPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn transcription_timeout_fails_the_session_before_analysis() {
    // Provider answers long after the synchronous ceiling (60s default).
    let provider = Arc::new(StubProvider::slow("too late", Duration::from_secs(120)));
    let enricher = Arc::new(StubEnricher::fixed("never"));
    let notes = Arc::new(MemoryNoteStore::default());
    let controller = controller_with(
        SttMode::Sync,
        provider,
        Arc::clone(&enricher),
        Arc::clone(&notes),
    );

    controller.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = controller.stop(StopReason::User).await.unwrap_err();
    assert_eq!(err.kind(), "transcription");
    assert_eq!(enricher.calls.load(Ordering::SeqCst), 0);
    assert_eq!(notes.len(), 0);
    assert_eq!(controller.stats().await.phase, SessionPhase::Failed);
}

#[tokio::test(start_paused = true)]
async fn analysis_outage_still_persists_the_note() {
    let provider = Arc::new(StubProvider::returning("content survives"));
    let enricher = Arc::new(StubEnricher::failing());
    let notes = Arc::new(MemoryNoteStore::default());
    let controller = controller_with(
        SttMode::Sync,
        provider,
        Arc::clone(&enricher),
        Arc::clone(&notes),
    );

    controller.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let note = controller.stop(StopReason::User).await.unwrap().unwrap();
    assert_eq!(note.content, "content survives");
    assert!(note.summary.is_none());
    assert!(note.emotions.is_none());
    assert_eq!(enricher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(controller.stats().await.phase, SessionPhase::Completed);
}

#[tokio::test(start_paused = true)]
async fn persistence_failure_lands_in_failed() {
    let provider = Arc::new(StubProvider::returning("lost words"));
    let notes = Arc::new(MemoryNoteStore::failing());
    let controller = controller_with(
        SttMode::Sync,
        provider,
        Arc::new(StubEnricher::fixed("s")),
        Arc::clone(&notes),
    );

    controller.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = controller.stop(StopReason::User).await.unwrap_err();
    assert_eq!(err.kind(), "persistence");
    assert_eq!(controller.stats().await.phase, SessionPhase::Failed);
    assert_eq!(notes.len(), 0);
}

#[tokio::test(start_paused = true)]
async fn long_running_mode_uploads_before_transcribing() {
    let provider = Arc::new(StubProvider::with_poll_states(vec![
        voicenote::transcribe::JobState::Running,
        voicenote::transcribe::JobState::Succeeded(vec![
            voicenote::transcribe::TranscriptSegment {
                transcript: "uploaded and recognized".to_string(),
                confidence: Some(0.95),
            },
        ]),
    ]));
    let storage = Arc::new(MemoryBlobStore::default());
    let notes = Arc::new(MemoryNoteStore::default());

    let deps = SessionDeps {
        dispatcher: stub_dispatcher(SttMode::LongRunning, provider, Arc::clone(&storage)),
        enricher: Arc::new(StubEnricher::fixed("long form")),
        notes: Arc::clone(&notes) as Arc<dyn voicenote::db::NoteStore>,
    };
    let controller = RecordingSessionController::new(
        test_policy(SttMode::LongRunning),
        CaptureConfig::default(),
        deps,
        "dragon-0042".to_string(),
        Box::new(|| scripted_source(vec![vec![7u8; 8]], Duration::from_millis(10))),
    );

    controller.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    let note = controller.stop(StopReason::User).await.unwrap().unwrap();
    assert_eq!(note.content, "uploaded and recognized");
    assert_eq!(storage.uploads.load(Ordering::SeqCst), 1);
    assert_eq!(notes.len(), 1);
}
