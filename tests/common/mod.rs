// Shared fakes for the integration tests. Everything here sits behind the
// crate's public trait seams so the pipeline runs without any external
// provider, blob bucket, or database.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use voicenote::analyze::{Annotation, Enricher};
use voicenote::audio::{AudioArtifact, AudioEncoding};
use voicenote::config::{RecordingConfig, SpeechConfig, SttMode};
use voicenote::db::{GatewayError, NewNote, NoteRecord, NoteStore};
use voicenote::transcribe::{
    BlobStore, JobHandle, JobState, SpeechProvider, TranscribeError, TranscriptSegment,
    TranscriptionDispatcher,
};

/// Speech provider whose synchronous answer and job poll states are scripted.
pub struct StubProvider {
    /// Segments returned by the synchronous recognize call.
    pub segments: Vec<String>,
    /// Artificial latency before the synchronous call answers.
    pub delay: Option<Duration>,
    /// When set, the synchronous call fails with this provider error.
    pub fail: Option<(u16, String)>,
    /// States returned by successive poll calls; once drained, polls report
    /// `Running` forever.
    pub poll_states: Mutex<VecDeque<JobState>>,
    pub recognize_calls: AtomicUsize,
}

impl StubProvider {
    pub fn returning(text: &str) -> Self {
        Self {
            segments: vec![text.to_string()],
            delay: None,
            fail: None,
            poll_states: Mutex::new(VecDeque::new()),
            recognize_calls: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self {
            segments: Vec::new(),
            delay: None,
            fail: None,
            poll_states: Mutex::new(VecDeque::new()),
            recognize_calls: AtomicUsize::new(0),
        }
    }

    pub fn slow(text: &str, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::returning(text)
        }
    }

    pub fn with_poll_states(states: Vec<JobState>) -> Self {
        Self {
            segments: Vec::new(),
            delay: None,
            fail: None,
            poll_states: Mutex::new(states.into()),
            recognize_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl SpeechProvider for StubProvider {
    async fn recognize(
        &self,
        _artifact: &AudioArtifact,
    ) -> Result<Vec<TranscriptSegment>, TranscribeError> {
        self.recognize_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some((code, message)) = &self.fail {
            return Err(TranscribeError::Provider {
                code: *code,
                message: message.clone(),
            });
        }
        Ok(self
            .segments
            .iter()
            .map(|s| TranscriptSegment {
                transcript: s.clone(),
                confidence: Some(0.9),
            })
            .collect())
    }

    async fn start_long_running(
        &self,
        _audio_uri: &str,
        _encoding: AudioEncoding,
    ) -> Result<JobHandle, TranscribeError> {
        Ok(JobHandle("job-0".to_string()))
    }

    async fn poll_job(&self, _handle: &JobHandle) -> Result<JobState, TranscribeError> {
        let mut states = self.poll_states.lock().unwrap();
        Ok(states.pop_front().unwrap_or(JobState::Running))
    }
}

/// Blob store that records uploads and hands back in-memory handles.
#[derive(Default)]
pub struct MemoryBlobStore {
    pub uploads: AtomicUsize,
}

#[async_trait::async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, _bytes: &[u8], content_type: &str) -> Result<String, TranscribeError> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "mem://bucket/object-{}.{}",
            n,
            AudioEncoding::from_mime(content_type).file_extension()
        ))
    }
}

/// Enricher returning a fixed annotation, or simulating an outage.
pub struct StubEnricher {
    pub annotation: Option<Annotation>,
    pub calls: AtomicUsize,
}

impl StubEnricher {
    pub fn fixed(summary: &str) -> Self {
        Self {
            annotation: Some(Annotation {
                summary: summary.to_string(),
                thought: String::new(),
                emotions: vec!["calm".to_string()],
                core_needs: vec!["rest".to_string()],
                placeholder: false,
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            annotation: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl Enricher for StubEnricher {
    async fn analyze(&self, _text: &str) -> Option<Annotation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.annotation.clone()
    }
}

/// Note store backed by a vector; can be told to fail every insert.
#[derive(Default)]
pub struct MemoryNoteStore {
    pub records: Mutex<Vec<NoteRecord>>,
    pub fail_inserts: bool,
}

impl MemoryNoteStore {
    pub fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail_inserts: true,
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn first(&self) -> Option<NoteRecord> {
        self.records.lock().unwrap().first().cloned()
    }
}

#[async_trait::async_trait]
impl NoteStore for MemoryNoteStore {
    async fn insert(&self, note: NewNote) -> Result<NoteRecord, GatewayError> {
        if self.fail_inserts {
            return Err(GatewayError::Database(sqlx::Error::PoolClosed));
        }
        let content = note.content.trim().to_string();
        if content.is_empty() {
            return Err(GatewayError::EmptyContent);
        }

        let mut records = self.records.lock().unwrap();
        let annotation = note.annotation;
        let record = NoteRecord {
            id: records.len() as i64 + 1,
            owner_id: note.owner_id,
            content,
            summary: annotation.as_ref().map(|a| a.summary.clone()),
            thought: annotation.as_ref().map(|a| a.thought.clone()),
            emotions: annotation.as_ref().map(|a| a.emotions.clone()),
            core_needs: annotation.as_ref().map(|a| a.core_needs.clone()),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<NoteRecord>, GatewayError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect())
    }
}

/// Dispatcher wired to stubs, in the given mode.
pub fn stub_dispatcher(
    mode: SttMode,
    provider: Arc<StubProvider>,
    storage: Arc<MemoryBlobStore>,
) -> Arc<TranscriptionDispatcher> {
    Arc::new(TranscriptionDispatcher::new(
        mode,
        &SpeechConfig::default(),
        provider,
        storage,
    ))
}

/// Recording policy with short, test-friendly timings (still in real units;
/// tests run under a paused clock).
pub fn test_policy(mode: SttMode) -> RecordingConfig {
    RecordingConfig {
        mode,
        max_duration_secs: Some(5),
        stop_grace_ms: 100,
        completed_reset_secs: 2,
        failed_reset_secs: 3,
        fragment_interval_ms: 10,
    }
}
