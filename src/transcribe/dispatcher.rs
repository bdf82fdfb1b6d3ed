use super::provider::{JobState, SpeechProvider, TranscriptSegment};
use super::storage::BlobStore;
use super::TranscribeError;
use crate::audio::AudioArtifact;
use crate::config::{SpeechConfig, SttMode};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Single entry point for turning a finished artifact into text.
///
/// Mode selection is server configuration, not caller choice. The dispatcher
/// never retries: one failure propagates to the caller, which owns the
/// terminal failed state. (The persistence gateway is the layer that retries.)
pub struct TranscriptionDispatcher {
    mode: SttMode,
    provider: Arc<dyn SpeechProvider>,
    storage: Arc<dyn BlobStore>,
    sync_ceiling: Duration,
    poll_interval: Duration,
    job_timeout: Duration,
}

impl TranscriptionDispatcher {
    pub fn new(
        mode: SttMode,
        speech: &SpeechConfig,
        provider: Arc<dyn SpeechProvider>,
        storage: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            mode,
            provider,
            storage,
            sync_ceiling: Duration::from_secs(speech.sync_ceiling_secs),
            poll_interval: Duration::from_secs(speech.poll_interval_secs),
            job_timeout: Duration::from_secs(speech.job_timeout_secs),
        }
    }

    pub fn mode(&self) -> SttMode {
        self.mode
    }

    pub async fn transcribe(&self, artifact: &AudioArtifact) -> Result<String, TranscribeError> {
        match self.mode {
            SttMode::Sync => self.transcribe_sync(artifact).await,
            SttMode::LongRunning => self.transcribe_long_running(artifact).await,
        }
    }

    async fn transcribe_sync(&self, artifact: &AudioArtifact) -> Result<String, TranscribeError> {
        debug!(encoding = ?artifact.encoding, "dispatching synchronous recognition");

        let segments = tokio::time::timeout(self.sync_ceiling, self.provider.recognize(artifact))
            .await
            .map_err(|_| TranscribeError::Timeout(self.sync_ceiling))??;

        Ok(join_segments(&segments))
    }

    async fn transcribe_long_running(
        &self,
        artifact: &AudioArtifact,
    ) -> Result<String, TranscribeError> {
        let uri = self
            .storage
            .put(&artifact.bytes, artifact.encoding.mime_type())
            .await?;

        let handle = self
            .provider
            .start_long_running(&uri, artifact.encoding)
            .await?;
        info!(job = %handle.0, "recognition job submitted");

        let deadline = Instant::now() + self.job_timeout;
        loop {
            match self.provider.poll_job(&handle).await? {
                JobState::Succeeded(segments) => {
                    info!(job = %handle.0, segments = segments.len(), "recognition job succeeded");
                    return Ok(join_segments(&segments));
                }
                JobState::Failed { code, message } => {
                    warn!(job = %handle.0, code, %message, "recognition job failed");
                    return Err(TranscribeError::JobFailed { code, message });
                }
                JobState::Running => {
                    if Instant::now() >= deadline {
                        warn!(job = %handle.0, "recognition job exceeded hard deadline");
                        return Err(TranscribeError::Timeout(self.job_timeout));
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}

/// Concatenate top-alternative transcripts in result order.
fn join_segments(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .map(|s| s.transcript.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
