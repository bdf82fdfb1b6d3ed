//! Dual-mode transcription: synchronous short-form recognition, or
//! upload-then-long-running-job recognition with polling.

mod dispatcher;
mod provider;
mod storage;

pub use dispatcher::TranscriptionDispatcher;
pub use provider::{
    encoding_to_codec, GoogleSpeechClient, JobHandle, JobState, SpeechProvider,
    TranscriptSegment,
};
pub use storage::{BlobStore, GcsBlobStore};

/// Transcription failures, structured so the session controller can
/// distinguish "no speech found" from a provider outage without inspecting
/// provider internals.
#[derive(Debug, thiserror::Error)]
pub enum TranscribeError {
    #[error("speech provider error {code}: {message}")]
    Provider { code: u16, message: String },

    #[error("recognition job failed ({code}): {message}")]
    JobFailed { code: i32, message: String },

    #[error("transcription timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("artifact upload failed: {0}")]
    Upload(String),

    #[error("malformed provider response: {0}")]
    InvalidResponse(String),
}
