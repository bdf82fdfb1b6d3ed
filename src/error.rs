use crate::audio::CaptureError;
use crate::db::GatewayError;
use crate::transcribe::TranscribeError;

/// Error kinds at the session-controller boundary.
///
/// Every stage converts its internal failures into one of these before
/// crossing into the controller; the controller matches on the kind only and
/// never inspects underlying provider errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("transcription failed: {0}")]
    Transcription(#[from] TranscribeError),

    /// Transcription technically succeeded but produced no text. Treated the
    /// same as a transcription failure for session-state purposes.
    #[error("transcription produced no text")]
    EmptyTranscript,

    #[error("persistence failed: {0}")]
    Persistence(#[from] GatewayError),
}

impl SessionError {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::Capture(_) => "capture",
            SessionError::Transcription(_) => "transcription",
            SessionError::EmptyTranscript => "empty_transcript",
            SessionError::Persistence(_) => "persistence",
        }
    }

    /// What the user sees. Internal detail stays in the server logs.
    pub fn user_message(&self) -> &'static str {
        "Something went wrong with this recording. Please try again."
    }
}
