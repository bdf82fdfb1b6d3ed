//! Audio capture: fragment sources, encoding negotiation, artifact assembly.

mod capture;
mod encoding;
mod source;

pub use capture::{AudioCapture, CaptureConfig};
pub use encoding::AudioEncoding;
pub use source::{scripted_source, CaptureError, FragmentSource, ScriptedSource};

/// One timestamped binary audio fragment as delivered by a source.
#[derive(Debug, Clone)]
pub struct AudioFragment {
    /// Encoded audio bytes (or raw PCM for WAV-negotiated sources).
    pub bytes: Vec<u8>,
    /// Milliseconds since capture started.
    pub timestamp_ms: u64,
}

/// The finalized, immutable audio blob for one recording session.
///
/// Produced exactly once, at the recording -> processing transition.
#[derive(Debug, Clone)]
pub struct AudioArtifact {
    pub bytes: Vec<u8>,
    pub encoding: AudioEncoding,
    pub fragment_count: usize,
    pub duration_ms: u64,
}

impl AudioArtifact {
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
