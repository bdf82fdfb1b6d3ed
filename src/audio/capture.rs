use super::source::{CaptureError, FragmentSource};
use super::{AudioArtifact, AudioEncoding, AudioFragment};
use anyhow::Context;
use std::io::Cursor;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Encodings to attempt, most preferred first.
    pub preferred_encodings: Vec<AudioEncoding>,
    /// Sample rate assumed for PCM sources when wrapping a WAV container.
    pub sample_rate: u32,
    /// Channel count assumed for PCM sources.
    pub channels: u16,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            preferred_encodings: AudioEncoding::negotiation_order().to_vec(),
            sample_rate: 48000,
            channels: 1,
        }
    }
}

/// Records fragments from a [`FragmentSource`] into an append-only buffer and
/// concatenates them into a single immutable artifact on stop.
///
/// The buffer is only appended to while recording and only read during
/// finalization, after the collector task has drained the channel to the end.
pub struct AudioCapture {
    source: Box<dyn FragmentSource>,
    config: CaptureConfig,
    encoding: Option<AudioEncoding>,
    fragments: Arc<Mutex<Vec<AudioFragment>>>,
    collector: Option<JoinHandle<()>>,
}

impl AudioCapture {
    pub fn new(source: Box<dyn FragmentSource>, config: CaptureConfig) -> Self {
        Self {
            source,
            config,
            encoding: None,
            fragments: Arc::new(Mutex::new(Vec::new())),
            collector: None,
        }
    }

    /// Negotiate an encoding and begin collecting fragments.
    ///
    /// Walks the preference list and records whichever encoding the source
    /// accepts first; falling back is not an error, only logged.
    pub async fn start(&mut self) -> Result<AudioEncoding, CaptureError> {
        let encoding = self.negotiate()?;
        self.encoding = Some(encoding);

        let mut rx = self.source.start().await?;
        info!(source = self.source.name(), ?encoding, "audio capture started");

        let fragments = Arc::clone(&self.fragments);
        self.collector = Some(tokio::spawn(async move {
            while let Some(fragment) = rx.recv().await {
                debug!(
                    bytes = fragment.bytes.len(),
                    timestamp_ms = fragment.timestamp_ms,
                    "fragment received"
                );
                fragments.lock().await.push(fragment);
            }
        }));

        Ok(encoding)
    }

    /// Number of fragments collected so far.
    pub async fn fragment_count(&self) -> usize {
        self.fragments.lock().await.len()
    }

    /// Stop the source, drain every queued fragment, and finalize the
    /// artifact. Consumes the capture; an artifact is produced exactly once.
    pub async fn stop(mut self) -> Result<AudioArtifact, CaptureError> {
        self.source.stop().await?;

        // The source closed its channel; awaiting the collector guarantees
        // every sent fragment has been appended before we read the buffer.
        if let Some(collector) = self.collector.take() {
            if let Err(e) = collector.await {
                warn!("fragment collector task failed: {}", e);
            }
        }

        let encoding = self.encoding.ok_or(CaptureError::NoSupportedEncoding)?;
        let fragments = self.fragments.lock().await;

        let duration_ms = fragments.last().map(|f| f.timestamp_ms).unwrap_or(0);
        let concatenated: Vec<u8> = fragments
            .iter()
            .flat_map(|f| f.bytes.iter().copied())
            .collect();

        let bytes = match encoding {
            AudioEncoding::Wav => {
                wrap_wav(&concatenated, self.config.sample_rate, self.config.channels)
                    .context("failed to write WAV container")?
            }
            _ => concatenated,
        };

        info!(
            ?encoding,
            fragments = fragments.len(),
            bytes = bytes.len(),
            duration_ms,
            "capture finalized"
        );

        Ok(AudioArtifact {
            bytes,
            encoding,
            fragment_count: fragments.len(),
            duration_ms,
        })
    }

    fn negotiate(&self) -> Result<AudioEncoding, CaptureError> {
        for &candidate in &self.config.preferred_encodings {
            if self.source.supports(candidate) {
                if candidate != self.config.preferred_encodings[0] {
                    warn!(
                        ?candidate,
                        "preferred encoding unsupported, falling back"
                    );
                }
                return Ok(candidate);
            }
        }
        Err(CaptureError::NoSupportedEncoding)
    }
}

/// Wrap raw 16-bit little-endian PCM in a WAV container.
fn wrap_wav(pcm: &[u8], sample_rate: u32, channels: u16) -> anyhow::Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for pair in pcm.chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([pair[0], pair[1]]))?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}
