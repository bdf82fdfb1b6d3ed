use super::{AudioEncoding, AudioFragment};
use anyhow::Result;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Errors surfaced by capture before any session state exists.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("no capture device available: {0}")]
    DeviceUnavailable(String),

    #[error("capture permission denied")]
    PermissionDenied,

    #[error("source supports none of the negotiable encodings")]
    NoSupportedEncoding,

    #[error("capture source failed: {0}")]
    Source(#[from] anyhow::Error),
}

/// A source of timestamped audio fragments.
///
/// Implementations deliver fragments at a fixed cadence over a channel and
/// close the channel once stopped, so a drain loop observes every fragment
/// that was produced (no loss at the stop boundary).
#[async_trait::async_trait]
pub trait FragmentSource: Send + Sync {
    /// Begin delivering fragments. Called at most once per source.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFragment>, CaptureError>;

    /// Stop delivering fragments; the channel closes after any queued
    /// fragment has been sent.
    async fn stop(&mut self) -> Result<(), CaptureError>;

    /// Whether this source can produce the given encoding.
    fn supports(&self, encoding: AudioEncoding) -> bool;

    /// Source name for logging.
    fn name(&self) -> &str;
}

/// A source that replays a predefined fragment script at a fixed cadence.
///
/// Used by tests and demos; real microphone backends are platform integrations
/// that implement [`FragmentSource`] outside this crate.
pub struct ScriptedSource {
    fragments: Vec<Vec<u8>>,
    interval: Duration,
    encodings: Vec<AudioEncoding>,
    task: Option<JoinHandle<()>>,
}

impl ScriptedSource {
    pub fn new(fragments: Vec<Vec<u8>>, interval: Duration) -> Self {
        Self {
            fragments,
            interval,
            encodings: AudioEncoding::negotiation_order().to_vec(),
            task: None,
        }
    }

    /// Restrict the encodings this source claims to support.
    pub fn with_encodings(mut self, encodings: Vec<AudioEncoding>) -> Self {
        self.encodings = encodings;
        self
    }
}

#[async_trait::async_trait]
impl FragmentSource for ScriptedSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFragment>, CaptureError> {
        let (tx, rx) = mpsc::channel(64);
        let fragments = std::mem::take(&mut self.fragments);
        let interval = self.interval;

        self.task = Some(tokio::spawn(async move {
            for (i, bytes) in fragments.into_iter().enumerate() {
                tokio::time::sleep(interval).await;
                let fragment = AudioFragment {
                    bytes,
                    timestamp_ms: (i as u64 + 1) * interval.as_millis() as u64,
                };
                if tx.send(fragment).await.is_err() {
                    break;
                }
            }
            // Sender drops here, closing the channel.
        }));

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        if let Some(task) = self.task.take() {
            // Let the script run to completion so queued fragments drain;
            // an aborted script would violate the no-loss boundary.
            let _ = task.await;
        }
        Ok(())
    }

    fn supports(&self, encoding: AudioEncoding) -> bool {
        self.encodings.contains(&encoding)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Convenience constructor for a boxed scripted source.
pub fn scripted_source(
    fragments: Vec<Vec<u8>>,
    interval: Duration,
) -> Box<dyn FragmentSource> {
    Box::new(ScriptedSource::new(fragments, interval))
}
