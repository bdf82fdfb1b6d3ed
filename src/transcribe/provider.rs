use super::TranscribeError;
use crate::audio::{AudioArtifact, AudioEncoding};
use crate::config::SpeechConfig;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// One recognized segment: the top alternative's transcript plus confidence.
#[derive(Debug, Clone)]
pub struct TranscriptSegment {
    pub transcript: String,
    pub confidence: Option<f32>,
}

/// Opaque handle for a long-running recognition job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle(pub String);

/// Observed state of a long-running recognition job.
#[derive(Debug, Clone)]
pub enum JobState {
    Running,
    Succeeded(Vec<TranscriptSegment>),
    Failed { code: i32, message: String },
}

/// Speech-recognition provider contract.
#[async_trait::async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Short-form synchronous recognition of an inline artifact.
    async fn recognize(
        &self,
        artifact: &AudioArtifact,
    ) -> Result<Vec<TranscriptSegment>, TranscribeError>;

    /// Submit a long-running job referencing an uploaded artifact.
    async fn start_long_running(
        &self,
        audio_uri: &str,
        encoding: AudioEncoding,
    ) -> Result<JobHandle, TranscribeError>;

    /// Poll a job once; never blocks until completion.
    async fn poll_job(&self, handle: &JobHandle) -> Result<JobState, TranscribeError>;
}

/// Declared encoding -> provider codec name.
///
/// mp4 mapping to WEBM_OPUS is the observed production behavior, kept as-is;
/// the permissive default for unrecognized MIME types lives in
/// [`AudioEncoding::from_mime`] and also lands on WEBM_OPUS.
pub fn encoding_to_codec(encoding: AudioEncoding) -> &'static str {
    match encoding {
        AudioEncoding::WebmOpus => "WEBM_OPUS",
        AudioEncoding::OggOpus => "OGG_OPUS",
        AudioEncoding::Mp4 => "WEBM_OPUS",
        AudioEncoding::Wav => "LINEAR16",
    }
}

/// Google Cloud Speech-to-Text REST client.
pub struct GoogleSpeechClient {
    http: reqwest::Client,
    config: SpeechConfig,
}

impl GoogleSpeechClient {
    pub fn new(config: SpeechConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn recognition_config(&self, encoding: AudioEncoding) -> serde_json::Value {
        json!({
            "encoding": encoding_to_codec(encoding),
            "sampleRateHertz": self.config.sample_rate_hertz,
            "languageCode": self.config.language,
            "alternativeLanguageCodes": self.config.alternate_languages,
            "enableAutomaticPunctuation": self.config.punctuation,
            "model": self.config.model,
        })
    }

    fn url(&self, path: &str) -> String {
        match &self.config.api_key {
            Some(key) => format!("{}/v1/{}?key={}", self.config.endpoint, path, key),
            None => format!("{}/v1/{}", self.config.endpoint, path),
        }
    }

    async fn post_json(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, TranscribeError> {
        let response = self
            .http
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .map_err(|e| TranscribeError::Provider {
                code: e.status().map(|s| s.as_u16()).unwrap_or(0),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TranscribeError::Provider {
                code: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| TranscribeError::InvalidResponse(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognizeResult>,
}

#[derive(Debug, Deserialize)]
struct RecognizeResult {
    #[serde(default)]
    alternatives: Vec<RecognizeAlternative>,
}

#[derive(Debug, Deserialize)]
struct RecognizeAlternative {
    #[serde(default)]
    transcript: String,
    confidence: Option<f32>,
}

fn top_alternatives(response: RecognizeResponse) -> Vec<TranscriptSegment> {
    response
        .results
        .into_iter()
        .filter_map(|result| result.alternatives.into_iter().next())
        .map(|alt| TranscriptSegment {
            transcript: alt.transcript,
            confidence: alt.confidence,
        })
        .collect()
}

#[async_trait::async_trait]
impl SpeechProvider for GoogleSpeechClient {
    async fn recognize(
        &self,
        artifact: &AudioArtifact,
    ) -> Result<Vec<TranscriptSegment>, TranscribeError> {
        let content = base64::engine::general_purpose::STANDARD.encode(&artifact.bytes);
        let body = json!({
            "config": self.recognition_config(artifact.encoding),
            "audio": { "content": content },
        });

        debug!(bytes = artifact.bytes.len(), "submitting synchronous recognize");
        let value = self.post_json("speech:recognize", body).await?;
        let response: RecognizeResponse = serde_json::from_value(value)
            .map_err(|e| TranscribeError::InvalidResponse(e.to_string()))?;

        Ok(top_alternatives(response))
    }

    async fn start_long_running(
        &self,
        audio_uri: &str,
        encoding: AudioEncoding,
    ) -> Result<JobHandle, TranscribeError> {
        let body = json!({
            "config": self.recognition_config(encoding),
            "audio": { "uri": audio_uri },
        });

        debug!(uri = audio_uri, "submitting long-running recognize");
        let value = self.post_json("speech:longrunningrecognize", body).await?;
        let name = value
            .get("name")
            .and_then(|n| n.as_str())
            .ok_or_else(|| {
                TranscribeError::InvalidResponse("operation name missing".to_string())
            })?;

        Ok(JobHandle(name.to_string()))
    }

    async fn poll_job(&self, handle: &JobHandle) -> Result<JobState, TranscribeError> {
        let response = self
            .http
            .get(self.url(&format!("operations/{}", handle.0)))
            .send()
            .await
            .map_err(|e| TranscribeError::Provider {
                code: e.status().map(|s| s.as_u16()).unwrap_or(0),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TranscribeError::Provider {
                code: status.as_u16(),
                message,
            });
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TranscribeError::InvalidResponse(e.to_string()))?;

        if let Some(error) = value.get("error") {
            return Ok(JobState::Failed {
                code: error.get("code").and_then(|c| c.as_i64()).unwrap_or(0) as i32,
                message: error
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown job error")
                    .to_string(),
            });
        }

        if value.get("done").and_then(|d| d.as_bool()).unwrap_or(false) {
            let inner = value.get("response").cloned().unwrap_or(json!({}));
            let response: RecognizeResponse = serde_json::from_value(inner)
                .map_err(|e| TranscribeError::InvalidResponse(e.to_string()))?;
            return Ok(JobState::Succeeded(top_alternatives(response)));
        }

        Ok(JobState::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_mapping_matches_observed_behavior() {
        assert_eq!(encoding_to_codec(AudioEncoding::WebmOpus), "WEBM_OPUS");
        assert_eq!(encoding_to_codec(AudioEncoding::OggOpus), "OGG_OPUS");
        // mp4 input deliberately maps to WEBM_OPUS, not a dedicated codec.
        assert_eq!(encoding_to_codec(AudioEncoding::Mp4), "WEBM_OPUS");
        assert_eq!(encoding_to_codec(AudioEncoding::Wav), "LINEAR16");
    }

    #[test]
    fn takes_top_alternative_per_segment_in_order() {
        let response = RecognizeResponse {
            results: vec![
                RecognizeResult {
                    alternatives: vec![
                        RecognizeAlternative {
                            transcript: "hello".into(),
                            confidence: Some(0.9),
                        },
                        RecognizeAlternative {
                            transcript: "yellow".into(),
                            confidence: Some(0.4),
                        },
                    ],
                },
                RecognizeResult {
                    alternatives: vec![RecognizeAlternative {
                        transcript: "world".into(),
                        confidence: None,
                    }],
                },
                RecognizeResult { alternatives: vec![] },
            ],
        };

        let segments = top_alternatives(response);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].transcript, "hello");
        assert_eq!(segments[1].transcript, "world");
    }
}
