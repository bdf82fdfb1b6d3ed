//! Best-effort semantic analysis of transcribed text.
//!
//! Failure here must never abort the pipeline: every error path collapses to
//! `None` and the note persists with null annotation fields.

use crate::config::AnalysisConfig;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

/// Structured semantic metadata attached to a note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(default)]
    pub summary: String,
    /// Dominant automatic thought surfaced by the analysis.
    #[serde(default)]
    pub thought: String,
    #[serde(default)]
    pub emotions: Vec<String>,
    #[serde(default)]
    pub core_needs: Vec<String>,
    /// True when analysis was intentionally disabled (no credentials) rather
    /// than attempted and failed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub placeholder: bool,
}

impl Annotation {
    /// Marker annotation returned when no credentials are configured, so
    /// downstream consumers can tell "disabled" from "failed".
    pub fn placeholder() -> Self {
        Self {
            summary: "(placeholder) analysis is not configured".to_string(),
            thought: String::new(),
            emotions: Vec::new(),
            core_needs: Vec::new(),
            placeholder: true,
        }
    }
}

/// Semantic-analysis seam. `analyze` returns `None` on any failure.
#[async_trait::async_trait]
pub trait Enricher: Send + Sync {
    async fn analyze(&self, text: &str) -> Option<Annotation>;
}

const SYSTEM_PROMPT: &str = "You are a counseling specialist. Analyze the \
user's voice memo and extract: 1. thought: the dominant automatic thought or \
cognitive pattern. 2. emotions: 3-5 words naming the emotions present. 3. \
core_needs: 3-5 words naming the underlying needs. 4. summary: a 1-2 sentence \
summary. Respond with JSON only: {\"thought\": \"...\", \"emotions\": \
[\"...\"], \"core_needs\": [\"...\"], \"summary\": \"...\"}";

/// Chat-completions-backed enricher with a fixed JSON response schema.
pub struct AnalysisEnricher {
    http: reqwest::Client,
    config: AnalysisConfig,
}

impl AnalysisEnricher {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    async fn request_annotation(&self, text: &str, api_key: &str) -> anyhow::Result<Annotation> {
        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": text },
            ],
            "response_format": { "type": "json_object" },
            "temperature": 0.7,
        });

        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let value: serde_json::Value = response.json().await?;
        let content = value["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("completion content missing"))?;

        let annotation: Annotation = serde_json::from_str(content)?;
        Ok(annotation)
    }
}

#[async_trait::async_trait]
impl Enricher for AnalysisEnricher {
    async fn analyze(&self, text: &str) -> Option<Annotation> {
        let api_key = match &self.config.api_key {
            Some(key) => key.clone(),
            None => {
                info!("analysis credentials absent, returning placeholder annotation");
                return Some(Annotation::placeholder());
            }
        };

        match self.request_annotation(text, &api_key).await {
            Ok(annotation) => {
                info!(
                    emotions = annotation.emotions.len(),
                    needs = annotation.core_needs.len(),
                    "analysis complete"
                );
                Some(annotation)
            }
            Err(e) => {
                // Best-effort by contract: log and move on.
                warn!("analysis failed, continuing without annotation: {}", e);
                None
            }
        }
    }
}
