use super::{GatewayError, PersistenceGateway};
use crate::analyze::Annotation;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row;
use std::sync::Arc;
use tracing::info;

/// Input for a note insert, carried from the session pipeline.
#[derive(Debug, Clone)]
pub struct NewNote {
    pub owner_id: String,
    pub content: String,
    pub annotation: Option<Annotation>,
}

/// A durably stored note.
#[derive(Debug, Clone, Serialize)]
pub struct NoteRecord {
    pub id: i64,
    pub owner_id: String,
    pub content: String,
    pub summary: Option<String>,
    pub thought: Option<String>,
    pub emotions: Option<Vec<String>>,
    pub core_needs: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait NoteStore: Send + Sync {
    async fn insert(&self, note: NewNote) -> Result<NoteRecord, GatewayError>;
    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<NoteRecord>, GatewayError>;
}

pub struct PgNoteStore {
    gateway: Arc<PersistenceGateway>,
}

impl PgNoteStore {
    pub fn new(gateway: Arc<PersistenceGateway>) -> Self {
        Self { gateway }
    }
}

fn decode_string_list(raw: Option<String>) -> Option<Vec<String>> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
}

#[async_trait::async_trait]
impl NoteStore for PgNoteStore {
    async fn insert(&self, note: NewNote) -> Result<NoteRecord, GatewayError> {
        let content = note.content.trim().to_string();
        // Guarded upstream by the session controller; re-checked here because
        // the HTTP surface reaches this store directly.
        if content.is_empty() {
            return Err(GatewayError::EmptyContent);
        }

        let annotation = note.annotation;
        let summary = annotation.as_ref().map(|a| a.summary.clone());
        let thought = annotation.as_ref().map(|a| a.thought.clone());
        let emotions_json = annotation
            .as_ref()
            .map(|a| serde_json::to_string(&a.emotions).unwrap_or_default());
        let core_needs_json = annotation
            .as_ref()
            .map(|a| serde_json::to_string(&a.core_needs).unwrap_or_default());

        let owner_id = note.owner_id;
        let record = self
            .gateway
            .with_retry(|pool| {
                let owner_id = owner_id.clone();
                let content = content.clone();
                let summary = summary.clone();
                let thought = thought.clone();
                let emotions_json = emotions_json.clone();
                let core_needs_json = core_needs_json.clone();

                async move {
                    let row = sqlx::query(
                        "INSERT INTO notes \
                         (owner_id, content, summary, thought, emotions_json, core_needs_json) \
                         VALUES ($1, $2, $3, $4, $5, $6) \
                         RETURNING id, created_at, updated_at",
                    )
                    .bind(&owner_id)
                    .bind(&content)
                    .bind(&summary)
                    .bind(&thought)
                    .bind(&emotions_json)
                    .bind(&core_needs_json)
                    .fetch_one(&pool)
                    .await?;

                    Ok(NoteRecord {
                        id: row.try_get("id")?,
                        owner_id,
                        content,
                        summary,
                        thought,
                        emotions: decode_string_list(emotions_json),
                        core_needs: decode_string_list(core_needs_json),
                        created_at: row.try_get("created_at")?,
                        updated_at: row.try_get("updated_at")?,
                    })
                }
            })
            .await?;

        info!(id = record.id, owner = %record.owner_id, "note persisted");
        Ok(record)
    }

    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<NoteRecord>, GatewayError> {
        let owner = owner_id.to_string();
        self.gateway
            .with_retry(|pool| {
                let owner = owner.clone();
                async move {
                    let rows = sqlx::query(
                        "SELECT id, owner_id, content, summary, thought, \
                         emotions_json, core_needs_json, created_at, updated_at \
                         FROM notes WHERE owner_id = $1 ORDER BY created_at DESC",
                    )
                    .bind(&owner)
                    .fetch_all(&pool)
                    .await?;

                    rows.into_iter()
                        .map(|row| {
                            Ok(NoteRecord {
                                id: row.try_get("id")?,
                                owner_id: row.try_get("owner_id")?,
                                content: row.try_get("content")?,
                                summary: row.try_get("summary")?,
                                thought: row.try_get("thought")?,
                                emotions: decode_string_list(row.try_get("emotions_json")?),
                                core_needs: decode_string_list(row.try_get("core_needs_json")?),
                                created_at: row.try_get("created_at")?,
                                updated_at: row.try_get("updated_at")?,
                            })
                        })
                        .collect()
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_json_string_lists() {
        assert_eq!(
            decode_string_list(Some(r#"["calm","hope"]"#.to_string())),
            Some(vec!["calm".to_string(), "hope".to_string()])
        );
        assert_eq!(decode_string_list(Some("not json".to_string())), None);
        assert_eq!(decode_string_list(None), None);
    }
}
