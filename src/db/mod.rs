//! Persistence: the pooled gateway with whole-pool-recreate retry, plus the
//! note and sequence-slot stores built on top of it.

mod gateway;
mod notes;
mod retry;
mod slots;

pub use gateway::PersistenceGateway;
pub use notes::{NewNote, NoteRecord, NoteStore, PgNoteStore};
pub use retry::{PoolLifecycle, RetryPolicy};
pub use slots::{InMemorySlotStore, PgSlotStore, SlotStats, SlotStore};

/// Errors crossing the persistence boundary.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("note content must not be empty")]
    EmptyContent,
}

/// Create the tables this service owns. Idempotent.
pub async fn ensure_schema(gateway: &PersistenceGateway) -> Result<(), GatewayError> {
    gateway
        .with_retry(|pool| async move {
            sqlx::query(
                "CREATE TABLE IF NOT EXISTS notes (
                    id BIGSERIAL PRIMARY KEY,
                    owner_id TEXT NOT NULL,
                    content TEXT NOT NULL,
                    summary TEXT NULL,
                    thought TEXT NULL,
                    emotions_json TEXT NULL,
                    core_needs_json TEXT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
                )",
            )
            .execute(&pool)
            .await?;

            sqlx::query(
                "CREATE TABLE IF NOT EXISTS sequence_slots (
                    id BIGSERIAL PRIMARY KEY,
                    number TEXT NOT NULL UNIQUE,
                    is_used BOOLEAN NOT NULL DEFAULT FALSE,
                    assigned_owner_id TEXT NULL
                )",
            )
            .execute(&pool)
            .await?;

            Ok(())
        })
        .await
}
