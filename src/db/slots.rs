use super::{GatewayError, PersistenceGateway};
use crate::identity::OwnerIdentity;
use serde::Serialize;
use sqlx::Row;
use std::sync::Arc;
use std::sync::Mutex;
use tracing::info;

/// Usage counters for the sequence pool.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SlotStats {
    pub used: u64,
    pub total: u64,
}

impl SlotStats {
    pub fn available(&self) -> u64 {
        self.total - self.used
    }
}

/// Storage seam for sequence-slot allocation.
///
/// `claim` must be atomic with respect to concurrent claims: at most one
/// caller may take a given unused slot, and a slot never returns to the pool.
/// `Ok(None)` means the pool is exhausted (a capacity condition, not an
/// error at this layer).
#[async_trait::async_trait]
pub trait SlotStore: Send + Sync {
    async fn claim(&self, label: &str) -> Result<Option<OwnerIdentity>, GatewayError>;
    async fn stats(&self) -> Result<SlotStats, GatewayError>;
}

/// Candidate query for a claim. `SKIP LOCKED` matters: with a plain
/// `FOR UPDATE`, a claimant blocked on the current smallest row gets zero
/// rows back once the winner commits (the re-checked row fails the
/// `is_used = FALSE` qual and `LIMIT 1` has nothing left), which would look
/// like exhaustion while free slots remain. Skipping locked rows lets each
/// claimant take the smallest row nobody else is holding.
const CLAIM_CANDIDATE_SQL: &str = "SELECT number FROM sequence_slots \
     WHERE is_used = FALSE \
     ORDER BY number ASC LIMIT 1 \
     FOR UPDATE SKIP LOCKED";

/// Postgres-backed slot store. Claiming locks the candidate row for the
/// duration of the transaction so concurrent allocators serialize on it.
pub struct PgSlotStore {
    gateway: Arc<PersistenceGateway>,
}

impl PgSlotStore {
    pub fn new(gateway: Arc<PersistenceGateway>) -> Self {
        Self { gateway }
    }

    /// Populate slots `0001..=count` once. Idempotent: existing numbers are
    /// left untouched, used or not.
    pub async fn seed(&self, count: u32) -> Result<u64, GatewayError> {
        let inserted = self
            .gateway
            .with_retry(|pool| async move {
                let result = sqlx::query(
                    "INSERT INTO sequence_slots (number, is_used) \
                     SELECT lpad(n::text, 4, '0'), FALSE \
                     FROM generate_series(1, $1) AS n \
                     ON CONFLICT (number) DO NOTHING",
                )
                .bind(count as i64)
                .execute(&pool)
                .await?;
                Ok(result.rows_affected())
            })
            .await?;

        info!(inserted, count, "sequence slots seeded");
        Ok(inserted)
    }
}

#[async_trait::async_trait]
impl SlotStore for PgSlotStore {
    async fn claim(&self, label: &str) -> Result<Option<OwnerIdentity>, GatewayError> {
        let label = label.to_string();
        self.gateway
            .with_retry(|pool| {
                let label = label.clone();
                async move {
                    let mut tx = pool.begin().await?;

                    // Zero rows here means true exhaustion, not contention:
                    // rows held by concurrent claimants are skipped, so a
                    // loser takes the next-smallest free number instead.
                    let row = sqlx::query(CLAIM_CANDIDATE_SQL)
                        .fetch_optional(&mut *tx)
                        .await?;

                    let Some(row) = row else {
                        tx.commit().await?;
                        return Ok(None);
                    };

                    let number: String = row.try_get("number")?;
                    let identity = OwnerIdentity::new(&label, &number);

                    sqlx::query(
                        "UPDATE sequence_slots \
                         SET is_used = TRUE, assigned_owner_id = $1 \
                         WHERE number = $2",
                    )
                    .bind(identity.token())
                    .bind(&number)
                    .execute(&mut *tx)
                    .await?;

                    tx.commit().await?;
                    Ok(Some(identity))
                }
            })
            .await
    }

    async fn stats(&self) -> Result<SlotStats, GatewayError> {
        self.gateway
            .with_retry(|pool| async move {
                let row = sqlx::query(
                    "SELECT COUNT(*) FILTER (WHERE is_used) AS used, COUNT(*) AS total \
                     FROM sequence_slots",
                )
                .fetch_one(&pool)
                .await?;

                let used: i64 = row.try_get("used")?;
                let total: i64 = row.try_get("total")?;
                Ok(SlotStats {
                    used: used as u64,
                    total: total as u64,
                })
            })
            .await
    }
}

#[derive(Debug)]
struct MemorySlot {
    number: String,
    assigned: Option<String>,
}

/// In-memory slot store with the same claim semantics, for tests and local
/// runs without a database. The mutex fully serializes claims, so every
/// winner here gets the strictly smallest number; the Postgres store's
/// `SKIP LOCKED` lets simultaneous winners take near-smallest numbers
/// instead. Uniqueness and exhaustion behave identically.
pub struct InMemorySlotStore {
    slots: Mutex<Vec<MemorySlot>>,
}

impl InMemorySlotStore {
    pub fn with_numbers(numbers: Vec<String>) -> Self {
        let mut slots: Vec<MemorySlot> = numbers
            .into_iter()
            .map(|number| MemorySlot {
                number,
                assigned: None,
            })
            .collect();
        slots.sort_by(|a, b| a.number.cmp(&b.number));
        Self {
            slots: Mutex::new(slots),
        }
    }

    pub fn with_capacity(count: u32) -> Self {
        Self::with_numbers((1..=count).map(|n| format!("{:04}", n)).collect())
    }
}

#[async_trait::async_trait]
impl SlotStore for InMemorySlotStore {
    async fn claim(&self, label: &str) -> Result<Option<OwnerIdentity>, GatewayError> {
        let mut slots = self.slots.lock().expect("slot store poisoned");
        let Some(slot) = slots.iter_mut().find(|s| s.assigned.is_none()) else {
            return Ok(None);
        };

        let identity = OwnerIdentity::new(label, &slot.number);
        slot.assigned = Some(identity.token());
        Ok(Some(identity))
    }

    async fn stats(&self) -> Result<SlotStats, GatewayError> {
        let slots = self.slots.lock().expect("slot store poisoned");
        let used = slots.iter().filter(|s| s.assigned.is_some()).count() as u64;
        Ok(SlotStats {
            used,
            total: slots.len() as u64,
        })
    }
}
