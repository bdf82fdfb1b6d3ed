//! Owner identities: a category label plus an allocated sequence number.
//!
//! The number is the uniqueness key; the label is independent randomness and
//! collisions in it are expected and harmless.

use crate::db::{GatewayError, SlotStats, SlotStore};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// The twelve fixed category labels.
pub const CATEGORY_LABELS: [&str; 12] = [
    "rat", "ox", "tiger", "rabbit", "dragon", "snake", "horse", "sheep", "monkey", "rooster",
    "dog", "pig",
];

/// A human-readable owner token, e.g. `dragon-0001`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerIdentity {
    pub label: String,
    pub number: String,
}

impl OwnerIdentity {
    pub fn new(label: &str, number: &str) -> Self {
        Self {
            label: label.to_string(),
            number: number.to_string(),
        }
    }

    pub fn token(&self) -> String {
        format!("{}-{}", self.label, self.number)
    }

    /// Parse and validate a token: known label, dash, fixed-width number.
    pub fn parse(token: &str) -> Option<Self> {
        let (label, number) = token.split_once('-')?;
        if !CATEGORY_LABELS.contains(&label) {
            return None;
        }
        if number.len() != 4 || !number.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self::new(label, number))
    }
}

impl fmt::Display for OwnerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.label, self.number)
    }
}

/// Allocation failures. Exhaustion is terminal capacity, not a transient
/// fault: callers must not retry it.
#[derive(Debug, thiserror::Error)]
pub enum AllocateError {
    #[error("sequence pool exhausted")]
    Exhausted,

    #[error(transparent)]
    Store(#[from] GatewayError),
}

/// Hands out identities from the bounded slot pool.
pub struct SequenceAllocator {
    store: Arc<dyn SlotStore>,
}

impl SequenceAllocator {
    pub fn new(store: Arc<dyn SlotStore>) -> Self {
        Self { store }
    }

    pub async fn allocate(&self) -> Result<OwnerIdentity, AllocateError> {
        let label = random_label();
        match self.store.claim(label).await? {
            Some(identity) => {
                info!(identity = %identity, "owner identity allocated");
                Ok(identity)
            }
            None => Err(AllocateError::Exhausted),
        }
    }

    pub async fn stats(&self) -> Result<SlotStats, AllocateError> {
        Ok(self.store.stats().await?)
    }
}

fn random_label() -> &'static str {
    CATEGORY_LABELS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(CATEGORY_LABELS[0])
}

/// Return the cached identity untouched, or allocate exactly one.
///
/// Called once per client session, independent of the recording pipeline; an
/// identity is never re-validated against the store after allocation.
pub async fn ensure_identity(
    existing: Option<OwnerIdentity>,
    allocator: &SequenceAllocator,
) -> Result<OwnerIdentity, AllocateError> {
    match existing {
        Some(identity) => Ok(identity),
        None => allocator.allocate().await,
    }
}
