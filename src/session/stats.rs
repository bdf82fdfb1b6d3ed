use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle states of one recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Recording,
    Processing,
    Completed,
    Failed,
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub phase: SessionPhase,

    /// When the current (or last) recording started.
    pub started_at: Option<DateTime<Utc>>,

    /// Seconds left until auto-stop; present only while recording.
    pub remaining_seconds: Option<u64>,

    /// Fragments collected so far in the current recording.
    pub fragment_count: usize,
}
