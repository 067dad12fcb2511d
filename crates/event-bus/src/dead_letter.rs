use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::EventEnvelope;

/// An event a consumer group gave up on, kept for manual inspection.
#[derive(Debug, Clone, Serialize)]
pub struct DeadLetter {
    pub topic: String,
    pub group: String,
    pub partition: usize,
    pub offset: u64,
    pub event: EventEnvelope,
    pub error: String,
    /// Number of delivery attempts made before giving up.
    pub attempts: u32,
    pub dead_lettered_at: DateTime<Utc>,
}
