//! Usage log entries, the durable record of every selection outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a selection ultimately ended
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UsageOutcome {
    /// Downstream call completed and produced usage data
    Success,
    /// Selection was approved but the downstream call failed
    Failed,
    /// The spending guard denied the request
    Rejected,
}

/// Immutable record of a completed or rejected selection.
///
/// Append-only. The request id doubles as the dedup key so a retried write
/// cannot double-count in the performance ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageLogEntry {
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub model_id: String,
    pub task_type: String,
    pub estimated_cost_usd: f64,
    pub actual_cost_usd: Option<f64>,
    pub latency_ms: Option<u64>,
    pub outcome: UsageOutcome,
}
