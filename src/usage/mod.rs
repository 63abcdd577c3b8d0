//! Usage log sink, the durable append-only record of selection outcomes.
//!
//! Entries are the source of truth for billing and learning. The sink is
//! write-once per request id; the read side exists for the recorder's dedup
//! check and the admin surface.

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::UsageLogEntry;

/// Usage log failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum UsageLogError {
    #[error("usage log unavailable: {0}")]
    Unavailable(String),
}

/// Append-only usage log interface
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn append(&self, entry: UsageLogEntry) -> Result<(), UsageLogError>;

    /// Whether an entry for this request id already exists. Dedup key for
    /// idempotent recording.
    async fn contains(&self, request_id: Uuid) -> Result<bool, UsageLogError>;

    /// Most recent entries, newest last. For diagnostics only.
    async fn recent(&self, limit: usize) -> Result<Vec<UsageLogEntry>, UsageLogError>;
}

/// In-memory usage log for development and tests
pub struct InMemoryUsageLog {
    entries: RwLock<Vec<UsageLogEntry>>,
}

impl InMemoryUsageLog {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryUsageLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UsageSink for InMemoryUsageLog {
    async fn append(&self, entry: UsageLogEntry) -> Result<(), UsageLogError> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn contains(&self, request_id: Uuid) -> Result<bool, UsageLogError> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .any(|e| e.request_id == request_id))
    }

    async fn recent(&self, limit: usize) -> Result<Vec<UsageLogEntry>, UsageLogError> {
        let entries = self.entries.read().await;
        let start = entries.len().saturating_sub(limit);
        Ok(entries[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UsageOutcome;
    use chrono::Utc;

    fn entry(request_id: Uuid) -> UsageLogEntry {
        UsageLogEntry {
            request_id,
            timestamp: Utc::now(),
            user_id: "u1".to_string(),
            model_id: "m1".to_string(),
            task_type: "summarization".to_string(),
            estimated_cost_usd: 0.01,
            actual_cost_usd: Some(0.009),
            latency_ms: Some(750),
            outcome: UsageOutcome::Success,
        }
    }

    #[tokio::test]
    async fn test_append_and_contains() {
        let log = InMemoryUsageLog::new();
        let id = Uuid::new_v4();
        assert!(!log.contains(id).await.unwrap());
        log.append(entry(id)).await.unwrap();
        assert!(log.contains(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_recent_returns_tail() {
        let log = InMemoryUsageLog::new();
        let ids: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            log.append(entry(*id)).await.unwrap();
        }
        let tail = log.recent(2).await.unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[1].request_id, ids[4]);
    }
}
