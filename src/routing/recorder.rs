//! Usage recorder: folds completed (or failed) calls back into the ledger,
//! the usage log, and the spending counters.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use super::{RoutingResult, SpendingGuard};
use crate::config::SwapperConfig;
use crate::ledger::{Observation, PerformanceLedger};
use crate::models::{UsageLogEntry, UsageOutcome};
use crate::usage::UsageSink;

/// What actually happened after a selection was handed to the AI caller
#[derive(Debug, Clone)]
pub struct ActualOutcome {
    pub request_id: Uuid,
    pub user_id: String,
    pub model_id: String,
    pub task_type: String,
    pub estimated_cost_usd: f64,
    /// None when the call failed before producing usage data
    pub actual_cost_usd: Option<f64>,
    pub latency_ms: Option<u64>,
    pub success: bool,
    pub at: DateTime<Utc>,
}

/// Persists selection outcomes and keeps the performance ledger current.
///
/// Recording is idempotent on request id: a retried write is detected
/// through the usage log and skipped, so the ledger never double-counts.
pub struct UsageRecorder {
    sink: Arc<dyn UsageSink>,
    ledger: Arc<dyn PerformanceLedger>,
    guard: Arc<SpendingGuard>,
    sample_cap: u32,
}

impl UsageRecorder {
    pub fn new(
        sink: Arc<dyn UsageSink>,
        ledger: Arc<dyn PerformanceLedger>,
        guard: Arc<SpendingGuard>,
        config: &SwapperConfig,
    ) -> Self {
        Self {
            sink,
            ledger,
            guard,
            sample_cap: config.sample_cap,
        }
    }

    /// Record the outcome of a previously approved selection
    pub async fn record(&self, outcome: ActualOutcome) -> RoutingResult<()> {
        if self.sink.contains(outcome.request_id).await? {
            warn!(
                request = %outcome.request_id,
                "duplicate usage report ignored"
            );
            return Ok(());
        }

        let entry = UsageLogEntry {
            request_id: outcome.request_id,
            timestamp: outcome.at,
            user_id: outcome.user_id.clone(),
            model_id: outcome.model_id.clone(),
            task_type: outcome.task_type.clone(),
            estimated_cost_usd: outcome.estimated_cost_usd,
            actual_cost_usd: outcome.actual_cost_usd,
            latency_ms: outcome.latency_ms,
            outcome: if outcome.success {
                UsageOutcome::Success
            } else {
                UsageOutcome::Failed
            },
        };
        self.sink.append(entry).await?;

        let observation = Observation {
            success: outcome.success,
            latency_ms: outcome.latency_ms.unwrap_or(0),
            cost_usd: outcome.actual_cost_usd.unwrap_or(0.0),
        };
        self.ledger
            .observe(
                &outcome.model_id,
                &outcome.task_type,
                observation,
                self.sample_cap,
            )
            .await;

        if !outcome.success {
            // The guard pre-charged optimistically; give the budget back.
            self.guard
                .release(&outcome.user_id, outcome.estimated_cost_usd, outcome.at)
                .await?;
            info!(
                request = %outcome.request_id,
                user = %outcome.user_id,
                refunded = outcome.estimated_cost_usd,
                "downstream call failed, spending charge reversed"
            );
        }
        Ok(())
    }

    /// Log a guard-rejected selection. Nothing was charged, so there is no
    /// ledger or spending update.
    pub async fn record_rejection(
        &self,
        request_id: Uuid,
        user_id: &str,
        model_id: &str,
        task_type: &str,
        estimated_cost_usd: f64,
        at: DateTime<Utc>,
    ) -> RoutingResult<()> {
        if self.sink.contains(request_id).await? {
            return Ok(());
        }
        self.sink
            .append(UsageLogEntry {
                request_id,
                timestamp: at,
                user_id: user_id.to_string(),
                model_id: model_id.to_string(),
                task_type: task_type.to_string(),
                estimated_cost_usd,
                actual_cost_usd: None,
                latency_ms: None,
                outcome: UsageOutcome::Rejected,
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SpendPeriod, TierPolicy, UserTier};
    use crate::spending::{InMemorySpendingStore, SpendingStore};
    use crate::usage::InMemoryUsageLog;

    struct Fixture {
        sink: Arc<InMemoryUsageLog>,
        ledger: Arc<crate::ledger::InMemoryLedger>,
        store: Arc<InMemorySpendingStore>,
        guard: Arc<SpendingGuard>,
        recorder: UsageRecorder,
    }

    fn fixture() -> Fixture {
        let config = SwapperConfig::default();
        let sink = Arc::new(InMemoryUsageLog::new());
        let ledger = Arc::new(crate::ledger::InMemoryLedger::new());
        let store = Arc::new(InMemorySpendingStore::new());
        let guard = Arc::new(SpendingGuard::new(
            store.clone() as Arc<dyn SpendingStore>,
            &config,
        ));
        let recorder = UsageRecorder::new(
            sink.clone() as Arc<dyn UsageSink>,
            ledger.clone() as Arc<dyn PerformanceLedger>,
            guard.clone(),
            &config,
        );
        Fixture {
            sink,
            ledger,
            store,
            guard,
            recorder,
        }
    }

    fn outcome(request_id: Uuid, success: bool) -> ActualOutcome {
        ActualOutcome {
            request_id,
            user_id: "u1".to_string(),
            model_id: "m1".to_string(),
            task_type: "summarization".to_string(),
            estimated_cost_usd: 0.10,
            actual_cost_usd: if success { Some(0.09) } else { None },
            latency_ms: if success { Some(800) } else { None },
            success,
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_success_updates_ledger_and_log() {
        let fx = fixture();
        let id = Uuid::new_v4();
        fx.recorder.record(outcome(id, true)).await.unwrap();

        let record = fx.ledger.get("m1", "summarization").await.unwrap();
        assert_eq!(record.samples, 1);
        assert_eq!(record.reliability, 1.0);
        assert!(fx.sink.contains(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_recording_is_idempotent() {
        let fx = fixture();
        let id = Uuid::new_v4();
        fx.recorder.record(outcome(id, true)).await.unwrap();
        fx.recorder.record(outcome(id, true)).await.unwrap();

        // One sample, not two
        let record = fx.ledger.get("m1", "summarization").await.unwrap();
        assert_eq!(record.samples, 1);
        assert_eq!(fx.sink.recent(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_refunds_the_charge() {
        let fx = fixture();
        let now = Utc::now();
        let policy = TierPolicy::for_tier(UserTier::Clawback);
        fx.guard
            .authorize("u1", policy, 0.10, false, now)
            .await
            .unwrap();
        let charged = fx.store.state("u1", SpendPeriod::Day, now).await.unwrap();
        assert!((charged.spent_usd - 0.10).abs() < 1e-12);

        let mut failed = outcome(Uuid::new_v4(), false);
        failed.at = now;
        fx.recorder.record(failed).await.unwrap();

        let after = fx.store.state("u1", SpendPeriod::Day, now).await.unwrap();
        assert_eq!(after.spent_usd, 0.0);

        // Failure still counts against reliability
        let record = fx.ledger.get("m1", "summarization").await.unwrap();
        assert_eq!(record.reliability, 0.0);
        assert_eq!(record.samples, 1);
    }

    #[tokio::test]
    async fn test_rejection_entry_is_logged() {
        let fx = fixture();
        let id = Uuid::new_v4();
        fx.recorder
            .record_rejection(id, "u1", "m1", "summarization", 0.10, Utc::now())
            .await
            .unwrap();
        let entries = fx.sink.recent(10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome, UsageOutcome::Rejected);
        // No ledger entry for a rejection
        assert!(fx.ledger.get("m1", "summarization").await.is_none());
    }
}
