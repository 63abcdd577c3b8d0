//! Performance ledger: per (model, task) rolling statistics.
//!
//! Records are created lazily on first observation and updated with a
//! capped moving average so very old data loses influence without being
//! discarded. The counters are approximate by contract, so the in-memory
//! implementation uses a concurrent map with per-entry locking rather than
//! strict cross-entry transactions.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Rolling aggregate for one (model, task) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub model_id: String,
    pub task_type: String,
    /// Success rate in [0, 1]
    pub reliability: f64,
    pub avg_latency_ms: f64,
    pub avg_cost_usd: f64,
    pub samples: u64,
}

/// One completed request's contribution to the ledger
#[derive(Debug, Clone, Copy)]
pub struct Observation {
    pub success: bool,
    pub latency_ms: u64,
    pub cost_usd: f64,
}

/// Read/update interface for performance statistics
#[async_trait]
pub trait PerformanceLedger: Send + Sync {
    async fn get(&self, model_id: &str, task_type: &str) -> Option<PerformanceRecord>;

    /// Fold one observation into the record, bounding the averaging window
    /// at `sample_cap` effective samples
    async fn observe(&self, model_id: &str, task_type: &str, obs: Observation, sample_cap: u32);
}

/// Capped moving-average step: the divisor saturates at `cap` so the update
/// keeps tracking recent behavior instead of freezing as n grows.
fn rolling_update(old_avg: f64, sample: f64, samples_before: u64, cap: u32) -> f64 {
    let effective = (samples_before + 1).min(cap.max(1) as u64) as f64;
    old_avg + (sample - old_avg) / effective
}

/// In-memory ledger for development and tests
pub struct InMemoryLedger {
    records: DashMap<(String, String), PerformanceRecord>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PerformanceLedger for InMemoryLedger {
    async fn get(&self, model_id: &str, task_type: &str) -> Option<PerformanceRecord> {
        self.records
            .get(&(model_id.to_string(), task_type.to_string()))
            .map(|r| r.value().clone())
    }

    async fn observe(&self, model_id: &str, task_type: &str, obs: Observation, sample_cap: u32) {
        let key = (model_id.to_string(), task_type.to_string());
        let mut entry = self.records.entry(key).or_insert_with(|| PerformanceRecord {
            model_id: model_id.to_string(),
            task_type: task_type.to_string(),
            reliability: 0.0,
            avg_latency_ms: 0.0,
            avg_cost_usd: 0.0,
            samples: 0,
        });
        let record = entry.value_mut();
        let n = record.samples;
        let success_sample = if obs.success { 1.0 } else { 0.0 };
        record.reliability = rolling_update(record.reliability, success_sample, n, sample_cap);
        if obs.success {
            // Failed calls carry no meaningful latency or cost observation.
            record.avg_latency_ms =
                rolling_update(record.avg_latency_ms, obs.latency_ms as f64, n, sample_cap);
            record.avg_cost_usd = rolling_update(record.avg_cost_usd, obs.cost_usd, n, sample_cap);
        }
        record.samples = n + 1;
    }
}
