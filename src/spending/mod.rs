//! Spending counters behind an atomic check-and-increment interface.
//!
//! These counters are the only strictly-shared mutable state in the
//! selection pipeline. `try_charge` must check every ceiling and apply the
//! increment as one atomic operation against the backing store; two
//! concurrent requests from one user must never both pass when only one
//! fits under a ceiling. The bundled implementation holds a single write
//! lock for the duration of the operation; a relational backend would use a
//! row-level conditional update behind the same trait.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::models::{SpendPeriod, SpendingState};

/// Spending persistence failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum SpendingError {
    #[error("spending store unavailable: {0}")]
    Unavailable(String),
}

/// Per-period ceilings a charge is checked against
#[derive(Debug, Clone, Copy)]
pub struct PeriodLimits {
    pub daily_ceiling_usd: f64,
    pub hourly_ceiling_usd: f64,
    pub daily_request_quota: u32,
}

/// Which ceiling a rejected charge hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LimitDimension {
    DailySpend,
    HourlySpend,
    DailyRequests,
}

/// Result of an atomic charge attempt
#[derive(Debug, Clone)]
pub enum ChargeOutcome {
    /// Counters were incremented; `daily` is the state after the charge
    Charged { daily: SpendingState },
    /// Nothing was incremented. `attempted` is the total the charge would
    /// have produced, so callers can report the overshoot precisely.
    LimitExceeded {
        dimension: LimitDimension,
        limit: f64,
        attempted: f64,
    },
}

/// Atomic counter interface backing the spending guard
#[async_trait]
pub trait SpendingStore: Send + Sync {
    /// Atomically check all limits and, if every one holds, add the cost and
    /// one request to the user's daily and hourly counters plus the
    /// system-wide daily total.
    async fn try_charge(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
        cost_usd: f64,
        limits: &PeriodLimits,
    ) -> Result<ChargeOutcome, SpendingError>;

    /// Compensating update for a charge whose downstream call failed or was
    /// abandoned. Floors at zero rather than going negative.
    async fn release(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
        cost_usd: f64,
    ) -> Result<(), SpendingError>;

    async fn state(
        &self,
        user_id: &str,
        period: SpendPeriod,
        at: DateTime<Utc>,
    ) -> Result<SpendingState, SpendingError>;

    /// Today's spend across all users, for the emergency breaker
    async fn system_daily_spend(&self, at: DateTime<Utc>) -> Result<f64, SpendingError>;
}

fn user_key(user_id: &str, period: SpendPeriod, at: DateTime<Utc>) -> String {
    match period {
        SpendPeriod::Day => format!("user|{}|D|{}", user_id, period.key(at)),
        SpendPeriod::Hour => format!("user|{}|H|{}", user_id, period.key(at)),
    }
}

fn system_key(at: DateTime<Utc>) -> String {
    format!("system|D|{}", SpendPeriod::Day.key(at))
}

/// In-memory spending store.
///
/// A single map guarded by one lock keeps the multi-counter update atomic.
/// Period rollover happens through the bucket key, so stale buckets are
/// simply never read again.
pub struct InMemorySpendingStore {
    inner: RwLock<HashMap<String, SpendingState>>,
}

impl InMemorySpendingStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySpendingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpendingStore for InMemorySpendingStore {
    async fn try_charge(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
        cost_usd: f64,
        limits: &PeriodLimits,
    ) -> Result<ChargeOutcome, SpendingError> {
        let day_key = user_key(user_id, SpendPeriod::Day, at);
        let hour_key = user_key(user_id, SpendPeriod::Hour, at);
        let sys_key = system_key(at);

        // Checks and increments happen under one write lock; nothing else
        // can interleave between the check and the update.
        let mut counters = self.inner.write().await;

        let daily = counters.get(&day_key).copied().unwrap_or_default();
        let hourly = counters.get(&hour_key).copied().unwrap_or_default();

        let attempted_daily = daily.spent_usd + cost_usd;
        if attempted_daily > limits.daily_ceiling_usd {
            return Ok(ChargeOutcome::LimitExceeded {
                dimension: LimitDimension::DailySpend,
                limit: limits.daily_ceiling_usd,
                attempted: attempted_daily,
            });
        }

        let attempted_hourly = hourly.spent_usd + cost_usd;
        if attempted_hourly > limits.hourly_ceiling_usd {
            return Ok(ChargeOutcome::LimitExceeded {
                dimension: LimitDimension::HourlySpend,
                limit: limits.hourly_ceiling_usd,
                attempted: attempted_hourly,
            });
        }

        if daily.requests + 1 > limits.daily_request_quota {
            return Ok(ChargeOutcome::LimitExceeded {
                dimension: LimitDimension::DailyRequests,
                limit: limits.daily_request_quota as f64,
                attempted: (daily.requests + 1) as f64,
            });
        }

        let day = counters.entry(day_key).or_default();
        day.spent_usd += cost_usd;
        day.requests += 1;
        let charged_daily = *day;

        let hour = counters.entry(hour_key).or_default();
        hour.spent_usd += cost_usd;
        hour.requests += 1;

        let system = counters.entry(sys_key).or_default();
        system.spent_usd += cost_usd;
        system.requests += 1;

        Ok(ChargeOutcome::Charged {
            daily: charged_daily,
        })
    }

    async fn release(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
        cost_usd: f64,
    ) -> Result<(), SpendingError> {
        let mut counters = self.inner.write().await;
        for key in [
            user_key(user_id, SpendPeriod::Day, at),
            user_key(user_id, SpendPeriod::Hour, at),
            system_key(at),
        ] {
            if let Some(state) = counters.get_mut(&key) {
                state.spent_usd = (state.spent_usd - cost_usd).max(0.0);
                state.requests = state.requests.saturating_sub(1);
            }
        }
        Ok(())
    }

    async fn state(
        &self,
        user_id: &str,
        period: SpendPeriod,
        at: DateTime<Utc>,
    ) -> Result<SpendingState, SpendingError> {
        let counters = self.inner.read().await;
        Ok(counters
            .get(&user_key(user_id, period, at))
            .copied()
            .unwrap_or_default())
    }

    async fn system_daily_spend(&self, at: DateTime<Utc>) -> Result<f64, SpendingError> {
        let counters = self.inner.read().await;
        Ok(counters
            .get(&system_key(at))
            .map(|s| s.spent_usd)
            .unwrap_or(0.0))
    }
}
