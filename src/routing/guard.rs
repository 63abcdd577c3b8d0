//! Spending guard: the gate every selection passes before a model call is
//! authorized.
//!
//! Check order is fixed: emergency breaker, per-request cap, daily ceiling,
//! hourly ceiling, daily quota. Approval charges the counters optimistically;
//! the usage recorder issues the compensating release if the downstream call
//! fails.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::{RejectReason, RoutingResult};
use crate::config::SwapperConfig;
use crate::models::TierPolicy;
use crate::spending::{ChargeOutcome, LimitDimension, PeriodLimits, SpendingStore};

/// Outcome of an authorization attempt.
///
/// A rejection is a normal decision, not an error; it carries the reason
/// code, the limit, and the amount the request would have reached, so
/// callers can explain the denial precisely.
#[derive(Debug, Clone)]
pub enum Authorization {
    Approved {
        warnings: Vec<String>,
    },
    Rejected {
        reason: RejectReason,
        limit: f64,
        requested: f64,
    },
}

impl Authorization {
    pub fn is_approved(&self) -> bool {
        matches!(self, Authorization::Approved { .. })
    }
}

/// Enforces the emergency breaker and per-tier spending limits
pub struct SpendingGuard {
    store: Arc<dyn SpendingStore>,
    emergency_daily_ceiling_usd: f64,
    near_limit_fraction: f64,
}

impl SpendingGuard {
    pub fn new(store: Arc<dyn SpendingStore>, config: &SwapperConfig) -> Self {
        Self {
            store,
            emergency_daily_ceiling_usd: config.emergency_daily_ceiling_usd,
            near_limit_fraction: config.near_limit_fraction,
        }
    }

    /// Authorize `estimated_cost` for the user under the given policy.
    ///
    /// On approval the user's counters have already been incremented; a
    /// failed downstream call must be followed by `release`.
    pub async fn authorize(
        &self,
        user_id: &str,
        policy: &TierPolicy,
        estimated_cost: f64,
        critical: bool,
        at: DateTime<Utc>,
    ) -> RoutingResult<Authorization> {
        // 1. Emergency circuit breaker, independent of tier
        if !critical {
            let system_spend = self.store.system_daily_spend(at).await?;
            if system_spend > self.emergency_daily_ceiling_usd {
                warn!(
                    system_spend,
                    ceiling = self.emergency_daily_ceiling_usd,
                    "emergency breaker tripped, rejecting request"
                );
                return Ok(Authorization::Rejected {
                    reason: RejectReason::EmergencyBreaker,
                    limit: self.emergency_daily_ceiling_usd,
                    requested: system_spend + estimated_cost,
                });
            }
        }

        // 2. Per-request cap
        if estimated_cost > policy.max_cost_per_request_usd {
            return Ok(Authorization::Rejected {
                reason: RejectReason::PerRequestCap,
                limit: policy.max_cost_per_request_usd,
                requested: estimated_cost,
            });
        }

        // 3-5. Period ceilings and quota, checked and charged atomically
        let limits = PeriodLimits {
            daily_ceiling_usd: policy.daily_ceiling_usd,
            hourly_ceiling_usd: policy.hourly_ceiling_usd,
            daily_request_quota: policy.daily_request_quota,
        };
        match self
            .store
            .try_charge(user_id, at, estimated_cost, &limits)
            .await?
        {
            ChargeOutcome::Charged { daily } => {
                let mut warnings = Vec::new();
                let remaining = policy.daily_ceiling_usd - daily.spent_usd;
                if remaining < policy.daily_ceiling_usd * self.near_limit_fraction {
                    warnings.push(format!(
                        "near daily limit: ${:.2} of ${:.2} spent",
                        daily.spent_usd, policy.daily_ceiling_usd
                    ));
                }
                info!(
                    user = user_id,
                    cost = estimated_cost,
                    daily_spent = daily.spent_usd,
                    "spending authorized"
                );
                Ok(Authorization::Approved { warnings })
            }
            ChargeOutcome::LimitExceeded {
                dimension,
                limit,
                attempted,
            } => {
                let reason = match dimension {
                    LimitDimension::DailySpend => RejectReason::DailyCeiling,
                    LimitDimension::HourlySpend => RejectReason::HourlyCeiling,
                    LimitDimension::DailyRequests => RejectReason::QuotaExceeded,
                };
                Ok(Authorization::Rejected {
                    reason,
                    limit,
                    requested: attempted,
                })
            }
        }
    }

    /// Compensating update for an approved charge that never produced a
    /// completed call
    pub async fn release(
        &self,
        user_id: &str,
        estimated_cost: f64,
        at: DateTime<Utc>,
    ) -> RoutingResult<()> {
        self.store.release(user_id, at, estimated_cost).await?;
        Ok(())
    }

    /// Breaker state for the diagnostic surface
    pub async fn breaker_tripped(&self, at: DateTime<Utc>) -> RoutingResult<bool> {
        let system_spend = self.store.system_daily_spend(at).await?;
        Ok(system_spend > self.emergency_daily_ceiling_usd)
    }

    /// Today's system-wide spend
    pub async fn system_spend(&self, at: DateTime<Utc>) -> RoutingResult<f64> {
        Ok(self.store.system_daily_spend(at).await?)
    }

    pub fn emergency_ceiling(&self) -> f64 {
        self.emergency_daily_ceiling_usd
    }
}
