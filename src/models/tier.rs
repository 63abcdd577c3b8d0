//! User tiers and their spending policies.
//!
//! The tier table is static configuration, not user-mutable. Ceilings and
//! quotas are monotonically non-decreasing from FREE up to MEOWTRIX.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Subscription tiers, in ascending order of entitlement
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserTier {
    Free,
    Lilbean,
    Clawback,
    Bigchonk,
    Meowtrix,
}

impl UserTier {
    pub const ALL: [UserTier; 5] = [
        UserTier::Free,
        UserTier::Lilbean,
        UserTier::Clawback,
        UserTier::Bigchonk,
        UserTier::Meowtrix,
    ];
}

impl std::fmt::Display for UserTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserTier::Free => write!(f, "FREE"),
            UserTier::Lilbean => write!(f, "LILBEAN"),
            UserTier::Clawback => write!(f, "CLAWBACK"),
            UserTier::Bigchonk => write!(f, "BIGCHONK"),
            UserTier::Meowtrix => write!(f, "MEOWTRIX"),
        }
    }
}

/// Spending ceilings and quotas for one tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierPolicy {
    pub tier: UserTier,
    pub daily_ceiling_usd: f64,
    pub hourly_ceiling_usd: f64,
    pub daily_request_quota: u32,
    pub max_cost_per_request_usd: f64,
    pub allows_user_credentials: bool,
}

lazy_static! {
    static ref TIER_POLICIES: HashMap<UserTier, TierPolicy> = {
        let mut table = HashMap::new();
        table.insert(
            UserTier::Free,
            TierPolicy {
                tier: UserTier::Free,
                daily_ceiling_usd: 0.50,
                hourly_ceiling_usd: 0.25,
                daily_request_quota: 20,
                max_cost_per_request_usd: 0.05,
                allows_user_credentials: false,
            },
        );
        table.insert(
            UserTier::Lilbean,
            TierPolicy {
                tier: UserTier::Lilbean,
                daily_ceiling_usd: 2.00,
                hourly_ceiling_usd: 1.00,
                daily_request_quota: 100,
                max_cost_per_request_usd: 0.25,
                allows_user_credentials: false,
            },
        );
        table.insert(
            UserTier::Clawback,
            TierPolicy {
                tier: UserTier::Clawback,
                daily_ceiling_usd: 10.00,
                hourly_ceiling_usd: 4.00,
                daily_request_quota: 500,
                max_cost_per_request_usd: 1.00,
                allows_user_credentials: true,
            },
        );
        table.insert(
            UserTier::Bigchonk,
            TierPolicy {
                tier: UserTier::Bigchonk,
                daily_ceiling_usd: 50.00,
                hourly_ceiling_usd: 20.00,
                daily_request_quota: 2_000,
                max_cost_per_request_usd: 10.00,
                allows_user_credentials: true,
            },
        );
        table.insert(
            UserTier::Meowtrix,
            TierPolicy {
                tier: UserTier::Meowtrix,
                daily_ceiling_usd: 200.00,
                hourly_ceiling_usd: 80.00,
                daily_request_quota: 10_000,
                max_cost_per_request_usd: 25.00,
                allows_user_credentials: true,
            },
        );
        table
    };
}

impl TierPolicy {
    /// Look up the static policy for a tier
    pub fn for_tier(tier: UserTier) -> &'static TierPolicy {
        // The table is populated for every variant above.
        &TIER_POLICIES[&tier]
    }
}
