//! Deployment configuration for the selection pipeline.
//!
//! Everything tunable lives here: scoring weights, the emergency ceiling,
//! the prompt/completion split, and the moving-average cap. Defaults work
//! out of the box; `from_env` overrides individual values with
//! `MODEL_SWAPPER_*` environment variables.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Weights for the blended candidate score.
///
/// The selector normalizes by the sum of the four weights, so only their
/// ratios matter. `neutral_reliability` is the prior used for models with no
/// performance history; `cost_scale` sets the dollar amount at which the
/// cost term halves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub reliability: f64,
    pub latency: f64,
    pub cost: f64,
    pub preference: f64,
    pub neutral_reliability: f64,
    pub cost_scale: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            reliability: 0.4,
            latency: 0.2,
            cost: 0.3,
            preference: 0.1,
            neutral_reliability: 0.7,
            cost_scale: 0.01,
        }
    }
}

/// Top-level configuration for a ModelSwapper deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapperConfig {
    pub weights: ScoringWeights,
    /// System-wide daily hard ceiling in USD; tripping it rejects all
    /// non-critical requests regardless of tier
    pub emergency_daily_ceiling_usd: f64,
    /// Fraction of a total token estimate attributed to the prompt when no
    /// prompt/completion split is supplied
    pub prompt_split: f64,
    /// Cap on the effective sample count in the moving-average update
    pub sample_cap: u32,
    /// Approvals leaving less than this fraction of the daily ceiling attach
    /// a near-limit warning
    pub near_limit_fraction: f64,
}

impl Default for SwapperConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            emergency_daily_ceiling_usd: 50.0,
            prompt_split: 0.7,
            sample_cap: 100,
            near_limit_fraction: 0.2,
        }
    }
}

fn env_f64(name: &str, current: f64) -> f64 {
    match std::env::var(name) {
        Ok(raw) => match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => value,
            _ => {
                warn!("ignoring unparseable {}={:?}", name, raw);
                current
            }
        },
        Err(_) => current,
    }
}

fn env_u32(name: &str, current: u32) -> u32 {
    match std::env::var(name) {
        Ok(raw) => match raw.parse::<u32>() {
            Ok(value) => value,
            Err(_) => {
                warn!("ignoring unparseable {}={:?}", name, raw);
                current
            }
        },
        Err(_) => current,
    }
}

impl SwapperConfig {
    /// Defaults overridden by any `MODEL_SWAPPER_*` variables present
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.weights.reliability =
            env_f64("MODEL_SWAPPER_WEIGHT_RELIABILITY", config.weights.reliability);
        config.weights.latency = env_f64("MODEL_SWAPPER_WEIGHT_LATENCY", config.weights.latency);
        config.weights.cost = env_f64("MODEL_SWAPPER_WEIGHT_COST", config.weights.cost);
        config.weights.preference =
            env_f64("MODEL_SWAPPER_WEIGHT_PREFERENCE", config.weights.preference);
        config.weights.neutral_reliability = env_f64(
            "MODEL_SWAPPER_NEUTRAL_RELIABILITY",
            config.weights.neutral_reliability,
        );
        config.weights.cost_scale = env_f64("MODEL_SWAPPER_COST_SCALE", config.weights.cost_scale);
        config.emergency_daily_ceiling_usd = env_f64(
            "MODEL_SWAPPER_EMERGENCY_DAILY_CEILING",
            config.emergency_daily_ceiling_usd,
        );
        config.prompt_split = env_f64("MODEL_SWAPPER_PROMPT_SPLIT", config.prompt_split);
        config.sample_cap = env_u32("MODEL_SWAPPER_SAMPLE_CAP", config.sample_cap);
        config.near_limit_fraction = env_f64(
            "MODEL_SWAPPER_NEAR_LIMIT_FRACTION",
            config.near_limit_fraction,
        );
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let config = SwapperConfig::default();
        assert_eq!(config.emergency_daily_ceiling_usd, 50.0);
        assert_eq!(config.prompt_split, 0.7);
        assert!(config.weights.reliability > 0.0);
        assert!(config.near_limit_fraction > 0.0 && config.near_limit_fraction < 1.0);
    }

    #[test]
    fn test_env_override_and_bad_value() {
        std::env::set_var("MODEL_SWAPPER_TEST_F64", "0.9");
        assert_eq!(env_f64("MODEL_SWAPPER_TEST_F64", 0.1), 0.9);
        std::env::set_var("MODEL_SWAPPER_TEST_F64", "not-a-number");
        assert_eq!(env_f64("MODEL_SWAPPER_TEST_F64", 0.1), 0.1);
        std::env::remove_var("MODEL_SWAPPER_TEST_F64");
        assert_eq!(env_f64("MODEL_SWAPPER_TEST_F64", 0.1), 0.1);
    }
}
