//! Cost estimation from token counts and per-1k prices.

use tracing::error;

use super::{CostBreakdown, RoutingResult, SelectionError, TokenEstimate};
use crate::models::ModelSpec;

/// Computes a request's estimated monetary cost for one model.
///
/// `prompt_split` is the share of a total-only token estimate attributed to
/// the prompt; the remainder is treated as completion tokens.
#[derive(Debug, Clone)]
pub struct CostEstimator {
    prompt_split: f64,
}

impl CostEstimator {
    pub fn new(prompt_split: f64) -> Self {
        Self {
            prompt_split: prompt_split.clamp(0.0, 1.0),
        }
    }

    /// Breakdown for an explicit prompt/completion split
    pub fn estimate(
        &self,
        model: &ModelSpec,
        prompt_tokens: u32,
        completion_tokens: u32,
    ) -> RoutingResult<CostBreakdown> {
        if !model.pricing_is_valid() {
            // Data-integrity alarm: this should have been caught at catalog
            // ingestion. Fail closed rather than guess.
            error!(model = %model.id, "malformed pricing reached the estimator");
            return Err(SelectionError::InvalidModelPricing {
                model: model.id.clone(),
                detail: format!(
                    "cost_per_1k_prompt={}, cost_per_1k_completion={}",
                    model.cost_per_1k_prompt, model.cost_per_1k_completion
                ),
            });
        }
        let prompt_cost = prompt_tokens as f64 / 1000.0 * model.cost_per_1k_prompt;
        let completion_cost = completion_tokens as f64 / 1000.0 * model.cost_per_1k_completion;
        Ok(CostBreakdown {
            prompt_cost,
            completion_cost,
            total: prompt_cost + completion_cost,
        })
    }

    /// Breakdown for whatever shape of estimate the request carries
    pub fn estimate_tokens(
        &self,
        model: &ModelSpec,
        tokens: TokenEstimate,
    ) -> RoutingResult<CostBreakdown> {
        match tokens {
            TokenEstimate::Split { prompt, completion } => self.estimate(model, prompt, completion),
            TokenEstimate::Total { total } => {
                let prompt = (total as f64 * self.prompt_split).round() as u32;
                let completion = total.saturating_sub(prompt);
                self.estimate(model, prompt, completion)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelCapability;

    fn model(prompt_per_1k: f64, completion_per_1k: f64) -> ModelSpec {
        ModelSpec {
            id: "m1".to_string(),
            display_name: "Model One".to_string(),
            provider_id: "openai".to_string(),
            cost_per_1k_prompt: prompt_per_1k,
            cost_per_1k_completion: completion_per_1k,
            context_window: 16_384,
            max_output_tokens: 4_096,
            capabilities: vec![ModelCapability::TextGeneration],
            active: true,
        }
    }

    #[test]
    fn test_breakdown_math() {
        let estimator = CostEstimator::new(0.7);
        let cost = estimator.estimate(&model(0.001, 0.002), 2000, 500).unwrap();
        assert!((cost.prompt_cost - 0.002).abs() < 1e-12);
        assert!((cost.completion_cost - 0.001).abs() < 1e-12);
        assert_eq!(cost.total, cost.prompt_cost + cost.completion_cost);
    }

    #[test]
    fn test_cost_never_negative_and_sum_exact() {
        let estimator = CostEstimator::new(0.7);
        let cases = [
            (0u32, 0u32),
            (1, 0),
            (0, 1),
            (1_000_000, 1_000_000),
            (333, 777),
        ];
        for (prompt, completion) in cases {
            let cost = estimator
                .estimate(&model(0.0015, 0.006), prompt, completion)
                .unwrap();
            assert!(cost.prompt_cost >= 0.0);
            assert!(cost.completion_cost >= 0.0);
            assert!(cost.total >= 0.0);
            assert_eq!(cost.total, cost.prompt_cost + cost.completion_cost);
        }
    }

    #[test]
    fn test_total_only_split() {
        let estimator = CostEstimator::new(0.7);
        // 1000 total tokens split 700/300
        let cost = estimator
            .estimate_tokens(&model(0.001, 0.002), TokenEstimate::Total { total: 1000 })
            .unwrap();
        assert!((cost.prompt_cost - 0.0007).abs() < 1e-12);
        assert!((cost.completion_cost - 0.0006).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_pricing_fails_closed() {
        let estimator = CostEstimator::new(0.7);
        let err = estimator.estimate(&model(-0.001, 0.002), 100, 100);
        assert!(matches!(
            err,
            Err(SelectionError::InvalidModelPricing { .. })
        ));
        let err = estimator.estimate(&model(0.001, f64::NAN), 100, 100);
        assert!(matches!(
            err,
            Err(SelectionError::InvalidModelPricing { .. })
        ));
    }
}
