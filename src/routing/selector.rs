//! Model selector: filter, score, and authorize candidates for a request.
//!
//! Filtering narrows the catalog to models the request may legally use;
//! scoring blends reliability, latency, cost, and preference into one
//! number; the spending guard has the final word. Rankings are fully
//! deterministic: ties break on sample count, then estimated cost, then
//! model id.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    Authorization, CostBreakdown, CostEstimator, NoModelReason, RankedCandidate, RejectReason,
    RoutingResult, SelectionError, SelectionRequest, SelectionResult, SpendingGuard,
    UsageRecorder,
};
use crate::catalog::{CandidateScope, CatalogStore};
use crate::config::SwapperConfig;
use crate::ledger::PerformanceLedger;
use crate::models::{ModelSpec, Provider, TaskType, TierPolicy};

struct ScoredCandidate {
    model: ModelSpec,
    provider: Provider,
    cost: CostBreakdown,
    score: f64,
    samples: u64,
}

/// The decision core of ModelSwapper
pub struct ModelSelector {
    catalog: Arc<dyn CatalogStore>,
    ledger: Arc<dyn PerformanceLedger>,
    guard: Arc<SpendingGuard>,
    /// When present, guard denials are appended to the usage log with the
    /// top-ranked candidate's details
    recorder: Option<Arc<UsageRecorder>>,
    estimator: CostEstimator,
    config: SwapperConfig,
}

impl ModelSelector {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        ledger: Arc<dyn PerformanceLedger>,
        guard: Arc<SpendingGuard>,
        recorder: Option<Arc<UsageRecorder>>,
        config: SwapperConfig,
    ) -> Self {
        let estimator = CostEstimator::new(config.prompt_split);
        Self {
            catalog,
            ledger,
            guard,
            recorder,
            estimator,
            config,
        }
    }

    pub fn estimator(&self) -> &CostEstimator {
        &self.estimator
    }

    /// Run the full selection pipeline for one request
    pub async fn select(&self, request: &SelectionRequest) -> RoutingResult<SelectionResult> {
        let policy = TierPolicy::for_tier(request.tier);

        let task = self
            .catalog
            .get_task_type(&request.task_type)
            .await?
            .ok_or(SelectionError::NoEligibleModel {
                reason: NoModelReason::UnknownTask,
            })?;

        // Resolve the provider scope. Opting into user credentials restricts
        // candidates to the user's own providers; there is no silent
        // widening back to system providers.
        let scope = if request.use_user_credentials {
            if !policy.allows_user_credentials {
                return Err(SelectionError::CredentialError(format!(
                    "tier {} may not use user-supplied credentials",
                    request.tier
                )));
            }
            CandidateScope::UserOwnedOnly {
                user_id: request.user_id.clone(),
            }
        } else {
            CandidateScope::SystemOnly
        };

        let candidates = self.catalog.active_models(&scope).await?;
        if candidates.is_empty() {
            return Err(SelectionError::NoEligibleModel {
                reason: NoModelReason::NoCapacity,
            });
        }

        let ranked = self.filter_and_rank(request, &task, policy, candidates).await?;

        self.authorize_ranked(request, policy, ranked).await
    }

    async fn filter_and_rank(
        &self,
        request: &SelectionRequest,
        task: &TaskType,
        policy: &TierPolicy,
        candidates: Vec<(ModelSpec, Provider)>,
    ) -> RoutingResult<Vec<ScoredCandidate>> {
        let total_tokens = request.tokens.total();

        // Capability and context-window filter
        let mut capable = Vec::new();
        for (model, provider) in candidates {
            let has_caps = task
                .required_capabilities
                .iter()
                .all(|c| model.has_capability(c));
            let window_ok = model.context_window >= total_tokens
                && task
                    .min_context_window
                    .map_or(true, |floor| model.context_window >= floor);
            if has_caps && window_ok {
                capable.push((model, provider));
            } else {
                debug!(model = %model.id, "candidate filtered on capability or context window");
            }
        }
        if capable.is_empty() {
            return Err(SelectionError::NoEligibleModel {
                reason: NoModelReason::TaskUnsupported,
            });
        }

        // Tier cost ceiling filter. Malformed pricing aborts the whole
        // request; it is a data-integrity problem, not a scoring detail.
        let mut affordable = Vec::new();
        for (model, provider) in capable {
            let cost = self.estimator.estimate_tokens(&model, request.tokens)?;
            if cost.total <= policy.max_cost_per_request_usd {
                affordable.push((model, provider, cost));
            } else {
                debug!(
                    model = %model.id,
                    cost = cost.total,
                    cap = policy.max_cost_per_request_usd,
                    "candidate filtered on per-request cap"
                );
            }
        }
        if affordable.is_empty() {
            return Err(SelectionError::NoEligibleModel {
                reason: NoModelReason::AllOverCostCap,
            });
        }

        // Score
        let mut scored = Vec::new();
        for (model, provider, cost) in affordable {
            let record = self.ledger.get(&model.id, &task.id).await;
            let (score, samples) = self.score(request, task, &model, &provider, cost.total, record);
            scored.push(ScoredCandidate {
                model,
                provider,
                cost,
                score,
                samples,
            });
        }

        // Deterministic ordering: score desc, samples desc, cost asc, id asc
        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.samples.cmp(&a.samples))
                .then_with(|| a.cost.total.total_cmp(&b.cost.total))
                .then_with(|| a.model.id.cmp(&b.model.id))
        });
        Ok(scored)
    }

    fn score(
        &self,
        request: &SelectionRequest,
        task: &TaskType,
        model: &ModelSpec,
        provider: &Provider,
        estimated_cost: f64,
        record: Option<crate::ledger::PerformanceRecord>,
    ) -> (f64, u64) {
        let weights = &self.config.weights;

        let (reliability, latency_ms, samples) = match record {
            Some(r) if r.samples > 0 => (r.reliability, r.avg_latency_ms, r.samples),
            // No history: neutral prior, assume one second of latency
            _ => (weights.neutral_reliability, 1000.0, 0),
        };
        let latency_term = 1.0 / (1.0 + latency_ms / 1000.0);
        let cost_term = 1.0 / (1.0 + estimated_cost / weights.cost_scale);

        let preference_term = match &request.preference {
            Some(pref) => {
                let model_hit = pref.model_id.as_deref() == Some(model.id.as_str());
                let provider_hit = pref
                    .provider
                    .as_ref()
                    .map_or(false, |kind| *kind == provider.kind);
                if model_hit || provider_hit {
                    pref.weight
                } else {
                    0.0
                }
            }
            None => 0.0,
        };

        let reliability_weight = weights.reliability * task.quality_bias;
        let weight_sum =
            reliability_weight + weights.latency + weights.cost + weights.preference;
        let score = (reliability_weight * reliability
            + weights.latency * latency_term
            + weights.cost * cost_term
            + weights.preference * preference_term)
            / weight_sum.max(f64::EPSILON);
        (score, samples)
    }

    /// Walk the ranked list through the guard. On a non-breaker rejection,
    /// fall back only to strictly cheaper candidates; never degrade further
    /// than that on the pipeline's own initiative.
    async fn authorize_ranked(
        &self,
        request: &SelectionRequest,
        policy: &TierPolicy,
        ranked: Vec<ScoredCandidate>,
    ) -> RoutingResult<SelectionResult> {
        let now = Utc::now();
        let mut first_rejection: Option<(RejectReason, f64, f64)> = None;
        let mut rejected_cost: Option<f64> = None;

        for (index, candidate) in ranked.iter().enumerate() {
            if let Some(ceiling) = rejected_cost {
                if candidate.cost.total >= ceiling {
                    continue;
                }
            }
            let auth = self
                .guard
                .authorize(
                    &request.user_id,
                    policy,
                    candidate.cost.total,
                    request.critical,
                    now,
                )
                .await?;
            match auth {
                Authorization::Approved { warnings } => {
                    let mut warnings = warnings;
                    if index > 0 {
                        warn!(
                            user = %request.user_id,
                            model = %candidate.model.id,
                            "fell back to a cheaper candidate after guard rejection"
                        );
                        warnings.push(format!(
                            "preferred candidate rejected by spending guard; using {}",
                            candidate.model.id
                        ));
                    }
                    info!(
                        user = %request.user_id,
                        task = %request.task_type,
                        model = %candidate.model.id,
                        cost = candidate.cost.total,
                        "model selected"
                    );
                    let runners_up = ranked
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| *i != index)
                        .map(|(_, c)| RankedCandidate {
                            model_id: c.model.id.clone(),
                            provider: c.provider.kind.clone(),
                            score: c.score,
                            estimated_cost: c.cost.total,
                        })
                        .collect();
                    let chosen = &ranked[index];
                    return Ok(SelectionResult {
                        selection_id: Uuid::new_v4(),
                        request_id: request.request_id,
                        model: chosen.model.clone(),
                        provider: chosen.provider.clone(),
                        cost: chosen.cost,
                        runners_up,
                        warnings,
                    });
                }
                Authorization::Rejected {
                    reason,
                    limit,
                    requested,
                } => {
                    first_rejection.get_or_insert((reason, limit, requested));
                    if reason == RejectReason::EmergencyBreaker {
                        // Breaker rejections are system-wide; trying cheaper
                        // candidates cannot help.
                        break;
                    }
                    rejected_cost = Some(match rejected_cost {
                        Some(current) => current.min(candidate.cost.total),
                        None => candidate.cost.total,
                    });
                }
            }
        }

        let (reason, limit, requested) = first_rejection.ok_or(SelectionError::NoEligibleModel {
            reason: NoModelReason::NoCapacity,
        })?;
        if let Some(recorder) = &self.recorder {
            let top = &ranked[0];
            if let Err(log_err) = recorder
                .record_rejection(
                    request.request_id,
                    &request.user_id,
                    &top.model.id,
                    &request.task_type,
                    top.cost.total,
                    now,
                )
                .await
            {
                warn!(error = %log_err, "failed to log rejected selection");
            }
        }
        Err(SelectionError::SpendingRejected {
            reason,
            limit,
            requested,
        })
    }
}

impl std::fmt::Debug for ModelSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSelector").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{seed_defaults, InMemoryCatalog};
    use crate::config::ScoringWeights;
    use crate::ledger::{InMemoryLedger, Observation};
    use crate::models::{
        ModelCapability, ProviderKind, UserTier,
    };
    use crate::routing::{ModelPreference, TokenEstimate};
    use crate::spending::InMemorySpendingStore;

    struct Fixture {
        catalog: Arc<InMemoryCatalog>,
        ledger: Arc<InMemoryLedger>,
        selector: ModelSelector,
    }

    fn fixture(config: SwapperConfig) -> Fixture {
        let catalog = Arc::new(InMemoryCatalog::new());
        let ledger = Arc::new(InMemoryLedger::new());
        let store = Arc::new(InMemorySpendingStore::new());
        let guard = Arc::new(SpendingGuard::new(store, &config));
        let selector = ModelSelector::new(
            catalog.clone() as Arc<dyn CatalogStore>,
            ledger.clone() as Arc<dyn PerformanceLedger>,
            guard,
            None,
            config,
        );
        Fixture {
            catalog,
            ledger,
            selector,
        }
    }

    async fn seed_two_model_catalog(catalog: &InMemoryCatalog) {
        catalog
            .upsert_provider(Provider::system(
                "openai",
                ProviderKind::OpenAi,
                "OpenAI",
                "https://api.openai.com/v1",
            ))
            .await
            .unwrap();
        // Model A: expensive, reliable. Model B: cheap, less reliable.
        // At 1000 total tokens A costs $0.50 and B costs $0.10.
        for (id, per_1k) in [("model-a", 0.50), ("model-b", 0.10)] {
            catalog
                .upsert_model(ModelSpec {
                    id: id.to_string(),
                    display_name: id.to_string(),
                    provider_id: "openai".to_string(),
                    cost_per_1k_prompt: per_1k,
                    cost_per_1k_completion: per_1k,
                    context_window: 16_384,
                    max_output_tokens: 4_096,
                    capabilities: vec![
                        ModelCapability::TextGeneration,
                        ModelCapability::Summarization,
                    ],
                    active: true,
                })
                .await
                .unwrap();
        }
        catalog
            .upsert_task_type(TaskType::new(
                "summarization",
                "summaries",
                vec![ModelCapability::Summarization],
            ))
            .await
            .unwrap();
    }

    async fn observe_n(ledger: &InMemoryLedger, model: &str, reliability_target: f64, n: u32) {
        // Feed successes and failures in the requested ratio
        for i in 0..n {
            let success = (i as f64) < reliability_target * n as f64;
            ledger
                .observe(
                    model,
                    "summarization",
                    Observation {
                        success,
                        latency_ms: 1000,
                        cost_usd: 0.1,
                    },
                    1_000_000,
                )
                .await;
        }
    }

    fn request(tokens: u32) -> SelectionRequest {
        SelectionRequest::new(
            "summarization",
            "user-1",
            UserTier::Bigchonk,
            TokenEstimate::Total { total: tokens },
        )
    }

    #[tokio::test]
    async fn test_reliability_weighting_prefers_model_a() {
        // With reliability dominating the blend, the expensive reliable
        // model wins for a BIGCHONK user.
        let mut config = SwapperConfig::default();
        config.weights = ScoringWeights {
            reliability: 1.0,
            latency: 0.0,
            cost: 0.0,
            preference: 0.0,
            neutral_reliability: 0.7,
            cost_scale: 0.01,
        };
        let fx = fixture(config);
        seed_two_model_catalog(&fx.catalog).await;
        observe_n(&fx.ledger, "model-a", 0.95, 100).await;
        observe_n(&fx.ledger, "model-b", 0.80, 100).await;

        let result = fx.selector.select(&request(1000)).await.unwrap();
        assert_eq!(result.model.id, "model-a");
        assert_eq!(result.runners_up.len(), 1);
        assert_eq!(result.runners_up[0].model_id, "model-b");
    }

    #[tokio::test]
    async fn test_cost_weighting_prefers_model_b() {
        // Same catalog and history, cost-dominated weights flip the choice.
        let mut config = SwapperConfig::default();
        config.weights = ScoringWeights {
            reliability: 0.0,
            latency: 0.0,
            cost: 1.0,
            preference: 0.0,
            neutral_reliability: 0.7,
            cost_scale: 0.01,
        };
        let fx = fixture(config);
        seed_two_model_catalog(&fx.catalog).await;
        observe_n(&fx.ledger, "model-a", 0.95, 100).await;
        observe_n(&fx.ledger, "model-b", 0.80, 100).await;

        let result = fx.selector.select(&request(1000)).await.unwrap();
        assert_eq!(result.model.id, "model-b");
    }

    #[tokio::test]
    async fn test_selection_is_deterministic() {
        // Identical catalog and ledger: fifty calls, one answer.
        let fx = fixture(SwapperConfig::default());
        seed_two_model_catalog(&fx.catalog).await;
        let first = fx.selector.select(&request(100)).await.unwrap().model.id;
        for _ in 0..49 {
            let again = fx.selector.select(&request(100)).await.unwrap().model.id;
            assert_eq!(again, first);
        }
    }

    #[tokio::test]
    async fn test_tie_breaks_on_samples_then_cost_then_id() {
        // Flat weights make every score identical; history depth decides.
        let mut config = SwapperConfig::default();
        config.weights = ScoringWeights {
            reliability: 1.0,
            latency: 0.0,
            cost: 0.0,
            preference: 0.0,
            neutral_reliability: 0.7,
            cost_scale: 0.01,
        };
        let fx = fixture(config);
        seed_two_model_catalog(&fx.catalog).await;
        // Both fully reliable, but model-b has more accumulated samples
        observe_n(&fx.ledger, "model-a", 1.0, 10).await;
        observe_n(&fx.ledger, "model-b", 1.0, 50).await;

        let result = fx.selector.select(&request(1000)).await.unwrap();
        assert_eq!(result.model.id, "model-b");
    }

    #[tokio::test]
    async fn test_context_window_filter() {
        // A task demanding a 32k window drops every smaller model even if
        // it is cheaper.
        let fx = fixture(SwapperConfig::default());
        seed_defaults(fx.catalog.as_ref()).await.unwrap();

        let req = SelectionRequest::new(
            "long-context-digest",
            "user-1",
            UserTier::Meowtrix,
            TokenEstimate::Total { total: 1000 },
        );
        let result = fx.selector.select(&req).await.unwrap();
        assert!(result.model.context_window >= 32_768, "{}", result.model.id);
        for runner in &result.runners_up {
            let model = fx.catalog.get_model(&runner.model_id).await.unwrap().unwrap();
            assert!(model.context_window >= 32_768);
        }
    }

    #[tokio::test]
    async fn test_request_larger_than_window_filters_candidates() {
        let fx = fixture(SwapperConfig::default());
        seed_two_model_catalog(&fx.catalog).await;
        // 20k tokens exceed the 16,384 window of both models
        let err = fx.selector.select(&request(20_000)).await;
        assert!(matches!(
            err,
            Err(SelectionError::NoEligibleModel {
                reason: NoModelReason::TaskUnsupported
            })
        ));
    }

    #[tokio::test]
    async fn test_over_cost_cap_reports_reason() {
        let fx = fixture(SwapperConfig::default());
        seed_two_model_catalog(&fx.catalog).await;
        // FREE cap is $0.05; at 1000 tokens the cheapest model costs $0.10
        let mut req = request(1000);
        req.tier = UserTier::Free;
        let err = fx.selector.select(&req).await;
        assert!(matches!(
            err,
            Err(SelectionError::NoEligibleModel {
                reason: NoModelReason::AllOverCostCap
            })
        ));
    }

    #[tokio::test]
    async fn test_cheaper_fallback_after_guard_rejection() {
        // Daily ceiling admits the cheap model but not the expensive one;
        // the selector falls back rather than failing outright.
        let mut config = SwapperConfig::default();
        config.weights = ScoringWeights {
            reliability: 1.0,
            latency: 0.0,
            cost: 0.0,
            preference: 0.0,
            neutral_reliability: 0.7,
            cost_scale: 0.01,
        };
        let fx = fixture(config);
        seed_two_model_catalog(&fx.catalog).await;
        // Reprice model-a to $0.60 per 1k so six requests leave the hourly
        // ceiling with room for the cheap model but not the expensive one.
        fx.catalog
            .upsert_model(ModelSpec {
                id: "model-a".to_string(),
                display_name: "model-a".to_string(),
                provider_id: "openai".to_string(),
                cost_per_1k_prompt: 0.60,
                cost_per_1k_completion: 0.60,
                context_window: 16_384,
                max_output_tokens: 4_096,
                capabilities: vec![
                    ModelCapability::TextGeneration,
                    ModelCapability::Summarization,
                ],
                active: true,
            })
            .await
            .unwrap();
        observe_n(&fx.ledger, "model-a", 1.0, 100).await;
        observe_n(&fx.ledger, "model-b", 0.9, 100).await;

        // CLAWBACK: hourly ceiling $4, per-request cap $1. Six model-a
        // requests spend $3.60; a seventh would reach $4.20 and is
        // rejected, but model-b at $0.10 still fits.
        let mut req = request(1000);
        req.tier = UserTier::Clawback;
        for _ in 0..6 {
            let r = fx.selector.select(&req).await.unwrap();
            assert_eq!(r.model.id, "model-a");
        }
        let result = fx.selector.select(&req).await.unwrap();
        assert_eq!(result.model.id, "model-b");
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("spending guard")));
    }

    #[tokio::test]
    async fn test_rejection_surfaces_when_no_cheaper_candidate() {
        let fx = fixture(SwapperConfig::default());
        seed_two_model_catalog(&fx.catalog).await;
        let mut req = request(900);
        req.tier = UserTier::Lilbean;
        // LILBEAN hourly ceiling is $1.00 and model-a is already over the
        // per-request cap, so only model-b ($0.09 at 900 tokens) is
        // eligible. Eleven requests spend $0.99; the twelfth would reach
        // $1.08 and, with no cheaper candidate left, the rejection surfaces
        // instead of degrading further.
        for _ in 0..11 {
            let r = fx.selector.select(&req).await.unwrap();
            assert_eq!(r.model.id, "model-b");
        }
        match fx.selector.select(&req).await {
            Err(SelectionError::SpendingRejected { reason, limit, .. }) => {
                assert_eq!(reason, RejectReason::HourlyCeiling);
                assert_eq!(limit, 1.00);
            }
            other => panic!("expected spending rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_user_credentials_restrict_to_owned_providers() {
        let fx = fixture(SwapperConfig::default());
        seed_two_model_catalog(&fx.catalog).await;
        fx.catalog
            .upsert_provider(Provider::user_owned(
                "user-1-openai",
                ProviderKind::OpenAi,
                "My OpenAI",
                "https://api.openai.com/v1",
                "user-1",
            ))
            .await
            .unwrap();
        fx.catalog
            .upsert_model(ModelSpec {
                id: "my-gpt".to_string(),
                display_name: "My GPT".to_string(),
                provider_id: "user-1-openai".to_string(),
                cost_per_1k_prompt: 0.5,
                cost_per_1k_completion: 0.5,
                context_window: 16_384,
                max_output_tokens: 4_096,
                capabilities: vec![ModelCapability::Summarization],
                active: true,
            })
            .await
            .unwrap();

        let mut req = request(1000);
        req.tier = UserTier::Clawback;
        req.use_user_credentials = true;
        let result = fx.selector.select(&req).await.unwrap();
        assert_eq!(result.model.id, "my-gpt");
        // No system model leaks into the runner-up list either
        assert!(result.runners_up.is_empty());
    }

    #[tokio::test]
    async fn test_user_credentials_denied_below_clawback() {
        let fx = fixture(SwapperConfig::default());
        seed_two_model_catalog(&fx.catalog).await;
        let mut req = request(1000);
        req.tier = UserTier::Free;
        req.use_user_credentials = true;
        assert!(matches!(
            fx.selector.select(&req).await,
            Err(SelectionError::CredentialError(_))
        ));
    }

    #[tokio::test]
    async fn test_preference_bonus_sways_choice() {
        let mut config = SwapperConfig::default();
        config.weights = ScoringWeights {
            reliability: 0.1,
            latency: 0.0,
            cost: 0.0,
            preference: 1.0,
            neutral_reliability: 0.7,
            cost_scale: 0.01,
        };
        let fx = fixture(config);
        seed_two_model_catalog(&fx.catalog).await;
        let mut req = request(1000);
        req.preference = Some(ModelPreference {
            model_id: Some("model-a".to_string()),
            provider: None,
            weight: 1.0,
        });
        let result = fx.selector.select(&req).await.unwrap();
        assert_eq!(result.model.id, "model-a");
    }

    #[tokio::test]
    async fn test_unknown_task_is_no_eligible_model() {
        let fx = fixture(SwapperConfig::default());
        seed_two_model_catalog(&fx.catalog).await;
        let mut req = request(1000);
        req.task_type = "interpretive-dance".to_string();
        assert!(matches!(
            fx.selector.select(&req).await,
            Err(SelectionError::NoEligibleModel {
                reason: NoModelReason::UnknownTask
            })
        ));
    }
}
