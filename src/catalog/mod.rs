//! Catalog store for providers, models, and task types.
//!
//! The catalog is read by everything above it and mutated rarely. All
//! validation happens at ingestion time: provider URLs must parse, model
//! prices must be finite and non-negative, and a model must reference an
//! existing, active provider. Call-time code can therefore trust the rows
//! it reads, and anything malformed that slips through still fails closed
//! in the cost estimator.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::models::{ModelCapability, ModelSpec, Provider, ProviderKind, TaskType};

/// Catalog failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    #[error("invalid pricing for model {model}: {detail}")]
    InvalidPricing { model: String, detail: String },

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("provider is inactive: {0}")]
    InactiveProvider(String),

    #[error("invalid base url for provider {provider}: {detail}")]
    InvalidBaseUrl { provider: String, detail: String },
}

/// Which providers a request may draw candidates from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateScope {
    /// Platform-billed providers, available to everyone
    SystemOnly,
    /// Only the named user's own providers. Never widened to system
    /// providers implicitly.
    UserOwnedOnly { user_id: String },
}

/// Row counts for the diagnostic surface
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CatalogCounts {
    pub providers: usize,
    pub models: usize,
    pub task_types: usize,
}

/// Repository interface for catalog data.
///
/// The bundled implementation is in-memory; a relational backend implements
/// the same trait. Selection code never constructs queries itself.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn upsert_provider(&self, provider: Provider) -> Result<(), CatalogError>;
    async fn upsert_model(&self, model: ModelSpec) -> Result<(), CatalogError>;
    async fn upsert_task_type(&self, task: TaskType) -> Result<(), CatalogError>;

    async fn get_provider(&self, id: &str) -> Result<Option<Provider>, CatalogError>;
    async fn get_model(&self, id: &str) -> Result<Option<ModelSpec>, CatalogError>;
    async fn get_task_type(&self, id: &str) -> Result<Option<TaskType>, CatalogError>;

    /// Active models of active providers within the given scope, paired with
    /// their provider rows
    async fn active_models(
        &self,
        scope: &CandidateScope,
    ) -> Result<Vec<(ModelSpec, Provider)>, CatalogError>;

    async fn counts(&self) -> Result<CatalogCounts, CatalogError>;
}

/// In-memory catalog for development and tests
pub struct InMemoryCatalog {
    providers: RwLock<HashMap<String, Provider>>,
    models: RwLock<HashMap<String, ModelSpec>>,
    task_types: RwLock<HashMap<String, TaskType>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
            models: RwLock::new(HashMap::new()),
            task_types: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_provider(provider: &Provider) -> Result<(), CatalogError> {
    url::Url::parse(&provider.base_url).map_err(|e| CatalogError::InvalidBaseUrl {
        provider: provider.id.clone(),
        detail: e.to_string(),
    })?;
    Ok(())
}

fn validate_model(model: &ModelSpec, providers: &HashMap<String, Provider>) -> Result<(), CatalogError> {
    if !model.pricing_is_valid() {
        error!(
            model = %model.id,
            "rejecting model with malformed pricing at ingestion"
        );
        return Err(CatalogError::InvalidPricing {
            model: model.id.clone(),
            detail: format!(
                "cost_per_1k_prompt={}, cost_per_1k_completion={}",
                model.cost_per_1k_prompt, model.cost_per_1k_completion
            ),
        });
    }
    match providers.get(&model.provider_id) {
        None => Err(CatalogError::UnknownProvider(model.provider_id.clone())),
        Some(provider) if !provider.active => {
            Err(CatalogError::InactiveProvider(model.provider_id.clone()))
        }
        Some(_) => Ok(()),
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn upsert_provider(&self, provider: Provider) -> Result<(), CatalogError> {
        validate_provider(&provider)?;
        let mut providers = self.providers.write().await;
        info!(provider = %provider.id, kind = %provider.kind, "catalog provider upserted");
        providers.insert(provider.id.clone(), provider);
        Ok(())
    }

    async fn upsert_model(&self, model: ModelSpec) -> Result<(), CatalogError> {
        let providers = self.providers.read().await;
        validate_model(&model, &providers)?;
        drop(providers);
        let mut models = self.models.write().await;
        models.insert(model.id.clone(), model);
        Ok(())
    }

    async fn upsert_task_type(&self, task: TaskType) -> Result<(), CatalogError> {
        let mut task_types = self.task_types.write().await;
        task_types.insert(task.id.clone(), task);
        Ok(())
    }

    async fn get_provider(&self, id: &str) -> Result<Option<Provider>, CatalogError> {
        Ok(self.providers.read().await.get(id).cloned())
    }

    async fn get_model(&self, id: &str) -> Result<Option<ModelSpec>, CatalogError> {
        Ok(self.models.read().await.get(id).cloned())
    }

    async fn get_task_type(&self, id: &str) -> Result<Option<TaskType>, CatalogError> {
        Ok(self.task_types.read().await.get(id).cloned())
    }

    async fn active_models(
        &self,
        scope: &CandidateScope,
    ) -> Result<Vec<(ModelSpec, Provider)>, CatalogError> {
        let providers = self.providers.read().await;
        let models = self.models.read().await;

        let mut result = Vec::new();
        for model in models.values() {
            if !model.active {
                continue;
            }
            let provider = match providers.get(&model.provider_id) {
                Some(p) if p.active => p,
                _ => continue,
            };
            let in_scope = match scope {
                CandidateScope::SystemOnly => provider.scope.is_system(),
                CandidateScope::UserOwnedOnly { user_id } => {
                    provider.scope.owner() == Some(user_id.as_str())
                }
            };
            if in_scope {
                result.push((model.clone(), provider.clone()));
            }
        }
        Ok(result)
    }

    async fn counts(&self) -> Result<CatalogCounts, CatalogError> {
        Ok(CatalogCounts {
            providers: self.providers.read().await.len(),
            models: self.models.read().await.len(),
            task_types: self.task_types.read().await.len(),
        })
    }
}

/// Seed the catalog with the stock system providers, models, and task types.
///
/// Prices are USD per 1k tokens. Used by the server binary and by tests that
/// want a realistic catalog.
pub async fn seed_defaults(catalog: &dyn CatalogStore) -> Result<(), CatalogError> {
    catalog
        .upsert_provider(Provider::system(
            "openai",
            ProviderKind::OpenAi,
            "OpenAI",
            "https://api.openai.com/v1",
        ))
        .await?;
    catalog
        .upsert_provider(Provider::system(
            "anthropic",
            ProviderKind::Anthropic,
            "Anthropic Claude",
            "https://api.anthropic.com",
        ))
        .await?;
    catalog
        .upsert_provider(Provider::system(
            "google",
            ProviderKind::Google,
            "Google Gemini",
            "https://generativelanguage.googleapis.com/v1beta",
        ))
        .await?;

    let models = vec![
        ModelSpec {
            id: "gpt-3.5-turbo".to_string(),
            display_name: "GPT-3.5 Turbo".to_string(),
            provider_id: "openai".to_string(),
            cost_per_1k_prompt: 0.001,
            cost_per_1k_completion: 0.002,
            context_window: 16_385,
            max_output_tokens: 4_096,
            capabilities: vec![
                ModelCapability::TextGeneration,
                ModelCapability::TextAnalysis,
                ModelCapability::Summarization,
                ModelCapability::TopicExtraction,
                ModelCapability::FunctionCalling,
            ],
            active: true,
        },
        ModelSpec {
            id: "o4-mini".to_string(),
            display_name: "OpenAI o4 Mini".to_string(),
            provider_id: "openai".to_string(),
            cost_per_1k_prompt: 0.001,
            cost_per_1k_completion: 0.002,
            context_window: 128_000,
            max_output_tokens: 16_384,
            capabilities: vec![
                ModelCapability::TextGeneration,
                ModelCapability::TextAnalysis,
                ModelCapability::Summarization,
                ModelCapability::TopicExtraction,
                ModelCapability::Reasoning,
                ModelCapability::FunctionCalling,
            ],
            active: true,
        },
        ModelSpec {
            id: "claude-3-haiku".to_string(),
            display_name: "Claude 3 Haiku".to_string(),
            provider_id: "anthropic".to_string(),
            cost_per_1k_prompt: 0.00025,
            cost_per_1k_completion: 0.00125,
            context_window: 200_000,
            max_output_tokens: 4_096,
            capabilities: vec![
                ModelCapability::TextGeneration,
                ModelCapability::TextAnalysis,
                ModelCapability::Summarization,
                ModelCapability::TopicExtraction,
            ],
            active: true,
        },
        ModelSpec {
            id: "claude-sonnet-4".to_string(),
            display_name: "Claude Sonnet 4".to_string(),
            provider_id: "anthropic".to_string(),
            cost_per_1k_prompt: 0.003,
            cost_per_1k_completion: 0.015,
            context_window: 200_000,
            max_output_tokens: 8_192,
            capabilities: vec![
                ModelCapability::TextGeneration,
                ModelCapability::TextAnalysis,
                ModelCapability::Summarization,
                ModelCapability::TopicExtraction,
                ModelCapability::Reasoning,
                ModelCapability::FunctionCalling,
            ],
            active: true,
        },
        ModelSpec {
            id: "gemini-2.5-flash".to_string(),
            display_name: "Gemini 2.5 Flash".to_string(),
            provider_id: "google".to_string(),
            cost_per_1k_prompt: 0.000075,
            cost_per_1k_completion: 0.0003,
            context_window: 1_048_576,
            max_output_tokens: 8_192,
            capabilities: vec![
                ModelCapability::TextGeneration,
                ModelCapability::TextAnalysis,
                ModelCapability::Summarization,
                ModelCapability::TopicExtraction,
                ModelCapability::Reasoning,
            ],
            active: true,
        },
    ];
    for model in models {
        catalog.upsert_model(model).await?;
    }

    catalog
        .upsert_task_type(TaskType::new(
            "summarization",
            "Condense a chat export into a summary note",
            vec![ModelCapability::Summarization],
        ))
        .await?;
    catalog
        .upsert_task_type(TaskType::new(
            "topic-extraction",
            "Pull topics and entities out of a conversation",
            vec![ModelCapability::TopicExtraction],
        ))
        .await?;
    catalog
        .upsert_task_type(
            TaskType::new(
                "knowledge-extraction",
                "Structured knowledge-base document generation",
                vec![ModelCapability::Reasoning],
            )
            .with_quality_bias(1.25),
        )
        .await?;
    catalog
        .upsert_task_type(
            TaskType::new(
                "long-context-digest",
                "Digest archives too large for small context windows",
                vec![ModelCapability::Summarization],
            )
            .with_min_context_window(32_768),
        )
        .await?;

    Ok(())
}
