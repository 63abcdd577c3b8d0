//! Request and response types for the ModelSwapper REST surface.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ProviderKind, UserTier};
use crate::routing::{
    CostBreakdown, ModelPreference, RankedCandidate, SelectionRequest, SelectionResult,
    TokenEstimate,
};

/// POST /v1/select request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectBody {
    pub task_type: String,
    pub user_id: String,
    pub tier: UserTier,

    /// Explicit split, preferred when the caller knows it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u32>,
    /// Single estimate; the configured prompt share is applied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_provider: Option<ProviderKind>,

    #[serde(default)]
    pub use_user_credentials: bool,

    /// Caller-supplied id for idempotent usage reporting; generated when
    /// absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,
}

impl SelectBody {
    /// Build the core request, or explain which token fields are missing
    pub fn into_request(self) -> Result<SelectionRequest, String> {
        let tokens = match (self.prompt_tokens, self.completion_tokens, self.total_tokens) {
            (Some(prompt), Some(completion), _) => TokenEstimate::Split { prompt, completion },
            (None, None, Some(total)) => TokenEstimate::Total { total },
            _ => {
                return Err(
                    "provide prompt_tokens and completion_tokens, or total_tokens".to_string()
                )
            }
        };
        let preference = if self.preferred_model.is_some() || self.preferred_provider.is_some() {
            Some(ModelPreference {
                model_id: self.preferred_model,
                provider: self.preferred_provider,
                weight: 1.0,
            })
        } else {
            None
        };
        Ok(SelectionRequest {
            request_id: self.request_id.unwrap_or_else(Uuid::new_v4),
            task_type: self.task_type,
            user_id: self.user_id,
            tier: self.tier,
            tokens,
            preference,
            use_user_credentials: self.use_user_credentials,
            critical: false,
        })
    }
}

/// POST /v1/select response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectResponse {
    pub selection_id: Uuid,
    pub request_id: Uuid,
    pub model_id: String,
    pub provider_id: String,
    pub provider_kind: ProviderKind,
    pub cost: CostBreakdown,
    pub runners_up: Vec<RankedCandidate>,
    pub warnings: Vec<String>,
}

impl From<SelectionResult> for SelectResponse {
    fn from(result: SelectionResult) -> Self {
        Self {
            selection_id: result.selection_id,
            request_id: result.request_id,
            model_id: result.model.id,
            provider_id: result.provider.id,
            provider_kind: result.provider.kind,
            cost: result.cost,
            runners_up: result.runners_up,
            warnings: result.warnings,
        }
    }
}

/// POST /v1/usage request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageBody {
    pub request_id: Uuid,
    pub user_id: String,
    pub model_id: String,
    pub task_type: String,
    pub estimated_cost_usd: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_cost_usd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    pub success: bool,
}

/// POST /v1/credentials request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreCredentialBody {
    pub user_id: String,
    pub tier: UserTier,
    pub provider_id: String,
    pub api_key: String,
}

/// POST /v1/credentials response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreCredentialResponse {
    pub credential_id: Uuid,
}

/// GET /v1/models response entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    pub provider_id: String,
    pub provider_kind: ProviderKind,
    pub cost_per_1k_prompt: f64,
    pub cost_per_1k_completion: f64,
    pub context_window: u32,
}

/// Error envelope returned by every endpoint.
///
/// `kind` distinguishes the two denials that demand different user actions:
/// `no_model_available` (try again later or change the task) versus
/// `usage_limit` (the user has hit a spending limit for the period).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested: Option<f64>,
}

impl ErrorEnvelope {
    pub fn new(kind: &str, message: String) -> Self {
        Self {
            error: ErrorDetail {
                message,
                kind: kind.to_string(),
                reason: None,
                limit: None,
                requested: None,
            },
        }
    }
}
