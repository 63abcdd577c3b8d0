//! Model selection pipeline: estimator, guard, selector, recorder.
//!
//! A request flows selector -> catalog/ledger -> estimator -> guard. After
//! the external AI call completes, the recorder folds the outcome back into
//! the ledger and the usage log. This module holds the request/result types
//! and the error taxonomy shared by those stages.

pub mod estimator;
pub mod guard;
pub mod recorder;
pub mod selector;

pub use estimator::CostEstimator;
pub use guard::{Authorization, SpendingGuard};
pub use recorder::{ActualOutcome, UsageRecorder};
pub use selector::ModelSelector;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ModelSpec, Provider, ProviderKind, UserTier};

/// Token estimate attached to a selection request.
///
/// Callers that know the prompt/completion shape supply the split; callers
/// with only a single number let the estimator apply the configured
/// prompt-share split.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TokenEstimate {
    Split { prompt: u32, completion: u32 },
    Total { total: u32 },
}

impl TokenEstimate {
    pub fn total(&self) -> u32 {
        match self {
            TokenEstimate::Split { prompt, completion } => prompt + completion,
            TokenEstimate::Total { total } => *total,
        }
    }
}

fn default_preference_weight() -> f64 {
    1.0
}

/// Soft preference for a model or provider, folded into the score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPreference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderKind>,
    #[serde(default = "default_preference_weight")]
    pub weight: f64,
}

/// One incoming selection call. Ephemeral, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionRequest {
    pub request_id: Uuid,
    pub task_type: String,
    pub user_id: String,
    pub tier: UserTier,
    pub tokens: TokenEstimate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preference: Option<ModelPreference>,
    #[serde(default)]
    pub use_user_credentials: bool,
    /// Bypasses the emergency breaker. Nothing in the current product sets
    /// it; it exists so operational tooling can.
    #[serde(default)]
    pub critical: bool,
}

impl SelectionRequest {
    pub fn new(task_type: &str, user_id: &str, tier: UserTier, tokens: TokenEstimate) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            task_type: task_type.to_string(),
            user_id: user_id.to_string(),
            tier,
            tokens,
            preference: None,
            use_user_credentials: false,
            critical: false,
        }
    }
}

/// Estimated cost, broken down by token kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub prompt_cost: f64,
    pub completion_cost: f64,
    pub total: f64,
}

/// A scored candidate carried in the runner-up list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub model_id: String,
    pub provider: ProviderKind,
    pub score: f64,
    pub estimated_cost: f64,
}

/// Successful selection decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionResult {
    pub selection_id: Uuid,
    pub request_id: Uuid,
    pub model: ModelSpec,
    pub provider: Provider,
    pub cost: CostBreakdown,
    /// Lower-ranked eligible candidates, best first, for caller-side fallback
    pub runners_up: Vec<RankedCandidate>,
    pub warnings: Vec<String>,
}

/// Guard denial reason codes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    EmergencyBreaker,
    PerRequestCap,
    DailyCeiling,
    HourlyCeiling,
    QuotaExceeded,
}

/// Why filtering produced an empty candidate set
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoModelReason {
    UnknownTask,
    TaskUnsupported,
    AllOverCostCap,
    NoCapacity,
}

/// Errors surfaced by the selection pipeline
#[derive(Debug, Clone, thiserror::Error)]
pub enum SelectionError {
    /// Catalog or performance store unreachable. Fatal for the request and
    /// never retried internally.
    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("no eligible model: {reason:?}")]
    NoEligibleModel { reason: NoModelReason },

    /// Guard denial. The caller may retry with reduced scope; the pipeline
    /// does not retry on its own.
    #[error("spending rejected ({reason:?}): limit {limit}, requested {requested}")]
    SpendingRejected {
        reason: RejectReason,
        limit: f64,
        requested: f64,
    },

    /// Malformed catalog pricing. Fails closed, never treated as free.
    #[error("invalid pricing for model {model}: {detail}")]
    InvalidModelPricing { model: String, detail: String },

    /// Credential store or verification failure. The message never contains
    /// a credential value.
    #[error("credential error: {0}")]
    CredentialError(String),

    #[error("spending store unavailable: {0}")]
    SpendingUnavailable(String),

    #[error("usage log unavailable: {0}")]
    UsageLogUnavailable(String),
}

pub type RoutingResult<T> = Result<T, SelectionError>;

impl From<crate::catalog::CatalogError> for SelectionError {
    fn from(err: crate::catalog::CatalogError) -> Self {
        use crate::catalog::CatalogError;
        match err {
            CatalogError::InvalidPricing { model, detail } => {
                SelectionError::InvalidModelPricing { model, detail }
            }
            other => SelectionError::CatalogUnavailable(other.to_string()),
        }
    }
}

impl From<crate::spending::SpendingError> for SelectionError {
    fn from(err: crate::spending::SpendingError) -> Self {
        SelectionError::SpendingUnavailable(err.to_string())
    }
}

impl From<crate::usage::UsageLogError> for SelectionError {
    fn from(err: crate::usage::UsageLogError) -> Self {
        SelectionError::UsageLogUnavailable(err.to_string())
    }
}
