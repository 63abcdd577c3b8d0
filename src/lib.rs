//! # ModelSwapper
//!
//! Model selection and cost-control engine for the chat-archive knowledge
//! pipeline. Given a task request, a user tier, and a catalog of providers
//! and models with live performance and cost statistics, it picks a model,
//! enforces multi-layer spending limits, and records usage for future
//! scoring.
//!
//! ## Core Components
//!
//! - [`catalog`]: providers, models, and task types, validated at ingestion
//! - [`ledger`]: rolling per (model, task) performance statistics
//! - [`spending`]: atomic per-user spending counters
//! - [`routing`]: the selection pipeline (estimator, guard, selector,
//!   recorder)
//! - [`credentials`]: encrypted user-supplied provider credentials
//! - [`ModelSwapper`]: the assembled facade the application consumes
//! - [`api`]: a thin axum REST surface over the facade
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use model_swapper::{
//!     catalog::seed_defaults, CredentialCipher, ModelSwapper, SelectionRequest, TokenEstimate,
//!     UserTier,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let swapper = ModelSwapper::builder()
//!     .with_cipher(CredentialCipher::new([0u8; 32])?)
//!     .build()?;
//! seed_defaults(swapper.catalog().as_ref()).await?;
//!
//! let request = SelectionRequest::new(
//!     "summarization",
//!     "user-1",
//!     UserTier::Bigchonk,
//!     TokenEstimate::Total { total: 4_000 },
//! );
//! let decision = swapper.select(&request).await?;
//! println!("use {} for ${:.4}", decision.model.id, decision.cost.total);
//! # Ok(())
//! # }
//! ```

// Core domain models
pub mod models;

// Catalog of providers, models, and task types
pub mod catalog;

// Rolling performance statistics
pub mod ledger;

// Atomic spending counters
pub mod spending;

// Append-only usage log
pub mod usage;

// Selection pipeline: estimator, guard, selector, recorder
pub mod routing;

// Encrypted user-supplied credentials
pub mod credentials;

// Deployment configuration
pub mod config;

// Assembled facade
pub mod swapper;

// HTTP facade over the core
pub mod api;

// Re-export core domain types for easy access
pub use models::{
    ModelCapability, ModelSpec, Provider, ProviderKind, ProviderScope, SpendPeriod,
    SpendingState, TaskType, TierPolicy, UsageLogEntry, UsageOutcome, UserTier,
};

// Re-export the pipeline surface
pub use config::{ScoringWeights, SwapperConfig};
pub use routing::{
    ActualOutcome, Authorization, CostBreakdown, CostEstimator, ModelPreference, ModelSelector,
    NoModelReason, RankedCandidate, RejectReason, RoutingResult, SelectionError, SelectionRequest,
    SelectionResult, SpendingGuard, TokenEstimate, UsageRecorder,
};
pub use swapper::{ModelSwapper, ModelSwapperBuilder, SwapperStatus};

// Re-export store interfaces and the bundled implementations
pub use catalog::{CandidateScope, CatalogCounts, CatalogError, CatalogStore, InMemoryCatalog};
pub use credentials::{
    CredentialCipher, CredentialError, CredentialManager, CredentialStatus, CredentialStore,
    CredentialVerifier, HttpCapabilityProbe, InMemoryCredentialStore, UserCredential,
};
pub use ledger::{InMemoryLedger, Observation, PerformanceLedger, PerformanceRecord};
pub use spending::{
    ChargeOutcome, InMemorySpendingStore, LimitDimension, PeriodLimits, SpendingError,
    SpendingStore,
};
pub use usage::{InMemoryUsageLog, UsageLogError, UsageSink};

use thiserror::Error;

/// Top-level error type for embedders that want a single error surface
#[derive(Error, Debug)]
pub enum SwapperError {
    #[error("selection error: {0}")]
    Selection(#[from] routing::SelectionError),

    #[error("catalog error: {0}")]
    Catalog(#[from] catalog::CatalogError),

    #[error("spending error: {0}")]
    Spending(#[from] spending::SpendingError),

    #[error("usage log error: {0}")]
    UsageLog(#[from] usage::UsageLogError),

    #[error("credential error: {0}")]
    Credential(#[from] credentials::CredentialError),

    /// Storage backends wrap their own failures here
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for SwapperError {
    fn from(err: std::io::Error) -> Self {
        SwapperError::Internal(err.to_string())
    }
}

/// Type alias for Results that use the crate-wide error type
pub type Result<T> = std::result::Result<T, SwapperError>;
