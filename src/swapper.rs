//! ModelSwapper facade: one object wiring the catalog, ledger, guard,
//! selector, recorder, and credential manager together.
//!
//! This is the surface the surrounding application consumes. `select`
//! returns a decision for the external AI caller; `record_usage` must be
//! invoked once the call completes (or fails) so the ledger and spending
//! counters stay truthful.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogCounts, CatalogStore, InMemoryCatalog};
use crate::config::SwapperConfig;
use crate::credentials::{
    CredentialCipher, CredentialError, CredentialManager, CredentialStore, CredentialVerifier,
    HttpCapabilityProbe, InMemoryCredentialStore,
};
use crate::ledger::{InMemoryLedger, PerformanceLedger};
use crate::models::UsageLogEntry;
use crate::routing::{
    ActualOutcome, ModelSelector, RoutingResult, SelectionRequest, SelectionResult, SpendingGuard,
    UsageRecorder,
};
use crate::spending::{InMemorySpendingStore, SpendingStore};
use crate::usage::{InMemoryUsageLog, UsageSink};

/// Read-only snapshot for the health/diagnostic surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapperStatus {
    pub catalog: CatalogCounts,
    pub emergency_breaker_tripped: bool,
    pub emergency_daily_ceiling_usd: f64,
    pub today_system_spend_usd: f64,
}

/// The assembled selection engine
pub struct ModelSwapper {
    catalog: Arc<dyn CatalogStore>,
    usage_log: Arc<dyn UsageSink>,
    guard: Arc<SpendingGuard>,
    selector: ModelSelector,
    recorder: Arc<UsageRecorder>,
    credentials: CredentialManager,
}

impl ModelSwapper {
    pub fn builder() -> ModelSwapperBuilder {
        ModelSwapperBuilder::default()
    }

    /// Pick a model for the request, enforcing tier and system limits.
    ///
    /// Guard rejections are appended to the usage log by the selector before
    /// surfacing, so the append-only record covers denials too.
    pub async fn select(&self, request: &SelectionRequest) -> RoutingResult<SelectionResult> {
        self.selector.select(request).await
    }

    /// Report the outcome of the downstream AI call for a prior selection
    pub async fn record_usage(&self, outcome: ActualOutcome) -> RoutingResult<()> {
        self.recorder.record(outcome).await
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    pub fn catalog(&self) -> &Arc<dyn CatalogStore> {
        &self.catalog
    }

    pub async fn recent_usage(&self, limit: usize) -> RoutingResult<Vec<UsageLogEntry>> {
        Ok(self.usage_log.recent(limit).await?)
    }

    /// Snapshot for operational monitoring
    pub async fn status(&self) -> RoutingResult<SwapperStatus> {
        let now = Utc::now();
        let counts = self.catalog.counts().await?;
        let tripped = self.guard.breaker_tripped(now).await?;
        let spend = self.guard.system_spend(now).await?;
        Ok(SwapperStatus {
            catalog: counts,
            emergency_breaker_tripped: tripped,
            emergency_daily_ceiling_usd: self.guard.emergency_ceiling(),
            today_system_spend_usd: spend,
        })
    }
}

/// Builder with in-memory defaults; production deployments swap the stores
pub struct ModelSwapperBuilder {
    config: SwapperConfig,
    catalog: Option<Arc<dyn CatalogStore>>,
    ledger: Option<Arc<dyn PerformanceLedger>>,
    spending: Option<Arc<dyn SpendingStore>>,
    usage_log: Option<Arc<dyn UsageSink>>,
    credential_store: Option<Arc<dyn CredentialStore>>,
    verifier: Option<Arc<dyn CredentialVerifier>>,
    cipher: Option<CredentialCipher>,
}

impl Default for ModelSwapperBuilder {
    fn default() -> Self {
        Self {
            config: SwapperConfig::default(),
            catalog: None,
            ledger: None,
            spending: None,
            usage_log: None,
            credential_store: None,
            verifier: None,
            cipher: None,
        }
    }
}

impl ModelSwapperBuilder {
    pub fn with_config(mut self, config: SwapperConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn CatalogStore>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn PerformanceLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn with_spending_store(mut self, store: Arc<dyn SpendingStore>) -> Self {
        self.spending = Some(store);
        self
    }

    pub fn with_usage_log(mut self, sink: Arc<dyn UsageSink>) -> Self {
        self.usage_log = Some(sink);
        self
    }

    pub fn with_credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credential_store = Some(store);
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_cipher(mut self, cipher: CredentialCipher) -> Self {
        self.cipher = Some(cipher);
        self
    }

    pub fn build(self) -> Result<ModelSwapper, CredentialError> {
        let config = self.config;
        let catalog = self
            .catalog
            .unwrap_or_else(|| Arc::new(InMemoryCatalog::new()));
        let ledger = self
            .ledger
            .unwrap_or_else(|| Arc::new(InMemoryLedger::new()));
        let spending = self
            .spending
            .unwrap_or_else(|| Arc::new(InMemorySpendingStore::new()));
        let usage_log = self
            .usage_log
            .unwrap_or_else(|| Arc::new(InMemoryUsageLog::new()));
        let credential_store = self
            .credential_store
            .unwrap_or_else(|| Arc::new(InMemoryCredentialStore::new()));
        let verifier = self
            .verifier
            .unwrap_or_else(|| Arc::new(HttpCapabilityProbe::new()));
        let cipher = match self.cipher {
            Some(cipher) => cipher,
            None => CredentialCipher::from_env()?,
        };

        let guard = Arc::new(SpendingGuard::new(Arc::clone(&spending), &config));
        let recorder = Arc::new(UsageRecorder::new(
            Arc::clone(&usage_log),
            Arc::clone(&ledger),
            Arc::clone(&guard),
            &config,
        ));
        let selector = ModelSelector::new(
            Arc::clone(&catalog),
            Arc::clone(&ledger),
            Arc::clone(&guard),
            Some(Arc::clone(&recorder)),
            config.clone(),
        );
        let credentials = CredentialManager::new(
            credential_store,
            Arc::clone(&catalog),
            verifier,
            cipher,
        );

        Ok(ModelSwapper {
            catalog,
            usage_log,
            guard,
            selector,
            recorder,
            credentials,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::seed_defaults;
    use crate::models::{UsageOutcome, UserTier};
    use crate::routing::TokenEstimate;

    async fn swapper() -> ModelSwapper {
        let swapper = ModelSwapper::builder()
            .with_cipher(CredentialCipher::new([1u8; 32]).unwrap())
            .build()
            .unwrap();
        seed_defaults(swapper.catalog().as_ref()).await.unwrap();
        swapper
    }

    #[tokio::test]
    async fn test_select_then_record_round_trip() {
        let swapper = swapper().await;
        let request = SelectionRequest::new(
            "summarization",
            "user-1",
            UserTier::Bigchonk,
            TokenEstimate::Split {
                prompt: 2_000,
                completion: 500,
            },
        );
        let result = swapper.select(&request).await.unwrap();
        assert_eq!(result.request_id, request.request_id);
        assert!(result.cost.total > 0.0);

        swapper
            .record_usage(ActualOutcome {
                request_id: request.request_id,
                user_id: request.user_id.clone(),
                model_id: result.model.id.clone(),
                task_type: request.task_type.clone(),
                estimated_cost_usd: result.cost.total,
                actual_cost_usd: Some(result.cost.total * 0.9),
                latency_ms: Some(1200),
                success: true,
                at: Utc::now(),
            })
            .await
            .unwrap();

        let entries = swapper.recent_usage(10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome, UsageOutcome::Success);
    }

    #[tokio::test]
    async fn test_rejection_is_logged_to_usage() {
        let swapper = swapper().await;
        // FREE quota is 20 requests per day; the 21st is denied
        let mut rejected = false;
        for _ in 0..300 {
            let request = SelectionRequest::new(
                "summarization",
                "user-1",
                UserTier::Free,
                TokenEstimate::Total { total: 5_000 },
            );
            if swapper.select(&request).await.is_err() {
                rejected = true;
                break;
            }
        }
        assert!(rejected);
        let entries = swapper.recent_usage(1000).await.unwrap();
        assert!(entries
            .iter()
            .any(|e| e.outcome == UsageOutcome::Rejected));
    }

    #[tokio::test]
    async fn test_status_reports_catalog_and_breaker() {
        let swapper = swapper().await;
        let status = swapper.status().await.unwrap();
        assert_eq!(status.catalog.providers, 3);
        assert!(!status.emergency_breaker_tripped);
        assert_eq!(status.today_system_spend_usd, 0.0);
        assert_eq!(status.emergency_daily_ceiling_usd, 50.0);
    }
}
