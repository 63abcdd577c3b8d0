//! REST facade over the ModelSwapper core.
//!
//! A thin JSON surface consumed by the upload/processing pipeline:
//! selection, usage reporting, credential management, and the operational
//! status endpoint.

pub mod handlers;
pub mod types;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::swapper::ModelSwapper;
use handlers::{
    health_check, list_models, not_found, report_usage, revoke_credential, select_model, status,
    store_credential, verify_credential, ApiState,
};

/// API server configuration
#[derive(Clone, Debug)]
pub struct SwapperApiConfig {
    pub host: String,
    pub port: u16,
    pub cors_enabled: bool,
    /// Cap on in-flight requests across the whole surface
    pub max_concurrency: usize,
}

impl Default for SwapperApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors_enabled: true,
            max_concurrency: 256,
        }
    }
}

/// HTTP server wrapping a [`ModelSwapper`]
pub struct SwapperApiServer {
    config: SwapperApiConfig,
    state: ApiState,
}

impl SwapperApiServer {
    pub fn new(config: SwapperApiConfig, swapper: Arc<ModelSwapper>) -> Self {
        Self {
            config,
            state: ApiState { swapper },
        }
    }

    /// Build the axum router with all routes
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .route("/v1/select", post(select_model))
            .route("/v1/usage", post(report_usage))
            .route("/v1/models", get(list_models))
            .route("/v1/credentials", post(store_credential))
            .route("/v1/credentials/:id/verify", post(verify_credential))
            .route("/v1/credentials/:id", delete(revoke_credential))
            .route("/v1/status", get(status))
            .route("/health", get(health_check))
            .fallback(not_found)
            .with_state(self.state.clone())
            .layer(ConcurrencyLimitLayer::new(self.config.max_concurrency));

        if self.config.cors_enabled {
            router = router.layer(CorsLayer::permissive());
        }
        router
    }

    /// Bind and serve until shutdown
    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error>> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        info!("ModelSwapper API listening on http://{}", addr);
        axum::Server::bind(&addr.parse()?)
            .serve(self.router().into_make_service())
            .await?;
        Ok(())
    }
}
