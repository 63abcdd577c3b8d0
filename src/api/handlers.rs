//! HTTP handlers for the ModelSwapper REST surface.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::types::{
    ErrorEnvelope, ModelEntry, SelectBody, SelectResponse, StoreCredentialBody,
    StoreCredentialResponse, UsageBody,
};
use crate::catalog::CandidateScope;
use crate::credentials::CredentialError;
use crate::routing::{ActualOutcome, SelectionError};
use crate::swapper::ModelSwapper;

/// Shared application state
#[derive(Clone)]
pub struct ApiState {
    pub swapper: Arc<ModelSwapper>,
}

/// Error responses carry a status code plus the JSON envelope
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    envelope: ErrorEnvelope,
}

impl ApiError {
    fn new(status: StatusCode, kind: &str, message: String) -> Self {
        Self {
            status,
            envelope: ErrorEnvelope::new(kind, message),
        }
    }

    fn bad_request(message: String) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.envelope)).into_response()
    }
}

impl From<SelectionError> for ApiError {
    fn from(err: SelectionError) -> Self {
        match &err {
            SelectionError::NoEligibleModel { reason } => {
                // Temporarily no model available; a different request shape
                // or a later retry may succeed.
                let mut api = ApiError::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "no_model_available",
                    "no model is currently available for this task".to_string(),
                );
                api.envelope.error.reason = Some(format!("{:?}", reason));
                api
            }
            SelectionError::SpendingRejected {
                reason,
                limit,
                requested,
            } => {
                // A usage limit was reached; the user must wait or reduce
                // the request, which is a different action than retrying.
                let mut api = ApiError::new(
                    StatusCode::TOO_MANY_REQUESTS,
                    "usage_limit",
                    "you have reached your usage limit for this period".to_string(),
                );
                api.envelope.error.reason = Some(
                    serde_json::to_string(reason)
                        .unwrap_or_default()
                        .trim_matches('"')
                        .to_string(),
                );
                api.envelope.error.limit = Some(*limit);
                api.envelope.error.requested = Some(*requested);
                api
            }
            SelectionError::CatalogUnavailable(_) => {
                error!(error = %err, "catalog unavailable");
                ApiError::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "catalog_unavailable",
                    "model catalog is temporarily unavailable".to_string(),
                )
            }
            SelectionError::InvalidModelPricing { model, .. } => {
                error!(model = %model, "invalid pricing surfaced to the API");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "invalid_pricing",
                    "catalog pricing data is invalid".to_string(),
                )
            }
            SelectionError::CredentialError(message) => ApiError::new(
                StatusCode::FORBIDDEN,
                "credential_error",
                message.clone(),
            ),
            SelectionError::SpendingUnavailable(_) | SelectionError::UsageLogUnavailable(_) => {
                error!(error = %err, "persistence unavailable");
                ApiError::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "store_unavailable",
                    "a backing store is temporarily unavailable".to_string(),
                )
            }
        }
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        let status = match err {
            CredentialError::NotPermitted(_) | CredentialError::NotOwner(_) => {
                StatusCode::FORBIDDEN
            }
            CredentialError::NotFound | CredentialError::UnknownProvider(_) => {
                StatusCode::NOT_FOUND
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // CredentialError display never contains a credential value
        ApiError::new(status, "credential_error", err.to_string())
    }
}

/// POST /v1/select
pub async fn select_model(
    State(state): State<ApiState>,
    Json(body): Json<SelectBody>,
) -> Result<Json<SelectResponse>, ApiError> {
    debug!(task = %body.task_type, user = %body.user_id, "selection requested");
    let request = body.into_request().map_err(ApiError::bad_request)?;
    let result = state.swapper.select(&request).await?;
    Ok(Json(SelectResponse::from(result)))
}

/// POST /v1/usage
pub async fn report_usage(
    State(state): State<ApiState>,
    Json(body): Json<UsageBody>,
) -> Result<StatusCode, ApiError> {
    state
        .swapper
        .record_usage(ActualOutcome {
            request_id: body.request_id,
            user_id: body.user_id,
            model_id: body.model_id,
            task_type: body.task_type,
            estimated_cost_usd: body.estimated_cost_usd,
            actual_cost_usd: body.actual_cost_usd,
            latency_ms: body.latency_ms,
            success: body.success,
            at: Utc::now(),
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/credentials
pub async fn store_credential(
    State(state): State<ApiState>,
    Json(body): Json<StoreCredentialBody>,
) -> Result<Json<StoreCredentialResponse>, ApiError> {
    let credential_id = state
        .swapper
        .credentials()
        .store(&body.user_id, body.tier, &body.provider_id, &body.api_key)
        .await?;
    info!(user = %body.user_id, provider = %body.provider_id, "credential accepted");
    Ok(Json(StoreCredentialResponse { credential_id }))
}

/// POST /v1/credentials/:id/verify
pub async fn verify_credential(
    State(state): State<ApiState>,
    Path(credential_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let verified = state.swapper.credentials().verify(credential_id).await?;
    Ok(Json(serde_json::json!({ "verified": verified })))
}

/// DELETE /v1/credentials/:id
pub async fn revoke_credential(
    State(state): State<ApiState>,
    Path(credential_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.swapper.credentials().revoke(credential_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/models
pub async fn list_models(
    State(state): State<ApiState>,
) -> Result<Json<Vec<ModelEntry>>, ApiError> {
    let models = state
        .swapper
        .catalog()
        .active_models(&CandidateScope::SystemOnly)
        .await
        .map_err(SelectionError::from)?;
    let mut entries: Vec<ModelEntry> = models
        .into_iter()
        .map(|(model, provider)| ModelEntry {
            id: model.id,
            provider_id: provider.id,
            provider_kind: provider.kind,
            cost_per_1k_prompt: model.cost_per_1k_prompt,
            cost_per_1k_completion: model.cost_per_1k_completion,
            context_window: model.context_window,
        })
        .collect();
    entries.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(Json(entries))
}

/// GET /v1/status
pub async fn status(
    State(state): State<ApiState>,
) -> Result<Json<crate::swapper::SwapperStatus>, ApiError> {
    Ok(Json(state.swapper.status().await?))
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "model-swapper",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Fallback for unknown routes
pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorEnvelope::new("not_found", "unknown route".to_string())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::seed_defaults;
    use crate::credentials::CredentialCipher;
    use crate::models::UserTier;

    async fn state() -> ApiState {
        let swapper = ModelSwapper::builder()
            .with_cipher(CredentialCipher::new([2u8; 32]).unwrap())
            .build()
            .unwrap();
        seed_defaults(swapper.catalog().as_ref()).await.unwrap();
        ApiState {
            swapper: Arc::new(swapper),
        }
    }

    fn select_body(tier: UserTier, total: u32) -> SelectBody {
        SelectBody {
            task_type: "summarization".to_string(),
            user_id: "u1".to_string(),
            tier,
            prompt_tokens: None,
            completion_tokens: None,
            total_tokens: Some(total),
            preferred_model: None,
            preferred_provider: None,
            use_user_credentials: false,
            request_id: None,
        }
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = health_check().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_select_endpoint_round_trip() {
        let state = state().await;
        let response = select_model(State(state), Json(select_body(UserTier::Bigchonk, 1000)))
            .await
            .unwrap();
        assert!(!response.0.model_id.is_empty());
        assert!(response.0.cost.total > 0.0);
    }

    #[tokio::test]
    async fn test_usage_limit_maps_to_429() {
        let state = state().await;
        // FREE quota is 20 requests per day; the 21st must map to 429
        let mut last = None;
        for _ in 0..21 {
            last = Some(
                select_model(
                    State(state.clone()),
                    Json(select_body(UserTier::Free, 1000)),
                )
                .await,
            );
        }
        let err = last.unwrap().err().expect("expected a rejection");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_unknown_task_maps_to_503() {
        let state = state().await;
        let mut body = select_body(UserTier::Free, 1000);
        body.task_type = "nonexistent".to_string();
        let err = select_model(State(state), Json(body)).await.err().unwrap();
        assert_eq!(
            err.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_missing_tokens_maps_to_400() {
        let state = state().await;
        let mut body = select_body(UserTier::Free, 0);
        body.total_tokens = None;
        let err = select_model(State(state), Json(body)).await.err().unwrap();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_models_sorted() {
        let state = state().await;
        let entries = list_models(State(state)).await.unwrap().0;
        assert_eq!(entries.len(), 5);
        let mut sorted = entries.clone();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(
            entries.iter().map(|e| &e.id).collect::<Vec<_>>(),
            sorted.iter().map(|e| &e.id).collect::<Vec<_>>()
        );
    }
}
