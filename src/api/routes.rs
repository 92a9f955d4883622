//! API route handlers and the bearer-token guard.
//!
//! State is shared via `Arc<ApiState>`.

use axum::{
    extract::{Query, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::engine::aggregator::DividendAggregator;
use crate::engine::queue::TradeQueue;
use crate::types::{DividendQuery, DividendRecord};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct ApiState {
    pub aggregator: Arc<DividendAggregator>,
    pub queue: TradeQueue,
    pub auth_token: SecretString,
}

pub type AppState = Arc<ApiState>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid or missing Authorization header")]
    Unauthorized,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "detail": ApiError::Unauthorized.to_string() })),
            )
                .into_response(),
            ApiError::Internal(e) => {
                // Details stay in the log, never in the response.
                error!(error = %format!("{e:#}"), "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Middleware
// ---------------------------------------------------------------------------

/// Reject requests whose `Authorization` header is not `Bearer <token>`.
pub async fn require_bearer(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let expected = format!("Bearer {}", state.auth_token.expose_secret());
    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if presented != Some(expected.as_str()) {
        warn!(path = %req.uri().path(), "Rejected unauthenticated request");
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(req).await)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/tao_dividends
pub async fn tao_dividends(
    State(state): State<AppState>,
    Query(query): Query<DividendQuery>,
) -> Result<Json<Vec<DividendRecord>>, ApiError> {
    let records = state.aggregator.fetch_dividends(&query).await?;

    if query.trade {
        let hotkey = query.hotkey().map(str::to_string);
        if state.queue.enqueue(query.netuid, hotkey) {
            info!(netuid = ?query.netuid, "Trade job queued");
        }
    }

    Ok(Json(records))
}

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
