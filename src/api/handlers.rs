//! Request handlers
//!
//! Thin translation layer: authenticate, build the typed wager request,
//! submit through the admission controller, shape the reply.

use super::{
    errors::ApiError,
    middleware::RequestId,
    models::{
        format_multiplier, BalanceResponse, HealthResponse, HistoryEntry, HistoryQuery,
        HistoryResponse, PlayRequest, PlayResponse,
    },
};
use crate::{
    admission::AdmissionController,
    auth::Authenticator,
    draw::Selection,
    ledger::{AccountId, Ledger},
    metrics::Metrics,
    queue::WagerRequest,
};
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Extension, Json,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

pub struct AppState {
    pub admission: Arc<AdmissionController>,
    pub ledger: Arc<dyn Ledger>,
    pub auth: Arc<dyn Authenticator>,
    pub metrics: Arc<Metrics>,
    pub version: String,
    pub started_at: Instant,
}

fn bearer_token(headers: &HeaderMap) -> &str {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("")
        .trim()
}

async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    request_id: &str,
) -> Result<AccountId, ApiError> {
    state
        .auth
        .identify(bearer_token(headers))
        .await
        .map_err(|err| ApiError::auth(request_id.to_string(), err))
}

/// POST /api/keno/play
pub async fn play_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<PlayRequest>,
) -> Result<Json<PlayResponse>, ApiError> {
    let account = authenticate(&state, &headers, &request_id.0).await?;

    let selection = Selection::new(&body.selection)
        .map_err(|err| ApiError::wager(request_id.0.clone(), err))?;

    let outcome = state
        .admission
        .submit(WagerRequest {
            account,
            selection,
            stake: body.stake,
            currency: body.currency.clone(),
        })
        .await
        .map_err(|err| ApiError::wager(request_id.0.clone(), err))?;

    let balance = state
        .ledger
        .balance(account)
        .await
        .map_err(|err| ApiError::internal(request_id.0.clone(), err.to_string()))?;

    info!(
        request_id = %request_id.0,
        %account,
        matches = outcome.match_count,
        %outcome.profit,
        "wager settled"
    );

    Ok(Json(PlayResponse {
        request_id: request_id.0,
        draw: outcome.draw.numbers().to_vec(),
        match_count: outcome.match_count,
        multiplier: format_multiplier(outcome.multiplier),
        profit: outcome.profit,
        balance,
        currency: body.currency,
    }))
}

/// GET /api/balance
pub async fn balance_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<BalanceResponse>, ApiError> {
    let account = authenticate(&state, &headers, &request_id.0).await?;
    let balance = state
        .ledger
        .balance(account)
        .await
        .map_err(|err| ApiError::internal(request_id.0, err.to_string()))?;
    Ok(Json(BalanceResponse {
        account: account.0,
        balance,
    }))
}

/// GET /api/history?before={id}&limit={n}
pub async fn history_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let limit = params.limit.clamp(1, 100);
    let records = state
        .ledger
        .history_page(params.before, limit)
        .await
        .map_err(|err| ApiError::internal(request_id.0, err.to_string()))?;

    // a short page means the history is exhausted
    let next_before = if records.len() == limit {
        records.last().map(|r| r.id)
    } else {
        None
    };
    Ok(Json(HistoryResponse {
        records: records.into_iter().map(HistoryEntry::from).collect(),
        next_before,
    }))
}

/// GET /health
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Running".to_string(),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        live_workers: state.metrics.live_workers.load(Ordering::Relaxed).max(0) as usize,
        queue_depth: state.admission.queue_depth(),
    })
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    state.metrics.to_prometheus_format()
}
