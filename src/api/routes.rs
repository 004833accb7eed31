//! Route definitions

use super::handlers::{
    balance_handler, health_handler, history_handler, metrics_handler, play_handler, AppState,
};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/keno/play", post(play_handler))
        .route("/api/balance", get(balance_handler))
        .route("/api/history", get(history_handler))
        .with_state(state)
}
