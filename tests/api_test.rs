//! HTTP surface tests driven through the router without a socket.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use kenoq::{
    api::{errors::ErrorResponse, models::*, ApiServer, AppState},
    auth::StaticTokenAuth,
    config::{PoolConfig, ServerConfig},
    draw::{Draw, DrawEngine, FixedDrawSource},
    ledger::{AccountId, Ledger, MemoryLedger},
    metrics::Metrics,
    SettlementPipeline,
};
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceExt;

/// Full stack behind the router: fixed draw {1..10}, account 1 holding 100
/// USDT behind the token "alice-token".
async fn app() -> (Router, Arc<dyn Ledger>) {
    let draw = Draw::from_numbers([1, 2, 3, 4, 5, 6, 7, 8, 9, 10]).unwrap();
    let minimums = HashMap::from([("USDT".to_string(), dec!(1.0))]);
    let engine = Arc::new(DrawEngine::new(Arc::new(FixedDrawSource(draw)), minimums));

    let ledger: Arc<dyn Ledger> = Arc::new(MemoryLedger::new());
    ledger.deposit(AccountId(1), dec!(100)).await.unwrap();
    let auth = Arc::new(StaticTokenAuth::new());
    auth.register("alice-token", AccountId(1));

    let metrics = Arc::new(Metrics::new());
    let pipeline = SettlementPipeline::start(
        &PoolConfig::default(),
        engine,
        ledger.clone(),
        metrics.clone(),
    );
    let state = Arc::new(AppState {
        admission: pipeline.admission(),
        ledger: ledger.clone(),
        auth,
        metrics,
        version: "test".to_string(),
        started_at: Instant::now(),
    });
    (ApiServer::new(ServerConfig::default(), state).create_app(), ledger)
}

fn play_request(token: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/keno/play")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn play_settles_a_wager_and_reports_the_new_balance() {
    let (app, _ledger) = app().await;
    let response = app
        .oneshot(play_request(
            Some("alice-token"),
            r#"{"selection":[1,7,13,22,31],"stake":"10","currency":"USDT"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body: PlayResponse = json_body(response).await;
    assert_eq!(body.match_count, 2);
    assert_eq!(body.multiplier, "1.40");
    assert_eq!(body.profit, dec!(4.0));
    assert_eq!(body.balance, dec!(104.0));
    assert_eq!(body.draw, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
}

#[tokio::test]
async fn play_without_a_token_is_unauthorized() {
    let (app, ledger) = app().await;
    let response = app
        .oneshot(play_request(
            None,
            r#"{"selection":[1,7,13,22,31],"stake":"10","currency":"USDT"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: ErrorResponse = json_body(response).await;
    assert_eq!(body.error.code, "UNAUTHORIZED");
    // nothing was settled
    assert_eq!(ledger.balance(AccountId(1)).await.unwrap(), dec!(100));
}

#[tokio::test]
async fn invalid_selection_is_a_bad_request() {
    let (app, _ledger) = app().await;
    let response = app
        .oneshot(play_request(
            Some("alice-token"),
            r#"{"selection":[7,7],"stake":"10","currency":"USDT"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = json_body(response).await;
    assert_eq!(body.error.code, "INVALID_SELECTION");
    assert!(!body.error.retryable);
}

#[tokio::test]
async fn below_minimum_stake_is_a_bad_request() {
    let (app, _ledger) = app().await;
    let response = app
        .oneshot(play_request(
            Some("alice-token"),
            r#"{"selection":[1,2,3],"stake":"0.5","currency":"USDT"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = json_body(response).await;
    assert_eq!(body.error.code, "BELOW_MINIMUM_STAKE");
}

#[tokio::test]
async fn insufficient_funds_is_payment_required() {
    let (app, ledger) = app().await;
    let response = app
        .oneshot(play_request(
            Some("alice-token"),
            r#"{"selection":[1,7,13,22,31],"stake":"500","currency":"USDT"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body: ErrorResponse = json_body(response).await;
    assert_eq!(body.error.code, "INSUFFICIENT_FUNDS");
    assert_eq!(ledger.balance(AccountId(1)).await.unwrap(), dec!(100));
}

#[tokio::test]
async fn balance_and_history_reflect_settlements() {
    let (app, _ledger) = app().await;
    let response = app
        .clone()
        .oneshot(play_request(
            Some("alice-token"),
            r#"{"selection":[1,7,13,22,31],"stake":"10","currency":"USDT"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/balance")
                .header(header::AUTHORIZATION, "Bearer alice-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let balance: BalanceResponse = json_body(response).await;
    assert_eq!(balance.account, 1);
    assert_eq!(balance.balance, dec!(104.0));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/history?limit=10")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let history: HistoryResponse = json_body(response).await;
    assert_eq!(history.records.len(), 1);
    assert_eq!(history.records[0].multiplier, "1.40");
    assert_eq!(history.next_before, None);
}

#[tokio::test]
async fn health_and_metrics_respond() {
    let (app, _ledger) = app().await;
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let health: HealthResponse = json_body(response).await;
    assert_eq!(health.status, "Running");
    assert_eq!(health.live_workers, 5);

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("kenoq_wagers_settled_total"));
}
