use crate::infra::{AppState, Runtime};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use leadmarket::marketplace::claims::claim_router;
use leadmarket::marketplace::feed::{feed_router, TokenDirectory};
use leadmarket::marketplace::leads::lead_router;
use leadmarket::marketplace::wallet::wallet_router;
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_marketplace_routes(runtime: &Runtime) -> axum::Router {
    let directory: Arc<dyn TokenDirectory> = runtime.tokens.clone();
    lead_router(Arc::clone(&runtime.intake))
        .merge(claim_router(Arc::clone(&runtime.arbiter)))
        .merge(wallet_router(Arc::clone(&runtime.ledger)))
        .merge(feed_router(Arc::clone(&runtime.hub), directory))
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
