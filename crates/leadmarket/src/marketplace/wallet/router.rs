use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use super::ledger::{LedgerError, WalletLedger};
use super::repository::WalletRepository;
use crate::marketplace::leads::ProviderId;
use crate::marketplace::store::StoreError;

/// Routes for wallet provisioning, balances, and top-ups.
pub fn wallet_router<W>(ledger: Arc<WalletLedger<W>>) -> Router
where
    W: WalletRepository + 'static,
{
    Router::new()
        .route("/api/v1/wallets", post(open_wallet_handler))
        .route("/api/v1/wallets/:provider_id", get(get_wallet_handler))
        .route(
            "/api/v1/wallets/:provider_id/transactions",
            get(transactions_handler),
        )
        .route("/api/v1/wallets/:provider_id/top-up", post(top_up_handler))
        .with_state(ledger)
}

#[derive(Debug, Deserialize)]
struct OpenWalletRequest {
    provider_id: String,
    #[serde(default)]
    opening_balance: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct TopUpRequest {
    amount: Decimal,
}

async fn open_wallet_handler<W>(
    State(ledger): State<Arc<WalletLedger<W>>>,
    Json(request): Json<OpenWalletRequest>,
) -> impl IntoResponse
where
    W: WalletRepository + 'static,
{
    let provider = ProviderId(request.provider_id);
    let opening = request.opening_balance.unwrap_or(Decimal::ZERO);
    match ledger.open_wallet(&provider, opening) {
        Ok(wallet) => (StatusCode::CREATED, Json(wallet.view())).into_response(),
        Err(err @ LedgerError::WalletExists { .. }) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        Err(err @ LedgerError::InvalidAmount { .. }) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        Err(err) => ledger_error(err),
    }
}

async fn get_wallet_handler<W>(
    State(ledger): State<Arc<WalletLedger<W>>>,
    Path(provider_id): Path<String>,
) -> impl IntoResponse
where
    W: WalletRepository + 'static,
{
    match ledger.wallet(&ProviderId(provider_id)) {
        Ok(wallet) => (StatusCode::OK, Json(wallet.view())).into_response(),
        Err(err @ LedgerError::WalletNotFound { .. }) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        Err(err) => ledger_error(err),
    }
}

async fn transactions_handler<W>(
    State(ledger): State<Arc<WalletLedger<W>>>,
    Path(provider_id): Path<String>,
) -> impl IntoResponse
where
    W: WalletRepository + 'static,
{
    match ledger.history(&ProviderId(provider_id)) {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(err @ LedgerError::WalletNotFound { .. }) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        Err(err) => ledger_error(err),
    }
}

async fn top_up_handler<W>(
    State(ledger): State<Arc<WalletLedger<W>>>,
    Path(provider_id): Path<String>,
    Json(request): Json<TopUpRequest>,
) -> impl IntoResponse
where
    W: WalletRepository + 'static,
{
    let provider = ProviderId(provider_id);
    match ledger.top_up(&provider, request.amount) {
        Ok(entry) => (StatusCode::OK, Json(entry)).into_response(),
        Err(err @ LedgerError::WalletNotFound { .. }) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        Err(err @ LedgerError::InvalidAmount { .. }) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        Err(err) => ledger_error(err),
    }
}

fn ledger_error(err: LedgerError) -> axum::response::Response {
    let status = match err {
        LedgerError::Contention { .. } | LedgerError::Store(StoreError::Unavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}
