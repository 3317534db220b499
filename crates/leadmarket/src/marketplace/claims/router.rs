use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::arbiter::{ClaimArbiter, ClaimServiceError, RefundError};
use super::domain::{ClaimDecision, ClaimId};
use super::repository::ClaimRepository;
use crate::marketplace::feed::FeedPublisher;
use crate::marketplace::leads::{LeadId, LeadRepository, ProviderId};
use crate::marketplace::store::StoreError;
use crate::marketplace::wallet::{LedgerError, WalletRepository};

/// Routes for claim attempts and administrative refunds.
pub fn claim_router<L, C, W, F>(arbiter: Arc<ClaimArbiter<L, C, W, F>>) -> Router
where
    L: LeadRepository + 'static,
    C: ClaimRepository + 'static,
    W: WalletRepository + 'static,
    F: FeedPublisher + 'static,
{
    Router::new()
        .route("/api/v1/claims", post(attempt_claim_handler))
        .route("/api/v1/claims/:claim_id/refund", post(refund_handler))
        .with_state(arbiter)
}

#[derive(Debug, Deserialize)]
struct ClaimRequest {
    lead_id: String,
    provider_id: String,
}

#[derive(Debug, Serialize)]
struct ClaimResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    claim_id: Option<ClaimId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    remaining_slots: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    credit_cost_charged: Option<Decimal>,
}

impl From<ClaimDecision> for ClaimResponse {
    fn from(decision: ClaimDecision) -> Self {
        match decision {
            ClaimDecision::Admitted {
                claim,
                remaining_slots,
            } => ClaimResponse {
                status: "admitted",
                claim_id: Some(claim.id),
                reason: None,
                message: None,
                remaining_slots,
                credit_cost_charged: Some(claim.price_paid),
            },
            ClaimDecision::Rejected {
                reason,
                remaining_slots,
            } => ClaimResponse {
                status: "rejected",
                claim_id: None,
                reason: Some(reason.label()),
                message: Some(reason.message()),
                remaining_slots,
                credit_cost_charged: None,
            },
        }
    }
}

async fn attempt_claim_handler<L, C, W, F>(
    State(arbiter): State<Arc<ClaimArbiter<L, C, W, F>>>,
    Json(request): Json<ClaimRequest>,
) -> impl IntoResponse
where
    L: LeadRepository + 'static,
    C: ClaimRepository + 'static,
    W: WalletRepository + 'static,
    F: FeedPublisher + 'static,
{
    let lead_id = LeadId(request.lead_id);
    let provider_id = ProviderId(request.provider_id);
    match arbiter.attempt_claim(&lead_id, &provider_id) {
        Ok(decision) => {
            let response = ClaimResponse::from(decision);
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(ClaimServiceError::LeadNotFound { lead }) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("lead {lead} not found") })),
        )
            .into_response(),
    }
}

async fn refund_handler<L, C, W, F>(
    State(arbiter): State<Arc<ClaimArbiter<L, C, W, F>>>,
    Path(claim_id): Path<String>,
) -> impl IntoResponse
where
    L: LeadRepository + 'static,
    C: ClaimRepository + 'static,
    W: WalletRepository + 'static,
    F: FeedPublisher + 'static,
{
    let claim_id = ClaimId(claim_id);
    match arbiter.refund_claim(&claim_id) {
        Ok(entry) => (StatusCode::OK, Json(entry)).into_response(),
        Err(RefundError::ClaimNotFound { claim }) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("claim {claim} not found") })),
        )
            .into_response(),
        Err(RefundError::Ledger(LedgerError::AlreadyRefunded { claim })) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": format!("claim {claim} has already been refunded") })),
        )
            .into_response(),
        Err(RefundError::Ledger(LedgerError::WalletNotFound { provider })) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no wallet found for provider {provider}") })),
        )
            .into_response(),
        Err(RefundError::Ledger(LedgerError::Contention { .. }))
        | Err(RefundError::Ledger(LedgerError::Store(StoreError::Unavailable(_))))
        | Err(RefundError::Store(StoreError::Unavailable(_))) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "refund could not be applied, try again" })),
        )
            .into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}
