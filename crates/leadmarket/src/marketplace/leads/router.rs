use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;

use super::domain::{LeadId, LeadSubmission};
use super::intake::{IntakeError, LeadIntake};
use super::repository::LeadRepository;
use crate::marketplace::feed::FeedPublisher;
use crate::marketplace::pricing::PricingFactorSource;
use crate::marketplace::store::StoreError;

/// Routes for lead intake and lifecycle.
pub fn lead_router<R, S, F>(intake: Arc<LeadIntake<R, S, F>>) -> Router
where
    R: LeadRepository + 'static,
    S: PricingFactorSource + 'static,
    F: FeedPublisher + 'static,
{
    Router::new()
        .route("/api/v1/leads", post(create_lead_handler))
        .route("/api/v1/leads", get(available_leads_handler))
        .route("/api/v1/leads/:lead_id", get(get_lead_handler))
        .route("/api/v1/leads/:lead_id", delete(remove_lead_handler))
        .route("/api/v1/leads/:lead_id/close", post(close_lead_handler))
        .with_state(intake)
}

async fn create_lead_handler<R, S, F>(
    State(intake): State<Arc<LeadIntake<R, S, F>>>,
    Json(submission): Json<LeadSubmission>,
) -> impl IntoResponse
where
    R: LeadRepository + 'static,
    S: PricingFactorSource + 'static,
    F: FeedPublisher + 'static,
{
    match intake.create(submission) {
        Ok(lead) => (StatusCode::CREATED, Json(lead.view(Utc::now()))).into_response(),
        Err(err @ IntakeError::ZeroCapacity) | Err(err @ IntakeError::ExpiryNotInFuture { .. }) => {
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
        Err(err @ IntakeError::DuplicateLead { .. }) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        Err(err) => storage_error(err),
    }
}

async fn available_leads_handler<R, S, F>(
    State(intake): State<Arc<LeadIntake<R, S, F>>>,
) -> impl IntoResponse
where
    R: LeadRepository + 'static,
    S: PricingFactorSource + 'static,
    F: FeedPublisher + 'static,
{
    match intake.available() {
        Ok(leads) => {
            let now = Utc::now();
            let summaries: Vec<_> = leads.iter().map(|lead| lead.summary(now)).collect();
            (StatusCode::OK, Json(summaries)).into_response()
        }
        Err(err) => storage_error(err),
    }
}

async fn get_lead_handler<R, S, F>(
    State(intake): State<Arc<LeadIntake<R, S, F>>>,
    Path(lead_id): Path<String>,
) -> impl IntoResponse
where
    R: LeadRepository + 'static,
    S: PricingFactorSource + 'static,
    F: FeedPublisher + 'static,
{
    match intake.get(&LeadId(lead_id)) {
        Ok(lead) => (StatusCode::OK, Json(lead.view(Utc::now()))).into_response(),
        Err(err @ IntakeError::LeadNotFound { .. }) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        Err(err) => storage_error(err),
    }
}

async fn close_lead_handler<R, S, F>(
    State(intake): State<Arc<LeadIntake<R, S, F>>>,
    Path(lead_id): Path<String>,
) -> impl IntoResponse
where
    R: LeadRepository + 'static,
    S: PricingFactorSource + 'static,
    F: FeedPublisher + 'static,
{
    match intake.close(&LeadId(lead_id)) {
        Ok(lead) => (StatusCode::OK, Json(lead.view(Utc::now()))).into_response(),
        Err(err @ IntakeError::LeadNotFound { .. }) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        Err(err) => storage_error(err),
    }
}

async fn remove_lead_handler<R, S, F>(
    State(intake): State<Arc<LeadIntake<R, S, F>>>,
    Path(lead_id): Path<String>,
) -> impl IntoResponse
where
    R: LeadRepository + 'static,
    S: PricingFactorSource + 'static,
    F: FeedPublisher + 'static,
{
    match intake.remove(&LeadId(lead_id)) {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({ "removed": outcome.label() })),
        )
            .into_response(),
        Err(err @ IntakeError::LeadNotFound { .. }) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        Err(err) => storage_error(err),
    }
}

fn storage_error(err: IntakeError) -> axum::response::Response {
    let status = match err {
        IntakeError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}
