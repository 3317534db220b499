use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::{fixture, Fixture};
use crate::marketplace::claims::router::claim_router;

fn credits(units: i64) -> Decimal {
    Decimal::new(units * 100, 2)
}

fn router(fx: &Fixture) -> Router {
    claim_router(fx.arbiter.clone())
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn claim_endpoint_admits_and_reports_the_charge() {
    let fx = fixture();
    let lead = fx.seed_lead("lead-a", 3, credits(40));
    fx.fund("prov-1", credits(100));

    let response = router(&fx)
        .oneshot(post_json(
            "/api/v1/claims",
            json!({ "lead_id": lead.id.0, "provider_id": "prov-1" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["status"], "admitted");
    assert_eq!(body["remaining_slots"], 2);
    assert_eq!(body["credit_cost_charged"], "40.00");
    assert!(body["claim_id"].as_str().unwrap().starts_with("claim-"));
    assert!(body.get("reason").is_none());
}

#[tokio::test]
async fn claim_endpoint_reports_rejections_in_the_body() {
    let fx = fixture();
    let lead = fx.seed_lead("lead-a", 1, credits(10));
    fx.fund("prov-1", credits(50));
    fx.fund("prov-2", credits(50));
    let app = router(&fx);

    let first = app
        .clone()
        .oneshot(post_json(
            "/api/v1/claims",
            json!({ "lead_id": lead.id.0, "provider_id": "prov-1" }),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(post_json(
            "/api/v1/claims",
            json!({ "lead_id": lead.id.0, "provider_id": "prov-2" }),
        ))
        .await
        .unwrap();

    // Rejection is a decision, not an HTTP failure.
    assert_eq!(second.status(), StatusCode::OK);
    let body = read_json_body(second).await;
    assert_eq!(body["status"], "rejected");
    assert_eq!(body["reason"], "lead_full");
    assert_eq!(body["remaining_slots"], 0);
    assert!(body["message"].as_str().unwrap().contains("claim limit"));
    assert!(body.get("credit_cost_charged").is_none());
}

#[tokio::test]
async fn unknown_lead_maps_to_not_found() {
    let fx = fixture();
    fx.fund("prov-1", credits(50));

    let response = router(&fx)
        .oneshot(post_json(
            "/api/v1/claims",
            json!({ "lead_id": "lead-ghost", "provider_id": "prov-1" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = read_json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("lead-ghost"));
}

#[tokio::test]
async fn refund_endpoint_pays_back_once_then_conflicts() {
    let fx = fixture();
    let lead = fx.seed_lead("lead-a", 2, credits(40));
    fx.fund("prov-1", credits(100));
    let app = router(&fx);

    let admitted = app
        .clone()
        .oneshot(post_json(
            "/api/v1/claims",
            json!({ "lead_id": lead.id.0, "provider_id": "prov-1" }),
        ))
        .await
        .unwrap();
    let claim_id = read_json_body(admitted).await["claim_id"]
        .as_str()
        .unwrap()
        .to_string();

    let refund = app
        .clone()
        .oneshot(post_json(
            &format!("/api/v1/claims/{claim_id}/refund"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(refund.status(), StatusCode::OK);
    let body = read_json_body(refund).await;
    assert_eq!(body["reason"], "refund");
    assert_eq!(body["amount"], "40.00");
    assert_eq!(body["claim_ref"], claim_id.as_str());

    let again = app
        .oneshot(post_json(
            &format!("/api/v1/claims/{claim_id}/refund"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn refund_of_unknown_claim_is_not_found() {
    let fx = fixture();

    let response = router(&fx)
        .oneshot(post_json("/api/v1/claims/claim-ghost/refund", json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
