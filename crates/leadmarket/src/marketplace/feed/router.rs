use std::fmt;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use super::events::{lead_topic, GLOBAL_FEED_TOPIC};
use super::hub::{FeedHub, FeedMessage};
use crate::marketplace::leads::LeadId;

/// Identifier wrapper for authenticated feed accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountId(pub String);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves opaque bearer tokens to marketplace accounts. Token issuance
/// lives in the account system; the feed only asks yes or no.
pub trait TokenDirectory: Send + Sync {
    fn resolve(&self, token: &str) -> Option<AccountId>;
}

#[derive(Clone)]
struct FeedState {
    hub: Arc<FeedHub>,
    directory: Arc<dyn TokenDirectory>,
}

/// Routes for the real-time feed WebSocket.
pub fn feed_router(hub: Arc<FeedHub>, directory: Arc<dyn TokenDirectory>) -> Router {
    Router::new()
        .route("/api/v1/feed", get(feed_handler))
        .with_state(FeedState { hub, directory })
}

#[derive(Debug, Deserialize)]
struct FeedQuery {
    /// Fallback for clients that cannot set an Authorization header.
    token: Option<String>,
    /// Narrow the subscription to a single lead's topic.
    lead_id: Option<String>,
}

async fn feed_handler(
    State(state): State<FeedState>,
    headers: HeaderMap,
    Query(query): Query<FeedQuery>,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    // Authentication decides before any upgrade concern does: a missing
    // or stale token gets 401 whether or not this is a WebSocket request.
    let token = bearer_token(&headers).or(query.token);
    let Some(token) = token else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "a feed token is required" })),
        )
            .into_response();
    };
    let Some(account) = state.directory.resolve(&token) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "feed token not recognized" })),
        )
            .into_response();
    };
    let Some(ws) = ws else {
        return (
            StatusCode::UPGRADE_REQUIRED,
            Json(json!({ "error": "this endpoint only speaks websocket" })),
        )
            .into_response();
    };

    let topic = match query.lead_id {
        Some(id) => lead_topic(&LeadId(id)),
        None => GLOBAL_FEED_TOPIC.to_string(),
    };
    let events = state.hub.subscribe(&topic);
    info!(account = %account, topic = %topic, "feed subscriber connected");
    ws.on_upgrade(move |socket| stream_events(socket, events, account, topic))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

async fn stream_events(
    socket: WebSocket,
    mut events: broadcast::Receiver<FeedMessage>,
    account: AccountId,
    topic: String,
) {
    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            frame = events.recv() => match frame {
                Ok(message) => {
                    let text = String::from_utf8_lossy(&message.payload).into_owned();
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    debug!(account = %account, topic = %topic, missed, "feed subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!(account = %account, topic = %topic, "feed subscriber disconnected");
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    use super::*;

    struct StaticTokens;

    impl TokenDirectory for StaticTokens {
        fn resolve(&self, token: &str) -> Option<AccountId> {
            (token == "good-token").then(|| AccountId("acct-001".to_string()))
        }
    }

    fn router() -> Router {
        feed_router(Arc::new(FeedHub::default()), Arc::new(StaticTokens))
    }

    fn ws_request(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(header::CONNECTION, "upgrade")
            .header(header::UPGRADE, "websocket")
            .header(header::SEC_WEBSOCKET_VERSION, "13")
            .header(header::SEC_WEBSOCKET_KEY, "dGhlIHNhbXBsZSBub25jZQ==");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let response = router()
            .oneshot(ws_request("/api/v1/feed", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_token_is_unauthorized() {
        let response = router()
            .oneshot(ws_request("/api/v1/feed", Some("stale-token")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn query_token_is_accepted_for_headerless_clients() {
        // Auth passes; the plain-HTTP test connection then stops at the
        // upgrade requirement rather than at 401.
        let response = router()
            .oneshot(ws_request("/api/v1/feed?token=good-token", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UPGRADE_REQUIRED);
    }

    #[tokio::test]
    async fn header_token_beats_query_token() {
        let response = router()
            .oneshot(ws_request(
                "/api/v1/feed?token=good-token",
                Some("stale-token"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn bearer_parsing_requires_the_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc".to_string()));

        let mut bare = HeaderMap::new();
        bare.insert(header::AUTHORIZATION, "abc".parse().unwrap());
        assert_eq!(bearer_token(&bare), None);
    }
}
