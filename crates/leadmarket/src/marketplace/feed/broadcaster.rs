use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::warn;

use super::events::{lead_topic, LeadEvent, GLOBAL_FEED_TOPIC};
use crate::marketplace::leads::{Lead, LeadId};

/// Error surfaced by a publish attempt.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("event encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("feed transport unavailable: {0}")]
    Transport(String),
}

/// Transport seam for the feed: a serialized payload on a named topic.
///
/// Implementations must not block on slow consumers; delivery is
/// best-effort by contract.
pub trait FeedPublisher: Send + Sync {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), PublishError>;
}

/// Typed fan-out facade over a [`FeedPublisher`].
///
/// Every event goes to the lead's own topic and to the global feed.
/// Callers invoke this only after their state change has committed, and
/// a publish failure is logged and dropped, never bubbled: feed delivery
/// must not decide the fate of a claim or a lead write.
pub struct LeadBroadcaster<F> {
    feed: Arc<F>,
}

impl<F> Clone for LeadBroadcaster<F> {
    fn clone(&self) -> Self {
        Self {
            feed: Arc::clone(&self.feed),
        }
    }
}

impl<F: FeedPublisher> LeadBroadcaster<F> {
    pub fn new(feed: Arc<F>) -> Self {
        Self { feed }
    }

    pub fn claim_state_changed(&self, lead: &Lead, now: DateTime<Utc>) {
        self.emit(&LeadEvent::claim_state(lead, now));
    }

    pub fn lead_created(&self, lead: &Lead, now: DateTime<Utc>) {
        self.emit(&LeadEvent::created(lead, now));
    }

    pub fn lead_updated(&self, lead: &Lead, now: DateTime<Utc>) {
        self.emit(&LeadEvent::updated(lead, now));
    }

    pub fn lead_deleted(&self, id: LeadId) {
        self.emit(&LeadEvent::deleted(id));
    }

    fn emit(&self, event: &LeadEvent) {
        let payload = match serde_json::to_vec(event) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(kind = event.kind(), error = %err, "failed to encode feed event");
                return;
            }
        };
        let scoped = lead_topic(event.lead_id());
        for topic in [scoped.as_str(), GLOBAL_FEED_TOPIC] {
            if let Err(err) = self.feed.publish(topic, &payload) {
                warn!(
                    kind = event.kind(),
                    topic,
                    error = %err,
                    "dropping feed event after publish failure"
                );
            }
        }
    }
}
