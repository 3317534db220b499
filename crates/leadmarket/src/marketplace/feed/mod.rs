//! Real-time lead feed.
//!
//! State changes fan out as JSON events over topics: one global topic for
//! the whole feed plus a per-lead topic. [`FeedPublisher`] is the
//! transport seam; [`FeedHub`] is the in-process broadcast implementation
//! behind the WebSocket endpoint. Publishing is strictly best-effort and
//! always happens after the state change has committed.

pub mod broadcaster;
pub mod events;
pub mod hub;
pub mod router;

pub use broadcaster::{FeedPublisher, LeadBroadcaster, PublishError};
pub use events::{lead_topic, LeadEvent, GLOBAL_FEED_TOPIC};
pub use hub::{FeedHub, FeedMessage};
pub use router::{feed_router, AccountId, TokenDirectory};
