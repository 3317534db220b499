use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use super::broadcaster::{FeedPublisher, PublishError};
use super::events::GLOBAL_FEED_TOPIC;

const DEFAULT_TOPIC_BUFFER: usize = 256;

/// One frame delivered to hub subscribers.
#[derive(Debug, Clone)]
pub struct FeedMessage {
    pub topic: String,
    pub payload: Arc<Vec<u8>>,
}

/// In-process topic hub: one bounded broadcast channel per topic.
///
/// Slow subscribers lag rather than block publishers; a subscriber that
/// falls more than the buffer behind loses the oldest frames and keeps
/// going. Publishing to a topic nobody listens on is a no-op.
#[derive(Debug)]
pub struct FeedHub {
    topics: Mutex<HashMap<String, broadcast::Sender<FeedMessage>>>,
    buffer: usize,
}

impl Default for FeedHub {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_BUFFER)
    }
}

impl FeedHub {
    /// `buffer` is the per-topic backlog kept for a lagging subscriber.
    pub fn new(buffer: usize) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// Subscribe to a topic, creating its channel when absent.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<FeedMessage> {
        let mut topics = match self.topics.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.buffer).0)
            .subscribe()
    }

    /// Subscribers currently attached to a topic.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        let topics = match self.topics.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        topics
            .get(topic)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

impl FeedPublisher for FeedHub {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        let mut topics = self
            .topics
            .lock()
            .map_err(|_| PublishError::Transport("feed hub lock poisoned".to_string()))?;
        if let Some(sender) = topics.get(topic) {
            let message = FeedMessage {
                topic: topic.to_string(),
                payload: Arc::new(payload.to_vec()),
            };
            if sender.send(message).is_err() && topic != GLOBAL_FEED_TOPIC {
                // Last subscriber left; drop the per-lead channel. The
                // global topic channel stays for the next connection.
                topics.remove(topic);
            }
        }
        Ok(())
    }
}
