//! [`Broadcaster`] over per-topic tokio broadcast channels.
//!
//! Channels are created on first subscription. Publishing to a topic nobody
//! listens on drops the message, matching the at-most-once contract.

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::trace;

use super::{Broadcaster, Message};
use crate::error::BroadcastError;

/// Default per-topic buffer; slow subscribers lag past this and skip.
pub const DEFAULT_TOPIC_CAPACITY: usize = 64;

/// In-process pub/sub used by the SSE endpoint.
#[derive(Debug)]
pub struct ChannelBroadcaster {
    topics: DashMap<String, broadcast::Sender<Message>>,
    capacity: usize,
}

impl ChannelBroadcaster {
    /// Creates a broadcaster whose topics buffer `capacity` messages.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Subscribes to `topic`, creating its channel if needed.
    #[must_use]
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<Message> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Number of topics with a live channel.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Drops channels whose subscribers have all gone away.
    pub fn prune(&self) {
        self.topics.retain(|_, tx| tx.receiver_count() > 0);
    }
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_CAPACITY)
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn publish(
        &self,
        topic: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<(), BroadcastError> {
        let Some(tx) = self.topics.get(topic) else {
            trace!(topic, event, "no subscribers");
            return Ok(());
        };
        let message = Message {
            topic: topic.to_string(),
            event: event.to_string(),
            payload,
        };
        // Err only means every receiver is gone.
        if tx.send(message).is_err() {
            trace!(topic, event, "all subscribers dropped");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn subscriber_receives_in_order() {
        let broadcaster = ChannelBroadcaster::default();
        let mut rx = broadcaster.subscribe("t");

        broadcaster.publish("t", "a", json!({"n": 1})).unwrap();
        broadcaster.publish("t", "b", json!({"n": 2})).unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.event, "a");
        assert_eq!(second.event, "b");
        assert_eq!(second.payload["n"], 2);
    }

    #[test]
    fn publish_without_subscribers_is_ok() {
        let broadcaster = ChannelBroadcaster::default();
        assert!(broadcaster.publish("nobody", "x", json!(null)).is_ok());
        assert_eq!(broadcaster.topic_count(), 0);
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let broadcaster = ChannelBroadcaster::default();
        let mut lobby = broadcaster.subscribe("lobby");
        let _round = broadcaster.subscribe("round");

        broadcaster.publish("round", "pick", json!({})).unwrap();
        broadcaster.publish("lobby", "join", json!({})).unwrap();

        assert_eq!(lobby.recv().await.unwrap().event, "join");
    }

    #[test]
    fn prune_drops_abandoned_topics() {
        let broadcaster = ChannelBroadcaster::default();
        let rx = broadcaster.subscribe("gone");
        let _keep = broadcaster.subscribe("kept");
        drop(rx);
        broadcaster.prune();
        assert_eq!(broadcaster.topic_count(), 1);
        assert!(broadcaster.publish("gone", "x", json!(1)).is_ok());
    }
}
