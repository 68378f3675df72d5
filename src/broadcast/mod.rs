//! Match-scoped publish/subscribe.
//!
//! The engine receives a [`Broadcaster`] explicitly and publishes after the
//! new state has been stored. Delivery is at-most-once; a client that misses
//! a message recovers by refetching the match snapshot.

pub mod channel;

use serde::Serialize;

use crate::error::BroadcastError;
use crate::game::MatchId;

pub use channel::ChannelBroadcaster;

/// Event names published by the match engine.
pub mod event {
    pub const PLAYER_JOINED: &str = "player-joined";
    pub const PLAYER_LEFT: &str = "player-left";
    pub const PLAYER_READY: &str = "player-ready";
    pub const PLAYER_NOT_READY: &str = "player-not-ready";
    pub const MATCH_STARTING: &str = "match-starting";
    pub const PLAYER_PICKED: &str = "player-picked";
    pub const ROUND_RESOLVED: &str = "round-resolved";
    pub const NEW_ROUND: &str = "new-round";
    pub const MATCH_ENDED: &str = "match-ended";
}

/// Topic for membership and ready-state changes.
#[must_use]
pub fn lobby_topic(match_id: MatchId) -> String {
    format!("match-{match_id}-lobby")
}

/// Topic for picks and round results.
#[must_use]
pub fn round_topic(match_id: MatchId) -> String {
    format!("match-{match_id}-round")
}

/// A published message as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub topic: String,
    pub event: String,
    pub payload: serde_json::Value,
}

/// Fire-and-forget publisher.
pub trait Broadcaster: Send + Sync {
    /// Publishes `payload` as `event` on `topic`.
    ///
    /// # Errors
    ///
    /// Returns a [`BroadcastError`] when the transport refuses the message.
    /// Having no subscribers is not an error.
    fn publish(
        &self,
        topic: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<(), BroadcastError>;
}
