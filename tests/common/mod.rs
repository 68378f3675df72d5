//! Shared integration-test harness: an in-process engine wired to a real
//! channel broadcaster, and fixture lookup.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use signclash::broadcast::{ChannelBroadcaster, Message};
use signclash::config::GameConfig;
use signclash::game::{MatchEngine, MatchId, PlayerId};
use signclash::observability::EventEmitter;
use signclash::store::MemoryStore;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Default timeout for waiting on a broadcast message.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Engine plus the broadcaster it publishes to.
pub struct Stack {
    pub engine: Arc<MatchEngine>,
    pub topics: Arc<ChannelBroadcaster>,
}

impl Stack {
    pub fn new() -> Self {
        Self::with_config(GameConfig::default())
    }

    pub fn with_config(config: GameConfig) -> Self {
        let topics = Arc::new(ChannelBroadcaster::default());
        let engine = MatchEngine::new(
            Arc::new(MemoryStore::new()),
            topics.clone(),
            Arc::new(EventEmitter::noop()),
            config,
        );
        Self {
            engine: Arc::new(engine),
            topics,
        }
    }

    /// Creates a match, seats a guest, and readies both players.
    pub async fn started_match(&self) -> (MatchId, PlayerId, PlayerId) {
        let host = Uuid::new_v4();
        let guest = Uuid::new_v4();
        let id = self.engine.create_match(host).await.unwrap().match_id;
        self.engine.join_match(id, guest).await.unwrap();
        self.engine.set_ready(id, host).await.unwrap();
        self.engine.set_ready(id, guest).await.unwrap();
        (id, host, guest)
    }
}

/// Receives the next message or panics after [`DEFAULT_TIMEOUT`].
pub async fn next_message(rx: &mut broadcast::Receiver<Message>) -> Message {
    tokio::time::timeout(DEFAULT_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for broadcast")
        .expect("broadcast channel closed")
}

/// Path to a file under `tests/fixtures`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Runs the `signclash` binary to completion.
pub fn run_cli(args: &[&str]) -> std::process::Output {
    std::process::Command::new(env!("CARGO_BIN_EXE_signclash"))
        .args(args)
        .env_remove("SIGNCLASH_CONFIG")
        .output()
        .expect("failed to run signclash")
}
