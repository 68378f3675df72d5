//! Configuration schema types.
//!
//! Every section and field is optional in YAML; missing values fall back to
//! the defaults below. Unknown keys are rejected.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::broadcast::channel::DEFAULT_TOPIC_CAPACITY;
use crate::game::code::DEFAULT_CODE_LENGTH;

/// Default listen address.
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

// ============================================================================
// Top-Level Configuration
// ============================================================================

/// Root configuration for a `signclash` server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Listener and transport settings
    pub server: ServerSettings,

    /// Match rules
    pub game: GameConfig,
}

// ============================================================================
// Server Settings
// ============================================================================

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    /// Socket address to bind, e.g. `"0.0.0.0:3000"`
    pub bind: String,

    /// Per-topic broadcast buffer for SSE subscribers
    pub sse_buffer: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            sse_buffer: DEFAULT_TOPIC_CAPACITY,
        }
    }
}

// ============================================================================
// Game Settings
// ============================================================================

/// Rules the match engine enforces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GameConfig {
    /// Length of the public join code
    pub code_length: usize,

    /// Code samples tried before giving up on a create
    pub max_code_attempts: usize,

    /// A player may not reuse any of their last N signs (0 disables)
    pub sign_cooldown: usize,

    /// Lobby countdown announced when both players are ready
    #[serde(with = "duration_str")]
    pub countdown: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            code_length: DEFAULT_CODE_LENGTH,
            max_code_attempts: 32,
            sign_cooldown: 3,
            countdown: Duration::from_secs(3),
        }
    }
}

/// Serde adapter for human-readable durations (`"3s"`, `"1m 30s"`).
mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}
