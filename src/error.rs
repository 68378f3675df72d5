//! Error types for `SignClash`
//!
//! A single hierarchy covers the game core, the store and broadcast seams,
//! configuration loading and the HTTP transport. Every game failure carries
//! an [`ErrorKind`] so callers can map it to a status or display message
//! without matching on individual variants.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `SignClash` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Transport error (bind failed, server error)
    pub const TRANSPORT_ERROR: i32 = 4;

    /// Game core error surfaced to the CLI
    pub const GAME_ERROR: i32 = 5;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `SignClash` operations.
#[derive(Debug, Error)]
pub enum SignClashError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Transport layer error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Game core error
    #[error(transparent)]
    Game(#[from] GameError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SignClashError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => ExitCode::CONFIG_ERROR,
            Self::Transport(_) => ExitCode::TRANSPORT_ERROR,
            Self::Game(_) => ExitCode::GAME_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
            Self::Json(_) => ExitCode::ERROR,
        }
    }
}

// ============================================================================
// Game Errors
// ============================================================================

/// Coarse classification of a [`GameError`].
///
/// The HTTP layer maps kinds to status codes; metrics use the label form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Match or public code cannot be resolved.
    NotFound,
    /// Action is invalid for the current match state.
    StateConflict,
    /// Malformed sign, code or identifier.
    Validation,
    /// Caller is not allowed to act on this match.
    Forbidden,
    /// Store or other infrastructure failure.
    Internal,
}

impl ErrorKind {
    /// Returns the `snake_case` label used in responses and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::StateConflict => "state_conflict",
            Self::Validation => "validation",
            Self::Forbidden => "forbidden",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures of match actions.
///
/// Structural errors are returned before any state is mutated.
#[derive(Debug, Error)]
pub enum GameError {
    /// No match with this id exists
    #[error("match not found: {0}")]
    MatchNotFound(Uuid),

    /// No active match uses this public code
    #[error("no active match with code {0}")]
    PublicIdNotFound(String),

    /// The match has ended
    #[error("match {0} has ended")]
    MatchEnded(Uuid),

    /// The match is full or a round is in progress
    #[error("match {0} has already started")]
    MatchAlreadyStarted(Uuid),

    /// The player already picked a sign this round
    #[error("player {player} already picked in round {round}")]
    AlreadyPicked {
        /// Player that tried to pick again
        player: Uuid,
        /// Current round number
        round: u32,
    },

    /// Picks are only accepted while a round is active
    #[error("no round is active in match {0}")]
    RoundNotActive(Uuid),

    /// The sign was used too recently by this player
    #[error("{sign} was used in the last {cooldown} rounds")]
    SignOnCooldown {
        /// Sign name
        sign: String,
        /// Configured cooldown length
        cooldown: usize,
    },

    /// The player is not seated in the match
    #[error("player {player} is not part of match {match_id}")]
    NotParticipant {
        /// Match id
        match_id: Uuid,
        /// Offending player
        player: Uuid,
    },

    /// Only the host may perform this action
    #[error("only the host can do this in match {0}")]
    NotHost(Uuid),

    /// Raw sign name is not part of the ring
    #[error("invalid sign '{input}'{}", suggestion.as_ref().map(|s| format!(" (did you mean {s}?)")).unwrap_or_default())]
    InvalidSign {
        /// The rejected input
        input: String,
        /// Closest valid sign name, if any
        suggestion: Option<String>,
    },

    /// Public code has the wrong length or alphabet
    #[error("invalid public code '{0}'")]
    InvalidPublicId(String),

    /// Player identifier is missing or not a UUID
    #[error("invalid player id: {0}")]
    InvalidPlayerId(String),

    /// Could not find a free public code
    #[error("no free public code after {0} attempts")]
    CodeSpaceExhausted(usize),

    /// Store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GameError {
    /// Classifies this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MatchNotFound(_) | Self::PublicIdNotFound(_) => ErrorKind::NotFound,
            Self::MatchEnded(_)
            | Self::MatchAlreadyStarted(_)
            | Self::AlreadyPicked { .. }
            | Self::RoundNotActive(_)
            | Self::SignOnCooldown { .. } => ErrorKind::StateConflict,
            Self::InvalidSign { .. } | Self::InvalidPublicId(_) | Self::InvalidPlayerId(_) => {
                ErrorKind::Validation
            }
            Self::NotParticipant { .. } | Self::NotHost(_) => ErrorKind::Forbidden,
            Self::CodeSpaceExhausted(_) | Self::Store(_) => ErrorKind::Internal,
        }
    }
}

// ============================================================================
// Store / Broadcast Errors
// ============================================================================

/// Errors reported by a [`Store`](crate::store::Store) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another non-ended match already uses this public code
    #[error("public code {0} is already in use")]
    DuplicatePublicId(String),

    /// Update targeted a match that does not exist
    #[error("match {0} does not exist in the store")]
    Missing(Uuid),
}

/// Errors reported by a [`Broadcaster`](crate::broadcast::Broadcaster).
///
/// Never propagated out of match actions; they are logged and counted.
#[derive(Debug, Error)]
pub enum BroadcastError {
    /// Payload could not be serialized
    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The transport refused the message
    #[error("delivery failed on {topic}: {message}")]
    Delivery {
        /// Target topic
        topic: String,
        /// Transport message
        message: String,
    },
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}: {}", errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Configuration file exceeds the size limit
    #[error("config file {path} is {size} bytes (limit: {limit})")]
    TooLarge {
        /// Path to the configuration file
        path: PathBuf,
        /// Actual size in bytes
        size: u64,
        /// Limit in bytes
        limit: u64,
    },

    /// Environment variable referenced in configuration is not set
    #[error("environment variable '{var}' not set ({location})")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
        /// Message attached to the reference
        location: String,
    },
}

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., `"game.code_length"`)
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Prevents the configuration from being used
    Error,
    /// Logged, does not prevent loading
    Warning,
}

// ============================================================================
// Transport Errors
// ============================================================================

/// HTTP transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failed to bind the listener
    #[error("bind failed: {0}")]
    Bind(String),

    /// Server loop failed
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================
