//! Match audit trail as JSON lines.
//!
//! Discrete, typed events for the lifecycle of the server and its matches,
//! each stamped with a monotonically increasing sequence number. This is a
//! local audit log, separate from the player-facing broadcast topics.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::sign::Outcome;

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete audit event, tagged with `"type"` when serialized.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// The HTTP server is listening.
    ServerStarted {
        timestamp: DateTime<Utc>,
        /// Bound socket address.
        bind_addr: String,
    },

    /// The HTTP server has stopped.
    ServerStopped {
        timestamp: DateTime<Utc>,
        reason: String,
    },

    /// A host opened a match.
    MatchCreated {
        timestamp: DateTime<Utc>,
        match_id: Uuid,
        public_id: String,
        host_id: Uuid,
    },

    /// A second player took a seat.
    PlayerJoined {
        timestamp: DateTime<Utc>,
        match_id: Uuid,
        player_id: Uuid,
    },

    /// Both picks were in and the round was scored.
    RoundResolved {
        timestamp: DateTime<Utc>,
        match_id: Uuid,
        round: u32,
        /// Outcome for the first seat.
        outcome: Outcome,
        winner: Option<Uuid>,
    },

    /// The match reached its terminal state.
    MatchEnded {
        timestamp: DateTime<Utc>,
        match_id: Uuid,
        /// `"host_ended"` or `"abandoned"`.
        reason: String,
        rounds_played: u32,
    },
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Serialization and I/O failures are dropped; the audit trail never fails
/// a match action.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Emitter on stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Emitter that discards everything.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Emitter writing to a new file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Writes one event as a JSON line and flushes.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
