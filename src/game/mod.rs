//! Two-player matches: records, join codes and the lifecycle engine.

pub mod code;
pub mod engine;
pub mod state;

pub use engine::MatchEngine;
pub use state::{
    CreatedMatch, MAX_SEATS, MatchId, MatchPhase, MatchRecord, MatchSnapshot, PickReceipt,
    Player, PlayerId, PlayerView, RoundPick, RoundResult, Seat, SeatView,
};
