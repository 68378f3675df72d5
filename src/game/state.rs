//! Match records and the views handed to callers.
//!
//! [`MatchRecord`] is the authoritative per-match state kept by the store.
//! Everything else in this module is a read-only projection of it.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sign::{self, Outcome, Sign};

/// Internal match identifier.
pub type MatchId = Uuid;

/// Player identifier supplied by the identity layer.
pub type PlayerId = Uuid;

/// Players per match.
pub const MAX_SEATS: usize = 2;

/// Lifecycle phase of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Joinable through the public code, fewer than two seats taken.
    Open,
    /// Both seats taken, waiting for both players to ready up.
    ReadyPending,
    /// Waiting for both picks.
    RoundActive,
    /// Both picks in, outcome computed and broadcast.
    RoundResolved,
    /// Terminal.
    Ended,
}

impl MatchPhase {
    /// Label used in logs and events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::ReadyPending => "ready_pending",
            Self::RoundActive => "round_active",
            Self::RoundResolved => "round_resolved",
            Self::Ended => "ended",
        }
    }
}

impl std::fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A player's slot in a match, including per-round state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub player_id: PlayerId,
    pub ready: bool,
    pub pick: Option<Sign>,
    /// Rounds won since the seat was taken.
    pub wins: u32,
    /// Most recent signs first; bounded by the cooldown length.
    pub recent: VecDeque<Sign>,
}

impl Seat {
    /// Empty seat for `player_id`.
    #[must_use]
    pub const fn new(player_id: PlayerId) -> Self {
        Self {
            player_id,
            ready: false,
            pick: None,
            wins: 0,
            recent: VecDeque::new(),
        }
    }

    /// Clears ready flag and pick for a new round.
    pub fn clear_round(&mut self) {
        self.ready = false;
        self.pick = None;
    }

    /// Whether `sign` is among the last `cooldown` signs this player used.
    #[must_use]
    pub fn on_cooldown(&self, sign: Sign, cooldown: usize) -> bool {
        self.recent.iter().take(cooldown).any(|s| *s == sign)
    }

    fn remember(&mut self, sign: Sign, cooldown: usize) {
        if cooldown == 0 {
            return;
        }
        self.recent.push_front(sign);
        self.recent.truncate(cooldown);
    }
}

/// One player's side of a resolved round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundPick {
    pub player_id: PlayerId,
    pub sign: Sign,
    pub outcome: Outcome,
    /// Score after this round.
    pub wins: u32,
}

/// A resolved round.
///
/// `picks` follows seat order and `outcome` is seat 0's view, so every
/// client derives its own result from the same payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResult {
    pub round: u32,
    pub picks: Vec<RoundPick>,
    pub outcome: Outcome,
}

impl RoundResult {
    /// Outcome for `player`, if they took part.
    #[must_use]
    pub fn outcome_for(&self, player: PlayerId) -> Option<Outcome> {
        self.picks
            .iter()
            .find(|p| p.player_id == player)
            .map(|p| p.outcome)
    }

    /// The winning player, `None` on a draw.
    #[must_use]
    pub fn winner(&self) -> Option<PlayerId> {
        self.picks
            .iter()
            .find(|p| p.outcome == Outcome::Win)
            .map(|p| p.player_id)
    }
}

/// Authoritative state of one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: MatchId,
    pub public_id: String,
    pub host_id: PlayerId,
    pub phase: MatchPhase,
    pub started: bool,
    pub ended: bool,
    /// Current round, 0 until the match starts.
    pub round: u32,
    /// Join order.
    pub seats: Vec<Seat>,
    pub last_result: Option<RoundResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MatchRecord {
    /// Fresh open match with the host in seat 0.
    #[must_use]
    pub fn new(id: MatchId, public_id: String, host_id: PlayerId) -> Self {
        let now = Utc::now();
        Self {
            id,
            public_id,
            host_id,
            phase: MatchPhase::Open,
            started: false,
            ended: false,
            round: 0,
            seats: vec![Seat::new(host_id)],
            last_result: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn seat_index(&self, player: PlayerId) -> Option<usize> {
        self.seats.iter().position(|s| s.player_id == player)
    }

    #[must_use]
    pub fn is_member(&self, player: PlayerId) -> bool {
        self.seat_index(player).is_some()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.seats.len() >= MAX_SEATS
    }

    /// Both seats taken and both ready.
    #[must_use]
    pub fn all_ready(&self) -> bool {
        self.is_full() && self.seats.iter().all(|s| s.ready)
    }

    /// Both seats taken and both picked.
    #[must_use]
    pub fn all_picked(&self) -> bool {
        self.is_full() && self.seats.iter().all(|s| s.pick.is_some())
    }

    /// Marks the record as modified now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Resolves the current round if both picks are in.
    ///
    /// Seat 0 is the reference side. Updates scores and cooldown history and
    /// moves the match to [`MatchPhase::RoundResolved`]. Returns `None` and
    /// leaves the record untouched when the round cannot resolve.
    pub fn resolve_round(&mut self, cooldown: usize) -> Option<RoundResult> {
        if self.phase != MatchPhase::RoundActive {
            return None;
        }
        let [first, second] = self.seats.as_slice() else {
            return None;
        };
        let (Some(a), Some(b)) = (first.pick, second.pick) else {
            return None;
        };

        let outcome = sign::resolve(a, b);
        match outcome {
            Outcome::Win => self.seats[0].wins += 1,
            Outcome::Lose => self.seats[1].wins += 1,
            Outcome::Draw => {}
        }

        let picks = self
            .seats
            .iter_mut()
            .zip([(a, outcome), (b, outcome.flip())])
            .map(|(seat, (sign, outcome))| {
                seat.remember(sign, cooldown);
                RoundPick {
                    player_id: seat.player_id,
                    sign,
                    outcome,
                    wins: seat.wins,
                }
            })
            .collect();

        let result = RoundResult {
            round: self.round,
            picks,
            outcome,
        };
        self.phase = MatchPhase::RoundResolved;
        self.last_result = Some(result.clone());
        Some(result)
    }

    /// Returns the match to the lobby with whoever is still seated.
    pub fn reset_to_lobby(&mut self) {
        self.started = false;
        self.round = 0;
        self.last_result = None;
        for seat in &mut self.seats {
            seat.clear_round();
            seat.wins = 0;
            seat.recent.clear();
        }
        self.phase = if self.is_full() {
            MatchPhase::ReadyPending
        } else {
            MatchPhase::Open
        };
    }

    /// Client-safe view: unresolved picks are reduced to `has_picked`.
    #[must_use]
    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            id: self.id,
            public_id: self.public_id.clone(),
            host_id: self.host_id,
            phase: self.phase,
            started: self.started,
            ended: self.ended,
            round: self.round,
            seats: self
                .seats
                .iter()
                .map(|s| SeatView {
                    player_id: s.player_id,
                    ready: s.ready,
                    has_picked: s.pick.is_some(),
                    wins: s.wins,
                })
                .collect(),
            last_result: self.last_result.clone(),
        }
    }
}

/// Public state of one seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatView {
    pub player_id: PlayerId,
    pub ready: bool,
    pub has_picked: bool,
    pub wins: u32,
}

/// Full-state refetch payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSnapshot {
    pub id: MatchId,
    pub public_id: String,
    pub host_id: PlayerId,
    pub phase: MatchPhase,
    pub started: bool,
    pub ended: bool,
    pub round: u32,
    pub seats: Vec<SeatView>,
    pub last_result: Option<RoundResult>,
}

/// Display metadata from the identity layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: Option<String>,
    pub image: Option<String>,
}

impl Player {
    /// Profile with no display metadata.
    #[must_use]
    pub const fn anonymous(id: PlayerId) -> Self {
        Self {
            id,
            name: None,
            image: None,
        }
    }
}

/// A seated player joined with their profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: Option<String>,
    pub image: Option<String>,
    pub is_host: bool,
    pub ready: bool,
    pub has_picked: bool,
    pub wins: u32,
}

/// Returned by match creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedMatch {
    pub match_id: MatchId,
    pub public_id: String,
}

/// Returned by a successful pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickReceipt {
    pub round: u32,
    /// Present when this pick completed the round.
    pub resolved: Option<RoundResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_pair() -> (MatchRecord, PlayerId, PlayerId) {
        let host = Uuid::new_v4();
        let guest = Uuid::new_v4();
        let mut record = MatchRecord::new(Uuid::new_v4(), "ABC123".into(), host);
        record.seats.push(Seat::new(guest));
        record.phase = MatchPhase::RoundActive;
        record.started = true;
        record.round = 1;
        (record, host, guest)
    }

    #[test]
    fn new_record_seats_host() {
        let host = Uuid::new_v4();
        let record = MatchRecord::new(Uuid::new_v4(), "ZZZ999".into(), host);
        assert_eq!(record.phase, MatchPhase::Open);
        assert_eq!(record.seats.len(), 1);
        assert!(record.is_member(host));
        assert!(!record.is_full());
        assert_eq!(record.round, 0);
    }

    #[test]
    fn resolve_needs_both_picks() {
        let (mut record, _, _) = active_pair();
        record.seats[0].pick = Some(Sign::Fire);
        assert!(record.resolve_round(3).is_none());
        assert_eq!(record.phase, MatchPhase::RoundActive);
    }

    #[test]
    fn resolve_scores_and_reports_both_sides() {
        let (mut record, host, guest) = active_pair();
        record.seats[0].pick = Some(Sign::Fire);
        record.seats[1].pick = Some(Sign::Paper);

        let result = record.resolve_round(3).unwrap();
        assert_eq!(result.outcome, Outcome::Win);
        assert_eq!(result.outcome_for(host), Some(Outcome::Win));
        assert_eq!(result.outcome_for(guest), Some(Outcome::Lose));
        assert_eq!(result.winner(), Some(host));
        assert_eq!(record.seats[0].wins, 1);
        assert_eq!(record.seats[1].wins, 0);
        assert_eq!(record.phase, MatchPhase::RoundResolved);
        assert_eq!(record.last_result.as_ref(), Some(&result));
    }

    #[test]
    fn resolve_only_once() {
        let (mut record, _, _) = active_pair();
        record.seats[0].pick = Some(Sign::Rock);
        record.seats[1].pick = Some(Sign::Rock);
        let result = record.resolve_round(3).unwrap();
        assert_eq!(result.winner(), None);
        assert!(record.resolve_round(3).is_none());
    }

    #[test]
    fn cooldown_history_is_bounded() {
        let mut seat = Seat::new(Uuid::new_v4());
        for sign in [Sign::Air, Sign::Water, Sign::Alien, Sign::Dragon] {
            seat.remember(sign, 3);
        }
        assert_eq!(seat.recent.len(), 3);
        assert!(!seat.on_cooldown(Sign::Air, 3));
        assert!(seat.on_cooldown(Sign::Dragon, 3));
        assert!(!seat.on_cooldown(Sign::Dragon, 0));
    }

    #[test]
    fn zero_cooldown_keeps_no_history() {
        let mut seat = Seat::new(Uuid::new_v4());
        seat.remember(Sign::Gun, 0);
        assert!(seat.recent.is_empty());
    }

    #[test]
    fn snapshot_hides_pending_picks() {
        let (mut record, _, _) = active_pair();
        record.seats[0].pick = Some(Sign::Wolf);
        let snap = record.snapshot();
        assert!(snap.seats[0].has_picked);
        assert!(!snap.seats[1].has_picked);
        let json = serde_json::to_string(&snap).unwrap();
        assert!(!json.contains("WOLF"));
    }

    #[test]
    fn reset_to_lobby_clears_scores() {
        let (mut record, _, guest) = active_pair();
        record.seats[0].wins = 2;
        record.seats[0].pick = Some(Sign::Tree);
        record.seats.retain(|s| s.player_id != guest);
        record.reset_to_lobby();
        assert_eq!(record.phase, MatchPhase::Open);
        assert!(!record.started);
        assert_eq!(record.round, 0);
        assert_eq!(record.seats[0].wins, 0);
        assert_eq!(record.seats[0].pick, None);
    }

    #[test]
    fn api_types_use_camel_case() {
        let created = CreatedMatch {
            match_id: Uuid::nil(),
            public_id: "AB12CD".into(),
        };
        let value = serde_json::to_value(&created).unwrap();
        assert!(value.get("matchId").is_some());
        assert_eq!(value["publicId"], "AB12CD");
    }
}
