//! Match lifecycle orchestration.
//!
//! The `MatchEngine` owns the state machine
//! (open → ready-pending → round-active → round-resolved → … → ended) and is
//! the only writer of match records. Every mutating operation runs under a
//! per-match async lock across load → guard → mutate → save → publish, so
//! two concurrent picks can never both see "one pick missing".

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::json;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::broadcast::{self, Broadcaster, event};
use crate::config::GameConfig;
use crate::error::{BroadcastError, GameError, StoreError};
use crate::observability::metrics;
use crate::observability::{Event, EventEmitter};
use crate::sign::Sign;
use crate::store::Store;

use super::code;
use super::state::{
    CreatedMatch, MatchId, MatchPhase, MatchRecord, MatchSnapshot, PickReceipt, Player, PlayerId,
    PlayerView, Seat,
};

/// Runs match operations against a [`Store`] and announces changes through a
/// [`Broadcaster`].
pub struct MatchEngine {
    store: Arc<dyn Store>,
    broadcaster: Arc<dyn Broadcaster>,
    events: Arc<EventEmitter>,
    config: GameConfig,
    /// One async lock per match with an action in flight; an entry is
    /// dropped as soon as nobody holds or waits on it.
    locks: DashMap<MatchId, Arc<Mutex<()>>>,
}

impl MatchEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        broadcaster: Arc<dyn Broadcaster>,
        events: Arc<EventEmitter>,
        config: GameConfig,
    ) -> Self {
        Self {
            store,
            broadcaster,
            events,
            config,
            locks: DashMap::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Number of matches with an action in flight or waiting.
    #[must_use]
    pub fn tracked_matches(&self) -> usize {
        self.locks.len()
    }

    /// Number of matches the store reports as not ended.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Store`] if the store fails.
    pub async fn active_match_count(&self) -> Result<usize, GameError> {
        Ok(self.store.active_match_count().await?)
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Opens a match with `host` in the first seat and a fresh public code.
    ///
    /// # Errors
    ///
    /// [`GameError::CodeSpaceExhausted`] when every sampled code collided
    /// with an active match, or [`GameError::Store`].
    pub async fn create_match(&self, host: PlayerId) -> Result<CreatedMatch, GameError> {
        metrics::record_action("create");
        self.create(host)
            .await
            .inspect_err(|e| rejected("create", None, e))
    }

    /// Resolves a public join code to the match it belongs to.
    ///
    /// # Errors
    ///
    /// [`GameError::InvalidPublicId`] for malformed input,
    /// [`GameError::PublicIdNotFound`] when no active match uses the code.
    pub async fn match_id_by_public_id(&self, public_id: &str) -> Result<MatchId, GameError> {
        metrics::record_action("lookup");
        self.lookup(public_id)
            .await
            .inspect_err(|e| rejected("lookup", None, e))
    }

    /// Seats `player` in the match. Re-joining is a no-op.
    ///
    /// # Errors
    ///
    /// [`GameError::MatchNotFound`], [`GameError::MatchEnded`], or
    /// [`GameError::MatchAlreadyStarted`] when the match is full or running.
    pub async fn join_match(&self, match_id: MatchId, player: PlayerId) -> Result<(), GameError> {
        metrics::record_action("join");
        let guard = self.acquire(match_id).await;
        let result = self.join(match_id, player).await;
        self.settle("join", match_id, guard, result)
    }

    /// Marks `player` ready; starts round 1 once both seats are ready.
    ///
    /// Returns the phase after the change.
    ///
    /// # Errors
    ///
    /// [`GameError::MatchNotFound`], [`GameError::MatchEnded`],
    /// [`GameError::NotParticipant`].
    pub async fn set_ready(
        &self,
        match_id: MatchId,
        player: PlayerId,
    ) -> Result<MatchPhase, GameError> {
        metrics::record_action("ready");
        let guard = self.acquire(match_id).await;
        let result = self.set_ready_flag(match_id, player, true).await;
        self.settle("ready", match_id, guard, result)
    }

    /// Clears `player`'s ready flag.
    ///
    /// # Errors
    ///
    /// Same as [`MatchEngine::set_ready`].
    pub async fn set_not_ready(
        &self,
        match_id: MatchId,
        player: PlayerId,
    ) -> Result<MatchPhase, GameError> {
        metrics::record_action("not_ready");
        let guard = self.acquire(match_id).await;
        let result = self.set_ready_flag(match_id, player, false).await;
        self.settle("not_ready", match_id, guard, result)
    }

    /// Records `player`'s sign for the current round, resolving the round
    /// when this is the second pick.
    ///
    /// # Errors
    ///
    /// [`GameError::RoundNotActive`], [`GameError::AlreadyPicked`] (the
    /// first pick stands), [`GameError::SignOnCooldown`], plus the
    /// membership errors of [`MatchEngine::set_ready`].
    pub async fn submit_pick(
        &self,
        match_id: MatchId,
        player: PlayerId,
        sign: Sign,
    ) -> Result<PickReceipt, GameError> {
        metrics::record_action("pick");
        let guard = self.acquire(match_id).await;
        let result = self.pick(match_id, player, sign).await;
        self.settle("pick", match_id, guard, result)
    }

    /// Starts the next round after a resolved one.
    ///
    /// Returns `false` without changing anything when the current round has
    /// not resolved yet, so both players may request it.
    ///
    /// # Errors
    ///
    /// [`GameError::MatchNotFound`], [`GameError::MatchEnded`],
    /// [`GameError::NotParticipant`].
    pub async fn next_round(&self, match_id: MatchId, player: PlayerId) -> Result<bool, GameError> {
        metrics::record_action("next_round");
        let guard = self.acquire(match_id).await;
        let result = self.advance(match_id, player).await;
        self.settle("next_round", match_id, guard, result)
    }

    /// Removes `player` from the match. The last player out ends it.
    ///
    /// # Errors
    ///
    /// [`GameError::MatchNotFound`], [`GameError::NotParticipant`].
    pub async fn leave_match(&self, match_id: MatchId, player: PlayerId) -> Result<(), GameError> {
        metrics::record_action("leave");
        let guard = self.acquire(match_id).await;
        let result = self.leave(match_id, player).await;
        self.settle("leave", match_id, guard, result)
    }

    /// Ends the match for everyone. Host only; repeated calls are no-ops.
    ///
    /// # Errors
    ///
    /// [`GameError::MatchNotFound`], [`GameError::NotHost`].
    pub async fn end_match(&self, match_id: MatchId, player: PlayerId) -> Result<(), GameError> {
        metrics::record_action("end");
        let guard = self.acquire(match_id).await;
        let result = self.end(match_id, player).await;
        self.settle("end", match_id, guard, result)
    }

    /// Seated players in seat order, joined with their profiles.
    ///
    /// # Errors
    ///
    /// [`GameError::MatchNotFound`] or [`GameError::Store`].
    pub async fn players_by_match_id(&self, match_id: MatchId) -> Result<Vec<PlayerView>, GameError> {
        let record = self.load(match_id).await?;
        let mut players = Vec::with_capacity(record.seats.len());
        for seat in &record.seats {
            let profile = self
                .store
                .get_player(seat.player_id)
                .await?
                .unwrap_or_else(|| Player::anonymous(seat.player_id));
            players.push(PlayerView {
                id: seat.player_id,
                name: profile.name,
                image: profile.image,
                is_host: seat.player_id == record.host_id,
                ready: seat.ready,
                has_picked: seat.pick.is_some(),
                wins: seat.wins,
            });
        }
        Ok(players)
    }

    /// Full client-safe state of a match.
    ///
    /// # Errors
    ///
    /// [`GameError::MatchNotFound`] or [`GameError::Store`].
    pub async fn get_match(&self, match_id: MatchId) -> Result<MatchSnapshot, GameError> {
        Ok(self.load(match_id).await?.snapshot())
    }

    /// Stores or refreshes a player's display profile.
    ///
    /// # Errors
    ///
    /// [`GameError::Store`].
    pub async fn register_player(&self, player: Player) -> Result<(), GameError> {
        Ok(self.store.upsert_player(player).await?)
    }

    // ========================================================================
    // Transitions (caller holds the match lock)
    // ========================================================================

    async fn create(&self, host: PlayerId) -> Result<CreatedMatch, GameError> {
        let match_id = Uuid::new_v4();
        for attempt in 1..=self.config.max_code_attempts {
            let public_id = code::generate(&mut rand::rng(), self.config.code_length);
            let record = MatchRecord::new(match_id, public_id.clone(), host);
            match self.store.insert_match(record).await {
                Ok(()) => {
                    metrics::record_match_created();
                    self.events.emit(Event::MatchCreated {
                        timestamp: Utc::now(),
                        match_id,
                        public_id: public_id.clone(),
                        host_id: host,
                    });
                    info!(%match_id, %public_id, %host, "match created");
                    return Ok(CreatedMatch {
                        match_id,
                        public_id,
                    });
                }
                Err(StoreError::DuplicatePublicId(taken)) => {
                    debug!(attempt, code = %taken, "public code in use, resampling");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(GameError::CodeSpaceExhausted(self.config.max_code_attempts))
    }

    async fn lookup(&self, public_id: &str) -> Result<MatchId, GameError> {
        let normalized = code::normalize(public_id, self.config.code_length)?;
        self.store
            .find_by_public_id(&normalized)
            .await?
            .ok_or(GameError::PublicIdNotFound(normalized))
    }

    async fn join(&self, match_id: MatchId, player: PlayerId) -> Result<(), GameError> {
        let mut record = self.load_live(match_id).await?;
        if record.is_member(player) {
            debug!(%match_id, %player, "already seated");
            return Ok(());
        }
        if record.started || record.is_full() {
            return Err(GameError::MatchAlreadyStarted(match_id));
        }

        record.seats.push(Seat::new(player));
        if record.is_full() {
            record.phase = MatchPhase::ReadyPending;
        }
        let seats = record.seats.len();
        self.save(&mut record).await?;

        self.events.emit(Event::PlayerJoined {
            timestamp: Utc::now(),
            match_id,
            player_id: player,
        });
        info!(%match_id, %player, seats, "player joined");
        self.publish(
            &broadcast::lobby_topic(match_id),
            event::PLAYER_JOINED,
            json!({ "playerId": player, "seats": seats }),
        );
        Ok(())
    }

    async fn set_ready_flag(
        &self,
        match_id: MatchId,
        player: PlayerId,
        ready: bool,
    ) -> Result<MatchPhase, GameError> {
        let mut record = self.load_live(match_id).await?;
        let idx = seat_of(&record, player)?;

        let changed = record.seats[idx].ready != ready;
        record.seats[idx].ready = ready;
        let starting = ready && record.phase == MatchPhase::ReadyPending && record.all_ready();
        if starting {
            record.started = true;
            record.round = 1;
            record.phase = MatchPhase::RoundActive;
        }
        if changed || starting {
            self.save(&mut record).await?;
        }

        let lobby = broadcast::lobby_topic(match_id);
        if changed {
            let name = if ready {
                event::PLAYER_READY
            } else {
                event::PLAYER_NOT_READY
            };
            self.publish(&lobby, name, json!({ "playerId": player }));
        }
        if starting {
            info!(%match_id, "both players ready, match starting");
            self.publish(
                &lobby,
                event::MATCH_STARTING,
                json!({
                    "round": record.round,
                    "countdownSecs": self.config.countdown.as_secs(),
                }),
            );
        }
        Ok(record.phase)
    }

    async fn pick(
        &self,
        match_id: MatchId,
        player: PlayerId,
        sign: Sign,
    ) -> Result<PickReceipt, GameError> {
        let mut record = self.load_live(match_id).await?;
        let idx = seat_of(&record, player)?;
        // A pick stands until the next round clears it, resolved or not.
        let in_round = matches!(
            record.phase,
            MatchPhase::RoundActive | MatchPhase::RoundResolved
        );
        if in_round && record.seats[idx].pick.is_some() {
            return Err(GameError::AlreadyPicked {
                player,
                round: record.round,
            });
        }
        if record.phase != MatchPhase::RoundActive {
            return Err(GameError::RoundNotActive(match_id));
        }

        let cooldown = self.config.sign_cooldown;
        let seat = &mut record.seats[idx];
        if seat.on_cooldown(sign, cooldown) {
            return Err(GameError::SignOnCooldown {
                sign: sign.name().to_string(),
                cooldown,
            });
        }
        seat.pick = Some(sign);
        seat.ready = true;

        let resolved = record.resolve_round(cooldown);
        let round = record.round;
        self.save(&mut record).await?;

        let topic = broadcast::round_topic(match_id);
        // Only the fact of picking is announced; signs are revealed on resolve.
        self.publish(
            &topic,
            event::PLAYER_PICKED,
            json!({ "playerId": player, "round": round }),
        );
        if let Some(result) = &resolved {
            metrics::record_round_resolved(result.outcome);
            self.events.emit(Event::RoundResolved {
                timestamp: Utc::now(),
                match_id,
                round,
                outcome: result.outcome,
                winner: result.winner(),
            });
            info!(%match_id, round, outcome = %result.outcome, "round resolved");
            self.publish_encoded(&topic, event::ROUND_RESOLVED, result);
        }

        Ok(PickReceipt { round, resolved })
    }

    async fn advance(&self, match_id: MatchId, player: PlayerId) -> Result<bool, GameError> {
        let mut record = self.load_live(match_id).await?;
        seat_of(&record, player)?;
        if record.phase != MatchPhase::RoundResolved {
            debug!(%match_id, phase = %record.phase, "next round ignored");
            return Ok(false);
        }

        for seat in &mut record.seats {
            seat.clear_round();
        }
        record.round += 1;
        record.phase = MatchPhase::RoundActive;
        let round = record.round;
        self.save(&mut record).await?;

        debug!(%match_id, round, "new round");
        self.publish(
            &broadcast::round_topic(match_id),
            event::NEW_ROUND,
            json!({ "round": round }),
        );
        Ok(true)
    }

    async fn leave(&self, match_id: MatchId, player: PlayerId) -> Result<(), GameError> {
        let mut record = self.load(match_id).await?;
        if record.ended {
            return Ok(());
        }
        let idx = seat_of(&record, player)?;

        record.seats.remove(idx);
        if let Some(first) = record.seats.first() {
            if record.host_id == player {
                record.host_id = first.player_id;
            }
            record.reset_to_lobby();
        } else {
            record.ended = true;
            record.phase = MatchPhase::Ended;
        }
        self.save(&mut record).await?;

        info!(%match_id, %player, remaining = record.seats.len(), "player left");
        self.publish(
            &broadcast::lobby_topic(match_id),
            event::PLAYER_LEFT,
            json!({ "playerId": player, "hostId": record.host_id }),
        );
        if record.ended {
            self.finish(&record, "abandoned");
        }
        Ok(())
    }

    async fn end(&self, match_id: MatchId, player: PlayerId) -> Result<(), GameError> {
        let mut record = self.load(match_id).await?;
        if record.ended {
            return Ok(());
        }
        if record.host_id != player {
            return Err(GameError::NotHost(match_id));
        }

        record.ended = true;
        record.phase = MatchPhase::Ended;
        self.save(&mut record).await?;
        self.finish(&record, "host_ended");
        Ok(())
    }

    /// Announces a stored terminal record.
    fn finish(&self, record: &MatchRecord, reason: &str) {
        let match_id = record.id;
        metrics::record_match_ended();
        self.events.emit(Event::MatchEnded {
            timestamp: Utc::now(),
            match_id,
            reason: reason.to_string(),
            rounds_played: record.round,
        });
        info!(%match_id, reason, "match ended");

        let payload = json!({ "matchId": match_id, "reason": reason });
        self.publish(
            &broadcast::lobby_topic(match_id),
            event::MATCH_ENDED,
            payload.clone(),
        );
        self.publish(
            &broadcast::round_topic(match_id),
            event::MATCH_ENDED,
            payload,
        );
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn acquire(&self, match_id: MatchId) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(&self.locks.entry(match_id).or_default());
        lock.lock_owned().await
    }

    /// Releases the match lock, reaps it when idle, and records rejections.
    fn settle<T>(
        &self,
        action: &'static str,
        match_id: MatchId,
        guard: OwnedMutexGuard<()>,
        result: Result<T, GameError>,
    ) -> Result<T, GameError> {
        drop(guard);
        // Waiters hold a clone of the Arc, so a count of one means the map
        // entry is the only reference. The shard lock keeps `acquire` out.
        self.locks
            .remove_if(&match_id, |_, lock| Arc::strong_count(lock) == 1);
        if let Err(e) = &result {
            rejected(action, Some(match_id), e);
        }
        result
    }

    async fn load(&self, match_id: MatchId) -> Result<MatchRecord, GameError> {
        self.store
            .get_match(match_id)
            .await?
            .ok_or(GameError::MatchNotFound(match_id))
    }

    async fn load_live(&self, match_id: MatchId) -> Result<MatchRecord, GameError> {
        let record = self.load(match_id).await?;
        if record.ended {
            return Err(GameError::MatchEnded(match_id));
        }
        Ok(record)
    }

    async fn save(&self, record: &mut MatchRecord) -> Result<(), GameError> {
        record.touch();
        self.store.update_match(record.clone()).await?;
        Ok(())
    }

    fn publish(&self, topic: &str, name: &str, payload: serde_json::Value) {
        report_delivery(topic, name, self.broadcaster.publish(topic, name, payload));
    }

    /// Like [`Self::publish`], with encoding failures counted as broadcast failures.
    fn publish_encoded<T: Serialize>(&self, topic: &str, name: &str, value: &T) {
        let sent = serde_json::to_value(value)
            .map_err(BroadcastError::from)
            .and_then(|payload| self.broadcaster.publish(topic, name, payload));
        report_delivery(topic, name, sent);
    }
}

fn report_delivery(topic: &str, name: &str, sent: Result<(), BroadcastError>) {
    if let Err(e) = sent {
        metrics::record_broadcast_failure();
        warn!(topic, event = name, error = %e, "broadcast failed");
    }
}

fn seat_of(record: &MatchRecord, player: PlayerId) -> Result<usize, GameError> {
    record
        .seat_index(player)
        .ok_or(GameError::NotParticipant {
            match_id: record.id,
            player,
        })
}

fn rejected(action: &str, match_id: Option<MatchId>, err: &GameError) {
    metrics::record_error(err.kind());
    debug!(action, match_id = ?match_id, kind = %err.kind(), error = %err, "action rejected");
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::broadcast::Message;
    use crate::error::BroadcastError;
    use crate::sign::Outcome;
    use crate::store::MemoryStore;

    #[derive(Default)]
    struct Recorder(StdMutex<Vec<Message>>);

    impl Recorder {
        fn events(&self) -> Vec<String> {
            self.0.lock().unwrap().iter().map(|m| m.event.clone()).collect()
        }

        fn last(&self, name: &str) -> Message {
            self.0
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|m| m.event == name)
                .cloned()
                .unwrap()
        }
    }

    impl Broadcaster for Recorder {
        fn publish(
            &self,
            topic: &str,
            event: &str,
            payload: serde_json::Value,
        ) -> Result<(), BroadcastError> {
            self.0.lock().unwrap().push(Message {
                topic: topic.to_string(),
                event: event.to_string(),
                payload,
            });
            Ok(())
        }
    }

    struct Refusing;

    impl Broadcaster for Refusing {
        fn publish(&self, topic: &str, _: &str, _: serde_json::Value) -> Result<(), BroadcastError> {
            Err(BroadcastError::Delivery {
                topic: topic.to_string(),
                message: "down".into(),
            })
        }
    }

    /// Store whose code index is always taken.
    #[derive(Default)]
    struct Crowded {
        inner: MemoryStore,
        inserts: AtomicUsize,
    }

    #[async_trait]
    impl Store for Crowded {
        async fn insert_match(&self, record: MatchRecord) -> Result<(), StoreError> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::DuplicatePublicId(record.public_id))
        }
        async fn get_match(&self, id: MatchId) -> Result<Option<MatchRecord>, StoreError> {
            self.inner.get_match(id).await
        }
        async fn update_match(&self, record: MatchRecord) -> Result<(), StoreError> {
            self.inner.update_match(record).await
        }
        async fn find_by_public_id(&self, code: &str) -> Result<Option<MatchId>, StoreError> {
            self.inner.find_by_public_id(code).await
        }
        async fn upsert_player(&self, player: Player) -> Result<(), StoreError> {
            self.inner.upsert_player(player).await
        }
        async fn get_player(&self, id: PlayerId) -> Result<Option<Player>, StoreError> {
            self.inner.get_player(id).await
        }
        async fn active_match_count(&self) -> Result<usize, StoreError> {
            self.inner.active_match_count().await
        }
    }

    fn engine_with(broadcaster: Arc<dyn Broadcaster>) -> MatchEngine {
        MatchEngine::new(
            Arc::new(MemoryStore::new()),
            broadcaster,
            Arc::new(EventEmitter::noop()),
            GameConfig::default(),
        )
    }

    fn engine() -> (MatchEngine, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        (engine_with(recorder.clone()), recorder)
    }

    /// Two seated, ready players in round 1.
    async fn started(engine: &MatchEngine) -> (MatchId, PlayerId, PlayerId) {
        let host = Uuid::new_v4();
        let guest = Uuid::new_v4();
        let created = engine.create_match(host).await.unwrap();
        engine.join_match(created.match_id, guest).await.unwrap();
        engine.set_ready(created.match_id, host).await.unwrap();
        let phase = engine.set_ready(created.match_id, guest).await.unwrap();
        assert_eq!(phase, MatchPhase::RoundActive);
        (created.match_id, host, guest)
    }

    #[tokio::test]
    async fn create_opens_match_with_host_seated() {
        let (engine, _) = engine();
        let host = Uuid::new_v4();
        let created = engine.create_match(host).await.unwrap();

        let snap = engine.get_match(created.match_id).await.unwrap();
        assert_eq!(snap.phase, MatchPhase::Open);
        assert_eq!(snap.host_id, host);
        assert_eq!(snap.seats.len(), 1);
        assert_eq!(snap.public_id.len(), engine.config().code_length);
        assert_eq!(
            engine
                .match_id_by_public_id(&created.public_id.to_lowercase())
                .await
                .unwrap(),
            created.match_id
        );
    }

    #[tokio::test]
    async fn create_gives_up_after_max_attempts() {
        let store = Arc::new(Crowded::default());
        let engine = MatchEngine::new(
            store.clone(),
            Arc::new(Recorder::default()),
            Arc::new(EventEmitter::noop()),
            GameConfig {
                max_code_attempts: 5,
                ..GameConfig::default()
            },
        );
        let err = engine.create_match(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, GameError::CodeSpaceExhausted(5)));
        assert_eq!(store.inserts.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn lookup_rejects_malformed_and_unknown_codes() {
        let (engine, _) = engine();
        assert!(matches!(
            engine.match_id_by_public_id("no!").await,
            Err(GameError::InvalidPublicId(_))
        ));
        assert!(matches!(
            engine.match_id_by_public_id("ZZZZZZ").await,
            Err(GameError::PublicIdNotFound(_))
        ));
    }

    #[tokio::test]
    async fn join_fills_second_seat_and_is_idempotent() {
        let (engine, recorder) = engine();
        let host = Uuid::new_v4();
        let guest = Uuid::new_v4();
        let id = engine.create_match(host).await.unwrap().match_id;

        engine.join_match(id, guest).await.unwrap();
        engine.join_match(id, guest).await.unwrap();
        engine.join_match(id, host).await.unwrap();

        let snap = engine.get_match(id).await.unwrap();
        assert_eq!(snap.seats.len(), 2);
        assert_eq!(snap.phase, MatchPhase::ReadyPending);
        assert_eq!(recorder.events(), [event::PLAYER_JOINED]);
    }

    #[tokio::test]
    async fn third_player_is_turned_away() {
        let (engine, _) = engine();
        let id = engine.create_match(Uuid::new_v4()).await.unwrap().match_id;
        engine.join_match(id, Uuid::new_v4()).await.unwrap();

        let err = engine.join_match(id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, GameError::MatchAlreadyStarted(_)));
        assert_eq!(engine.get_match(id).await.unwrap().seats.len(), 2);
    }

    #[tokio::test]
    async fn unknown_match_is_not_found_and_leaves_no_lock() {
        let (engine, _) = engine();
        let err = engine.join_match(Uuid::new_v4(), Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, GameError::MatchNotFound(_)));
        assert_eq!(engine.tracked_matches(), 0);
    }

    #[tokio::test]
    async fn ready_is_idempotent_and_starts_when_both_ready() {
        let (engine, recorder) = engine();
        let host = Uuid::new_v4();
        let guest = Uuid::new_v4();
        let id = engine.create_match(host).await.unwrap().match_id;
        engine.join_match(id, guest).await.unwrap();

        assert_eq!(engine.set_ready(id, host).await.unwrap(), MatchPhase::ReadyPending);
        assert_eq!(engine.set_ready(id, host).await.unwrap(), MatchPhase::ReadyPending);
        assert_eq!(engine.set_not_ready(id, host).await.unwrap(), MatchPhase::ReadyPending);
        engine.set_ready(id, host).await.unwrap();
        assert_eq!(engine.set_ready(id, guest).await.unwrap(), MatchPhase::RoundActive);

        let snap = engine.get_match(id).await.unwrap();
        assert!(snap.started);
        assert_eq!(snap.round, 1);
        let starting = recorder.last(event::MATCH_STARTING);
        assert_eq!(starting.payload["countdownSecs"], 3);
    }

    #[tokio::test]
    async fn outsider_cannot_ready() {
        let (engine, _) = engine();
        let id = engine.create_match(Uuid::new_v4()).await.unwrap().match_id;
        let err = engine.set_ready(id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, GameError::NotParticipant { .. }));
    }

    #[tokio::test]
    async fn pick_before_start_is_rejected() {
        let (engine, _) = engine();
        let host = Uuid::new_v4();
        let id = engine.create_match(host).await.unwrap().match_id;
        let err = engine.submit_pick(id, host, Sign::Fire).await.unwrap_err();
        assert!(matches!(err, GameError::RoundNotActive(_)));
    }

    #[tokio::test]
    async fn first_pick_hides_sign_and_second_resolves() {
        let (engine, recorder) = engine();
        let (id, host, guest) = started(&engine).await;

        let first = engine.submit_pick(id, host, Sign::Fire).await.unwrap();
        assert!(first.resolved.is_none());
        let picked = recorder.last(event::PLAYER_PICKED);
        assert_eq!(picked.payload, json!({ "playerId": host, "round": 1 }));

        let second = engine.submit_pick(id, guest, Sign::Paper).await.unwrap();
        let result = second.resolved.unwrap();
        assert_eq!(result.outcome, Outcome::Win);
        assert_eq!(result.winner(), Some(host));
        assert_eq!(result.outcome_for(guest), Some(Outcome::Lose));

        let snap = engine.get_match(id).await.unwrap();
        assert_eq!(snap.phase, MatchPhase::RoundResolved);
        assert_eq!(snap.seats[0].wins, 1);
        assert_eq!(snap.seats[1].wins, 0);
        assert_eq!(
            recorder.last(event::ROUND_RESOLVED).payload["picks"][1]["sign"],
            "PAPER"
        );
    }

    #[tokio::test]
    async fn second_pick_by_same_player_keeps_first() {
        let (engine, _) = engine();
        let (id, host, guest) = started(&engine).await;

        engine.submit_pick(id, host, Sign::Rock).await.unwrap();
        let err = engine.submit_pick(id, host, Sign::Air).await.unwrap_err();
        assert!(matches!(err, GameError::AlreadyPicked { round: 1, .. }));

        let result = engine
            .submit_pick(id, guest, Sign::Fire)
            .await
            .unwrap()
            .resolved
            .unwrap();
        assert_eq!(result.picks[0].sign, Sign::Rock);
        assert_eq!(result.outcome, Outcome::Win);
    }

    #[tokio::test]
    async fn repick_after_resolution_is_already_picked() {
        let (engine, _) = engine();
        let (id, host, guest) = started(&engine).await;
        engine.submit_pick(id, host, Sign::Fire).await.unwrap();
        engine.submit_pick(id, guest, Sign::Paper).await.unwrap();
        let before = engine.get_match(id).await.unwrap().last_result;

        let err = engine.submit_pick(id, host, Sign::Air).await.unwrap_err();
        assert!(matches!(err, GameError::AlreadyPicked { round: 1, .. }));
        assert_eq!(engine.get_match(id).await.unwrap().last_result, before);
    }

    #[tokio::test]
    async fn unchanged_ready_flag_is_not_announced() {
        let (engine, recorder) = engine();
        let host = Uuid::new_v4();
        let id = engine.create_match(host).await.unwrap().match_id;

        engine.set_ready(id, host).await.unwrap();
        engine.set_ready(id, host).await.unwrap();
        engine.set_not_ready(id, host).await.unwrap();
        engine.set_not_ready(id, host).await.unwrap();

        assert_eq!(
            recorder.events(),
            [event::PLAYER_READY, event::PLAYER_NOT_READY]
        );
    }

    #[tokio::test]
    async fn idle_locks_are_reaped_while_match_lives() {
        let (engine, _) = engine();
        let (id, host, guest) = started(&engine).await;
        engine.submit_pick(id, host, Sign::Fire).await.unwrap();
        engine.leave_match(id, guest).await.unwrap();

        let snap = engine.get_match(id).await.unwrap();
        assert!(!snap.ended);
        assert_eq!(engine.tracked_matches(), 0);
    }

    #[test]
    fn unencodable_payload_counts_as_broadcast_failure() {
        struct Unencodable;

        impl Serialize for Unencodable {
            fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("refused"))
            }
        }

        let (engine, recorder) = engine();
        engine.publish_encoded("match-x-round", event::ROUND_RESOLVED, &Unencodable);
        engine.publish("match-x-round", event::NEW_ROUND, json!({ "round": 2 }));
        assert_eq!(recorder.events(), [event::NEW_ROUND]);
    }

    #[tokio::test]
    async fn next_round_only_after_resolution() {
        let (engine, recorder) = engine();
        let (id, host, guest) = started(&engine).await;

        assert!(!engine.next_round(id, host).await.unwrap());
        engine.submit_pick(id, host, Sign::Water).await.unwrap();
        engine.submit_pick(id, guest, Sign::Water).await.unwrap();

        assert!(engine.next_round(id, guest).await.unwrap());
        assert!(!engine.next_round(id, host).await.unwrap());

        let snap = engine.get_match(id).await.unwrap();
        assert_eq!(snap.round, 2);
        assert_eq!(snap.phase, MatchPhase::RoundActive);
        assert!(snap.seats.iter().all(|s| !s.has_picked && !s.ready));
        assert_eq!(recorder.last(event::NEW_ROUND).payload["round"], 2);
    }

    #[tokio::test]
    async fn recent_signs_are_on_cooldown() {
        let (engine, _) = engine();
        let (id, host, guest) = started(&engine).await;

        engine.submit_pick(id, host, Sign::Gun).await.unwrap();
        engine.submit_pick(id, guest, Sign::Tree).await.unwrap();
        engine.next_round(id, host).await.unwrap();

        let err = engine.submit_pick(id, host, Sign::Gun).await.unwrap_err();
        assert!(matches!(err, GameError::SignOnCooldown { cooldown: 3, .. }));
        // The guest's cooldown is separate.
        engine.submit_pick(id, guest, Sign::Gun).await.unwrap();
    }

    #[tokio::test]
    async fn zero_cooldown_allows_repeats() {
        let engine = MatchEngine::new(
            Arc::new(MemoryStore::new()),
            Arc::new(Recorder::default()),
            Arc::new(EventEmitter::noop()),
            GameConfig {
                sign_cooldown: 0,
                countdown: Duration::ZERO,
                ..GameConfig::default()
            },
        );
        let (id, host, guest) = started(&engine).await;
        for _ in 0..3 {
            engine.submit_pick(id, host, Sign::Snake).await.unwrap();
            engine.submit_pick(id, guest, Sign::Human).await.unwrap();
            engine.next_round(id, host).await.unwrap();
        }
        assert_eq!(engine.get_match(id).await.unwrap().round, 4);
    }

    #[tokio::test]
    async fn leaving_returns_remaining_player_to_lobby() {
        let (engine, _) = engine();
        let (id, host, guest) = started(&engine).await;
        engine.submit_pick(id, host, Sign::Fire).await.unwrap();
        engine.submit_pick(id, guest, Sign::Paper).await.unwrap();

        engine.leave_match(id, host).await.unwrap();

        let snap = engine.get_match(id).await.unwrap();
        assert_eq!(snap.phase, MatchPhase::Open);
        assert_eq!(snap.host_id, guest);
        assert!(!snap.started);
        assert_eq!(snap.round, 0);
        assert_eq!(snap.seats[0].wins, 0);
        assert!(snap.last_result.is_none());

        // The freed seat can be taken again.
        engine.join_match(id, Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn last_player_out_ends_match_and_frees_code() {
        let (engine, recorder) = engine();
        let host = Uuid::new_v4();
        let created = engine.create_match(host).await.unwrap();

        engine.leave_match(created.match_id, host).await.unwrap();
        engine.leave_match(created.match_id, host).await.unwrap();

        let snap = engine.get_match(created.match_id).await.unwrap();
        assert!(snap.ended);
        assert_eq!(engine.tracked_matches(), 0);
        assert!(matches!(
            engine.match_id_by_public_id(&created.public_id).await,
            Err(GameError::PublicIdNotFound(_))
        ));
        assert_eq!(recorder.last(event::MATCH_ENDED).payload["reason"], "abandoned");
    }

    #[tokio::test]
    async fn only_host_ends_and_ended_match_rejects_actions() {
        let (engine, _) = engine();
        let (id, host, guest) = started(&engine).await;

        assert!(matches!(
            engine.end_match(id, guest).await,
            Err(GameError::NotHost(_))
        ));
        engine.end_match(id, host).await.unwrap();
        engine.end_match(id, host).await.unwrap();

        assert!(matches!(
            engine.submit_pick(id, guest, Sign::Air).await,
            Err(GameError::MatchEnded(_))
        ));
        assert!(matches!(
            engine.join_match(id, Uuid::new_v4()).await,
            Err(GameError::MatchEnded(_))
        ));
        assert!(engine.leave_match(id, guest).await.is_ok());
    }

    #[tokio::test]
    async fn players_join_profiles_in_seat_order() {
        let (engine, _) = engine();
        let host = Uuid::new_v4();
        let guest = Uuid::new_v4();
        engine
            .register_player(Player {
                id: host,
                name: Some("Ana".into()),
                image: None,
            })
            .await
            .unwrap();
        let id = engine.create_match(host).await.unwrap().match_id;
        engine.join_match(id, guest).await.unwrap();

        let players = engine.players_by_match_id(id).await.unwrap();
        assert_eq!(players.len(), 2);
        assert_eq!(players[0].name.as_deref(), Some("Ana"));
        assert!(players[0].is_host);
        assert_eq!(players[1].id, guest);
        assert!(players[1].name.is_none());
        assert!(!players[1].is_host);
    }

    #[tokio::test]
    async fn broadcast_failure_does_not_fail_actions() {
        let engine = engine_with(Arc::new(Refusing));
        let (id, host, guest) = started(&engine).await;
        engine.submit_pick(id, host, Sign::Fire).await.unwrap();
        let receipt = engine.submit_pick(id, guest, Sign::Paper).await.unwrap();
        assert!(receipt.resolved.is_some());
    }

    #[tokio::test]
    async fn rejected_actions_do_not_mutate() {
        let (engine, _) = engine();
        let (id, host, _) = started(&engine).await;
        let before = engine.get_match(id).await.unwrap();

        let _ = engine.submit_pick(id, Uuid::new_v4(), Sign::Air).await;
        let _ = engine.join_match(id, Uuid::new_v4()).await;
        let _ = engine.end_match(id, Uuid::new_v4()).await;
        let _ = engine.next_round(id, host).await;

        assert_eq!(engine.get_match(id).await.unwrap(), before);
    }
}
