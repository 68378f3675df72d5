//! Persistence seam for matches and player profiles.
//!
//! The match engine depends on [`Store`] only. [`MemoryStore`] is the
//! implementation shipped with the server and used as the test fake.

pub mod memory;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::game::{MatchId, MatchRecord, Player, PlayerId};

pub use memory::MemoryStore;

/// Atomic create/read/update over match records.
///
/// Implementations must guarantee that no two non-ended matches share a
/// public code: [`insert_match`](Store::insert_match) fails with
/// [`StoreError::DuplicatePublicId`] instead of overwriting, and
/// [`update_match`](Store::update_match) releases the code once a record is
/// stored as ended.
#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts a new match, claiming its public code.
    async fn insert_match(&self, record: MatchRecord) -> Result<(), StoreError>;

    /// Loads a match by id.
    async fn get_match(&self, id: MatchId) -> Result<Option<MatchRecord>, StoreError>;

    /// Replaces an existing match record.
    async fn update_match(&self, record: MatchRecord) -> Result<(), StoreError>;

    /// Resolves an active public code to its match id.
    async fn find_by_public_id(&self, public_id: &str) -> Result<Option<MatchId>, StoreError>;

    /// Creates or refreshes a player profile. `None` fields keep their
    /// stored value.
    async fn upsert_player(&self, player: Player) -> Result<(), StoreError>;

    /// Loads a player profile.
    async fn get_player(&self, id: PlayerId) -> Result<Option<Player>, StoreError>;

    /// Number of matches that have not ended.
    async fn active_match_count(&self) -> Result<usize, StoreError>;
}
