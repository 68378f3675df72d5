//! In-process [`Store`] backed by `DashMap`.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::Store;
use crate::error::StoreError;
use crate::game::{MatchId, MatchRecord, Player, PlayerId};

/// Concurrent in-memory store.
///
/// The public code index is claimed through the `DashMap` entry API, so two
/// concurrent inserts with the same code cannot both succeed.
#[derive(Debug, Default)]
pub struct MemoryStore {
    matches: DashMap<MatchId, MatchRecord>,
    /// Active public code -> match id
    codes: DashMap<String, MatchId>,
    players: DashMap<PlayerId, Player>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_match(&self, record: MatchRecord) -> Result<(), StoreError> {
        match self.codes.entry(record.public_id.clone()) {
            Entry::Occupied(_) => return Err(StoreError::DuplicatePublicId(record.public_id)),
            Entry::Vacant(slot) => {
                slot.insert(record.id);
            }
        }
        self.matches.insert(record.id, record);
        Ok(())
    }

    async fn get_match(&self, id: MatchId) -> Result<Option<MatchRecord>, StoreError> {
        Ok(self.matches.get(&id).map(|r| r.value().clone()))
    }

    async fn update_match(&self, record: MatchRecord) -> Result<(), StoreError> {
        let id = record.id;
        if record.ended {
            self.codes.remove_if(&record.public_id, |_, owner| *owner == id);
        }
        let Some(mut slot) = self.matches.get_mut(&id) else {
            return Err(StoreError::Missing(id));
        };
        *slot = record;
        Ok(())
    }

    async fn find_by_public_id(&self, public_id: &str) -> Result<Option<MatchId>, StoreError> {
        Ok(self.codes.get(public_id).map(|id| *id.value()))
    }

    async fn upsert_player(&self, player: Player) -> Result<(), StoreError> {
        self.players
            .entry(player.id)
            .and_modify(|existing| {
                if player.name.is_some() {
                    existing.name.clone_from(&player.name);
                }
                if player.image.is_some() {
                    existing.image.clone_from(&player.image);
                }
            })
            .or_insert_with(|| player.clone());
        Ok(())
    }

    async fn get_player(&self, id: PlayerId) -> Result<Option<Player>, StoreError> {
        Ok(self.players.get(&id).map(|p| p.value().clone()))
    }

    async fn active_match_count(&self) -> Result<usize, StoreError> {
        Ok(self.matches.iter().filter(|r| !r.ended).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn record(code: &str) -> MatchRecord {
        MatchRecord::new(Uuid::new_v4(), code.to_string(), Uuid::new_v4())
    }

    #[tokio::test]
    async fn insert_and_lookup() {
        let store = MemoryStore::new();
        let rec = record("AAAAAA");
        let id = rec.id;
        store.insert_match(rec).await.unwrap();

        assert_eq!(store.find_by_public_id("AAAAAA").await.unwrap(), Some(id));
        assert_eq!(store.get_match(id).await.unwrap().unwrap().id, id);
        assert_eq!(store.active_match_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_code_is_rejected() {
        let store = MemoryStore::new();
        store.insert_match(record("AAAAAA")).await.unwrap();
        let err = store.insert_match(record("AAAAAA")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicatePublicId(code) if code == "AAAAAA"));
        assert_eq!(store.active_match_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn ending_a_match_releases_its_code() {
        let store = MemoryStore::new();
        let mut rec = record("BBBBBB");
        store.insert_match(rec.clone()).await.unwrap();

        rec.ended = true;
        store.update_match(rec).await.unwrap();

        assert_eq!(store.find_by_public_id("BBBBBB").await.unwrap(), None);
        assert_eq!(store.active_match_count().await.unwrap(), 0);
        store.insert_match(record("BBBBBB")).await.unwrap();
    }

    #[tokio::test]
    async fn update_missing_match_fails() {
        let store = MemoryStore::new();
        let err = store.update_match(record("CCCCCC")).await.unwrap_err();
        assert!(matches!(err, StoreError::Missing(_)));
    }

    #[tokio::test]
    async fn upsert_keeps_known_fields() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        store
            .upsert_player(Player {
                id,
                name: Some("Ada".into()),
                image: Some("https://img/ada.png".into()),
            })
            .await
            .unwrap();
        store.upsert_player(Player::anonymous(id)).await.unwrap();
        store
            .upsert_player(Player {
                id,
                name: Some("Ada L.".into()),
                image: None,
            })
            .await
            .unwrap();

        let stored = store.get_player(id).await.unwrap().unwrap();
        assert_eq!(stored.name.as_deref(), Some("Ada L."));
        assert_eq!(stored.image.as_deref(), Some("https://img/ada.png"));
    }
}
