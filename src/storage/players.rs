//! Player storage interface and in-memory implementation

use crate::error::{MatchdayError, Result};
use crate::storage::lock_error;
use crate::types::{PlayerId, PlayerRecord, RatingChange, RatingHistoryEntry};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

/// Trait for player persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlayerStore: Send + Sync {
    /// Register a player; an existing id is a conflict
    async fn insert(&self, player: PlayerRecord) -> Result<()>;

    async fn get(&self, player_id: &str) -> Result<Option<PlayerRecord>>;

    /// Load several players; unknown ids are left out of the map
    async fn get_many(&self, player_ids: &[PlayerId]) -> Result<HashMap<PlayerId, PlayerRecord>>;

    /// Write every `after` rating and append a history entry, all or nothing.
    ///
    /// Idempotent per match: a player whose history already holds `match_id`
    /// is left untouched. Fails with `NotFound` before writing anything if a
    /// player is unknown. Returns how many players were updated.
    async fn apply_ratings(&self, match_id: &str, changes: &[RatingChange]) -> Result<usize>;

    /// Bump `games_played` of the given players; unknown ids are skipped
    async fn increment_games_played(&self, player_ids: &[PlayerId]) -> Result<()>;

    async fn list(&self) -> Result<Vec<PlayerRecord>>;
}

/// In-memory player storage
#[derive(Debug, Default)]
pub struct InMemoryPlayerStore {
    players: RwLock<HashMap<PlayerId, PlayerRecord>>,
}

impl InMemoryPlayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `players`
    pub fn with_players(players: impl IntoIterator<Item = PlayerRecord>) -> Self {
        Self {
            players: RwLock::new(players.into_iter().map(|p| (p.id.clone(), p)).collect()),
        }
    }
}

#[async_trait]
impl PlayerStore for InMemoryPlayerStore {
    async fn insert(&self, player: PlayerRecord) -> Result<()> {
        let mut players = self
            .players
            .write()
            .map_err(|_| lock_error("players write"))?;

        if players.contains_key(&player.id) {
            return Err(MatchdayError::conflict(format!(
                "player {} already exists",
                player.id
            )));
        }

        players.insert(player.id.clone(), player);
        Ok(())
    }

    async fn get(&self, player_id: &str) -> Result<Option<PlayerRecord>> {
        let players = self
            .players
            .read()
            .map_err(|_| lock_error("players read"))?;
        Ok(players.get(player_id).cloned())
    }

    async fn get_many(&self, player_ids: &[PlayerId]) -> Result<HashMap<PlayerId, PlayerRecord>> {
        let players = self
            .players
            .read()
            .map_err(|_| lock_error("players read"))?;

        Ok(player_ids
            .iter()
            .filter_map(|id| players.get(id).map(|p| (id.clone(), p.clone())))
            .collect())
    }

    async fn apply_ratings(&self, match_id: &str, changes: &[RatingChange]) -> Result<usize> {
        let mut players = self
            .players
            .write()
            .map_err(|_| lock_error("players write"))?;

        if let Some(missing) = changes.iter().find(|c| !players.contains_key(&c.player_id)) {
            return Err(MatchdayError::not_found("Player", missing.player_id.clone()));
        }

        let now = Utc::now();
        let mut updated = 0;
        for change in changes {
            if let Some(player) = players.get_mut(&change.player_id) {
                if player.rating_history.iter().any(|h| h.match_id == match_id) {
                    continue;
                }
                updated += 1;
                player.rating = change.after;
                player.rating_history.push(RatingHistoryEntry {
                    match_id: match_id.to_string(),
                    old: change.before,
                    new: change.after,
                    recorded_at: now,
                });
                player.updated_at = now;
            }
        }

        Ok(updated)
    }

    async fn increment_games_played(&self, player_ids: &[PlayerId]) -> Result<()> {
        let mut players = self
            .players
            .write()
            .map_err(|_| lock_error("players write"))?;

        let now = Utc::now();
        for id in player_ids {
            if let Some(player) = players.get_mut(id) {
                player.games_played += 1;
                player.updated_at = now;
            }
        }

        Ok(())
    }

    async fn list(&self) -> Result<Vec<PlayerRecord>> {
        let players = self
            .players
            .read()
            .map_err(|_| lock_error("players read"))?;

        let mut all: Vec<PlayerRecord> = players.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }
}
