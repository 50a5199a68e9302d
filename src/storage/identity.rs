//! Resolution of the voter expected to vote for a player

use crate::error::Result;
use crate::storage::players::PlayerStore;
use crate::types::{PlayerId, VoterId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps a player to the identity linked to it, if any
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn voter_for(&self, player_id: &str) -> Result<Option<VoterId>>;
}

/// Resolves through the `owner` of the player record
pub struct PlayerOwnerResolver {
    players: Arc<dyn PlayerStore>,
}

impl PlayerOwnerResolver {
    pub fn new(players: Arc<dyn PlayerStore>) -> Self {
        Self { players }
    }
}

#[async_trait]
impl IdentityResolver for PlayerOwnerResolver {
    async fn voter_for(&self, player_id: &str) -> Result<Option<VoterId>> {
        Ok(self
            .players
            .get(player_id)
            .await?
            .and_then(|player| player.owner))
    }
}

/// Fixed player-to-voter table
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityResolver {
    links: HashMap<PlayerId, VoterId>,
}

impl StaticIdentityResolver {
    pub fn new(links: impl IntoIterator<Item = (PlayerId, VoterId)>) -> Self {
        Self {
            links: links.into_iter().collect(),
        }
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn voter_for(&self, player_id: &str) -> Result<Option<VoterId>> {
        Ok(self.links.get(player_id).cloned())
    }
}
