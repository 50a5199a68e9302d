//! Vote storage interface and in-memory implementation

use crate::error::Result;
use crate::storage::lock_error;
use crate::types::{Vote, VoteKey};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Whether an upsert created a record or replaced one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Created,
    Updated,
}

impl UpsertOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            UpsertOutcome::Created => "created",
            UpsertOutcome::Updated => "updated",
        }
    }
}

/// Trait for vote persistence
#[async_trait]
pub trait VoteStore: Send + Sync {
    /// Insert or replace the vote with the same (match, player, voter) key.
    ///
    /// A replacement keeps the original `created_at`.
    async fn upsert(&self, vote: Vote) -> Result<UpsertOutcome>;

    async fn list_for_match(&self, match_id: &str) -> Result<Vec<Vote>>;

    /// Votes cast by a voter, optionally limited to one match
    async fn list_for_voter(&self, voter_id: &str, match_id: Option<&str>) -> Result<Vec<Vote>>;
}

/// In-memory vote storage ordered by key
#[derive(Debug, Default)]
pub struct InMemoryVoteStore {
    votes: RwLock<BTreeMap<VoteKey, Vote>>,
}

impl InMemoryVoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.votes.read().map_err(|_| lock_error("votes read"))?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl VoteStore for InMemoryVoteStore {
    async fn upsert(&self, mut vote: Vote) -> Result<UpsertOutcome> {
        let mut votes = self.votes.write().map_err(|_| lock_error("votes write"))?;

        let key = vote.key();
        let outcome = match votes.get(&key) {
            Some(existing) => {
                vote.created_at = existing.created_at;
                UpsertOutcome::Updated
            }
            None => UpsertOutcome::Created,
        };

        votes.insert(key, vote);
        Ok(outcome)
    }

    async fn list_for_match(&self, match_id: &str) -> Result<Vec<Vote>> {
        let votes = self.votes.read().map_err(|_| lock_error("votes read"))?;
        Ok(votes
            .values()
            .filter(|v| v.match_id == match_id)
            .cloned()
            .collect())
    }

    async fn list_for_voter(&self, voter_id: &str, match_id: Option<&str>) -> Result<Vec<Vote>> {
        let votes = self.votes.read().map_err(|_| lock_error("votes read"))?;
        Ok(votes
            .values()
            .filter(|v| v.voter_id == voter_id)
            .filter(|v| match_id.map_or(true, |m| v.match_id == m))
            .cloned()
            .collect())
    }
}
