//! Match storage interface and in-memory implementation
//!
//! Besides plain load/save, the store owns the settlement commit point:
//! [`MatchStore::try_commit_settlement`] is a compare-and-set on the
//! `rating_applied` flag and the match revision, so two concurrent settlements
//! of the same match can never both succeed and a settlement computed from a
//! stale match is refused.

use crate::error::{MatchdayError, Result};
use crate::storage::lock_error;
use crate::types::{
    MatchId, MatchRecord, MatchResult, MatchStatus, PlayerId, RatingChange, TeamAssignment,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// Trait for match persistence
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Store a new match; an existing id is a conflict
    async fn insert(&self, record: MatchRecord) -> Result<()>;

    /// Load a match by id
    async fn get(&self, match_id: &str) -> Result<Option<MatchRecord>>;

    /// Matches of a group, oldest first
    async fn list_by_group(&self, group_id: &str) -> Result<Vec<MatchRecord>>;

    /// Add a participant (set semantics). Rejected once the match is finalized.
    async fn add_participant(&self, match_id: &str, player_id: &PlayerId) -> Result<MatchRecord>;

    /// Overwrite the team split. Rejected once the match is finalized.
    async fn save_teams(&self, match_id: &str, teams: TeamAssignment) -> Result<MatchRecord>;

    /// Store final scores and move to `Finalized`.
    ///
    /// Returns `true` when this is the first time the match is finalized.
    async fn record_result(&self, match_id: &str, result: MatchResult) -> Result<bool>;

    /// Admit a vote write: count it in flight and bump the revision.
    ///
    /// Fails with `Conflict` once ratings are applied. Every admitted vote
    /// must be followed by [`MatchStore::finish_vote`], whatever the write did.
    async fn begin_vote(&self, match_id: &str) -> Result<()>;

    /// End an admitted vote write and bump the revision
    async fn finish_vote(&self, match_id: &str) -> Result<()>;

    /// Atomically set `rating_applied` if it is unset, the match is finalized,
    /// no vote is in flight and its revision is still `expected_revision`,
    /// storing the changes in the same step. Nothing is written unless the outcome is `Committed`.
    async fn try_commit_settlement(
        &self,
        match_id: &str,
        expected_revision: u64,
        changes: Vec<RatingChange>,
    ) -> Result<SettlementCommit>;

    /// Mark the committed changes as written to the player store
    async fn mark_ratings_persisted(&self, match_id: &str) -> Result<()>;
}

/// Outcome of a settlement compare-and-set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementCommit {
    Committed,
    AlreadyApplied,
    NotFinalized,
    /// The match changed after the changes were computed
    Stale,
}

impl SettlementCommit {
    pub fn as_str(self) -> &'static str {
        match self {
            SettlementCommit::Committed => "committed",
            SettlementCommit::AlreadyApplied => "already_applied",
            SettlementCommit::NotFinalized => "not_finalized",
            SettlementCommit::Stale => "stale",
        }
    }
}

/// In-memory match storage
#[derive(Debug, Default)]
pub struct InMemoryMatchStore {
    matches: RwLock<HashMap<MatchId, MatchRecord>>,
}

impl InMemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self
            .matches
            .read()
            .map_err(|_| lock_error("matches read"))?
            .len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Run `update` on a stored match under the write lock
    fn modify<T>(
        &self,
        match_id: &str,
        update: impl FnOnce(&mut MatchRecord) -> Result<T>,
    ) -> Result<T> {
        let mut matches = self
            .matches
            .write()
            .map_err(|_| lock_error("matches write"))?;

        let record = matches
            .get_mut(match_id)
            .ok_or_else(|| MatchdayError::not_found("Match", match_id))?;

        let value = update(record)?;
        record.revision += 1;
        record.updated_at = Utc::now();
        Ok(value)
    }
}

fn ensure_open(record: &MatchRecord) -> Result<()> {
    if record.is_finalized() {
        return Err(MatchdayError::conflict(format!(
            "match {} is already {}",
            record.id, record.status
        )));
    }
    Ok(())
}

#[async_trait]
impl MatchStore for InMemoryMatchStore {
    async fn insert(&self, record: MatchRecord) -> Result<()> {
        let mut matches = self
            .matches
            .write()
            .map_err(|_| lock_error("matches write"))?;

        if matches.contains_key(&record.id) {
            return Err(MatchdayError::conflict(format!(
                "match {} already exists",
                record.id
            )));
        }

        matches.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get(&self, match_id: &str) -> Result<Option<MatchRecord>> {
        let matches = self
            .matches
            .read()
            .map_err(|_| lock_error("matches read"))?;
        Ok(matches.get(match_id).cloned())
    }

    async fn list_by_group(&self, group_id: &str) -> Result<Vec<MatchRecord>> {
        let matches = self
            .matches
            .read()
            .map_err(|_| lock_error("matches read"))?;

        let mut found: Vec<MatchRecord> = matches
            .values()
            .filter(|m| m.group_id == group_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn add_participant(&self, match_id: &str, player_id: &PlayerId) -> Result<MatchRecord> {
        self.modify(match_id, |record| {
            ensure_open(record)?;
            if !record.participants.contains(player_id) {
                record.participants.push(player_id.clone());
            }
            Ok(record.clone())
        })
    }

    async fn save_teams(&self, match_id: &str, teams: TeamAssignment) -> Result<MatchRecord> {
        self.modify(match_id, |record| {
            ensure_open(record)?;
            record.teams = Some(teams);
            record.status = MatchStatus::TeamsAssigned;
            Ok(record.clone())
        })
    }

    async fn record_result(&self, match_id: &str, result: MatchResult) -> Result<bool> {
        self.modify(match_id, |record| {
            if record.rating_applied {
                return Err(MatchdayError::conflict(format!(
                    "match {} has already been settled",
                    record.id
                )));
            }
            let teams = record.teams.as_mut().ok_or_else(|| {
                MatchdayError::conflict(format!("match {} has no teams assigned", match_id))
            })?;

            teams.team_a.score = result.score_a;
            teams.team_b.score = result.score_b;

            let first = record.result.is_none();
            record.result = Some(result);
            record.status = MatchStatus::Finalized;
            Ok(first)
        })
    }

    async fn begin_vote(&self, match_id: &str) -> Result<()> {
        self.modify(match_id, |record| {
            if record.rating_applied {
                return Err(MatchdayError::conflict(format!(
                    "ratings for match {} are already applied, votes are closed",
                    record.id
                )));
            }
            record.votes_in_flight += 1;
            Ok(())
        })
    }

    async fn finish_vote(&self, match_id: &str) -> Result<()> {
        self.modify(match_id, |record| {
            record.votes_in_flight = record.votes_in_flight.saturating_sub(1);
            Ok(())
        })
    }

    async fn try_commit_settlement(
        &self,
        match_id: &str,
        expected_revision: u64,
        changes: Vec<RatingChange>,
    ) -> Result<SettlementCommit> {
        let mut matches = self
            .matches
            .write()
            .map_err(|_| lock_error("matches write"))?;

        let record = matches
            .get_mut(match_id)
            .ok_or_else(|| MatchdayError::not_found("Match", match_id))?;

        let outcome = if record.rating_applied {
            SettlementCommit::AlreadyApplied
        } else if record.status != MatchStatus::Finalized {
            SettlementCommit::NotFinalized
        } else if record.votes_in_flight > 0 || record.revision != expected_revision {
            SettlementCommit::Stale
        } else {
            record.rating_applied = true;
            record.rating_changes = changes;
            record.status = MatchStatus::RatingsApplied;
            record.revision += 1;
            record.updated_at = Utc::now();
            SettlementCommit::Committed
        };

        if outcome != SettlementCommit::Committed {
            debug!(
                "Settlement commit refused for match {}: {}",
                match_id,
                outcome.as_str()
            );
        }
        Ok(outcome)
    }

    async fn mark_ratings_persisted(&self, match_id: &str) -> Result<()> {
        self.modify(match_id, |record| {
            if !record.rating_applied {
                return Err(MatchdayError::conflict(format!(
                    "match {} has no committed settlement",
                    record.id
                )));
            }
            record.ratings_persisted = true;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AssignmentSource;

    fn record(id: &str) -> MatchRecord {
        MatchRecord::new(id, "g1", vec!["p1".to_string(), "p2".to_string()])
    }

    fn teams() -> TeamAssignment {
        TeamAssignment::new(
            vec!["p1".to_string()],
            vec!["p2".to_string()],
            1,
            AssignmentSource::Shuffled,
        )
    }

    fn change(player: &str) -> RatingChange {
        RatingChange {
            player_id: player.to_string(),
            side: crate::types::TeamSide::A,
            before: 1000,
            after: 1010,
            delta: 10,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryMatchStore::new();
        store.insert(record("m1")).await.unwrap();

        let loaded = store.get("m1").await.unwrap().unwrap();
        assert_eq!(loaded.status, MatchStatus::Pending);
        assert!(store.get("missing").await.unwrap().is_none());

        let err = store.insert(record("m1")).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let store = InMemoryMatchStore::new();
        store.insert(record("m1")).await.unwrap();

        let updated = store.add_participant("m1", &"p3".to_string()).await.unwrap();
        assert_eq!(updated.participants.len(), 3);
        let updated = store.add_participant("m1", &"p3".to_string()).await.unwrap();
        assert_eq!(updated.participants.len(), 3);

        let err = store
            .record_result("m1", MatchResult::new(1, 0))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let saved = store.save_teams("m1", teams()).await.unwrap();
        assert_eq!(saved.status, MatchStatus::TeamsAssigned);

        assert!(store.record_result("m1", MatchResult::new(3, 1)).await.unwrap());
        assert!(!store.record_result("m1", MatchResult::new(2, 2)).await.unwrap());

        let finalized = store.get("m1").await.unwrap().unwrap();
        assert_eq!(finalized.status, MatchStatus::Finalized);
        let teams = finalized.teams.unwrap();
        assert_eq!((teams.team_a.score, teams.team_b.score), (2, 2));

        assert!(store
            .save_teams("m1", self::teams())
            .await
            .unwrap_err()
            .is_conflict());
        assert!(store
            .add_participant("m1", &"p9".to_string())
            .await
            .unwrap_err()
            .is_conflict());
    }

    #[tokio::test]
    async fn test_commit_settlement_is_compare_and_set() {
        let store = InMemoryMatchStore::new();
        store.insert(record("m1")).await.unwrap();

        let pending = store.get("m1").await.unwrap().unwrap();
        assert_eq!(
            store
                .try_commit_settlement("m1", pending.revision, vec![])
                .await
                .unwrap(),
            SettlementCommit::NotFinalized
        );

        store.save_teams("m1", teams()).await.unwrap();
        store.record_result("m1", MatchResult::new(1, 0)).await.unwrap();
        let revision = store.get("m1").await.unwrap().unwrap().revision;

        assert_eq!(
            store
                .try_commit_settlement("m1", revision, vec![change("p1")])
                .await
                .unwrap(),
            SettlementCommit::Committed
        );
        assert_eq!(
            store
                .try_commit_settlement("m1", revision, vec![change("p2")])
                .await
                .unwrap(),
            SettlementCommit::AlreadyApplied
        );

        let settled = store.get("m1").await.unwrap().unwrap();
        assert!(settled.rating_applied);
        assert!(settled.settlement_pending());
        assert_eq!(settled.status, MatchStatus::RatingsApplied);
        assert_eq!(settled.rating_changes, vec![change("p1")]);

        let err = store
            .record_result("m1", MatchResult::new(0, 1))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        store.mark_ratings_persisted("m1").await.unwrap();
        let persisted = store.get("m1").await.unwrap().unwrap();
        assert!(persisted.rating_applied);
        assert!(!persisted.settlement_pending());
        assert_eq!(persisted.rating_changes, vec![change("p1")]);
    }

    #[tokio::test]
    async fn test_commit_refused_after_match_changed() {
        let store = InMemoryMatchStore::new();
        store.insert(record("m1")).await.unwrap();
        store.save_teams("m1", teams()).await.unwrap();
        store.record_result("m1", MatchResult::new(3, 1)).await.unwrap();
        let seen = store.get("m1").await.unwrap().unwrap().revision;

        store.record_result("m1", MatchResult::new(0, 5)).await.unwrap();
        assert_eq!(
            store
                .try_commit_settlement("m1", seen, vec![change("p1")])
                .await
                .unwrap(),
            SettlementCommit::Stale
        );

        let latest = store.get("m1").await.unwrap().unwrap();
        assert_eq!(latest.revision, seen + 1);
        assert!(!latest.rating_applied);
        assert!(latest.rating_changes.is_empty());
    }

    #[tokio::test]
    async fn test_commit_waits_for_votes_in_flight() {
        let store = InMemoryMatchStore::new();
        store.insert(record("m1")).await.unwrap();
        store.save_teams("m1", teams()).await.unwrap();
        store.record_result("m1", MatchResult::new(1, 0)).await.unwrap();

        store.begin_vote("m1").await.unwrap();
        let during = store.get("m1").await.unwrap().unwrap();
        assert_eq!(during.votes_in_flight, 1);
        assert_eq!(
            store
                .try_commit_settlement("m1", during.revision, vec![change("p1")])
                .await
                .unwrap(),
            SettlementCommit::Stale
        );

        store.finish_vote("m1").await.unwrap();
        let after = store.get("m1").await.unwrap().unwrap();
        assert_eq!(after.votes_in_flight, 0);
        assert_eq!(after.revision, during.revision + 1);
        assert_eq!(
            store
                .try_commit_settlement("m1", after.revision, vec![change("p1")])
                .await
                .unwrap(),
            SettlementCommit::Committed
        );
    }

    #[tokio::test]
    async fn test_vote_admission_closed_after_settlement() {
        let store = InMemoryMatchStore::new();
        store.insert(record("m1")).await.unwrap();
        store.begin_vote("m1").await.unwrap();
        store.finish_vote("m1").await.unwrap();
        assert!(store
            .mark_ratings_persisted("m1")
            .await
            .unwrap_err()
            .is_conflict());

        store.save_teams("m1", teams()).await.unwrap();
        store.record_result("m1", MatchResult::new(1, 0)).await.unwrap();
        let revision = store.get("m1").await.unwrap().unwrap().revision;
        store
            .try_commit_settlement("m1", revision, vec![change("p1")])
            .await
            .unwrap();

        assert!(store.begin_vote("m1").await.unwrap_err().is_conflict());
        assert_eq!(store.get("m1").await.unwrap().unwrap().votes_in_flight, 0);
    }

    #[tokio::test]
    async fn test_list_by_group() {
        let store = InMemoryMatchStore::new();
        store.insert(record("m1")).await.unwrap();
        store.insert(record("m2")).await.unwrap();
        store
            .insert(MatchRecord::new("m3", "other", vec![]))
            .await
            .unwrap();

        let listed = store.list_by_group("g1").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(store.len().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_unknown_match_not_found() {
        let store = InMemoryMatchStore::new();
        let err = store.save_teams("nope", teams()).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
