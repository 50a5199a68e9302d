//! Vote readiness of a match
//!
//! Every eligible player may be linked to the identity expected to vote. The
//! snapshot reports, per player, what was received and, per expected voter,
//! which eligible players are still missing a vote.

use crate::error::{MatchdayError, Result};
use crate::storage::{IdentityResolver, MatchStore, VoteStore};
use crate::types::{MatchId, MatchRecord, PlayerId, Vote, VoteValue, VoterId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// Votes received by one eligible player
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerVoteStats {
    pub player_id: PlayerId,
    pub up: u32,
    pub neutral: u32,
    pub down: u32,
    pub distinct_voters: u32,
}

impl PlayerVoteStats {
    pub fn total(&self) -> u32 {
        self.up + self.neutral + self.down
    }
}

/// Which eligible players an expected voter has covered
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterProgress {
    pub voter_id: VoterId,
    pub voted: BTreeSet<PlayerId>,
    pub remaining: BTreeSet<PlayerId>,
}

impl VoterProgress {
    pub fn is_complete(&self) -> bool {
        self.remaining.is_empty()
    }
}

/// Derived readiness view of a match; never persisted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteProgressSnapshot {
    pub match_id: MatchId,
    pub players: Vec<PlayerVoteStats>,
    pub voters: Vec<VoterProgress>,
    /// Every eligible player received at least one vote
    pub all_players_have_at_least_one_vote: bool,
    /// Every expected voter voted on every eligible player
    pub all_voters_completed_all_players: bool,
}

impl VoteProgressSnapshot {
    pub fn voter(&self, voter_id: &str) -> Option<&VoterProgress> {
        self.voters.iter().find(|v| v.voter_id == voter_id)
    }

    pub fn player(&self, player_id: &str) -> Option<&PlayerVoteStats> {
        self.players.iter().find(|p| p.player_id == player_id)
    }

    /// Expected voters that still have players left
    pub fn incomplete_voters(&self) -> impl Iterator<Item = &VoterProgress> {
        self.voters.iter().filter(|v| !v.is_complete())
    }
}

/// Build the snapshot from a match, its votes and the player-to-voter links. Pure.
///
/// Votes on players no longer eligible are ignored. With no eligible players
/// or no expected voters the matching predicate is `false`.
pub fn compute_progress(
    record: &MatchRecord,
    votes: &[Vote],
    voter_links: &BTreeMap<PlayerId, VoterId>,
) -> VoteProgressSnapshot {
    let eligible = record.eligible_players();

    let mut stats: BTreeMap<&PlayerId, PlayerVoteStats> = eligible
        .iter()
        .map(|id| {
            (
                id,
                PlayerVoteStats {
                    player_id: id.clone(),
                    ..PlayerVoteStats::default()
                },
            )
        })
        .collect();
    let mut voters_per_player: BTreeMap<&PlayerId, BTreeSet<&VoterId>> = BTreeMap::new();
    let mut voted_by: BTreeMap<&VoterId, BTreeSet<PlayerId>> = BTreeMap::new();

    for vote in votes.iter().filter(|v| v.match_id == record.id) {
        let Some(entry) = stats.get_mut(&vote.player_id) else {
            continue;
        };
        match vote.value {
            VoteValue::Up => entry.up += 1,
            VoteValue::Neutral => entry.neutral += 1,
            VoteValue::Down => entry.down += 1,
        }
        voters_per_player
            .entry(&vote.player_id)
            .or_default()
            .insert(&vote.voter_id);
        voted_by
            .entry(&vote.voter_id)
            .or_default()
            .insert(vote.player_id.clone());
    }

    for (player, voters) in &voters_per_player {
        if let Some(entry) = stats.get_mut(player) {
            entry.distinct_voters = voters.len() as u32;
        }
    }

    let expected: BTreeSet<&VoterId> = eligible
        .iter()
        .filter_map(|player| voter_links.get(player))
        .collect();

    let voters: Vec<VoterProgress> = expected
        .into_iter()
        .map(|voter_id| {
            let voted = voted_by.get(voter_id).cloned().unwrap_or_default();
            let remaining = eligible.difference(&voted).cloned().collect();
            VoterProgress {
                voter_id: voter_id.clone(),
                voted,
                remaining,
            }
        })
        .collect();

    let players: Vec<PlayerVoteStats> = stats.into_values().collect();

    VoteProgressSnapshot {
        match_id: record.id.clone(),
        all_players_have_at_least_one_vote: !players.is_empty()
            && players.iter().all(|p| p.total() > 0),
        all_voters_completed_all_players: !voters.is_empty()
            && voters.iter().all(VoterProgress::is_complete),
        players,
        voters,
    }
}

/// Loads match state and resolves expected voters to build snapshots
pub struct VoteProgressTracker {
    matches: Arc<dyn MatchStore>,
    votes: Arc<dyn VoteStore>,
    identities: Arc<dyn IdentityResolver>,
}

impl VoteProgressTracker {
    pub fn new(
        matches: Arc<dyn MatchStore>,
        votes: Arc<dyn VoteStore>,
        identities: Arc<dyn IdentityResolver>,
    ) -> Self {
        Self {
            matches,
            votes,
            identities,
        }
    }

    pub async fn compute_progress(&self, match_id: &str) -> Result<VoteProgressSnapshot> {
        let record = self
            .matches
            .get(match_id)
            .await?
            .ok_or_else(|| MatchdayError::not_found("Match", match_id))?;
        self.progress_for(&record).await
    }

    /// Snapshot for an already loaded match
    pub async fn progress_for(&self, record: &MatchRecord) -> Result<VoteProgressSnapshot> {
        let votes = self.votes.list_for_match(&record.id).await?;

        let mut links = BTreeMap::new();
        for player in record.eligible_players() {
            if let Some(voter) = self.identities.voter_for(&player).await? {
                links.insert(player, voter);
            }
        }

        let snapshot = compute_progress(record, &votes, &links);
        debug!(
            "Vote progress for match {} - expected voters: {}, complete: {}",
            record.id,
            snapshot.voters.len(),
            snapshot.all_voters_completed_all_players
        );
        Ok(snapshot)
    }
}
