//! Peer feedback votes
//!
//! Votes are upserted by (match, player, voter): a later cast replaces the
//! earlier one. Aggregation sums the weighted values per player and clamps the
//! result to the feedback cap.

use crate::config::RatingConfig;
use crate::error::{MatchdayError, Result};
use crate::metrics::MetricsCollector;
use crate::storage::{MatchStore, UpsertOutcome, VoteStore};
use crate::types::{PlayerId, Rating, Vote, VoteValue};
use crate::utils::validate_id;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Longest note accepted with a vote, in characters
pub const MAX_NOTE_LENGTH: usize = 500;

/// Weighted contribution of one vote
pub fn vote_points(value: VoteValue, weight: Rating) -> Rating {
    match value {
        VoteValue::Up => weight,
        VoteValue::Neutral => 0,
        VoteValue::Down => -weight,
    }
}

/// Clamped feedback score per voted-on player. Pure.
///
/// Players without votes are absent from the map.
pub fn aggregate_votes(votes: &[Vote], config: &RatingConfig) -> BTreeMap<PlayerId, Rating> {
    let mut sums: BTreeMap<PlayerId, Rating> = BTreeMap::new();
    for vote in votes {
        *sums.entry(vote.player_id.clone()).or_default() +=
            vote_points(vote.value, config.vote_weight);
    }

    for score in sums.values_mut() {
        *score = (*score).clamp(-config.feedback_cap, config.feedback_cap);
    }
    sums
}

fn normalize_note(note: Option<String>) -> Result<Option<String>> {
    let Some(note) = note else {
        return Ok(None);
    };
    let trimmed = note.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_NOTE_LENGTH {
        return Err(MatchdayError::invalid_input(format!(
            "vote note exceeds {} characters",
            MAX_NOTE_LENGTH
        )));
    }
    Ok(Some(trimmed.to_string()))
}

/// Records votes and summarizes them per player
pub struct VoteAggregator {
    matches: Arc<dyn MatchStore>,
    votes: Arc<dyn VoteStore>,
    config: RatingConfig,
    metrics: Option<Arc<MetricsCollector>>,
}

impl VoteAggregator {
    pub fn new(
        matches: Arc<dyn MatchStore>,
        votes: Arc<dyn VoteStore>,
        config: RatingConfig,
    ) -> Self {
        Self {
            matches,
            votes,
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Cast or replace a vote.
    ///
    /// Fails with `Forbidden` if the player is not eligible for the match and
    /// with `Conflict` once the match has been settled. An accepted vote is
    /// always part of the settlement: the match revision moves around the
    /// write, so a settlement computed without it cannot commit.
    pub async fn cast_vote(
        &self,
        match_id: &str,
        player_id: &str,
        voter_id: &str,
        value: VoteValue,
        note: Option<String>,
    ) -> Result<UpsertOutcome> {
        validate_id(match_id, "match id")?;
        validate_id(player_id, "player id")?;
        validate_id(voter_id, "voter id")?;
        let note = normalize_note(note)?;

        let record = self
            .matches
            .get(match_id)
            .await?
            .ok_or_else(|| MatchdayError::not_found("Match", match_id))?;

        if record.rating_applied {
            return Err(MatchdayError::conflict(format!(
                "ratings for match {} are already applied, votes are closed",
                match_id
            )));
        }

        if !record.is_eligible(player_id) {
            return Err(MatchdayError::forbidden(format!(
                "player {} is not part of match {}",
                player_id, match_id
            )));
        }

        let vote = Vote::new(match_id, player_id, voter_id, value).with_note(note);
        // Settlement cannot commit while the write is in flight
        self.matches.begin_vote(match_id).await?;
        let written = self.votes.upsert(vote).await;
        self.matches.finish_vote(match_id).await?;
        let outcome = written?;

        info!(
            "Vote {} - match: {}, player: {}, voter: {}, value: {}",
            outcome.as_str(),
            match_id,
            player_id,
            voter_id,
            value.as_str()
        );

        if let Some(metrics) = &self.metrics {
            metrics.record_vote(value, outcome);
        }

        Ok(outcome)
    }

    /// Clamped feedback score per player of a match
    pub async fn aggregate(&self, match_id: &str) -> Result<BTreeMap<PlayerId, Rating>> {
        let votes = self.votes.list_for_match(match_id).await?;
        let scores = aggregate_votes(&votes, &self.config);
        debug!(
            "Aggregated {} votes over {} players for match {}",
            votes.len(),
            scores.len(),
            match_id
        );
        Ok(scores)
    }

    /// Every stored vote of a match
    pub async fn votes_for_match(&self, match_id: &str) -> Result<Vec<Vote>> {
        self.votes.list_for_match(match_id).await
    }
}
