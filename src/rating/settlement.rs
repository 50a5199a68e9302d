//! One-shot rating settlement of a finalized match
//!
//! The match store's compare-and-set on `rating_applied` is the single commit
//! point. It only succeeds while the match is at the revision the changes were
//! computed from, so a re-finalize or an accepted vote in between forces a
//! retry. Once set, the flag is never cleared: the winner writes the committed
//! changes to the player store, and a failed write is finished later by
//! [`RatingUpdateEngine::resume_settlement`], which replays the stored changes
//! without recomputing them.

use crate::error::{MatchdayError, Result};
use crate::metrics::MetricsCollector;
use crate::rating::calculator::RatingCalculator;
use crate::storage::{MatchStore, PlayerStore, SettlementCommit};
use crate::types::{MatchId, MatchRecord, MatchStatus, PlayerId, Rating, RatingChange};
use crate::votes::{VoteAggregator, VoteProgressTracker};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Outcome of a successful settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementReport {
    pub match_id: MatchId,
    pub changes: Vec<RatingChange>,
    pub settled_at: DateTime<Utc>,
}

/// Applies rating changes exactly once per match
pub struct RatingUpdateEngine {
    matches: Arc<dyn MatchStore>,
    players: Arc<dyn PlayerStore>,
    aggregator: Arc<VoteAggregator>,
    tracker: Arc<VoteProgressTracker>,
    calculator: Arc<dyn RatingCalculator>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl RatingUpdateEngine {
    pub fn new(
        matches: Arc<dyn MatchStore>,
        players: Arc<dyn PlayerStore>,
        aggregator: Arc<VoteAggregator>,
        tracker: Arc<VoteProgressTracker>,
        calculator: Arc<dyn RatingCalculator>,
    ) -> Self {
        Self {
            matches,
            players,
            aggregator,
            tracker,
            calculator,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Settle a finalized match.
    ///
    /// With `require_full`, every expected voter must have voted on every
    /// eligible player; otherwise the returned `Conflict` carries the current
    /// progress snapshot. A second call after a commit is a `Conflict` and
    /// changes nothing, even when the player write of that commit failed.
    pub async fn apply_ratings(
        &self,
        match_id: &str,
        require_full: bool,
    ) -> Result<SettlementReport> {
        let start = Instant::now();
        let result = self.settle(match_id, require_full).await;
        self.record_outcome("applied", &result, start);
        result
    }

    /// Finish a committed settlement whose player write did not complete.
    ///
    /// Replays the stored changes; players already carrying this match in
    /// their history are skipped, so running it again is harmless. Fails with
    /// `Conflict` if the match has no committed settlement.
    pub async fn resume_settlement(&self, match_id: &str) -> Result<SettlementReport> {
        let start = Instant::now();
        let result = self.resume(match_id).await;
        self.record_outcome("resumed", &result, start);
        result
    }

    fn record_outcome(&self, success: &str, result: &Result<SettlementReport>, start: Instant) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        match result {
            Ok(report) => {
                metrics.record_settlement(success, start.elapsed());
                for change in &report.changes {
                    metrics.record_rating_delta(change.delta);
                }
            }
            Err(e) if e.is_conflict() => metrics.record_settlement("conflict", start.elapsed()),
            Err(_) => metrics.record_settlement("failed", start.elapsed()),
        }
    }

    async fn settle(&self, match_id: &str, require_full: bool) -> Result<SettlementReport> {
        let record = self
            .matches
            .get(match_id)
            .await?
            .ok_or_else(|| MatchdayError::not_found("Match", match_id))?;

        if record.settlement_pending() {
            warn!(
                "Settlement of match {} is committed but its ratings are not persisted",
                match_id
            );
            return Err(MatchdayError::conflict(format!(
                "ratings for match {} are committed but not yet persisted; resume the settlement",
                match_id
            )));
        }
        if record.rating_applied {
            warn!("Ratings for match {} were already applied", match_id);
            return Err(MatchdayError::conflict(format!(
                "ratings for match {} were already applied",
                match_id
            )));
        }
        if record.status != MatchStatus::Finalized {
            return Err(MatchdayError::conflict(format!(
                "match {} is {}, not finalized",
                match_id, record.status
            )));
        }

        let (Some(result), Some(teams)) = (&record.result, &record.teams) else {
            return Err(MatchdayError::internal(format!(
                "finalized match {} is missing its result or teams",
                match_id
            )));
        };

        if require_full {
            let progress = self.tracker.progress_for(&record).await?;
            if !progress.all_voters_completed_all_players {
                info!(
                    "Settlement of match {} blocked - {} voters incomplete",
                    match_id,
                    progress.incomplete_voters().count()
                );
                return Err(MatchdayError::incomplete_votes(progress));
            }
        }

        let feedback = self.aggregator.aggregate(match_id).await?;

        let member_ids: Vec<PlayerId> = teams.members().map(|(_, id)| id.clone()).collect();
        let ratings: HashMap<PlayerId, Rating> = self
            .players
            .get_many(&member_ids)
            .await?
            .into_iter()
            .map(|(id, player)| (id, player.rating))
            .collect();

        let changes = self
            .calculator
            .calculate(result, teams, &ratings, &feedback)?;

        match self
            .matches
            .try_commit_settlement(match_id, record.revision, changes.clone())
            .await?
        {
            SettlementCommit::Committed => {}
            SettlementCommit::AlreadyApplied => {
                warn!("Lost settlement race for match {}", match_id);
                return Err(MatchdayError::conflict(format!(
                    "ratings for match {} were already applied",
                    match_id
                )));
            }
            SettlementCommit::NotFinalized => {
                return Err(MatchdayError::conflict(format!(
                    "match {} is no longer finalized",
                    match_id
                )));
            }
            SettlementCommit::Stale => {
                info!(
                    "Match {} changed while its settlement was computed, nothing committed",
                    match_id
                );
                return Err(MatchdayError::conflict(format!(
                    "match {} changed during settlement, retry",
                    match_id
                )));
            }
        }

        self.persist(match_id, &changes).await?;

        info!(
            "Ratings applied for match {} - {} players, score {}:{}",
            match_id,
            changes.len(),
            result.score_a,
            result.score_b
        );

        Ok(SettlementReport {
            match_id: match_id.to_string(),
            changes,
            settled_at: Utc::now(),
        })
    }

    async fn resume(&self, match_id: &str) -> Result<SettlementReport> {
        let record: MatchRecord = self
            .matches
            .get(match_id)
            .await?
            .ok_or_else(|| MatchdayError::not_found("Match", match_id))?;

        if !record.rating_applied {
            return Err(MatchdayError::conflict(format!(
                "match {} has no committed settlement to resume",
                match_id
            )));
        }

        self.persist(match_id, &record.rating_changes).await?;
        info!(
            "Settlement of match {} resumed - {} committed changes",
            match_id,
            record.rating_changes.len()
        );

        Ok(SettlementReport {
            match_id: match_id.to_string(),
            changes: record.rating_changes,
            settled_at: Utc::now(),
        })
    }

    /// Write committed changes to the player store, then mark them persisted
    async fn persist(&self, match_id: &str, changes: &[RatingChange]) -> Result<()> {
        let updated = self
            .players
            .apply_ratings(match_id, changes)
            .await
            .map_err(|e| {
                error!(
                    "Rating write for committed match {} failed, settlement left pending: {}",
                    match_id, e
                );
                MatchdayError::internal(format!(
                    "ratings for match {} are committed but not persisted: {}",
                    match_id, e
                ))
            })?;
        debug!("Wrote {} ratings for match {}", updated, match_id);

        // The player write is idempotent, so a failed mark only costs a no-op resume
        if let Err(e) = self.matches.mark_ratings_persisted(match_id).await {
            warn!(
                "Ratings for match {} written but not marked persisted: {}",
                match_id, e
            );
        }
        Ok(())
    }
}
