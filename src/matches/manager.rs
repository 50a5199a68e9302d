//! Match manager implementation
//!
//! The `MatchManager` is the façade a calling layer talks to. It owns the
//! collaborators (stores, assignment engine, vote aggregator, progress tracker,
//! settlement engine), drives the match lifecycle and keeps operation stats.

use crate::abilities::{initial_rating, AbilityScores};
use crate::config::{AppConfig, RatingConfig};
use crate::error::{MatchdayError, Result};
use crate::metrics::MetricsCollector;
use crate::rating::{LinearRatingCalculator, RatingUpdateEngine, SettlementReport};
use crate::storage::{
    IdentityResolver, MatchStore, PlayerOwnerResolver, PlayerStore, UpsertOutcome, VoteStore,
};
use crate::teams::{AssignmentOutcome, TeamAssignmentEngine};
use crate::types::{
    MatchRecord, MatchResult, Participant, PlayerId, PlayerRecord, VoteValue, VoterId,
};
use crate::utils::{generate_match_id, generate_player_id, validate_id};
use crate::votes::{VoteAggregator, VoteProgressSnapshot, VoteProgressTracker};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Statistics about match manager operations
#[derive(Debug, Clone, Default)]
pub struct MatchManagerStats {
    /// Total players registered through the manager
    pub players_registered: u64,
    /// Total matches created
    pub matches_created: u64,
    /// Total team splits generated (including regenerations)
    pub teams_generated: u64,
    /// Total finalize calls that succeeded
    pub matches_finalized: u64,
    /// Total votes accepted
    pub votes_cast: u64,
    /// Total settlements applied
    pub settlements_applied: u64,
    /// Total settlement attempts rejected as conflicts
    pub settlement_conflicts: u64,
}

/// Stores handed to the manager
#[derive(Clone)]
pub struct Stores {
    pub matches: Arc<dyn MatchStore>,
    pub players: Arc<dyn PlayerStore>,
    pub votes: Arc<dyn VoteStore>,
}

/// The main match manager
#[derive(Clone)]
pub struct MatchManager {
    matches: Arc<dyn MatchStore>,
    players: Arc<dyn PlayerStore>,
    /// Team assignment engine
    assignment: Arc<TeamAssignmentEngine>,
    /// Vote recording and aggregation
    aggregator: Arc<VoteAggregator>,
    /// Vote readiness
    tracker: Arc<VoteProgressTracker>,
    /// One-shot settlement
    settlement: Arc<RatingUpdateEngine>,
    rating_config: RatingConfig,
    /// Manager statistics
    stats: Arc<RwLock<MatchManagerStats>>,
    /// Metrics collector for recording performance data
    metrics_collector: Arc<MetricsCollector>,
}

impl MatchManager {
    /// Create a manager; expected voters are resolved through player owners
    pub fn new(
        stores: Stores,
        assignment: TeamAssignmentEngine,
        config: &AppConfig,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Self {
        let identities: Arc<dyn IdentityResolver> =
            Arc::new(PlayerOwnerResolver::new(stores.players.clone()));
        Self::with_identity_resolver(stores, assignment, identities, config, metrics_collector)
    }

    /// Create a manager with a custom identity resolver
    pub fn with_identity_resolver(
        stores: Stores,
        assignment: TeamAssignmentEngine,
        identities: Arc<dyn IdentityResolver>,
        config: &AppConfig,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Self {
        let aggregator = Arc::new(
            VoteAggregator::new(
                stores.matches.clone(),
                stores.votes.clone(),
                config.rating.clone(),
            )
            .with_metrics(metrics_collector.clone()),
        );
        let tracker = Arc::new(VoteProgressTracker::new(
            stores.matches.clone(),
            stores.votes.clone(),
            identities,
        ));
        let settlement = Arc::new(
            RatingUpdateEngine::new(
                stores.matches.clone(),
                stores.players.clone(),
                aggregator.clone(),
                tracker.clone(),
                Arc::new(LinearRatingCalculator::new(config.rating.clone())),
            )
            .with_metrics(metrics_collector.clone()),
        );

        Self {
            matches: stores.matches,
            players: stores.players,
            assignment: Arc::new(assignment.with_metrics(metrics_collector.clone())),
            aggregator,
            tracker,
            settlement,
            rating_config: config.rating.clone(),
            stats: Arc::new(RwLock::new(MatchManagerStats::default())),
            metrics_collector,
        }
    }

    /// Register a player, deriving the initial rating from abilities if any
    pub async fn register_player(
        &self,
        name: &str,
        abilities: AbilityScores,
        owner: Option<VoterId>,
    ) -> Result<PlayerRecord> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MatchdayError::invalid_input("player name cannot be empty"));
        }

        let rating = initial_rating(&abilities, &self.rating_config);
        let mut player =
            PlayerRecord::new(generate_player_id(), name, rating).with_abilities(abilities);
        if let Some(owner) = owner {
            validate_id(&owner, "owner")?;
            player = player.with_owner(owner);
        }

        self.players.insert(player.clone()).await?;
        self.update_stats(|stats| stats.players_registered += 1)?;

        info!(
            "Player registered - id: {}, rating: {}",
            player.id, player.rating
        );
        Ok(player)
    }

    /// Create a match for a group; every participant must be a known player
    pub async fn create_match(
        &self,
        group_id: &str,
        participants: &[PlayerId],
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<MatchRecord> {
        let start = Instant::now();
        validate_id(group_id, "group id")?;

        let mut seen = HashSet::new();
        let mut unique: Vec<PlayerId> = Vec::with_capacity(participants.len());
        for id in participants {
            validate_id(id, "participant id")?;
            if seen.insert(id.as_str()) {
                unique.push(id.clone());
            }
        }
        self.ensure_players_exist(&unique).await?;

        let mut record = MatchRecord::new(generate_match_id(), group_id, unique);
        record.scheduled_at = scheduled_at;
        self.matches.insert(record.clone()).await?;

        self.update_stats(|stats| stats.matches_created += 1)?;
        self.metrics_collector
            .record_operation("create_match", start.elapsed());

        info!(
            "Match created - id: {}, group: {}, participants: {}",
            record.id,
            record.group_id,
            record.participants.len()
        );
        Ok(record)
    }

    /// Add a known player to a match that is not finalized yet
    pub async fn add_participant(&self, match_id: &str, player_id: &str) -> Result<MatchRecord> {
        validate_id(player_id, "player id")?;
        let player_id = player_id.to_string();
        self.ensure_players_exist(std::slice::from_ref(&player_id))
            .await?;

        let record = self.matches.add_participant(match_id, &player_id).await?;
        debug!("Player {} added to match {}", player_id, match_id);
        Ok(record)
    }

    /// Split the match participants into two sides and overwrite the stored split
    pub async fn generate_teams(
        &self,
        match_id: &str,
        seed: Option<u32>,
    ) -> Result<(MatchRecord, AssignmentOutcome)> {
        let start = Instant::now();
        let record = self.load_match(match_id).await?;
        if record.is_finalized() {
            return Err(MatchdayError::conflict(format!(
                "match {} is already {}, teams are fixed",
                match_id, record.status
            )));
        }

        let participants = self.load_participants(&record.participants).await?;
        let outcome = self.assignment.assign(&participants, seed).await?;
        let updated = self
            .matches
            .save_teams(match_id, outcome.clone().into_assignment())
            .await?;

        self.update_stats(|stats| stats.teams_generated += 1)?;
        self.metrics_collector
            .record_operation("generate_teams", start.elapsed());

        info!(
            "Teams generated for match {} - source: {}, seed: {}",
            match_id,
            outcome.source.as_str(),
            outcome.seed
        );
        Ok((updated, outcome))
    }

    /// Store the final score; games played is counted on the first finalize only
    pub async fn finalize_match(
        &self,
        match_id: &str,
        score_a: u32,
        score_b: u32,
    ) -> Result<MatchRecord> {
        let start = Instant::now();
        let first = self
            .matches
            .record_result(match_id, MatchResult::new(score_a, score_b))
            .await?;
        let record = self.load_match(match_id).await?;

        if first {
            if let Some(teams) = &record.teams {
                let members: Vec<PlayerId> = teams.members().map(|(_, id)| id.clone()).collect();
                self.players.increment_games_played(&members).await?;
            }
        } else {
            warn!("Match {} re-finalized with {}:{}", match_id, score_a, score_b);
        }

        self.update_stats(|stats| stats.matches_finalized += 1)?;
        self.metrics_collector
            .record_operation("finalize_match", start.elapsed());

        info!("Match {} finalized {}:{}", match_id, score_a, score_b);
        Ok(record)
    }

    pub async fn cast_vote(
        &self,
        match_id: &str,
        player_id: &str,
        voter_id: &str,
        value: VoteValue,
        note: Option<String>,
    ) -> Result<UpsertOutcome> {
        let outcome = self
            .aggregator
            .cast_vote(match_id, player_id, voter_id, value, note)
            .await?;
        self.update_stats(|stats| stats.votes_cast += 1)?;
        Ok(outcome)
    }

    pub async fn compute_progress(&self, match_id: &str) -> Result<VoteProgressSnapshot> {
        self.tracker.compute_progress(match_id).await
    }

    /// Settle the match ratings exactly once
    pub async fn apply_ratings(
        &self,
        match_id: &str,
        require_full: bool,
    ) -> Result<SettlementReport> {
        match self.settlement.apply_ratings(match_id, require_full).await {
            Ok(report) => {
                self.update_stats(|stats| stats.settlements_applied += 1)?;
                Ok(report)
            }
            Err(e) => {
                if e.is_conflict() {
                    self.update_stats(|stats| stats.settlement_conflicts += 1)?;
                }
                Err(e)
            }
        }
    }

    /// Finish a settlement whose player write failed after the commit
    pub async fn resume_settlement(&self, match_id: &str) -> Result<SettlementReport> {
        self.settlement.resume_settlement(match_id).await
    }

    pub async fn get_match(&self, match_id: &str) -> Result<Option<MatchRecord>> {
        self.matches.get(match_id).await
    }

    pub async fn list_matches(&self, group_id: &str) -> Result<Vec<MatchRecord>> {
        self.matches.list_by_group(group_id).await
    }

    pub async fn get_player(&self, player_id: &str) -> Result<Option<PlayerRecord>> {
        self.players.get(player_id).await
    }

    /// Snapshot of the manager statistics
    pub fn get_stats(&self) -> Result<MatchManagerStats> {
        let stats = self
            .stats
            .read()
            .map_err(|_| MatchdayError::internal("Failed to acquire stats lock"))?;
        Ok(stats.clone())
    }

    /// The assignment engine used by this manager
    pub fn assignment_engine(&self) -> Arc<TeamAssignmentEngine> {
        self.assignment.clone()
    }

    async fn load_match(&self, match_id: &str) -> Result<MatchRecord> {
        self.matches
            .get(match_id)
            .await?
            .ok_or_else(|| MatchdayError::not_found("Match", match_id))
    }

    async fn ensure_players_exist(&self, ids: &[PlayerId]) -> Result<()> {
        let found = self.players.get_many(ids).await?;
        if let Some(missing) = ids.iter().find(|id| !found.contains_key(*id)) {
            return Err(MatchdayError::not_found("Player", missing.clone()));
        }
        Ok(())
    }

    /// Participants in match order with their stored ratings and abilities
    async fn load_participants(&self, ids: &[PlayerId]) -> Result<Vec<Participant>> {
        let found = self.players.get_many(ids).await?;
        ids.iter()
            .map(|id| {
                found
                    .get(id)
                    .map(PlayerRecord::to_participant)
                    .ok_or_else(|| MatchdayError::not_found("Player", id.clone()))
            })
            .collect()
    }

    fn update_stats(&self, update: impl FnOnce(&mut MatchManagerStats)) -> Result<()> {
        let mut stats = self
            .stats
            .write()
            .map_err(|_| MatchdayError::internal("Failed to acquire stats lock"))?;
        update(&mut *stats);
        self.metrics_collector.update_from_manager_stats(&stats);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abilities::AbilityKey;
    use crate::config::BalanceConfig;
    use crate::storage::{InMemoryMatchStore, InMemoryPlayerStore, InMemoryVoteStore};
    use crate::types::MatchStatus;

    fn manager() -> MatchManager {
        let stores = Stores {
            matches: Arc::new(InMemoryMatchStore::new()),
            players: Arc::new(InMemoryPlayerStore::new()),
            votes: Arc::new(InMemoryVoteStore::new()),
        };
        MatchManager::new(
            stores,
            TeamAssignmentEngine::without_suggestions(BalanceConfig::default()),
            &AppConfig::default(),
            Arc::new(MetricsCollector::default()),
        )
    }

    async fn register(manager: &MatchManager, count: usize) -> Vec<PlayerId> {
        let mut ids = Vec::new();
        for i in 0..count {
            let player = manager
                .register_player(
                    &format!("player{}", i),
                    AbilityScores::new(),
                    Some(format!("u{}", i)),
                )
                .await
                .unwrap();
            ids.push(player.id);
        }
        ids
    }

    #[tokio::test]
    async fn test_register_player_with_abilities() {
        let manager = manager();
        let abilities: AbilityScores = AbilityKey::ALL.iter().map(|k| (*k, 9)).collect();

        let strong = manager
            .register_player("Strong", abilities, None)
            .await
            .unwrap();
        assert_eq!(strong.rating, 1100);

        let plain = manager
            .register_player("Plain", AbilityScores::new(), None)
            .await
            .unwrap();
        assert_eq!(plain.rating, 1000);

        let err = manager
            .register_player("  ", AbilityScores::new(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[tokio::test]
    async fn test_create_match_validates_participants() {
        let manager = manager();
        let ids = register(&manager, 2).await;

        let mut with_dup = ids.clone();
        with_dup.push(ids[0].clone());
        let record = manager.create_match("g1", &with_dup, None).await.unwrap();
        assert_eq!(record.participants.len(), 2);
        assert_eq!(record.status, MatchStatus::Pending);

        let err = manager
            .create_match("g1", &["ghost".to_string()], None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");

        assert_eq!(manager.list_matches("g1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_generate_teams_overwrites_split() {
        let manager = manager();
        let ids = register(&manager, 6).await;
        let record = manager.create_match("g1", &ids, None).await.unwrap();

        let (first, outcome) = manager.generate_teams(&record.id, Some(1)).await.unwrap();
        assert_eq!(first.status, MatchStatus::TeamsAssigned);
        assert_eq!(outcome.seed, 1);
        assert_eq!(outcome.team_a.len() + outcome.team_b.len(), 6);

        let (second, _) = manager.generate_teams(&record.id, Some(2)).await.unwrap();
        let teams = second.teams.unwrap();
        assert_eq!(teams.seed, 2);
        assert_eq!(teams.team_a.players.len() + teams.team_b.players.len(), 6);
        assert_eq!(manager.get_stats().unwrap().teams_generated, 2);
    }

    #[tokio::test]
    async fn test_generate_teams_without_participants() {
        let manager = manager();
        let record = manager.create_match("g1", &[], None).await.unwrap();
        let err = manager.generate_teams(&record.id, None).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[tokio::test]
    async fn test_finalize_counts_games_once() {
        let manager = manager();
        let ids = register(&manager, 4).await;
        let record = manager.create_match("g1", &ids, None).await.unwrap();

        let err = manager.finalize_match(&record.id, 1, 0).await.unwrap_err();
        assert!(err.is_conflict());

        manager.generate_teams(&record.id, Some(3)).await.unwrap();
        let finalized = manager.finalize_match(&record.id, 3, 1).await.unwrap();
        assert_eq!(finalized.status, MatchStatus::Finalized);
        let teams = finalized.teams.as_ref().unwrap();
        assert_eq!(teams.team_a.score, 3);
        assert_eq!(teams.team_b.score, 1);

        manager.finalize_match(&record.id, 2, 2).await.unwrap();
        let player = manager.get_player(&ids[0]).await.unwrap().unwrap();
        assert_eq!(player.games_played, 1);

        let err = manager.generate_teams(&record.id, None).await.unwrap_err();
        assert!(err.is_conflict());
        let err = manager
            .add_participant(&record.id, &ids[0])
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_full_lifecycle_stats() {
        let manager = manager();
        let ids = register(&manager, 2).await;
        let record = manager.create_match("g1", &ids, None).await.unwrap();
        manager.generate_teams(&record.id, Some(5)).await.unwrap();
        manager.finalize_match(&record.id, 1, 0).await.unwrap();

        manager
            .cast_vote(&record.id, &ids[0], "u1", VoteValue::Up, None)
            .await
            .unwrap();
        manager.apply_ratings(&record.id, false).await.unwrap();
        assert!(manager
            .apply_ratings(&record.id, false)
            .await
            .unwrap_err()
            .is_conflict());

        let settled = manager.get_match(&record.id).await.unwrap().unwrap();
        assert!(!settled.settlement_pending());
        let replay = manager.resume_settlement(&record.id).await.unwrap();
        assert_eq!(replay.changes, settled.rating_changes);

        let stats = manager.get_stats().unwrap();
        assert_eq!(stats.matches_created, 1);
        assert_eq!(stats.votes_cast, 1);
        assert_eq!(stats.settlements_applied, 1);
        assert_eq!(stats.settlement_conflicts, 1);
    }
}
