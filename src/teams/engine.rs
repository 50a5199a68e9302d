//! Team assignment engine
//!
//! Orchestrates the optional external suggestion, its validation and repair,
//! local-search rebalancing and the greedy fallback. Every failure on the
//! suggestion side degrades to the local partition; only an empty or malformed
//! participant list is rejected.

use crate::config::{BalanceConfig, SuggestionSettings};
use crate::error::{MatchdayError, Result};
use crate::metrics::MetricsCollector;
use crate::teams::partition::{partition_balanced, partition_shuffled, place_greedily, Partition};
use crate::teams::rng::{fresh_seed, seeded_shuffle};
use crate::teams::suggestion::{
    validate_suggestion, DisabledSuggestionProvider, Suggestion, SuggestionProvider,
    SuggestionRequest,
};
use crate::types::{AssignmentSource, Participant, PlayerId, Rating, TeamAssignment};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Result of one assignment run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentOutcome {
    pub team_a: Vec<PlayerId>,
    pub team_b: Vec<PlayerId>,
    pub sum_a: i64,
    pub sum_b: i64,
    /// Seed that reproduces this split
    pub seed: u32,
    pub source: AssignmentSource,
    /// Swaps applied by the local search
    pub swaps: usize,
    /// Why a supplied suggestion was not used, if one was discarded
    pub suggestion_rejected: Option<String>,
}

impl AssignmentOutcome {
    fn from_partition(partition: Partition, seed: u32, source: AssignmentSource) -> Self {
        Self {
            team_a: partition.team_a,
            team_b: partition.team_b,
            sum_a: partition.sum_a,
            sum_b: partition.sum_b,
            seed,
            source,
            swaps: 0,
            suggestion_rejected: None,
        }
    }

    pub fn difference(&self) -> i64 {
        (self.sum_a - self.sum_b).abs()
    }

    pub fn into_assignment(self) -> TeamAssignment {
        TeamAssignment::new(self.team_a, self.team_b, self.seed, self.source)
    }
}

/// Swap players across sides to shrink the rating-sum difference.
///
/// Each round applies the single cross-side swap with the smallest resulting
/// difference (first found wins ties) and stops once the difference is within
/// the threshold, no swap improves it, or `max_swap_iterations` rounds ran.
/// Returns the number of swaps applied.
pub fn rebalance(
    partition: &mut Partition,
    ratings: &HashMap<PlayerId, Rating>,
    config: &BalanceConfig,
) -> usize {
    let threshold = config.threshold(partition.sum_a, partition.sum_b);
    let rating_of = |id: &PlayerId| ratings.get(id).copied().unwrap_or_default() as i64;
    let mut swaps = 0;

    while swaps < config.max_swap_iterations && partition.difference() as f64 > threshold {
        let signed = partition.sum_a - partition.sum_b;
        let mut best: Option<(usize, usize, i64)> = None;

        for (i, a) in partition.team_a.iter().enumerate() {
            for (j, b) in partition.team_b.iter().enumerate() {
                let moved = rating_of(a) - rating_of(b);
                let resulting = (signed - 2 * moved).abs();
                if best.map_or(true, |(_, _, d)| resulting < d) {
                    best = Some((i, j, resulting));
                }
            }
        }

        let Some((i, j, resulting)) = best else {
            break;
        };
        if resulting >= partition.difference() {
            break;
        }

        let moved = rating_of(&partition.team_a[i]) - rating_of(&partition.team_b[j]);
        std::mem::swap(&mut partition.team_a[i], &mut partition.team_b[j]);
        partition.sum_a -= moved;
        partition.sum_b += moved;
        swaps += 1;

        debug!(
            "Rebalance swap {} applied - difference now {}",
            swaps,
            partition.difference()
        );
    }

    swaps
}

/// Splits participants into two balanced sides
pub struct TeamAssignmentEngine {
    config: BalanceConfig,
    suggestions: SuggestionSettings,
    provider: Arc<dyn SuggestionProvider>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl TeamAssignmentEngine {
    /// Create an engine; `suggestions.enabled` decides whether `provider` is asked
    pub fn new(
        config: BalanceConfig,
        suggestions: SuggestionSettings,
        provider: Arc<dyn SuggestionProvider>,
    ) -> Self {
        Self {
            config,
            suggestions,
            provider,
            metrics: None,
        }
    }

    /// Engine that never asks for suggestions
    pub fn without_suggestions(config: BalanceConfig) -> Self {
        Self::new(
            config,
            SuggestionSettings::default(),
            Arc::new(DisabledSuggestionProvider),
        )
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &BalanceConfig {
        &self.config
    }

    pub fn suggestions_enabled(&self) -> bool {
        self.suggestions.enabled
    }

    /// Assign teams, asking the provider first when suggestions are enabled.
    ///
    /// Without a seed a fresh one is drawn; it is returned in the outcome.
    pub async fn assign(
        &self,
        participants: &[Participant],
        seed: Option<u32>,
    ) -> Result<AssignmentOutcome> {
        let participants = unique_participants(participants)?;
        let seed = seed.unwrap_or_else(fresh_seed);
        let suggestion = self.fetch_suggestion(&participants, seed).await;
        self.assign_teams(&participants, seed, &suggestion)
    }

    /// Assign teams from an already obtained suggestion. Pure.
    pub fn assign_teams(
        &self,
        participants: &[Participant],
        seed: u32,
        suggestion: &Suggestion,
    ) -> Result<AssignmentOutcome> {
        let start = Instant::now();
        let participants = unique_participants(participants)?;

        let outcome = match validate_suggestion(suggestion, &participants) {
            Ok(validated) => {
                let ratings: HashMap<PlayerId, Rating> = participants
                    .iter()
                    .map(|p| (p.id.clone(), p.rating))
                    .collect();
                let sum_of = |ids: &[PlayerId]| -> i64 {
                    ids.iter()
                        .map(|id| ratings.get(id).copied().unwrap_or_default() as i64)
                        .sum()
                };

                let mut partition = Partition {
                    sum_a: sum_of(&validated.team_a),
                    sum_b: sum_of(&validated.team_b),
                    team_a: validated.team_a,
                    team_b: validated.team_b,
                };
                let swaps = rebalance(&mut partition, &ratings, &self.config);

                let assigned: HashSet<&PlayerId> = partition
                    .team_a
                    .iter()
                    .chain(partition.team_b.iter())
                    .collect();
                let unassigned: Vec<Participant> = participants
                    .iter()
                    .filter(|p| !assigned.contains(&p.id))
                    .cloned()
                    .collect();
                if !unassigned.is_empty() {
                    debug!(
                        "Completing suggestion with {} unassigned participants",
                        unassigned.len()
                    );
                    place_greedily(&mut partition, &seeded_shuffle(&unassigned, seed), None);
                }

                let mut outcome =
                    AssignmentOutcome::from_partition(partition, seed, AssignmentSource::Suggested);
                outcome.swaps = swaps;
                outcome
            }
            Err(rejection) => {
                if *suggestion != Suggestion::None {
                    warn!("Discarding team suggestion: {}", rejection);
                    if let Some(metrics) = &self.metrics {
                        metrics.record_suggestion_failure(rejection.as_str());
                    }
                }

                let mut outcome = if self.config.shuffle_before_partition {
                    AssignmentOutcome::from_partition(
                        partition_shuffled(&participants, seed),
                        seed,
                        AssignmentSource::Shuffled,
                    )
                } else {
                    AssignmentOutcome::from_partition(
                        partition_balanced(&participants),
                        seed,
                        AssignmentSource::Deterministic,
                    )
                };
                if *suggestion != Suggestion::None {
                    outcome.suggestion_rejected = Some(rejection.to_string());
                }
                outcome
            }
        };

        info!(
            "Teams assigned - source: {}, seed: {}, sizes: {}/{}, sums: {}/{}, swaps: {}",
            outcome.source.as_str(),
            outcome.seed,
            outcome.team_a.len(),
            outcome.team_b.len(),
            outcome.sum_a,
            outcome.sum_b,
            outcome.swaps
        );

        if let Some(metrics) = &self.metrics {
            metrics.record_team_assignment(outcome.source, outcome.swaps, start.elapsed());
        }

        Ok(outcome)
    }

    /// Ask the provider within the configured timeout; every failure becomes
    /// `Suggestion::None`
    async fn fetch_suggestion(&self, participants: &[Participant], seed: u32) -> Suggestion {
        if !self.suggestions.enabled {
            return Suggestion::None;
        }

        let request = SuggestionRequest {
            participants: participants.to_vec(),
            seed,
        };

        match tokio::time::timeout(self.suggestions.timeout(), self.provider.suggest(&request))
            .await
        {
            Ok(Ok(response)) => {
                debug!("Suggestion received with {} sides", response.teams.len());
                Suggestion::from(response)
            }
            Ok(Err(e)) => {
                warn!("Suggestion provider failed, using local partition: {}", e);
                if let Some(metrics) = &self.metrics {
                    metrics.record_suggestion_failure("provider_error");
                }
                Suggestion::None
            }
            Err(_) => {
                warn!(
                    "Suggestion provider timed out after {}ms, using local partition",
                    self.suggestions.timeout_ms
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_suggestion_failure("timeout");
                }
                Suggestion::None
            }
        }
    }
}

/// Reject empty input and blank ids; drop repeated ids keeping the first
fn unique_participants(participants: &[Participant]) -> Result<Vec<Participant>> {
    if participants.is_empty() {
        return Err(MatchdayError::invalid_input(
            "cannot assign teams without participants",
        ));
    }

    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(participants.len());
    for participant in participants {
        if participant.id.trim().is_empty() {
            return Err(MatchdayError::invalid_input("participant id cannot be empty"));
        }
        if seen.insert(participant.id.as_str()) {
            unique.push(participant.clone());
        }
    }
    Ok(unique)
}
