//! Rating calculator trait and the capped linear implementation
//!
//! A settled player's delta is the outcome base plus clamped peer feedback,
//! scaled by the tier multiplier of their current rating, clamped to the
//! maximum delta and finally held above the rating floor.

use crate::config::RatingConfig;
use crate::error::{MatchdayError, Result};
use crate::types::{MatchResult, PlayerId, Rating, RatingChange, SideOutcome, TeamAssignment};
use std::collections::{BTreeMap, HashMap};

/// Trait for computing the rating changes of a finalized match
pub trait RatingCalculator: Send + Sync {
    /// New rating of one player
    fn player_rating(&self, before: Rating, outcome: SideOutcome, feedback: Rating) -> Rating;

    /// Changes for every team member, side A first.
    ///
    /// # Arguments
    /// * `result` - final scores of the match
    /// * `teams` - the persisted split
    /// * `ratings` - current rating of every team member
    /// * `feedback` - aggregated vote score per player, absent means 0
    fn calculate(
        &self,
        result: &MatchResult,
        teams: &TeamAssignment,
        ratings: &HashMap<PlayerId, Rating>,
        feedback: &BTreeMap<PlayerId, Rating>,
    ) -> Result<Vec<RatingChange>> {
        teams
            .members()
            .map(|(side, player_id)| -> Result<RatingChange> {
                let before = *ratings
                    .get(player_id)
                    .ok_or_else(|| MatchdayError::not_found("Player", player_id.clone()))?;
                let score = feedback.get(player_id).copied().unwrap_or(0);
                let after = self.player_rating(before, result.outcome_for(side), score);
                Ok(RatingChange {
                    player_id: player_id.clone(),
                    side,
                    before,
                    after,
                    delta: after - before,
                })
            })
            .collect()
    }

    /// Current configuration as JSON
    fn config(&self) -> serde_json::Value;
}

/// Fixed, capped linear adjustment
#[derive(Debug, Clone, Default)]
pub struct LinearRatingCalculator {
    config: RatingConfig,
}

impl LinearRatingCalculator {
    pub fn new(config: RatingConfig) -> Self {
        Self { config }
    }

    pub fn base_delta(&self, outcome: SideOutcome) -> Rating {
        match outcome {
            SideOutcome::Win => self.config.win_delta,
            SideOutcome::Lose => self.config.lose_delta,
            SideOutcome::Draw => self.config.draw_delta,
        }
    }

    /// Scale `total` by the tier of `before`, rounding halves up
    pub fn apply_tier(&self, before: Rating, total: Rating) -> Rating {
        let multiplier = if before < self.config.low_tier_below {
            self.config.low_tier_multiplier
        } else if before > self.config.high_tier_above {
            self.config.high_tier_multiplier
        } else {
            return total;
        };
        (total as f64 * multiplier + 0.5).floor() as Rating
    }

    /// Signed delta before the floor is applied
    pub fn raw_delta(&self, before: Rating, outcome: SideOutcome, feedback: Rating) -> Rating {
        let feedback = feedback.clamp(-self.config.feedback_cap, self.config.feedback_cap);
        let total = self.apply_tier(before, self.base_delta(outcome) + feedback);
        total.clamp(-self.config.max_delta, self.config.max_delta)
    }
}

impl RatingCalculator for LinearRatingCalculator {
    fn player_rating(&self, before: Rating, outcome: SideOutcome, feedback: Rating) -> Rating {
        (before + self.raw_delta(before, outcome, feedback)).max(self.config.rating_floor)
    }

    fn config(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or(serde_json::Value::Null)
    }
}
