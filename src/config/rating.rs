//! Rating settlement configuration

use crate::types::Rating;
use serde::{Deserialize, Serialize};

/// Constants of the capped linear rating update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    /// Rating of a player registered without abilities
    pub default_rating: Rating,
    /// No settlement may take a rating below this
    pub rating_floor: Rating,
    pub win_delta: Rating,
    pub lose_delta: Rating,
    pub draw_delta: Rating,
    /// Points per "up" vote (and minus per "down" vote)
    pub vote_weight: Rating,
    /// Aggregated feedback is clamped to [-feedback_cap, feedback_cap]
    pub feedback_cap: Rating,
    /// Ratings strictly below this get `low_tier_multiplier`
    pub low_tier_below: Rating,
    pub low_tier_multiplier: f64,
    /// Ratings strictly above this get `high_tier_multiplier`
    pub high_tier_above: Rating,
    pub high_tier_multiplier: f64,
    /// Total per-player delta is clamped to [-max_delta, max_delta]
    pub max_delta: Rating,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            default_rating: 1000,
            rating_floor: 500,
            win_delta: 10,
            lose_delta: -10,
            draw_delta: 2,
            vote_weight: 2,
            feedback_cap: 6,
            low_tier_below: 950,
            low_tier_multiplier: 1.2,
            high_tier_above: 1200,
            high_tier_multiplier: 0.8,
            max_delta: 40,
        }
    }
}
