//! Team balancing configuration

use serde::{Deserialize, Serialize};

/// Tuning of the assignment engine's rebalancing step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceConfig {
    /// Smallest tolerated rating-sum difference before rebalancing
    pub min_threshold: f64,
    /// Fraction of the average side sum tolerated before rebalancing
    pub threshold_ratio: f64,
    /// Upper bound on swap rounds in the local search
    pub max_swap_iterations: usize,
    /// Shuffle with the seed before the greedy partition (false = pure greedy)
    pub shuffle_before_partition: bool,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            min_threshold: 30.0,
            threshold_ratio: 0.05,
            max_swap_iterations: 5,
            shuffle_before_partition: true,
        }
    }
}

impl BalanceConfig {
    /// Balance threshold for two sides with the given rating sums
    pub fn threshold(&self, sum_a: i64, sum_b: i64) -> f64 {
        let average_side = (sum_a + sum_b) as f64 / 2.0;
        self.min_threshold.max(average_side * self.threshold_ratio)
    }
}
