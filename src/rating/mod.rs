//! Rating settlement
//!
//! The calculator holds the pure delta math; the settlement engine loads a
//! finalized match, gathers feedback and commits the changes exactly once.

pub mod calculator;
pub mod settlement;

// Re-export commonly used types
pub use calculator::{LinearRatingCalculator, RatingCalculator};
pub use settlement::{RatingUpdateEngine, SettlementReport};
