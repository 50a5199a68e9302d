//! Matchday - team balancing, peer feedback and rating settlement
//!
//! This crate splits the players of a pickup match into two balanced sides,
//! records peer feedback votes after the match and settles every player's
//! rating exactly once.

pub mod abilities;
pub mod config;
pub mod error;
pub mod matches;
pub mod metrics;
pub mod rating;
pub mod service;
pub mod storage;
pub mod teams;
pub mod types;
pub mod utils;
pub mod votes;

// Re-export commonly used types and traits
pub use error::{MatchdayError, Result};
pub use types::*;

// Re-export key components
pub use matches::{MatchManager, MatchManagerStats, Stores};
pub use rating::{LinearRatingCalculator, RatingCalculator, RatingUpdateEngine, SettlementReport};
pub use storage::{IdentityResolver, MatchStore, PlayerStore, VoteStore};
pub use teams::{AssignmentOutcome, SuggestionProvider, TeamAssignmentEngine};
pub use votes::{VoteAggregator, VoteProgressSnapshot, VoteProgressTracker};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
