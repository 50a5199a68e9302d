//! Match lifecycle
//!
//! Creation, participants, team generation, finalization, votes and
//! settlement behind a single manager.

pub mod manager;

// Re-export commonly used types
pub use manager::{MatchManager, MatchManagerStats, Stores};
