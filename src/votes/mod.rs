//! Peer feedback after a match

pub mod aggregator;
pub mod progress;

// Re-export commonly used types
pub use aggregator::{aggregate_votes, vote_points, VoteAggregator, MAX_NOTE_LENGTH};
pub use progress::{
    compute_progress, PlayerVoteStats, VoteProgressSnapshot, VoteProgressTracker, VoterProgress,
};
