//! Team assignment for matches
//!
//! Seeded randomness, the greedy partitioner, the external suggestion boundary
//! and the engine that combines them into a two-sided split.

pub mod engine;
pub mod partition;
pub mod rng;
pub mod roster;
pub mod suggestion;

// Re-export commonly used types
pub use engine::{rebalance, AssignmentOutcome, TeamAssignmentEngine};
pub use partition::{partition_balanced, partition_shuffled, Partition};
pub use rng::{fresh_seed, seeded_shuffle, SeededRng};
pub use roster::parse_roster;
pub use suggestion::{
    validate_suggestion, DisabledSuggestionProvider, HttpSuggestionProvider, SuggestedTeam,
    Suggestion, SuggestionProvider, SuggestionRejection, SuggestionRequest, SuggestionResponse,
};
