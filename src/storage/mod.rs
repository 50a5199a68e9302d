//! Persistence boundary of the engine
//!
//! Match, player and vote stores plus the identity resolver are injected into
//! the engines as trait objects. The in-memory implementations back the
//! service binary and the tests.

pub mod identity;
pub mod matches;
pub mod players;
pub mod votes;

use crate::error::MatchdayError;

// Re-export commonly used types
pub use identity::{IdentityResolver, PlayerOwnerResolver, StaticIdentityResolver};
pub use matches::{InMemoryMatchStore, MatchStore, SettlementCommit};
pub use players::{InMemoryPlayerStore, PlayerStore};
pub use votes::{InMemoryVoteStore, UpsertOutcome, VoteStore};

/// Error for a poisoned store lock
pub(crate) fn lock_error(what: &str) -> MatchdayError {
    MatchdayError::internal(format!("Failed to acquire {} lock", what))
}
