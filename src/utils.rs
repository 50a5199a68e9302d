//! Utility functions for the matchday engine

use crate::error::{MatchdayError, Result};
use crate::types::{MatchId, PlayerId};
use uuid::Uuid;

/// Generate a new unique match ID
pub fn generate_match_id() -> MatchId {
    Uuid::new_v4().to_string()
}

/// Generate a new unique player ID
pub fn generate_player_id() -> PlayerId {
    Uuid::new_v4().to_string()
}

/// Reject blank identifiers
pub fn validate_id(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(MatchdayError::invalid_input(format!(
            "{} cannot be empty",
            field
        )));
    }
    Ok(())
}
