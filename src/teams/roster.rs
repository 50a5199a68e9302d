//! Offline roster input for one-shot balance runs
//!
//! A roster is a JSON array of `{id, name?, rating?, abilities?}`. Abilities
//! accept the same loose shapes as player registration. A missing rating is
//! derived from the abilities the way a newly registered player's would be.

use crate::abilities::{initial_rating, normalize_abilities, DEFAULT_ABILITY_SCORE};
use crate::config::RatingConfig;
use crate::error::{MatchdayError, Result};
use crate::types::{Participant, Rating};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct RosterEntry {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    rating: Option<Rating>,
    #[serde(default)]
    abilities: Value,
}

/// Parse a roster document into participants, in input order
pub fn parse_roster(raw: &str, config: &RatingConfig) -> Result<Vec<Participant>> {
    let entries: Vec<RosterEntry> = serde_json::from_str(raw)
        .map_err(|e| MatchdayError::invalid_input(format!("malformed roster: {}", e)))?;

    Ok(entries
        .into_iter()
        .map(|entry| {
            let abilities =
                normalize_abilities(&entry.abilities, DEFAULT_ABILITY_SCORE).unwrap_or_default();
            let rating = entry
                .rating
                .unwrap_or_else(|| initial_rating(&abilities, config));
            Participant {
                id: entry.id,
                name: entry.name.unwrap_or_default(),
                rating,
                abilities,
            }
        })
        .collect())
}
