//! Player ability scores
//!
//! Abilities are optional per-skill scores in [1, 10]. They are forwarded to the
//! suggestion provider and seed the initial rating of a newly registered player.

use crate::config::RatingConfig;
use crate::types::Rating;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Lowest accepted ability score
pub const MIN_ABILITY_SCORE: u8 = 1;

/// Highest accepted ability score
pub const MAX_ABILITY_SCORE: u8 = 10;

/// Score assigned to abilities given in the legacy list form
pub const DEFAULT_ABILITY_SCORE: u8 = 7;

/// Rating points per ability point away from the default score
const RATING_PER_ABILITY_POINT: f64 = 50.0;

/// Known ability keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AbilityKey {
    Goalkeeper,
    Running,
    Passes,
    Defense,
    Power,
    Scorer,
    PositionalUnderstanding,
}

impl AbilityKey {
    pub const ALL: [AbilityKey; 7] = [
        AbilityKey::Goalkeeper,
        AbilityKey::Running,
        AbilityKey::Passes,
        AbilityKey::Defense,
        AbilityKey::Power,
        AbilityKey::Scorer,
        AbilityKey::PositionalUnderstanding,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AbilityKey::Goalkeeper => "goalkeeper",
            AbilityKey::Running => "running",
            AbilityKey::Passes => "passes",
            AbilityKey::Defense => "defense",
            AbilityKey::Power => "power",
            AbilityKey::Scorer => "scorer",
            AbilityKey::PositionalUnderstanding => "positionalUnderstanding",
        }
    }
}

impl FromStr for AbilityKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AbilityKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or(())
    }
}

/// Ability scores keyed by ability
pub type AbilityScores = BTreeMap<AbilityKey, u8>;

/// Normalize loosely shaped ability input.
///
/// Accepts an object of `{ability: score}` (unknown keys and non-numeric values
/// are dropped, scores rounded and clamped to [1, 10]) or the legacy list of
/// ability names, each mapped to `default_score`. Returns `None` when nothing
/// usable remains.
pub fn normalize_abilities(input: &Value, default_score: u8) -> Option<AbilityScores> {
    let mut scores = AbilityScores::new();

    match input {
        Value::Object(map) => {
            for (name, raw) in map {
                let Ok(key) = name.parse::<AbilityKey>() else {
                    continue;
                };
                let number = match raw {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    _ => None,
                };
                if let Some(n) = number.filter(|n| n.is_finite()) {
                    scores.insert(key, clamp_score(n));
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                if let Some(key) = item.as_str().and_then(|s| s.parse::<AbilityKey>().ok()) {
                    scores.insert(key, default_score.clamp(MIN_ABILITY_SCORE, MAX_ABILITY_SCORE));
                }
            }
        }
        _ => {}
    }

    if scores.is_empty() {
        None
    } else {
        Some(scores)
    }
}

fn clamp_score(value: f64) -> u8 {
    value
        .round()
        .clamp(MIN_ABILITY_SCORE as f64, MAX_ABILITY_SCORE as f64) as u8
}

/// Average ability score, if any abilities are set
pub fn ability_average(abilities: &AbilityScores) -> Option<f64> {
    if abilities.is_empty() {
        return None;
    }
    let total: u32 = abilities.values().map(|&v| v as u32).sum();
    Some(total as f64 / abilities.len() as f64)
}

/// Initial rating for a newly registered player.
///
/// Without abilities the player starts at the default rating. With abilities the
/// rating moves 50 points per point of average away from the default score 7,
/// never below the rating floor.
pub fn initial_rating(abilities: &AbilityScores, config: &RatingConfig) -> Rating {
    match ability_average(abilities) {
        None => config.default_rating,
        Some(avg) => {
            let offset = ((avg - DEFAULT_ABILITY_SCORE as f64) * RATING_PER_ABILITY_POINT).round();
            (config.default_rating + offset as Rating).max(config.rating_floor)
        }
    }
}
