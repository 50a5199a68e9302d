//! External team suggestion boundary
//!
//! A provider proposes two named sides for a participant list. Its answer is
//! untrusted: [`validate_suggestion`] filters it down to known, unique ids and
//! anything unusable is reported as a [`SuggestionRejection`] so the engine can
//! fall back to the local partition.

use crate::error::{MatchdayError, Result};
use crate::types::{Participant, PlayerId, TeamSide};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

/// Payload sent to a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionRequest {
    pub participants: Vec<Participant>,
    pub seed: u32,
}

/// One proposed side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedTeam {
    pub name: String,
    pub players: Vec<String>,
}

/// Provider answer, as received
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionResponse {
    pub teams: Vec<SuggestedTeam>,
}

/// Suggestion handed to the assignment engine
#[derive(Debug, Clone, PartialEq)]
pub enum Suggestion {
    Teams(Vec<SuggestedTeam>),
    None,
}

impl From<SuggestionResponse> for Suggestion {
    fn from(response: SuggestionResponse) -> Self {
        Suggestion::Teams(response.teams)
    }
}

/// Why a suggestion could not be used
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SuggestionRejection {
    #[error("no suggestion supplied")]
    Absent,
    #[error("suggestion names {0} sides, at most 2 allowed")]
    TooManySides(usize),
    #[error("suggestion contains no known participant")]
    NoKnownPlayers,
}

impl SuggestionRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionRejection::Absent => "absent",
            SuggestionRejection::TooManySides(_) => "too_many_sides",
            SuggestionRejection::NoKnownPlayers => "no_known_players",
        }
    }
}

/// Suggestion reduced to known, unique participant ids
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedSuggestion {
    pub team_a: Vec<PlayerId>,
    pub team_b: Vec<PlayerId>,
    /// Entries dropped as unknown or duplicate
    pub dropped: usize,
}

/// Map proposed sides onto A and B.
///
/// Sides literally named "A" and "B" keep their names; otherwise the first
/// proposed side becomes A and the second B.
fn side_order(teams: &[SuggestedTeam]) -> Vec<TeamSide> {
    let names: Vec<String> = teams
        .iter()
        .map(|t| t.name.trim().to_ascii_uppercase())
        .collect();

    let named = match names.as_slice() {
        [a] if a == "B" => Some(vec![TeamSide::B]),
        [a, b] if a == "A" && b == "B" => Some(vec![TeamSide::A, TeamSide::B]),
        [a, b] if a == "B" && b == "A" => Some(vec![TeamSide::B, TeamSide::A]),
        _ => None,
    };

    named.unwrap_or_else(|| {
        [TeamSide::A, TeamSide::B]
            .into_iter()
            .take(teams.len())
            .collect()
    })
}

/// Validate and repair a suggestion against the participant list
pub fn validate_suggestion(
    suggestion: &Suggestion,
    participants: &[Participant],
) -> std::result::Result<ValidatedSuggestion, SuggestionRejection> {
    let teams = match suggestion {
        Suggestion::None => return Err(SuggestionRejection::Absent),
        Suggestion::Teams(teams) if teams.is_empty() => return Err(SuggestionRejection::Absent),
        Suggestion::Teams(teams) if teams.len() > 2 => {
            return Err(SuggestionRejection::TooManySides(teams.len()))
        }
        Suggestion::Teams(teams) => teams,
    };

    let known: HashSet<&str> = participants.iter().map(|p| p.id.as_str()).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut validated = ValidatedSuggestion::default();

    // side A is filled first so an id proposed on both sides stays on A
    let mut ordered: Vec<(TeamSide, &SuggestedTeam)> =
        side_order(teams).into_iter().zip(teams.iter()).collect();
    ordered.sort_by_key(|(side, _)| *side);

    for (side, team) in ordered {
        for id in &team.players {
            let id = id.trim();
            if !known.contains(id) || !seen.insert(id) {
                validated.dropped += 1;
                continue;
            }
            match side {
                TeamSide::A => validated.team_a.push(id.to_string()),
                TeamSide::B => validated.team_b.push(id.to_string()),
            }
        }
    }

    if validated.team_a.is_empty() && validated.team_b.is_empty() {
        return Err(SuggestionRejection::NoKnownPlayers);
    }

    debug!(
        "Suggestion validated - side A: {}, side B: {}, dropped: {}",
        validated.team_a.len(),
        validated.team_b.len(),
        validated.dropped
    );

    Ok(validated)
}

/// Source of external team suggestions
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SuggestionProvider: Send + Sync {
    /// Propose two sides for the participants. Any failure is reported as
    /// `UpstreamUnavailable`; the engine recovers from it locally.
    async fn suggest(&self, request: &SuggestionRequest) -> Result<SuggestionResponse>;
}

/// Provider used when suggestions are switched off
#[derive(Debug, Clone, Default)]
pub struct DisabledSuggestionProvider;

#[async_trait]
impl SuggestionProvider for DisabledSuggestionProvider {
    async fn suggest(&self, _request: &SuggestionRequest) -> Result<SuggestionResponse> {
        Err(MatchdayError::upstream("suggestion provider disabled"))
    }
}

/// Provider reached over HTTP: POSTs the request as JSON and expects a
/// `{"teams": [{"name", "players"}]}` body back
#[derive(Debug, Clone)]
pub struct HttpSuggestionProvider {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpSuggestionProvider {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MatchdayError::internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SuggestionProvider for HttpSuggestionProvider {
    async fn suggest(&self, request: &SuggestionRequest) -> Result<SuggestionResponse> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| MatchdayError::upstream(format!("suggestion request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MatchdayError::upstream(format!(
                "suggestion provider answered {}",
                status
            )));
        }

        response
            .json::<SuggestionResponse>()
            .await
            .map_err(|e| MatchdayError::upstream(format!("malformed suggestion: {}", e)))
    }
}
