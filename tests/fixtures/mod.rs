//! Test fixtures shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use matchday::config::{AppConfig, BalanceConfig, SuggestionSettings};
use matchday::error::{MatchdayError, Result};
use matchday::metrics::MetricsCollector;
use matchday::storage::{InMemoryMatchStore, InMemoryPlayerStore, InMemoryVoteStore};
use matchday::teams::{SuggestedTeam, SuggestionProvider, SuggestionRequest, SuggestionResponse};
use matchday::types::{
    AssignmentSource, MatchRecord, PlayerId, PlayerRecord, Rating, TeamAssignment,
};
use matchday::{MatchManager, Stores, TeamAssignmentEngine};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a scripted provider answers
#[derive(Debug, Clone)]
pub enum Script {
    Teams(Vec<SuggestedTeam>),
    Fail,
    Delay(Duration, Vec<SuggestedTeam>),
}

/// Suggestion provider that answers from a script and records requests
pub struct ScriptedSuggestionProvider {
    script: Script,
    calls: AtomicUsize,
    last_request: Mutex<Option<SuggestionRequest>>,
}

impl ScriptedSuggestionProvider {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<SuggestionRequest> {
        self.last_request
            .lock()
            .map(|request| request.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SuggestionProvider for ScriptedSuggestionProvider {
    async fn suggest(&self, request: &SuggestionRequest) -> Result<SuggestionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }

        match &self.script {
            Script::Teams(teams) => Ok(SuggestionResponse {
                teams: teams.clone(),
            }),
            Script::Fail => Err(MatchdayError::upstream("scripted failure")),
            Script::Delay(delay, teams) => {
                tokio::time::sleep(*delay).await;
                Ok(SuggestionResponse {
                    teams: teams.clone(),
                })
            }
        }
    }
}

/// A named side of a suggestion
pub fn side(name: &str, players: &[&str]) -> SuggestedTeam {
    SuggestedTeam {
        name: name.to_string(),
        players: players.iter().map(|p| p.to_string()).collect(),
    }
}

/// Voter identity linked to a fixture player
pub fn owner_of(player_id: &str) -> String {
    format!("u-{}", player_id)
}

/// Stores, metrics and a manager over them
pub struct TestWorld {
    pub stores: Stores,
    pub manager: MatchManager,
    pub metrics: Arc<MetricsCollector>,
}

impl TestWorld {
    /// Local balancing only
    pub fn new() -> Self {
        Self::build(TeamAssignmentEngine::without_suggestions(
            BalanceConfig::default(),
        ))
    }

    /// Suggestions enabled with a 100ms timeout
    pub fn with_provider(provider: Arc<dyn SuggestionProvider>) -> Self {
        let settings = SuggestionSettings {
            enabled: true,
            endpoint: Some("scripted".to_string()),
            api_key: None,
            timeout_ms: 100,
        };
        Self::build(TeamAssignmentEngine::new(
            BalanceConfig::default(),
            settings,
            provider,
        ))
    }

    fn build(engine: TeamAssignmentEngine) -> Self {
        let stores = Stores {
            matches: Arc::new(InMemoryMatchStore::new()),
            players: Arc::new(InMemoryPlayerStore::new()),
            votes: Arc::new(InMemoryVoteStore::new()),
        };
        let metrics = Arc::new(MetricsCollector::new().expect("Failed to create collector"));
        let manager = MatchManager::new(
            stores.clone(),
            engine,
            &AppConfig::default(),
            metrics.clone(),
        );

        Self {
            stores,
            manager,
            metrics,
        }
    }

    /// Insert a player with a fixed id and rating, owned by `u-<id>`
    pub async fn add_player(&self, id: &str, rating: Rating) -> PlayerId {
        self.stores
            .players
            .insert(PlayerRecord::new(id, id.to_uppercase(), rating).with_owner(owner_of(id)))
            .await
            .expect("Failed to insert player");
        id.to_string()
    }

    /// Insert a player nobody has claimed
    pub async fn add_unclaimed_player(&self, id: &str, rating: Rating) -> PlayerId {
        self.stores
            .players
            .insert(PlayerRecord::new(id, id.to_uppercase(), rating))
            .await
            .expect("Failed to insert player");
        id.to_string()
    }

    /// Create a match with a fixed split and finalize it
    pub async fn finalized_match(
        &self,
        team_a: &[&str],
        team_b: &[&str],
        score_a: u32,
        score_b: u32,
    ) -> MatchRecord {
        let participants: Vec<PlayerId> = team_a
            .iter()
            .chain(team_b.iter())
            .map(|p| p.to_string())
            .collect();
        let record = self
            .manager
            .create_match("sunday-league", &participants, None)
            .await
            .expect("Failed to create match");

        let split = TeamAssignment::new(
            team_a.iter().map(|p| p.to_string()).collect(),
            team_b.iter().map(|p| p.to_string()).collect(),
            7,
            AssignmentSource::Deterministic,
        );
        self.stores
            .matches
            .save_teams(&record.id, split)
            .await
            .expect("Failed to save teams");

        self.manager
            .finalize_match(&record.id, score_a, score_b)
            .await
            .expect("Failed to finalize match")
    }

    pub async fn rating_of(&self, player_id: &str) -> Rating {
        self.stores
            .players
            .get(player_id)
            .await
            .expect("Failed to read player")
            .expect("Player missing")
            .rating
    }
}
