//! Common types used throughout the matchday engine

use crate::abilities::AbilityScores;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

/// Unique identifier for players
pub type PlayerId = String;

/// Unique identifier for matches
pub type MatchId = String;

/// Identity of someone who casts feedback votes (the account owning a player)
pub type VoterId = String;

/// Unique identifier for groups
pub type GroupId = String;

/// Skill rating. Integer points, default 1000, floor 500.
pub type Rating = i32;

/// A player eligible for a given match, as seen by the assignment engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: PlayerId,
    #[serde(default)]
    pub name: String,
    pub rating: Rating,
    #[serde(default)]
    pub abilities: AbilityScores,
}

impl Participant {
    pub fn new(id: impl Into<PlayerId>, rating: Rating) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            rating,
            abilities: AbilityScores::new(),
        }
    }
}

/// One of the two sides of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TeamSide {
    A,
    B,
}

impl TeamSide {
    pub fn other(self) -> Self {
        match self {
            TeamSide::A => TeamSide::B,
            TeamSide::B => TeamSide::A,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TeamSide::A => "A",
            TeamSide::B => "B",
        }
    }
}

impl std::fmt::Display for TeamSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Players of one side plus the score it reached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRoster {
    pub name: TeamSide,
    pub players: Vec<PlayerId>,
    pub score: u32,
}

impl TeamRoster {
    pub fn new(name: TeamSide, players: Vec<PlayerId>) -> Self {
        Self {
            name,
            players,
            score: 0,
        }
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.players.iter().any(|p| p == player_id)
    }
}

/// How a team split was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentSource {
    /// External suggestion, repaired and completed locally
    Suggested,
    /// Seeded shuffle followed by the greedy partition
    Shuffled,
    /// Greedy partition over the input as given
    Deterministic,
}

impl AssignmentSource {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentSource::Suggested => "suggested",
            AssignmentSource::Shuffled => "shuffled",
            AssignmentSource::Deterministic => "deterministic",
        }
    }
}

/// The persisted split of a match into sides A and B
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamAssignment {
    pub team_a: TeamRoster,
    pub team_b: TeamRoster,
    /// Seed the split was generated with, surfaced so it can be repeated
    pub seed: u32,
    pub source: AssignmentSource,
    pub assigned_at: DateTime<Utc>,
}

impl TeamAssignment {
    pub fn new(
        team_a: Vec<PlayerId>,
        team_b: Vec<PlayerId>,
        seed: u32,
        source: AssignmentSource,
    ) -> Self {
        Self {
            team_a: TeamRoster::new(TeamSide::A, team_a),
            team_b: TeamRoster::new(TeamSide::B, team_b),
            seed,
            source,
            assigned_at: Utc::now(),
        }
    }

    pub fn roster(&self, side: TeamSide) -> &TeamRoster {
        match side {
            TeamSide::A => &self.team_a,
            TeamSide::B => &self.team_b,
        }
    }

    pub fn roster_mut(&mut self, side: TeamSide) -> &mut TeamRoster {
        match side {
            TeamSide::A => &mut self.team_a,
            TeamSide::B => &mut self.team_b,
        }
    }

    /// Which side a player is on, if any
    pub fn side_of(&self, player_id: &str) -> Option<TeamSide> {
        if self.team_a.contains(player_id) {
            Some(TeamSide::A)
        } else if self.team_b.contains(player_id) {
            Some(TeamSide::B)
        } else {
            None
        }
    }

    /// Every (side, player) pair, side A first
    pub fn members(&self) -> impl Iterator<Item = (TeamSide, &PlayerId)> {
        self.team_a
            .players
            .iter()
            .map(|p| (TeamSide::A, p))
            .chain(self.team_b.players.iter().map(|p| (TeamSide::B, p)))
    }
}

/// Lifecycle state of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Pending,
    TeamsAssigned,
    Finalized,
    RatingsApplied,
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStatus::Pending => write!(f, "pending"),
            MatchStatus::TeamsAssigned => write!(f, "teams_assigned"),
            MatchStatus::Finalized => write!(f, "finalized"),
            MatchStatus::RatingsApplied => write!(f, "ratings_applied"),
        }
    }
}

/// Result of a match from one side's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SideOutcome {
    Win,
    Lose,
    Draw,
}

impl SideOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            SideOutcome::Win => "win",
            SideOutcome::Lose => "lose",
            SideOutcome::Draw => "draw",
        }
    }
}

/// Final scores of a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub score_a: u32,
    pub score_b: u32,
    pub finalized_at: DateTime<Utc>,
}

impl MatchResult {
    pub fn new(score_a: u32, score_b: u32) -> Self {
        Self {
            score_a,
            score_b,
            finalized_at: Utc::now(),
        }
    }

    pub fn score(&self, side: TeamSide) -> u32 {
        match side {
            TeamSide::A => self.score_a,
            TeamSide::B => self.score_b,
        }
    }

    pub fn outcome_for(&self, side: TeamSide) -> SideOutcome {
        let own = self.score(side);
        let other = self.score(side.other());
        if own > other {
            SideOutcome::Win
        } else if own < other {
            SideOutcome::Lose
        } else {
            SideOutcome::Draw
        }
    }

    pub fn winner(&self) -> Option<TeamSide> {
        match self.outcome_for(TeamSide::A) {
            SideOutcome::Win => Some(TeamSide::A),
            SideOutcome::Lose => Some(TeamSide::B),
            SideOutcome::Draw => None,
        }
    }
}

/// Peer feedback value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteValue {
    Up,
    Neutral,
    Down,
}

impl VoteValue {
    pub fn as_str(self) -> &'static str {
        match self {
            VoteValue::Up => "up",
            VoteValue::Neutral => "neutral",
            VoteValue::Down => "down",
        }
    }
}

impl FromStr for VoteValue {
    type Err = crate::error::MatchdayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(VoteValue::Up),
            "neutral" => Ok(VoteValue::Neutral),
            "down" => Ok(VoteValue::Down),
            other => Err(crate::error::MatchdayError::invalid_input(format!(
                "unknown vote value '{}'",
                other
            ))),
        }
    }
}

/// Composite key of a vote; a later cast with the same key replaces the earlier one
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoteKey {
    pub match_id: MatchId,
    pub player_id: PlayerId,
    pub voter_id: VoterId,
}

/// One voter's judgment on one player for one match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub match_id: MatchId,
    pub player_id: PlayerId,
    pub voter_id: VoterId,
    pub value: VoteValue,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vote {
    pub fn new(
        match_id: impl Into<MatchId>,
        player_id: impl Into<PlayerId>,
        voter_id: impl Into<VoterId>,
        value: VoteValue,
    ) -> Self {
        let now = Utc::now();
        Self {
            match_id: match_id.into(),
            player_id: player_id.into(),
            voter_id: voter_id.into(),
            value,
            note: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }

    pub fn key(&self) -> VoteKey {
        VoteKey {
            match_id: self.match_id.clone(),
            player_id: self.player_id.clone(),
            voter_id: self.voter_id.clone(),
        }
    }
}

/// Rating movement of one player in one settled match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingChange {
    pub player_id: PlayerId,
    pub side: TeamSide,
    pub before: Rating,
    pub after: Rating,
    pub delta: Rating,
}

/// Persisted state of a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: MatchId,
    pub group_id: GroupId,
    pub participants: Vec<PlayerId>,
    pub teams: Option<TeamAssignment>,
    pub status: MatchStatus,
    pub result: Option<MatchResult>,
    /// Terminal gate: once true, settlement never runs again for this match
    pub rating_applied: bool,
    pub rating_changes: Vec<RatingChange>,
    /// Every committed change has reached the player store
    #[serde(default)]
    pub ratings_persisted: bool,
    /// Bumped by every stored mutation, including accepted votes
    #[serde(default)]
    pub revision: u64,
    /// Votes between their admission and their write
    #[serde(default)]
    pub votes_in_flight: u32,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MatchRecord {
    pub fn new(
        id: impl Into<MatchId>,
        group_id: impl Into<GroupId>,
        participants: Vec<PlayerId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            group_id: group_id.into(),
            participants,
            teams: None,
            status: MatchStatus::Pending,
            result: None,
            rating_applied: false,
            rating_changes: Vec::new(),
            ratings_persisted: false,
            revision: 0,
            votes_in_flight: 0,
            scheduled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Original participants plus anyone placed on a side
    pub fn eligible_players(&self) -> BTreeSet<PlayerId> {
        let mut eligible: BTreeSet<PlayerId> = self.participants.iter().cloned().collect();
        if let Some(teams) = &self.teams {
            eligible.extend(teams.members().map(|(_, p)| p.clone()));
        }
        eligible
    }

    pub fn is_eligible(&self, player_id: &str) -> bool {
        self.participants.iter().any(|p| p == player_id)
            || self
                .teams
                .as_ref()
                .is_some_and(|t| t.side_of(player_id).is_some())
    }

    /// Committed but the player write has not completed yet
    pub fn settlement_pending(&self) -> bool {
        self.rating_applied && !self.ratings_persisted
    }

    pub fn is_finalized(&self) -> bool {
        matches!(
            self.status,
            MatchStatus::Finalized | MatchStatus::RatingsApplied
        )
    }
}

/// Rating history entry appended by each settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingHistoryEntry {
    pub match_id: MatchId,
    pub old: Rating,
    pub new: Rating,
    pub recorded_at: DateTime<Utc>,
}

/// Player registry entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub name: String,
    pub rating: Rating,
    pub abilities: AbilityScores,
    /// Voter identity linked to this player, if the player has claimed an account
    pub owner: Option<VoterId>,
    pub games_played: u32,
    pub rating_history: Vec<RatingHistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PlayerRecord {
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>, rating: Rating) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            rating,
            abilities: AbilityScores::new(),
            owner: None,
            games_played: 0,
            rating_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_owner(mut self, owner: impl Into<VoterId>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_abilities(mut self, abilities: AbilityScores) -> Self {
        self.abilities = abilities;
        self
    }

    pub fn to_participant(&self) -> Participant {
        Participant {
            id: self.id.clone(),
            name: self.name.clone(),
            rating: self.rating,
            abilities: self.abilities.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_derivation() {
        let result = MatchResult::new(3, 1);
        assert_eq!(result.outcome_for(TeamSide::A), SideOutcome::Win);
        assert_eq!(result.outcome_for(TeamSide::B), SideOutcome::Lose);
        assert_eq!(result.winner(), Some(TeamSide::A));

        let draw = MatchResult::new(2, 2);
        assert_eq!(draw.outcome_for(TeamSide::A), SideOutcome::Draw);
        assert_eq!(draw.outcome_for(TeamSide::B), SideOutcome::Draw);
        assert_eq!(draw.winner(), None);
    }

    #[test]
    fn test_eligible_players_include_team_members() {
        let mut record = MatchRecord::new("m1", "g1", vec!["p1".to_string(), "p2".to_string()]);
        record.teams = Some(TeamAssignment::new(
            vec!["p1".to_string(), "p3".to_string()],
            vec!["p2".to_string()],
            7,
            AssignmentSource::Shuffled,
        ));

        let eligible = record.eligible_players();
        assert_eq!(eligible.len(), 3);
        assert!(record.is_eligible("p3"));
        assert!(!record.is_eligible("p4"));
    }

    #[test]
    fn test_vote_value_parsing() {
        assert_eq!("up".parse::<VoteValue>().unwrap(), VoteValue::Up);
        assert_eq!(" Down ".parse::<VoteValue>().unwrap(), VoteValue::Down);
        assert!("maybe".parse::<VoteValue>().is_err());
    }

    #[test]
    fn test_side_lookup() {
        let teams = TeamAssignment::new(
            vec!["a".to_string()],
            vec!["b".to_string()],
            1,
            AssignmentSource::Deterministic,
        );
        assert_eq!(teams.side_of("a"), Some(TeamSide::A));
        assert_eq!(teams.side_of("b"), Some(TeamSide::B));
        assert_eq!(teams.side_of("c"), None);
        assert_eq!(teams.members().count(), 2);
    }
}
