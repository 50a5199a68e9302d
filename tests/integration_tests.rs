//! Integration tests for the matchday engine
//!
//! These tests drive the match manager end to end over the in-memory stores:
//! - team generation with and without a suggestion provider
//! - finalization and games played
//! - peer feedback votes and progress
//! - one-shot rating settlement and its gating

mod fixtures;

use fixtures::{owner_of, side, Script, ScriptedSuggestionProvider, TestWorld};
use matchday::types::{AssignmentSource, MatchStatus, TeamSide, VoteValue};
use matchday::MatchdayError;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_complete_match_lifecycle() {
    let provider = Arc::new(ScriptedSuggestionProvider::new(Script::Teams(vec![
        side("A", &["a1", "a2"]),
        side("B", &["b1", "b2"]),
    ])));
    let world = TestWorld::with_provider(provider.clone());
    for id in ["a1", "a2", "b1", "b2"] {
        world.add_player(id, 1000).await;
    }

    // Step 1: create and split
    let ids: Vec<String> = ["a1", "a2", "b1", "b2"].iter().map(|s| s.to_string()).collect();
    let record = world
        .manager
        .create_match("sunday-league", &ids, None)
        .await
        .unwrap();
    let (record, outcome) = world
        .manager
        .generate_teams(&record.id, Some(42))
        .await
        .unwrap();

    assert_eq!(provider.calls(), 1);
    assert_eq!(provider.last_request().unwrap().seed, 42);
    assert_eq!(outcome.source, AssignmentSource::Suggested);
    assert_eq!(outcome.team_a, vec!["a1", "a2"]);
    assert_eq!(outcome.team_b, vec!["b1", "b2"]);
    assert_eq!(record.status, MatchStatus::TeamsAssigned);

    // Step 2: finalize, side A wins
    let record = world
        .manager
        .finalize_match(&record.id, 3, 1)
        .await
        .unwrap();
    assert_eq!(record.status, MatchStatus::Finalized);

    // Step 3: two up votes for a1
    for voter in [owner_of("a2"), owner_of("b1")] {
        world
            .manager
            .cast_vote(&record.id, "a1", &voter, VoteValue::Up, None)
            .await
            .unwrap();
    }

    // Step 4: settle
    let report = world
        .manager
        .apply_ratings(&record.id, false)
        .await
        .unwrap();
    assert_eq!(report.changes.len(), 4);

    assert_eq!(world.rating_of("a1").await, 1014);
    assert_eq!(world.rating_of("a2").await, 1010);
    assert_eq!(world.rating_of("b1").await, 990);
    assert_eq!(world.rating_of("b2").await, 990);

    let a1 = world.stores.players.get("a1").await.unwrap().unwrap();
    assert_eq!(a1.games_played, 1);
    assert_eq!(a1.rating_history.len(), 1);
    assert_eq!(a1.rating_history[0].old, 1000);
    assert_eq!(a1.rating_history[0].new, 1014);

    let settled = world.manager.get_match(&record.id).await.unwrap().unwrap();
    assert!(settled.rating_applied);
    assert_eq!(settled.status, MatchStatus::RatingsApplied);
    assert_eq!(settled.rating_changes, report.changes);

    let stats = world.manager.get_stats().unwrap();
    assert_eq!(stats.matches_created, 1);
    assert_eq!(stats.teams_generated, 1);
    assert_eq!(stats.matches_finalized, 1);
    assert_eq!(stats.votes_cast, 2);
    assert_eq!(stats.settlements_applied, 1);
}

#[tokio::test]
async fn test_settlement_winner_with_two_up_votes() {
    let world = TestWorld::new();
    for id in ["p", "q"] {
        world.add_player(id, 1000).await;
    }
    let record = world.finalized_match(&["p"], &["q"], 3, 1).await;

    for voter in ["v1", "v2"] {
        world
            .manager
            .cast_vote(&record.id, "p", voter, VoteValue::Up, None)
            .await
            .unwrap();
    }

    let report = world.manager.apply_ratings(&record.id, false).await.unwrap();
    let change = report
        .changes
        .iter()
        .find(|c| c.player_id == "p")
        .unwrap();
    assert_eq!(change.side, TeamSide::A);
    assert_eq!(change.before, 1000);
    assert_eq!(change.delta, 14);
    assert_eq!(change.after, 1014);
}

#[tokio::test]
async fn test_require_full_reports_missing_vote() {
    let world = TestWorld::new();
    for id in ["x", "y"] {
        world.add_player(id, 1000).await;
    }
    let record = world.finalized_match(&["x"], &["y"], 1, 1).await;

    let ux = owner_of("x");
    let uy = owner_of("y");
    for (voter, player) in [(&ux, "x"), (&ux, "y"), (&uy, "x")] {
        world
            .manager
            .cast_vote(&record.id, player, voter, VoteValue::Neutral, None)
            .await
            .unwrap();
    }

    let err = world
        .manager
        .apply_ratings(&record.id, true)
        .await
        .unwrap_err();
    let progress = match err {
        MatchdayError::Conflict {
            progress: Some(progress),
            ..
        } => progress,
        other => panic!("expected a conflict with progress, got {:?}", other),
    };

    assert!(!progress.all_voters_completed_all_players);
    assert!(progress.all_players_have_at_least_one_vote);
    let missing = progress.voter(&uy).unwrap();
    assert_eq!(missing.remaining.iter().collect::<Vec<_>>(), vec!["y"]);
    assert!(progress.voter(&ux).unwrap().is_complete());

    // Nothing was applied
    assert_eq!(world.rating_of("x").await, 1000);
    let stored = world.manager.get_match(&record.id).await.unwrap().unwrap();
    assert!(!stored.rating_applied);

    // The last vote unblocks settlement
    world
        .manager
        .cast_vote(&record.id, "y", &uy, VoteValue::Neutral, None)
        .await
        .unwrap();
    let report = world.manager.apply_ratings(&record.id, true).await.unwrap();
    assert!(report.changes.iter().all(|c| c.delta == 2));
}

#[tokio::test]
async fn test_second_settlement_is_conflict() {
    let world = TestWorld::new();
    for id in ["p", "q"] {
        world.add_player(id, 1000).await;
    }
    let record = world.finalized_match(&["p"], &["q"], 0, 2).await;

    let first = world.manager.apply_ratings(&record.id, false).await.unwrap();
    let err = world
        .manager
        .apply_ratings(&record.id, false)
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    let stored = world.manager.get_match(&record.id).await.unwrap().unwrap();
    assert_eq!(stored.rating_changes, first.changes);
    assert_eq!(world.rating_of("p").await, 990);
    assert_eq!(world.rating_of("q").await, 1010);
    assert_eq!(world.manager.get_stats().unwrap().settlement_conflicts, 1);
}

#[tokio::test]
async fn test_votes_closed_after_settlement() {
    let world = TestWorld::new();
    for id in ["p", "q"] {
        world.add_player(id, 1000).await;
    }
    let record = world.finalized_match(&["p"], &["q"], 1, 0).await;
    world.manager.apply_ratings(&record.id, false).await.unwrap();

    let err = world
        .manager
        .cast_vote(&record.id, "p", "late-voter", VoteValue::Down, None)
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_vote_on_ineligible_player_forbidden() {
    let world = TestWorld::new();
    for id in ["p", "q", "outsider"] {
        world.add_player(id, 1000).await;
    }
    let record = world.finalized_match(&["p"], &["q"], 1, 0).await;

    let err = world
        .manager
        .cast_vote(&record.id, "outsider", "v1", VoteValue::Up, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "forbidden");
}

#[tokio::test]
async fn test_vote_upsert_keeps_latest() {
    let world = TestWorld::new();
    for id in ["p", "q"] {
        world.add_player(id, 1000).await;
    }
    let record = world.finalized_match(&["p"], &["q"], 1, 0).await;

    for value in [VoteValue::Up, VoteValue::Down] {
        world
            .manager
            .cast_vote(&record.id, "q", "v1", value, None)
            .await
            .unwrap();
    }

    let votes = world
        .stores
        .votes
        .list_for_match(&record.id)
        .await
        .unwrap();
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0].value, VoteValue::Down);

    let progress = world.manager.compute_progress(&record.id).await.unwrap();
    let q = progress.player("q").unwrap();
    assert_eq!((q.up, q.down, q.distinct_voters), (0, 1, 1));
}

#[tokio::test]
async fn test_tiers_and_floor() {
    let world = TestWorld::new();
    world.add_player("rookie", 900).await;
    world.add_player("veteran", 505).await;
    let record = world.finalized_match(&["rookie"], &["veteran"], 4, 0).await;

    for voter in ["v1", "v2", "v3", "v4"] {
        world
            .manager
            .cast_vote(&record.id, "rookie", voter, VoteValue::Up, None)
            .await
            .unwrap();
        world
            .manager
            .cast_vote(&record.id, "veteran", voter, VoteValue::Down, None)
            .await
            .unwrap();
    }

    world.manager.apply_ratings(&record.id, false).await.unwrap();

    // (10 + 6) * 1.2 = 19.2
    assert_eq!(world.rating_of("rookie").await, 919);
    // (-10 - 6) * 1.2 = -19.2, held at the floor
    assert_eq!(world.rating_of("veteran").await, 500);
}

#[tokio::test]
async fn test_unclaimed_players_are_not_expected_voters() {
    let world = TestWorld::new();
    world.add_player("claimed", 1000).await;
    world.add_unclaimed_player("guest", 1000).await;
    let record = world.finalized_match(&["claimed"], &["guest"], 1, 0).await;

    for player in ["claimed", "guest"] {
        world
            .manager
            .cast_vote(&record.id, player, &owner_of("claimed"), VoteValue::Up, None)
            .await
            .unwrap();
    }

    let progress = world.manager.compute_progress(&record.id).await.unwrap();
    assert_eq!(progress.voters.len(), 1);
    assert!(progress.all_voters_completed_all_players);
    world.manager.apply_ratings(&record.id, true).await.unwrap();
}

#[tokio::test]
async fn test_failing_provider_falls_back_to_shuffle() {
    let provider = Arc::new(ScriptedSuggestionProvider::new(Script::Fail));
    let world = TestWorld::with_provider(provider.clone());
    let mut ids = Vec::new();
    for (i, rating) in [1200, 1000, 900, 800, 1100, 950].into_iter().enumerate() {
        ids.push(world.add_player(&format!("p{}", i), rating).await);
    }
    let record = world
        .manager
        .create_match("sunday-league", &ids, None)
        .await
        .unwrap();

    let (_, first) = world
        .manager
        .generate_teams(&record.id, Some(9))
        .await
        .unwrap();
    let (_, second) = world
        .manager
        .generate_teams(&record.id, Some(9))
        .await
        .unwrap();

    assert_eq!(provider.calls(), 2);
    assert_eq!(first.source, AssignmentSource::Shuffled);
    assert_eq!(first.team_a, second.team_a);
    assert_eq!(first.team_b, second.team_b);
    assert_eq!(first.team_a.len(), 3);
    assert_eq!(first.team_b.len(), 3);
}

#[tokio::test]
async fn test_unusable_suggestion_is_reported() {
    let provider = Arc::new(ScriptedSuggestionProvider::new(Script::Teams(vec![
        side("red", &["p1"]),
        side("blue", &["p2"]),
        side("green", &["p3"]),
    ])));
    let world = TestWorld::with_provider(provider);
    let mut ids = Vec::new();
    for id in ["p1", "p2", "p3", "p4"] {
        ids.push(world.add_player(id, 1000).await);
    }
    let record = world
        .manager
        .create_match("sunday-league", &ids, None)
        .await
        .unwrap();

    let (_, outcome) = world
        .manager
        .generate_teams(&record.id, Some(1))
        .await
        .unwrap();
    assert_eq!(outcome.source, AssignmentSource::Shuffled);
    assert!(outcome.suggestion_rejected.is_some());
}

#[tokio::test]
async fn test_partial_suggestion_is_completed() {
    let provider = Arc::new(ScriptedSuggestionProvider::new(Script::Teams(vec![
        side("Bibs", &["p1", "ghost"]),
        side("Skins", &["p2", "p1"]),
    ])));
    let world = TestWorld::with_provider(provider);
    let mut ids = Vec::new();
    for id in ["p1", "p2", "p3", "p4"] {
        ids.push(world.add_player(id, 1000).await);
    }
    let record = world
        .manager
        .create_match("sunday-league", &ids, None)
        .await
        .unwrap();

    let (_, outcome) = world
        .manager
        .generate_teams(&record.id, Some(5))
        .await
        .unwrap();

    assert_eq!(outcome.source, AssignmentSource::Suggested);
    assert_eq!(outcome.team_a[0], "p1");
    assert_eq!(outcome.team_b[0], "p2");
    let mut all: Vec<&String> = outcome.team_a.iter().chain(&outcome.team_b).collect();
    all.sort();
    assert_eq!(all, vec!["p1", "p2", "p3", "p4"]);
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let provider = Arc::new(ScriptedSuggestionProvider::new(Script::Delay(
        Duration::from_millis(500),
        vec![side("A", &["p1"]), side("B", &["p2"])],
    )));
    let world = TestWorld::with_provider(provider);
    let mut ids = Vec::new();
    for id in ["p1", "p2"] {
        ids.push(world.add_player(id, 1000).await);
    }
    let record = world
        .manager
        .create_match("sunday-league", &ids, None)
        .await
        .unwrap();

    let (_, outcome) = world
        .manager
        .generate_teams(&record.id, Some(3))
        .await
        .unwrap();
    assert_eq!(outcome.source, AssignmentSource::Shuffled);
}

#[tokio::test]
async fn test_finalize_requires_teams_and_counts_once() {
    let world = TestWorld::new();
    for id in ["p", "q"] {
        world.add_player(id, 1000).await;
    }
    let ids = vec!["p".to_string(), "q".to_string()];
    let record = world
        .manager
        .create_match("sunday-league", &ids, None)
        .await
        .unwrap();

    let err = world
        .manager
        .finalize_match(&record.id, 1, 0)
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    world
        .manager
        .generate_teams(&record.id, Some(11))
        .await
        .unwrap();
    world.manager.finalize_match(&record.id, 1, 0).await.unwrap();
    world.manager.finalize_match(&record.id, 2, 0).await.unwrap();

    let p = world.stores.players.get("p").await.unwrap().unwrap();
    assert_eq!(p.games_played, 1);

    world.manager.apply_ratings(&record.id, false).await.unwrap();
    let err = world
        .manager
        .finalize_match(&record.id, 0, 3)
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_list_matches_by_group() {
    let world = TestWorld::new();
    world.add_player("p", 1000).await;
    let ids = vec!["p".to_string()];

    world.manager.create_match("g1", &ids, None).await.unwrap();
    world.manager.create_match("g1", &ids, None).await.unwrap();
    world.manager.create_match("g2", &ids, None).await.unwrap();

    assert_eq!(world.manager.list_matches("g1").await.unwrap().len(), 2);
    assert_eq!(world.manager.list_matches("g2").await.unwrap().len(), 1);
    assert!(world.manager.list_matches("g3").await.unwrap().is_empty());
}
