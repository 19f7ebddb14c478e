//! Reward ledger and leaderboard behavior over the in-memory store

use std::sync::Arc;

use chrono::Utc;
use citizenwater_core::{
    Badge, CitizenId, CoreError, MemoryRewardStore, Observation, ObservationSubmission,
    RewardLedger, ValidationFailure,
};

fn ledger() -> RewardLedger {
    RewardLedger::new(Arc::new(MemoryRewardStore::new()))
}

fn citizen(id: &str) -> CitizenId {
    CitizenId::parse(id).unwrap()
}

#[tokio::test]
async fn first_valid_observation_earns_ten_points() {
    let ledger = ledger();
    let reward = ledger.record_observation(&citizen("c1"), false).await.unwrap();

    assert_eq!(reward.total_points, 10);
    assert_eq!(reward.valid_observations, 1);
    assert_eq!(reward.complete_observations, 0);
    assert_eq!(reward.current_badge, Badge::None);
}

#[tokio::test]
async fn first_complete_observation_earns_twenty_points() {
    let ledger = ledger();
    let reward = ledger.record_observation(&citizen("c1"), true).await.unwrap();

    assert_eq!(reward.total_points, 20);
    assert_eq!(reward.valid_observations, 1);
    assert_eq!(reward.complete_observations, 1);
}

#[tokio::test]
async fn bronze_then_silver_progression() {
    let ledger = ledger();
    let id = citizen("c1");

    let mut reward = None;
    for _ in 0..5 {
        reward = Some(ledger.record_observation(&id, true).await.unwrap());
    }
    let reward = reward.unwrap();
    assert_eq!(reward.total_points, 100);
    assert_eq!(reward.current_badge, Badge::Bronze);
    assert_eq!(reward.badges, vec![Badge::Bronze]);

    for _ in 0..4 {
        ledger.record_observation(&id, true).await.unwrap();
    }
    let reward = ledger.record_observation(&id, true).await.unwrap();
    assert_eq!(reward.total_points, 200);
    assert_eq!(reward.current_badge, Badge::Silver);
    assert_eq!(reward.badges, vec![Badge::Bronze, Badge::Silver]);
}

#[tokio::test]
async fn jump_past_every_threshold_awards_gold_only() {
    let ledger = ledger();
    let id = citizen("c1");

    // Raw adjustment leaves badges alone; the next observation evaluates them
    let adjusted = ledger.add_points(&id, 490).await.unwrap();
    assert!(adjusted.badges.is_empty());

    let reward = ledger.record_observation(&id, false).await.unwrap();
    assert_eq!(reward.total_points, 500);
    assert_eq!(reward.badges, vec![Badge::Gold]);
    assert_eq!(reward.current_badge, Badge::Gold);
}

#[tokio::test]
async fn reset_zeroes_everything() {
    let ledger = ledger();
    let id = citizen("c1");
    for _ in 0..12 {
        ledger.record_observation(&id, true).await.unwrap();
    }

    let reward = ledger.reset(&id).await.unwrap();
    assert_eq!(reward.total_points, 0);
    assert_eq!(reward.valid_observations, 0);
    assert_eq!(reward.complete_observations, 0);
    assert!(reward.badges.is_empty());
    assert_eq!(reward.current_badge, Badge::None);
}

#[tokio::test]
async fn reset_creates_missing_row() {
    let ledger = ledger();
    let reward = ledger.reset(&citizen("new")).await.unwrap();

    assert_eq!(reward.total_points, 0);
    assert!(ledger.find(&citizen("new")).await.unwrap().is_some());
}

#[tokio::test]
async fn top_three_of_four() {
    let ledger = ledger();
    for (id, points) in [("a", 500), ("b", 200), ("c", 100), ("d", 50)] {
        ledger.add_points(&citizen(id), points).await.unwrap();
    }

    let board = ledger.leaderboard().await.unwrap();
    let points: Vec<i64> = board.top_n(3).iter().map(|r| r.total_points).collect();
    assert_eq!(points, vec![500, 200, 100]);
}

#[tokio::test]
async fn rank_of_leader_and_absent_citizen() {
    let ledger = ledger();
    for (id, points) in [("a", 30), ("b", 90), ("c", 10), ("d", 60), ("e", 20)] {
        ledger.add_points(&citizen(id), points).await.unwrap();
    }

    let board = ledger.leaderboard().await.unwrap();
    assert_eq!(board.rank_of(&citizen("b")), Some(1));
    assert_eq!(board.rank_of(&citizen("zz")), None);
}

#[tokio::test]
async fn get_or_create_is_idempotent() {
    let ledger = ledger();
    let id = citizen("fresh");

    let first = ledger.get_or_create(&id).await.unwrap();
    let second = ledger.get_or_create(&id).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.total_points, 0);
    assert_eq!(first.current_badge, Badge::None);
    assert_eq!(ledger.snapshot().await.unwrap().len(), 1);
}

#[test]
fn invalid_submission_never_becomes_an_observation() {
    let submission = ObservationSubmission {
        citizen_id: Some("c1".into()),
        postcode: Some("AB1 2CD".into()),
        ..Default::default()
    };

    match Observation::from_submission(submission, Utc::now()) {
        Err(CoreError::InvalidObservation(reason)) => {
            assert_eq!(reason, ValidationFailure::NoMeasurementOrNote)
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[test]
fn valid_submission_is_stamped() {
    let submission = ObservationSubmission {
        citizen_id: Some(" c1 ".into()),
        postcode: Some("AB1 2CD".into()),
        temperature: Some(14.0),
        ..Default::default()
    };

    let observation = Observation::from_submission(submission, Utc::now()).unwrap();
    assert!(observation.valid);
    assert!(!observation.complete);
    assert_eq!(observation.citizen_id.as_str(), "c1");
    assert!(uuid::Uuid::parse_str(&observation.id).is_ok());
}
