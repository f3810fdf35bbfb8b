//! Escalation engine behaviour against the real services.
//!
//! A journey that is not checked in before `created_at + duration + buffer`
//! escalates exactly once; a check-in racing the deadline never produces a
//! second escalation; restarts recover every active journey.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Duration as ChronoDuration;
use proptest::prelude::*;
use safeconnect_api::engine::{
    ClaimOutcome, CompletionOutcome, EscalationEngine, FireHandler, FireSource, FiredJourney,
    TimerState,
};
use safeconnect_api::services::StartJourney;
use safeconnect_core::SystemClock;
use safeconnect_test_utils::*;

#[path = "support/harness.rs"]
mod harness;
use harness::{settle, Harness};

fn start_request(user_id: UserId, minutes: i32, buffer: Option<i32>) -> StartJourney {
    StartJourney {
        user_id,
        start_location: "Library".to_string(),
        start: None,
        destination: "Home".to_string(),
        estimated_duration: minutes,
        buffer_time: buffer,
        note: None,
    }
}

#[tokio::test(start_paused = true)]
async fn test_deadline_fires_after_duration_plus_buffer() {
    let h = Harness::new();
    let user = seed_user(h.store(), "Alex", "+15550100").await;
    seed_contact(h.store(), user.id, "Sam", "+15550001").await;

    let journey = h
        .state
        .journeys
        .start(start_request(user.id, 30, Some(10)))
        .await
        .expect("start journey");
    assert_eq!(journey.expected_arrival, t0() + ChronoDuration::minutes(40));

    h.advance_minutes(39).await;
    assert!(h.overdue_alerts(user.id).await.is_empty());
    assert_eq!(h.state.engine.state(journey.id), Some(TimerState::Scheduled));

    h.advance_minutes(1).await;
    let alerts = h.overdue_alerts(user.id).await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].journey_id, Some(journey.id));
    assert_eq!(h.state.engine.state(journey.id), Some(TimerState::Fired));

    let stored = h
        .store()
        .journey_get(journey.id)
        .await
        .expect("get")
        .expect("journey exists");
    assert_eq!(stored.status, JourneyStatus::Overdue);
    assert_eq!(h.gateway.calls_to("+15550001").len(), 1);

    // Nothing re-fires later
    h.advance_minutes(120).await;
    assert_eq!(h.overdue_alerts(user.id).await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_default_buffer_is_ten_minutes() {
    let h = Harness::new();
    let user = seed_user(h.store(), "Alex", "+15550100").await;

    let journey = h
        .state
        .journeys
        .start(start_request(user.id, 20, None))
        .await
        .expect("start journey");
    assert_eq!(journey.buffer_time, 10);

    h.advance_minutes(29).await;
    assert!(h.overdue_alerts(user.id).await.is_empty());
    h.advance_minutes(1).await;
    assert_eq!(h.overdue_alerts(user.id).await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_check_in_before_deadline_disarms_timer() {
    let h = Harness::new();
    let user = seed_user(h.store(), "Alex", "+15550100").await;
    seed_contact(h.store(), user.id, "Sam", "+15550001").await;

    let journey = h
        .state
        .journeys
        .start(start_request(user.id, 30, Some(10)))
        .await
        .expect("start journey");

    h.advance_minutes(25).await;
    let finished = h
        .state
        .journeys
        .finish(journey.id, JourneyStatus::Completed, None)
        .await
        .expect("finish");
    assert_eq!(finished.status, JourneyStatus::Completed);
    assert_eq!(finished.completed_at, Some(t0() + ChronoDuration::minutes(25)));

    h.advance_minutes(60).await;
    assert!(h.overdue_alerts(user.id).await.is_empty());
    assert_eq!(h.state.engine.state(journey.id), Some(TimerState::Resolved));
    assert!(h.gateway.calls_to("+15550001").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_completion_is_idempotent() {
    let h = Harness::new();
    let user = seed_user(h.store(), "Alex", "+15550100").await;
    let journey = h
        .state
        .journeys
        .start(start_request(user.id, 30, Some(0)))
        .await
        .expect("start journey");

    h.advance_minutes(5).await;
    let first = h
        .state
        .journeys
        .finish(journey.id, JourneyStatus::Completed, None)
        .await
        .expect("first finish");

    h.advance_minutes(5).await;
    let second = h
        .state
        .journeys
        .finish(journey.id, JourneyStatus::Completed, None)
        .await
        .expect("repeated finish");
    assert_eq!(second.completed_at, first.completed_at);
    assert_eq!(
        h.state.engine.complete(journey.id, true),
        CompletionOutcome::AlreadyResolved
    );

    let err = h
        .state
        .journeys
        .finish(journey.id, JourneyStatus::Cancelled, None)
        .await
        .expect_err("cancel after completion");
    assert_eq!(err.status_code(), StatusCode::CONFLICT);
}

#[tokio::test(start_paused = true)]
async fn test_check_in_after_fire_still_escalates() {
    let h = Harness::new();
    let user = seed_user(h.store(), "Alex", "+15550100").await;
    seed_contact(h.store(), user.id, "Sam", "+15550001").await;
    let journey = h
        .state
        .journeys
        .start(start_request(user.id, 30, Some(10)))
        .await
        .expect("start journey");

    // The cell fired but the handler task has not run yet
    assert_eq!(h.state.engine.claim(journey.id), ClaimOutcome::Claimed);
    let finished = h
        .state
        .journeys
        .finish(journey.id, JourneyStatus::Completed, None)
        .await
        .expect("check-in is accepted");
    assert_eq!(finished.status, JourneyStatus::Completed);

    let outcome = h
        .state
        .escalation
        .escalate(journey.id, None, FireSource::Timer)
        .await
        .expect("escalation runs for a fired cell");
    assert_eq!(outcome.alert.journey_id, Some(journey.id));
    assert!(outcome.delivery.any_succeeded);

    settle().await;
    assert_eq!(h.overdue_alerts(user.id).await.len(), 1);
    assert_eq!(h.gateway.calls_to("+15550001").len(), 1);
    let stored = h
        .store()
        .journey_get(journey.id)
        .await
        .expect("get")
        .expect("journey exists");
    assert_eq!(stored.status, JourneyStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_untracked_claim_blocks_recovery() {
    let h = Harness::new();
    let user = seed_user(h.store(), "Alex", "+15550100").await;
    let journey = seed_journey(
        h.store(),
        user.id,
        30,
        Some(10),
        t0() - ChronoDuration::minutes(90),
    )
    .await;

    assert_eq!(
        h.state
            .engine
            .claim_untracked(journey.id, journey.expected_arrival),
        ClaimOutcome::Claimed
    );

    // Still active in the store, but the engine already owns the escalation
    let summary = h.state.engine.recover(h.store()).await.expect("recover");
    assert_eq!(summary.scanned, 1);
    assert_eq!(summary.fired, 0);
    assert_eq!(summary.already_tracked, 1);
    settle().await;
    assert!(h.overdue_alerts(user.id).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_recovery_fires_past_due_and_arms_future_journeys() {
    let h = Harness::new();
    let late_user = seed_user(h.store(), "Late", "+15550100").await;
    let early_user = seed_user(h.store(), "Early", "+15550200").await;

    let past_due = seed_journey(
        h.store(),
        late_user.id,
        30,
        Some(10),
        t0() - ChronoDuration::minutes(90),
    )
    .await;
    let upcoming = seed_journey(h.store(), early_user.id, 30, Some(0), t0()).await;

    let summary = h.state.engine.recover(h.store()).await.expect("recover");
    assert_eq!(summary.scanned, 2);
    assert_eq!(summary.fired, 1);
    assert_eq!(summary.scheduled, 1);
    settle().await;

    assert_eq!(h.overdue_alerts(late_user.id).await.len(), 1);
    assert!(h.overdue_alerts(early_user.id).await.is_empty());
    assert_eq!(h.state.engine.state(past_due.id), Some(TimerState::Fired));
    assert_eq!(h.state.engine.state(upcoming.id), Some(TimerState::Scheduled));

    // A second scan is a no-op
    let again = h.state.engine.recover(h.store()).await.expect("recover");
    assert_eq!(again.fired, 0);
    assert_eq!(again.scheduled, 0);
    settle().await;
    assert_eq!(h.overdue_alerts(late_user.id).await.len(), 1);

    h.advance_minutes(30).await;
    assert_eq!(h.overdue_alerts(early_user.id).await.len(), 1);
}

#[derive(Default)]
struct CountingHandler {
    fired: AtomicUsize,
}

#[async_trait::async_trait]
impl FireHandler for CountingHandler {
    async fn on_fire(&self, _fired: FiredJourney) {
        self.fired.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_complete_and_claim_have_one_winner() {
    let handler = Arc::new(CountingHandler::default());
    let engine = EscalationEngine::new(Arc::new(SystemClock), handler.clone());

    for _ in 0..200 {
        let id = JourneyId::now_v7();
        engine
            .schedule(id, chrono::Utc::now() + ChronoDuration::minutes(5))
            .expect("schedule");

        let completer = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.complete(id, true) })
        };
        let claimer = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.claim(id) })
        };
        let completed = completer.await.expect("join");
        let claimed = claimer.await.expect("join");

        let resolved = completed == CompletionOutcome::Resolved;
        let fired = claimed == ClaimOutcome::Claimed;
        assert!(resolved ^ fired, "exactly one side wins: {:?} / {:?}", completed, claimed);
    }
    assert_eq!(engine.armed_count(), 0);
    assert_eq!(handler.fired.load(Ordering::SeqCst), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// A check-in at any minute relative to the deadline yields at most one
    /// escalation, and exactly one when the deadline was reached first.
    #[test]
    fn prop_check_in_races_deadline(
        (minutes, buffer) in strategies::journey_minutes_strategy(),
        check_in_offset in -30i64..30,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .map_err(|e| TestCaseError::fail(format!("runtime: {}", e)))?;

        let (escalations, status) = runtime.block_on(async {
            let h = Harness::new();
            let user = seed_user(h.store(), "Alex", "+15550100").await;
            let journey = h
                .state
                .journeys
                .start(start_request(user.id, minutes, buffer))
                .await
                .expect("start journey");

            let deadline = i64::from(minutes + buffer.unwrap_or(10));
            let check_in = (deadline + check_in_offset).max(0);
            h.advance_minutes(check_in as u64).await;
            h.state
                .journeys
                .finish(journey.id, JourneyStatus::Completed, None)
                .await
                .expect("late or early check-in is accepted");

            h.advance_minutes(deadline as u64 + 60).await;
            let stored = h
                .store()
                .journey_get(journey.id)
                .await
                .expect("get")
                .expect("journey exists");
            (h.overdue_alerts(user.id).await.len(), (stored.status, check_in >= deadline))
        });

        let (final_status, reached_deadline) = status;
        prop_assert_eq!(final_status, JourneyStatus::Completed);
        prop_assert!(escalations <= 1);
        prop_assert_eq!(escalations == 1, reached_deadline);
    }
}
