//! Phone verification: single-use codes, a ten minute lifetime and three
//! wrong guesses before the code is burned.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use proptest::prelude::*;
use safeconnect_api::services::{DashMapVerificationStore, VerificationOutcome, VerificationService};
use safeconnect_api::VerificationConfig;
use safeconnect_test_utils::*;

const PHONE: &str = "+15550001234";

fn service(gateway: Arc<RecordingGateway>, clock: Arc<ManualClock>) -> VerificationService {
    VerificationService::new(
        Arc::new(DashMapVerificationStore::new()),
        gateway,
        clock,
        VerificationConfig::default(),
        Duration::from_secs(10),
    )
}

fn fixture() -> (VerificationService, Arc<RecordingGateway>, Arc<ManualClock>) {
    let gateway = Arc::new(RecordingGateway::new());
    let clock = Arc::new(ManualClock::at_t0());
    (service(gateway.clone(), clock.clone()), gateway, clock)
}

fn wrong_code(code: &str) -> String {
    if code == "123456" {
        "654321".to_string()
    } else {
        "123456".to_string()
    }
}

#[tokio::test]
async fn test_sent_code_verifies_once() {
    let (service, gateway, _clock) = fixture();

    service.send_code(PHONE).await.expect("send code");
    let texts = gateway.texts_to(PHONE);
    assert_eq!(texts.len(), 1);
    let code: String = texts[0].chars().filter(char::is_ascii_digit).take(6).collect();
    assert_eq!(code.len(), 6);
    assert!(texts[0].contains("10 minutes"));

    assert_eq!(service.check(PHONE, &code), VerificationOutcome::Valid);
    assert_eq!(service.check(PHONE, &code), VerificationOutcome::NotFound);
}

#[test]
fn test_three_mismatches_burn_the_code() {
    let (service, _gateway, _clock) = fixture();
    let code = service.issue(PHONE).expect("issue");
    let wrong = wrong_code(&code);

    for _ in 0..3 {
        assert_eq!(service.check(PHONE, &wrong), VerificationOutcome::Mismatch);
    }
    // Even the right code is refused now
    assert_eq!(service.check(PHONE, &code), VerificationOutcome::TooManyAttempts);
    assert_eq!(service.check(PHONE, &code), VerificationOutcome::NotFound);
}

#[test]
fn test_code_expires_after_ten_minutes() {
    let (service, _gateway, clock) = fixture();
    let code = service.issue(PHONE).expect("issue");

    clock.advance_minutes(10);
    assert_eq!(service.check(PHONE, &wrong_code(&code)), VerificationOutcome::Mismatch);

    clock.advance(chrono::Duration::seconds(1));
    assert_eq!(service.check(PHONE, &code), VerificationOutcome::Expired);
    assert_eq!(service.check(PHONE, &code), VerificationOutcome::NotFound);
}

#[test]
fn test_reissue_replaces_previous_code() {
    let (service, _gateway, _clock) = fixture();
    let first = service.issue(PHONE).expect("issue");
    let _ = service.check(PHONE, &wrong_code(&first));
    let second = service.issue(PHONE).expect("reissue");

    if first != second {
        assert_eq!(service.check(PHONE, &first), VerificationOutcome::Mismatch);
    }
    // Attempts were reset by the reissue
    assert_eq!(service.check(PHONE, &second), VerificationOutcome::Valid);
    assert_eq!(service.pending_count(), 0);
}

#[test]
fn test_formatting_differences_share_one_key() {
    let (service, _gateway, _clock) = fixture();
    let code = service.issue("+1 (555) 000-1234").expect("issue");
    assert_eq!(service.check("+15550001234", &code), VerificationOutcome::Valid);
}

#[test]
fn test_purge_drops_expired_codes() {
    let (service, _gateway, clock) = fixture();
    service.issue(PHONE).expect("issue");
    service.issue("+15550009999").expect("issue");
    assert_eq!(service.pending_count(), 2);

    clock.advance_minutes(11);
    assert_eq!(service.purge_expired(), 2);
    assert_eq!(service.pending_count(), 0);
}

#[tokio::test]
async fn test_failed_send_discards_code() {
    let (service, gateway, _clock) = fixture();
    gateway.fail_sms_to(PHONE);

    let err = service.send_code(PHONE).await.expect_err("send fails");
    assert!(err.status_code().is_server_error());
    assert_eq!(service.pending_count(), 0);
    assert_eq!(service.check(PHONE, "123456"), VerificationOutcome::NotFound);
}

#[tokio::test]
async fn test_invalid_phone_is_rejected_before_sending() {
    let (service, gateway, _clock) = fixture();
    let err = service.send_code("12").await.expect_err("too short");
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    assert!(gateway.attempts().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_guesses_never_exceed_attempt_limit() {
    let (service, _gateway, _clock) = fixture();
    let code = service.issue(PHONE).expect("issue");
    let wrong = wrong_code(&code);

    let handles: Vec<_> = (0..12)
        .map(|_| {
            let service = service.clone();
            let wrong = wrong.clone();
            tokio::spawn(async move { service.check(PHONE, &wrong) })
        })
        .collect();

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.expect("join"));
    }
    let count = |o: VerificationOutcome| outcomes.iter().filter(|x| **x == o).count();
    assert_eq!(count(VerificationOutcome::Mismatch), 3);
    assert_eq!(count(VerificationOutcome::TooManyAttempts), 1);
    assert_eq!(count(VerificationOutcome::NotFound), 8);
}

proptest! {
    /// Any wrong code is a mismatch while attempts remain.
    #[test]
    fn prop_wrong_code_is_mismatch(guess in strategies::code_strategy()) {
        let (service, _gateway, _clock) = fixture();
        let code = service.issue(PHONE).expect("issue");
        prop_assume!(guess != code);
        prop_assert_eq!(service.check(PHONE, &guess), VerificationOutcome::Mismatch);
        prop_assert_eq!(service.check(PHONE, &code), VerificationOutcome::Valid);
    }
}
