//! SafeConnect Test Utilities
//!
//! Shared test infrastructure for the SafeConnect workspace:
//! - A manually driven clock
//! - A recording notification gateway with scripted failures and delays
//! - Fixtures for seeding the in-memory store
//! - Proptest generators

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// Re-export the in-memory store from its source crate
pub use safeconnect_storage::{InMemoryStore, JourneyStore};

// Re-export core types for convenience
pub use safeconnect_core::{
    Alert, AlertId, AlertStatus, AlertType, Channel, Clock, ContactId, Coordinates,
    EmergencyContact, EntityIdType, GatewayError, Journey, JourneyId, JourneyPlan, JourneyStatus,
    MessageRef, NotificationGateway, Timestamp, User, UserId,
};

// ============================================================================
// CLOCK
// ============================================================================

/// Fixed start instant used across tests: 2025-03-14T09:00:00Z.
pub fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn at_t0() -> Self {
        Self::new(t0())
    }

    pub fn set(&self, at: Timestamp) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }

    pub fn advance(&self, by: ChronoDuration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.advance(ChronoDuration::minutes(minutes));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ============================================================================
// RECORDING GATEWAY
// ============================================================================

/// One gateway invocation as observed by [`RecordingGateway`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub channel: Channel,
    pub phone: String,
    /// SMS body, or the spoken segments of a call.
    pub content: Vec<String>,
    pub delivered: bool,
}

#[derive(Debug, Default)]
struct Script {
    failing_sms: HashSet<String>,
    failing_voice: HashSet<String>,
    delays: HashMap<String, Duration>,
}

/// Notification gateway that records every attempt.
///
/// Failures and delays are scripted per phone number, so a test can make
/// one contact unreachable while the others succeed.
#[derive(Debug)]
pub struct RecordingGateway {
    voice: bool,
    attempts: Mutex<Vec<SentMessage>>,
    script: Mutex<Script>,
    sequence: AtomicU64,
}

impl Default for RecordingGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingGateway {
    /// Gateway with both SMS and voice available.
    pub fn new() -> Self {
        Self {
            voice: true,
            attempts: Mutex::new(Vec::new()),
            script: Mutex::new(Script::default()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Gateway without voice capability.
    pub fn sms_only() -> Self {
        Self {
            voice: false,
            ..Self::new()
        }
    }

    pub fn fail_sms_to(&self, phone: &str) {
        self.script().failing_sms.insert(phone.to_string());
    }

    pub fn fail_voice_to(&self, phone: &str) {
        self.script().failing_voice.insert(phone.to_string());
    }

    /// Make both channels fail for `phone`.
    pub fn fail_all_to(&self, phone: &str) {
        self.fail_sms_to(phone);
        self.fail_voice_to(phone);
    }

    /// Delay every answer to `phone` by `delay`.
    pub fn delay_to(&self, phone: &str, delay: Duration) {
        self.script().delays.insert(phone.to_string(), delay);
    }

    /// Every attempt in the order it was made.
    pub fn attempts(&self) -> Vec<SentMessage> {
        self.attempts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Delivered SMS bodies for `phone`.
    pub fn texts_to(&self, phone: &str) -> Vec<String> {
        self.attempts()
            .into_iter()
            .filter(|m| m.channel == Channel::Sms && m.delivered && m.phone == phone)
            .filter_map(|m| m.content.into_iter().next())
            .collect()
    }

    /// Delivered voice calls for `phone`.
    pub fn calls_to(&self, phone: &str) -> Vec<Vec<String>> {
        self.attempts()
            .into_iter()
            .filter(|m| m.channel == Channel::Voice && m.delivered && m.phone == phone)
            .map(|m| m.content)
            .collect()
    }

    /// Number of attempts on `channel`, delivered or not.
    pub fn attempt_count(&self, channel: Channel) -> usize {
        self.attempts()
            .iter()
            .filter(|m| m.channel == channel)
            .count()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn attempt(
        &self,
        channel: Channel,
        phone: &str,
        content: Vec<String>,
    ) -> Result<MessageRef, GatewayError> {
        let (delay, failing) = {
            let script = self.script();
            let failing = match channel {
                Channel::Sms => script.failing_sms.contains(phone),
                Channel::Voice => script.failing_voice.contains(phone),
            };
            (script.delays.get(phone).copied(), failing)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.attempts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SentMessage {
                channel,
                phone: phone.to_string(),
                content,
                delivered: !failing,
            });

        if failing {
            return Err(GatewayError::Rejected {
                provider: "recording".to_string(),
                reason: format!("{} to {} scripted to fail", channel, phone),
            });
        }
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        Ok(MessageRef::new(format!("{}-{}", channel, seq)))
    }
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
    fn provider_id(&self) -> &str {
        "recording"
    }

    fn voice_available(&self) -> bool {
        self.voice
    }

    async fn send_text(&self, phone: &str, body: &str) -> Result<MessageRef, GatewayError> {
        self.attempt(Channel::Sms, phone, vec![body.to_string()])
            .await
    }

    async fn place_voice_call(
        &self,
        phone: &str,
        segments: &[String],
    ) -> Result<MessageRef, GatewayError> {
        if !self.voice {
            return Err(GatewayError::VoiceUnavailable);
        }
        self.attempt(Channel::Voice, phone, segments.to_vec()).await
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// Insert a user with the given display name and phone.
pub async fn seed_user(store: &dyn JourneyStore, name: &str, phone: &str) -> User {
    let user = User::new(UserId::now_v7(), name, phone, t0());
    store
        .user_insert(&user)
        .await
        .unwrap_or_else(|e| panic!("seeding user failed: {}", e));
    user
}

/// Insert an emergency contact for `user_id`.
pub async fn seed_contact(
    store: &dyn JourneyStore,
    user_id: UserId,
    name: &str,
    phone: &str,
) -> EmergencyContact {
    let contact = EmergencyContact {
        id: ContactId::now_v7(),
        user_id,
        name: name.to_string(),
        phone: phone.to_string(),
        relationship: "Friend".to_string(),
        is_primary: false,
        created_at: t0(),
    };
    store
        .contact_insert(&contact)
        .await
        .unwrap_or_else(|e| panic!("seeding contact failed: {}", e));
    contact
}

/// Insert an active journey created at `created_at`.
pub async fn seed_journey(
    store: &dyn JourneyStore,
    user_id: UserId,
    estimated_duration: i32,
    buffer_time: Option<i32>,
    created_at: Timestamp,
) -> Journey {
    let plan = JourneyPlan::new("Home", "Office", estimated_duration, buffer_time)
        .unwrap_or_else(|e| panic!("invalid fixture plan: {}", e));
    let journey = Journey::start(JourneyId::now_v7(), user_id, plan, created_at);
    store
        .journey_insert(&journey)
        .await
        .unwrap_or_else(|e| panic!("seeding journey failed: {}", e));
    journey
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod strategies {
    use proptest::prelude::*;

    /// Sanitised phone numbers, with and without country prefix.
    pub fn phone_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            "\\+[1-9][0-9]{9,12}",
            "[1-9][0-9]{9}",
        ]
    }

    /// Six-digit verification codes.
    pub fn code_strategy() -> impl Strategy<Value = String> {
        (100_000u32..1_000_000).prop_map(|c| c.to_string())
    }

    /// Journey duration and optional buffer, in minutes.
    pub fn journey_minutes_strategy() -> impl Strategy<Value = (i32, Option<i32>)> {
        (1i32..=240, proptest::option::of(0i32..=60))
    }

    /// Offset in seconds relative to a deadline, spanning both sides of it.
    pub fn deadline_offset_strategy() -> impl Strategy<Value = i64> {
        -3_600i64..3_600
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::at_t0();
        clock.advance_minutes(40);
        assert_eq!(clock.now(), t0() + ChronoDuration::minutes(40));
    }

    #[tokio::test]
    async fn test_recording_gateway_scripts_failures() {
        let gateway = RecordingGateway::new();
        gateway.fail_sms_to("+15550001");

        assert!(gateway.send_text("+15550001", "hi").await.is_err());
        assert!(gateway.send_text("+15550002", "hi").await.is_ok());
        assert_eq!(gateway.texts_to("+15550002"), vec!["hi".to_string()]);
        assert!(gateway.texts_to("+15550001").is_empty());
        assert_eq!(gateway.attempt_count(Channel::Sms), 2);
    }

    #[tokio::test]
    async fn test_sms_only_gateway_reports_voice_unavailable() {
        let gateway = RecordingGateway::sms_only();
        let result = gateway
            .place_voice_call("+15550001", &["hello".to_string()])
            .await;
        assert_eq!(result, Err(GatewayError::VoiceUnavailable));
        assert_eq!(gateway.attempt_count(Channel::Voice), 0);
    }
}
