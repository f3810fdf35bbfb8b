//! Phone Verification Service
//!
//! Issues short-lived six digit codes by SMS and checks them with a bounded
//! number of attempts. Codes live in a [`VerificationStore`] keyed by the
//! sanitised phone number; every read-modify-write on one key runs under
//! that key's exclusive lock, so two checks for the same phone can never
//! both consume the last attempt.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use safeconnect_core::{
    mask_phone, normalize_phone, sanitize_phone, Clock, MessageRef, NotificationGateway, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::VerificationConfig;
use crate::error::{ApiError, ApiResult};
use crate::services::messages;
use crate::telemetry::METRICS;

// ============================================================================
// STORE
// ============================================================================

/// A code waiting to be checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCode {
    pub code: String,
    pub expires_at: Timestamp,
    pub attempts: u32,
}

/// Key-partitioned storage for pending codes.
pub trait VerificationStore: Send + Sync {
    /// Run `f` with exclusive access to the entry for `phone`.
    ///
    /// Leaving `None` in the slot removes the entry.
    fn with_entry(&self, phone: &str, f: &mut dyn FnMut(&mut Option<PendingCode>));

    /// Remove entries that expired before `now`. Returns how many were removed.
    fn purge_expired(&self, now: Timestamp) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// [`VerificationStore`] backed by a sharded concurrent map.
#[derive(Debug, Default)]
pub struct DashMapVerificationStore {
    codes: DashMap<String, PendingCode>,
}

impl DashMapVerificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VerificationStore for DashMapVerificationStore {
    fn with_entry(&self, phone: &str, f: &mut dyn FnMut(&mut Option<PendingCode>)) {
        match self.codes.entry(phone.to_string()) {
            Entry::Occupied(mut occupied) => {
                let mut slot = Some(occupied.get().clone());
                f(&mut slot);
                match slot {
                    Some(updated) => *occupied.get_mut() = updated,
                    None => {
                        occupied.remove();
                    }
                }
            }
            Entry::Vacant(vacant) => {
                let mut slot = None;
                f(&mut slot);
                if let Some(created) = slot {
                    vacant.insert(created);
                }
            }
        }
    }

    fn purge_expired(&self, now: Timestamp) -> usize {
        let before = self.codes.len();
        self.codes.retain(|_, pending| pending.expires_at >= now);
        before.saturating_sub(self.codes.len())
    }

    fn len(&self) -> usize {
        self.codes.len()
    }
}

// ============================================================================
// OUTCOME
// ============================================================================

/// Result of checking a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    Valid,
    Expired,
    TooManyAttempts,
    Mismatch,
    NotFound,
}

impl VerificationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationOutcome::Valid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationOutcome::Valid => "valid",
            VerificationOutcome::Expired => "expired",
            VerificationOutcome::TooManyAttempts => "too_many_attempts",
            VerificationOutcome::Mismatch => "mismatch",
            VerificationOutcome::NotFound => "not_found",
        }
    }

    /// Message shown to the user.
    pub fn message(&self) -> &'static str {
        match self {
            VerificationOutcome::Valid => "Phone verified successfully",
            VerificationOutcome::Expired => {
                "Verification code has expired. Please request a new code."
            }
            VerificationOutcome::TooManyAttempts => "Too many attempts. Please request a new code.",
            VerificationOutcome::Mismatch => "Invalid verification code. Please try again.",
            VerificationOutcome::NotFound => {
                "No verification code found. Please request a new code."
            }
        }
    }
}

// ============================================================================
// SERVICE
// ============================================================================

fn generate_code() -> String {
    rand::rng().random_range(100_000..1_000_000u32).to_string()
}

/// Issues and checks phone verification codes.
#[derive(Clone)]
pub struct VerificationService {
    store: Arc<dyn VerificationStore>,
    gateway: Arc<dyn NotificationGateway>,
    clock: Arc<dyn Clock>,
    config: VerificationConfig,
    send_timeout: Duration,
}

impl VerificationService {
    pub fn new(
        store: Arc<dyn VerificationStore>,
        gateway: Arc<dyn NotificationGateway>,
        clock: Arc<dyn Clock>,
        config: VerificationConfig,
        send_timeout: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            clock,
            config,
            send_timeout,
        }
    }

    /// Store a fresh code for `phone`, replacing any previous one.
    pub fn issue(&self, phone: &str) -> ApiResult<String> {
        let key = normalize_phone(phone)?;
        let code = generate_code();
        let ttl = chrono::Duration::from_std(self.config.code_ttl)
            .map_err(|e| ApiError::internal_error(format!("Invalid code lifetime: {}", e)))?;
        let pending = PendingCode {
            code: code.clone(),
            expires_at: self.clock.now() + ttl,
            attempts: 0,
        };
        self.store.with_entry(&key, &mut |slot| *slot = Some(pending.clone()));
        Ok(code)
    }

    /// Issue a code and text it to `phone`.
    ///
    /// When the SMS cannot be sent the code is discarded, so a later check
    /// reports `NotFound` rather than waiting on a code nobody received.
    pub async fn send_code(&self, phone: &str) -> ApiResult<MessageRef> {
        let code = self.issue(phone)?;
        let key = sanitize_phone(phone);
        let body = messages::verification_sms(&code, self.config.code_ttl.as_secs() / 60);

        let sent = match tokio::time::timeout(self.send_timeout, self.gateway.send_text(&key, &body)).await {
            Ok(result) => result.map_err(ApiError::from),
            Err(_) => Err(ApiError::timeout("Verification code SMS timed out")),
        };

        match sent {
            Ok(reference) => {
                tracing::info!(phone = %mask_phone(&key), "Verification code sent");
                Ok(reference)
            }
            Err(e) => {
                self.discard_if_current(&key, &code);
                tracing::warn!(
                    phone = %mask_phone(&key),
                    error = %e.message,
                    "Verification code could not be sent"
                );
                Err(e)
            }
        }
    }

    /// Check `code` against the pending code for `phone`.
    pub fn check(&self, phone: &str, code: &str) -> VerificationOutcome {
        let key = sanitize_phone(phone);
        let code = code.trim();
        let now = self.clock.now();
        let max_attempts = self.config.max_attempts;

        let mut outcome = VerificationOutcome::NotFound;
        if !key.is_empty() {
            self.store.with_entry(&key, &mut |slot| {
                outcome = match slot.as_ref() {
                    None => VerificationOutcome::NotFound,
                    Some(pending) if now > pending.expires_at => VerificationOutcome::Expired,
                    Some(pending) if pending.attempts >= max_attempts => {
                        VerificationOutcome::TooManyAttempts
                    }
                    Some(pending) if pending.code != code => VerificationOutcome::Mismatch,
                    Some(_) => VerificationOutcome::Valid,
                };
                match outcome {
                    VerificationOutcome::NotFound => {}
                    VerificationOutcome::Mismatch => {
                        if let Some(pending) = slot.as_mut() {
                            pending.attempts += 1;
                        }
                    }
                    _ => *slot = None,
                }
            });
        }

        METRICS.record_verification(outcome.as_str());
        tracing::debug!(phone = %mask_phone(&key), outcome = outcome.as_str(), "Verification checked");
        outcome
    }

    /// Drop expired codes. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        self.store.purge_expired(self.clock.now())
    }

    pub fn pending_count(&self) -> usize {
        self.store.len()
    }

    fn discard_if_current(&self, key: &str, code: &str) {
        self.store.with_entry(key, &mut |slot| {
            if slot.as_ref().is_some_and(|p| p.code == code) {
                *slot = None;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_code_is_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_store_removes_entry_when_slot_cleared() {
        let store = DashMapVerificationStore::new();
        let now = chrono::Utc::now();
        store.with_entry("+15550001", &mut |slot| {
            *slot = Some(PendingCode {
                code: "123456".to_string(),
                expires_at: now,
                attempts: 0,
            })
        });
        assert_eq!(store.len(), 1);
        store.with_entry("+15550001", &mut |slot| *slot = None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_purge_keeps_live_codes() {
        let store = DashMapVerificationStore::new();
        let now = chrono::Utc::now();
        for (phone, offset) in [("+1555000001", -1), ("+1555000002", 5)] {
            store.with_entry(phone, &mut |slot| {
                *slot = Some(PendingCode {
                    code: "123456".to_string(),
                    expires_at: now + chrono::Duration::minutes(offset),
                    attempts: 0,
                })
            });
        }
        assert_eq!(store.purge_expired(now), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_outcome_messages() {
        assert!(VerificationOutcome::Valid.is_valid());
        assert_eq!(VerificationOutcome::TooManyAttempts.as_str(), "too_many_attempts");
        assert!(VerificationOutcome::Expired.message().contains("expired"));
    }
}
