//! Error types for SafeConnect operations

use thiserror::Error;
use uuid::Uuid;

/// Journey store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{entity} not found with id {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Conflict on {entity}: {reason}")]
    Conflict { entity: &'static str, reason: String },

    /// A user may have at most one active journey.
    #[error("User {user_id} already has an active journey")]
    ActiveJourneyExists { user_id: Uuid },

    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Stored {entity} could not be decoded: {reason}")]
    Decode { entity: &'static str, reason: String },
}

/// Input validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field '{field}' is missing")]
    RequiredFieldMissing { field: String },

    #[error("Field '{field}' must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("Field '{field}' has invalid format, expected {expected}")]
    InvalidFormat { field: String, expected: String },
}

/// Escalation engine errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("Journey {journey_id} already has a deadline scheduled")]
    DuplicateSchedule { journey_id: Uuid },

    #[error("Escalation engine is shut down")]
    ShutDown,
}

/// Notification gateway errors. Each applies to a single channel of a single call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Voice calls are not configured for this provider. Not a delivery failure.
    #[error("Voice calls are not available")]
    VoiceUnavailable,

    #[error("Provider {provider} rejected the message: {reason}")]
    Rejected { provider: String, reason: String },

    #[error("Transport error talking to {provider}: {reason}")]
    Transport { provider: String, reason: String },

    #[error("Provider {provider} did not answer within {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },

    #[error("Provider {provider} is not configured: {reason}")]
    NotConfigured { provider: String, reason: String },
}

impl GatewayError {
    /// Whether this outcome should be reported as a skipped channel rather than a failure.
    pub fn is_skip(&self) -> bool {
        matches!(self, GatewayError::VoiceUnavailable)
    }
}

/// Master error type for SafeConnect library code.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SafeConnectError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Result type alias for SafeConnect operations.
pub type SafeConnectResult<T> = Result<T, SafeConnectError>;

/// Result type alias for journey store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_unavailable_is_a_skip() {
        assert!(GatewayError::VoiceUnavailable.is_skip());
        assert!(!GatewayError::Timeout {
            provider: "vonage".to_string(),
            timeout_ms: 10_000
        }
        .is_skip());
    }

    #[test]
    fn test_master_error_wraps_variants() {
        let err: SafeConnectError = EngineError::ShutDown.into();
        assert!(matches!(err, SafeConnectError::Engine(EngineError::ShutDown)));
        assert_eq!(err.to_string(), "Escalation engine is shut down");
    }
}
