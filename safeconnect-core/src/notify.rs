//! Notification gateway contract.
//!
//! The pure trait lives here; provider adapters (Vonage, console) live in
//! `safeconnect-api::providers`. A gateway performs a single attempt per call
//! and never retries on its own.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::GatewayError;

/// Delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Sms,
    Voice,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Sms => "sms",
            Channel::Voice => "voice",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider reference for an accepted message or call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MessageRef(pub String);

impl MessageRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Capability to reach a phone number by SMS and voice.
///
/// Phone numbers passed in are already sanitised (digits with an optional
/// leading `+`).
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Identifier used in logs and metrics.
    fn provider_id(&self) -> &str;

    /// Whether `place_voice_call` can succeed at all.
    fn voice_available(&self) -> bool;

    async fn send_text(&self, phone: &str, body: &str) -> Result<MessageRef, GatewayError>;

    /// Speak `segments` in order. Returns [`GatewayError::VoiceUnavailable`]
    /// when the provider has no voice capability.
    async fn place_voice_call(
        &self,
        phone: &str,
        segments: &[String],
    ) -> Result<MessageRef, GatewayError>;
}
