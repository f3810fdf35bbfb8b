//! Gateway that writes messages to the log instead of sending them.

use async_trait::async_trait;
use safeconnect_core::{mask_phone, GatewayError, MessageRef, NotificationGateway};
use std::sync::atomic::{AtomicU64, Ordering};

/// Logs every message. Used when no provider is configured.
#[derive(Debug, Default)]
pub struct ConsoleGateway {
    sequence: AtomicU64,
}

impl ConsoleGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_ref(&self, prefix: &str) -> MessageRef {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        MessageRef::new(format!("console-{}-{}", prefix, seq))
    }
}

#[async_trait]
impl NotificationGateway for ConsoleGateway {
    fn provider_id(&self) -> &str {
        "console"
    }

    fn voice_available(&self) -> bool {
        true
    }

    async fn send_text(&self, phone: &str, body: &str) -> Result<MessageRef, GatewayError> {
        let reference = self.next_ref("sms");
        tracing::info!(
            phone = %mask_phone(phone),
            reference = %reference.as_str(),
            body = %body,
            "SMS (not sent, console gateway)"
        );
        Ok(reference)
    }

    async fn place_voice_call(
        &self,
        phone: &str,
        segments: &[String],
    ) -> Result<MessageRef, GatewayError> {
        let reference = self.next_ref("voice");
        tracing::info!(
            phone = %mask_phone(phone),
            reference = %reference.as_str(),
            script = %segments.join(" "),
            "Voice call (not placed, console gateway)"
        );
        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_console_references_are_unique() {
        let gateway = ConsoleGateway::new();
        let a = gateway.send_text("+15550001", "hi").await.expect("logged");
        let b = gateway
            .place_voice_call("+15550001", &["hi".to_string()])
            .await
            .expect("logged");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("console-sms-"));
    }
}
