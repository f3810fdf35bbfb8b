//! Vonage SMS and Voice gateway.
//!
//! SMS goes through the classic SMS REST endpoint authenticated with the
//! account key and secret. Voice calls use the Voice API with a short-lived
//! RS256 JWT minted from the application's private key; each spoken segment
//! becomes one `talk` action of the call's NCCO.

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use safeconnect_core::{mask_phone, GatewayError, MessageRef, NotificationGateway};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::config::VonageConfig;
use crate::constants::{SMS_SENDER_ID, VONAGE_JWT_TTL_SECS, VONAGE_SMS_URL, VONAGE_VOICE_URL};

const PROVIDER: &str = "vonage";

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Serialize)]
struct SmsRequest<'a> {
    api_key: &'a str,
    api_secret: &'a str,
    to: &'a str,
    from: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct SmsResponse {
    #[serde(default)]
    messages: Vec<SmsMessageStatus>,
}

#[derive(Debug, Deserialize)]
struct SmsMessageStatus {
    status: String,
    #[serde(rename = "message-id")]
    message_id: Option<String>,
    #[serde(rename = "error-text")]
    error_text: Option<String>,
}

#[derive(Debug, Serialize)]
struct PhoneEndpoint<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    number: &'a str,
}

#[derive(Debug, Serialize)]
struct TalkAction<'a> {
    action: &'static str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct CallRequest<'a> {
    to: Vec<PhoneEndpoint<'a>>,
    from: PhoneEndpoint<'a>,
    ncco: Vec<TalkAction<'a>>,
}

#[derive(Debug, Deserialize)]
struct CallResponse {
    uuid: Option<String>,
}

#[derive(Debug, Serialize)]
struct VoiceClaims<'a> {
    application_id: &'a str,
    iat: i64,
    exp: i64,
    jti: String,
}

// ============================================================================
// GATEWAY
// ============================================================================

struct VoiceCredentials {
    application_id: String,
    from: String,
    key: EncodingKey,
}

/// [`NotificationGateway`] backed by Vonage.
pub struct VonageGateway {
    client: Client,
    config: VonageConfig,
    voice: Option<VoiceCredentials>,
    sms_url: String,
    voice_url: String,
}

impl VonageGateway {
    /// Build the gateway. Voice is enabled only when the application id,
    /// private key and caller number are all configured and the key parses.
    pub fn new(config: VonageConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| GatewayError::NotConfigured {
                provider: PROVIDER.to_string(),
                reason: format!("HTTP client: {}", e),
            })?;

        let voice = match (&config.application_id, &config.private_key, &config.voice_from) {
            (Some(application_id), Some(private_key), Some(from)) => {
                match EncodingKey::from_rsa_pem(private_key.expose().as_bytes()) {
                    Ok(key) => Some(VoiceCredentials {
                        application_id: application_id.clone(),
                        from: strip_plus(from).to_string(),
                        key,
                    }),
                    Err(e) => {
                        tracing::warn!(error = %e, "Vonage private key rejected, voice calls disabled");
                        None
                    }
                }
            }
            _ => None,
        };

        Ok(Self {
            client,
            config,
            voice,
            sms_url: VONAGE_SMS_URL.to_string(),
            voice_url: VONAGE_VOICE_URL.to_string(),
        })
    }

    /// Point the gateway at different endpoints, e.g. a local mock server.
    pub fn with_endpoints(mut self, sms_url: impl Into<String>, voice_url: impl Into<String>) -> Self {
        self.sms_url = sms_url.into();
        self.voice_url = voice_url.into();
        self
    }

    fn voice_token(&self, voice: &VoiceCredentials) -> Result<String, GatewayError> {
        let iat = chrono::Utc::now().timestamp();
        let claims = VoiceClaims {
            application_id: &voice.application_id,
            iat,
            exp: iat + VONAGE_JWT_TTL_SECS,
            jti: Uuid::now_v7().to_string(),
        };
        encode(&Header::new(Algorithm::RS256), &claims, &voice.key).map_err(|e| {
            GatewayError::NotConfigured {
                provider: PROVIDER.to_string(),
                reason: format!("Cannot sign voice token: {}", e),
            }
        })
    }
}

impl std::fmt::Debug for VonageGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VonageGateway")
            .field("api_key", &self.config.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("voice", &self.voice.is_some())
            .finish()
    }
}

#[async_trait]
impl NotificationGateway for VonageGateway {
    fn provider_id(&self) -> &str {
        PROVIDER
    }

    fn voice_available(&self) -> bool {
        self.voice.is_some()
    }

    async fn send_text(&self, phone: &str, body: &str) -> Result<MessageRef, GatewayError> {
        let request = SmsRequest {
            api_key: &self.config.api_key,
            api_secret: self.config.api_secret.expose(),
            to: strip_plus(phone),
            from: SMS_SENDER_ID,
            text: body,
        };

        let response = self
            .client
            .post(&self.sms_url)
            .json(&request)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(rejected(format!("HTTP {}: {}", status.as_u16(), text)));
        }

        let parsed: SmsResponse = response
            .json()
            .await
            .map_err(transport)?;
        let reference = interpret_sms_response(parsed)?;
        tracing::debug!(phone = %mask_phone(phone), message_id = %reference.as_str(), "SMS accepted");
        Ok(reference)
    }

    async fn place_voice_call(
        &self,
        phone: &str,
        segments: &[String],
    ) -> Result<MessageRef, GatewayError> {
        let voice = self.voice.as_ref().ok_or(GatewayError::VoiceUnavailable)?;
        let token = self.voice_token(voice)?;

        let request = CallRequest {
            to: vec![PhoneEndpoint {
                kind: "phone",
                number: strip_plus(phone),
            }],
            from: PhoneEndpoint {
                kind: "phone",
                number: &voice.from,
            },
            ncco: talk_actions(segments),
        };

        let response = self
            .client
            .post(&self.voice_url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(rejected(format!("HTTP {}: {}", status.as_u16(), text)));
        }

        let parsed: CallResponse = response.json().await.map_err(transport)?;
        let reference = MessageRef::new(parsed.uuid.unwrap_or_default());
        tracing::debug!(phone = %mask_phone(phone), call_id = %reference.as_str(), "Voice call placed");
        Ok(reference)
    }
}

fn strip_plus(phone: &str) -> &str {
    phone.trim_start_matches('+')
}

fn talk_actions(segments: &[String]) -> Vec<TalkAction<'_>> {
    segments
        .iter()
        .map(|text| TalkAction {
            action: "talk",
            text,
        })
        .collect()
}

fn interpret_sms_response(response: SmsResponse) -> Result<MessageRef, GatewayError> {
    let first = response
        .messages
        .into_iter()
        .next()
        .ok_or_else(|| rejected("Empty SMS response".to_string()))?;
    if first.status == "0" {
        Ok(MessageRef::new(first.message_id.unwrap_or_default()))
    } else {
        Err(rejected(first.error_text.unwrap_or_else(|| {
            format!("SMS rejected with status {}", first.status)
        })))
    }
}

fn transport(e: reqwest::Error) -> GatewayError {
    GatewayError::Transport {
        provider: PROVIDER.to_string(),
        reason: e.to_string(),
    }
}

fn rejected(reason: String) -> GatewayError {
    GatewayError::Rejected {
        provider: PROVIDER.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderSecret;

    fn sms_only_config() -> VonageConfig {
        VonageConfig {
            api_key: "key".to_string(),
            api_secret: ProviderSecret::new("secret".to_string()).expect("non-empty"),
            application_id: None,
            private_key: None,
            voice_from: None,
        }
    }

    #[test]
    fn test_sms_success_response() {
        let parsed: SmsResponse = serde_json::from_str(
            r#"{"message-count":"1","messages":[{"to":"15550001","message-id":"abc-123","status":"0"}]}"#,
        )
        .expect("parse");
        assert_eq!(interpret_sms_response(parsed), Ok(MessageRef::new("abc-123")));
    }

    #[test]
    fn test_sms_error_response() {
        let parsed: SmsResponse = serde_json::from_str(
            r#"{"messages":[{"status":"4","error-text":"Bad Credentials"}]}"#,
        )
        .expect("parse");
        match interpret_sms_response(parsed) {
            Err(GatewayError::Rejected { reason, .. }) => assert_eq!(reason, "Bad Credentials"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_call_request_shape() {
        let segments = vec!["Hello".to_string(), "I repeat.".to_string()];
        let request = CallRequest {
            to: vec![PhoneEndpoint {
                kind: "phone",
                number: strip_plus("+15550001"),
            }],
            from: PhoneEndpoint {
                kind: "phone",
                number: "15559999",
            },
            ncco: talk_actions(&segments),
        };
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json["to"][0]["number"], "15550001");
        assert_eq!(json["to"][0]["type"], "phone");
        assert_eq!(json["ncco"][1]["action"], "talk");
        assert_eq!(json["ncco"][1]["text"], "I repeat.");
    }

    #[tokio::test]
    async fn test_voice_unavailable_without_application() {
        let gateway = VonageGateway::new(sms_only_config()).expect("client builds");
        assert!(!gateway.voice_available());
        let result = gateway
            .place_voice_call("+15550001", &["hi".to_string()])
            .await;
        assert_eq!(result, Err(GatewayError::VoiceUnavailable));
        assert!(!format!("{:?}", gateway).contains("secret"));
    }
}
