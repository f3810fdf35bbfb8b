//! API Configuration Module
//!
//! Configuration for CORS, rate limiting, notification dispatch, verification
//! codes and the Vonage provider. Everything is loaded from environment
//! variables with sensible defaults for development.

use crate::constants::{
    DEFAULT_CORS_MAX_AGE_SECS, DEFAULT_NOTIFY_CONCURRENCY, DEFAULT_NOTIFY_TIMEOUT_SECS,
    DEFAULT_OTP_MAX_ATTEMPTS, DEFAULT_OTP_RATE_LIMIT_BURST, DEFAULT_OTP_RATE_LIMIT_PER_MINUTE,
    DEFAULT_OTP_TTL_SECS,
};
use secrecy::{ExposeSecret, SecretString};
use std::str::FromStr;
use std::time::Duration;

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|s| match s.to_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => default,
        })
        .unwrap_or(default)
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// API configuration for CORS and rate limiting.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    // ========================================================================
    // CORS Configuration
    // ========================================================================
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Whether to allow credentials in CORS requests.
    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    // ========================================================================
    // Rate Limiting Configuration
    // ========================================================================
    /// Whether verification-code rate limiting is enabled.
    pub rate_limit_enabled: bool,

    /// Verification-code requests allowed per client IP per minute.
    pub otp_rate_limit_per_minute: u32,

    /// Burst capacity on top of the steady rate.
    pub otp_rate_limit_burst: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,

            rate_limit_enabled: true,
            otp_rate_limit_per_minute: DEFAULT_OTP_RATE_LIMIT_PER_MINUTE,
            otp_rate_limit_burst: DEFAULT_OTP_RATE_LIMIT_BURST,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `SAFECONNECT_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `SAFECONNECT_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `SAFECONNECT_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `SAFECONNECT_RATE_LIMIT_ENABLED`: "true" or "false" (default: true)
    /// - `SAFECONNECT_RATE_LIMIT_OTP_PER_MINUTE`: Code requests per minute per IP (default: 5)
    /// - `SAFECONNECT_RATE_LIMIT_OTP_BURST`: Burst capacity (default: 3)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cors_origins = std::env::var("SAFECONNECT_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            cors_origins,
            cors_allow_credentials: env_flag("SAFECONNECT_CORS_ALLOW_CREDENTIALS", false),
            cors_max_age_secs: env_parse("SAFECONNECT_CORS_MAX_AGE_SECS")
                .unwrap_or(defaults.cors_max_age_secs),
            rate_limit_enabled: env_flag("SAFECONNECT_RATE_LIMIT_ENABLED", true),
            otp_rate_limit_per_minute: env_parse("SAFECONNECT_RATE_LIMIT_OTP_PER_MINUTE")
                .unwrap_or(defaults.otp_rate_limit_per_minute),
            otp_rate_limit_burst: env_parse("SAFECONNECT_RATE_LIMIT_OTP_BURST")
                .unwrap_or(defaults.otp_rate_limit_burst),
        }
    }

    /// Check if running in production mode (strict CORS).
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            // *.example.org matches any https subdomain
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain
                        .strip_suffix(pattern)
                        .is_some_and(|prefix| prefix.ends_with('.'));
                }
            }
            false
        })
    }
}

// ============================================================================
// DISPATCH CONFIGURATION
// ============================================================================

/// Limits applied to notification fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Upper bound on every single gateway call.
    pub call_timeout: Duration,

    /// Contacts notified concurrently.
    pub max_concurrency: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(DEFAULT_NOTIFY_TIMEOUT_SECS),
            max_concurrency: DEFAULT_NOTIFY_CONCURRENCY,
        }
    }
}

impl DispatchConfig {
    /// Environment variables:
    /// - `SAFECONNECT_NOTIFY_TIMEOUT_SECS` (default: 10)
    /// - `SAFECONNECT_NOTIFY_CONCURRENCY` (default: 16)
    pub fn from_env() -> Self {
        let call_timeout = Duration::from_secs(
            env_parse("SAFECONNECT_NOTIFY_TIMEOUT_SECS").unwrap_or(DEFAULT_NOTIFY_TIMEOUT_SECS),
        );
        let max_concurrency = env_parse::<usize>("SAFECONNECT_NOTIFY_CONCURRENCY")
            .unwrap_or(DEFAULT_NOTIFY_CONCURRENCY)
            .max(1);
        Self {
            call_timeout,
            max_concurrency,
        }
    }
}

// ============================================================================
// VERIFICATION CONFIGURATION
// ============================================================================

/// Lifetime and attempt budget of phone verification codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationConfig {
    pub code_ttl: Duration,
    pub max_attempts: u32,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            code_ttl: Duration::from_secs(DEFAULT_OTP_TTL_SECS),
            max_attempts: DEFAULT_OTP_MAX_ATTEMPTS,
        }
    }
}

impl VerificationConfig {
    /// Environment variables:
    /// - `SAFECONNECT_OTP_TTL_SECS` (default: 600)
    /// - `SAFECONNECT_OTP_MAX_ATTEMPTS` (default: 3)
    pub fn from_env() -> Self {
        Self {
            code_ttl: Duration::from_secs(
                env_parse("SAFECONNECT_OTP_TTL_SECS").unwrap_or(DEFAULT_OTP_TTL_SECS),
            ),
            max_attempts: env_parse("SAFECONNECT_OTP_MAX_ATTEMPTS")
                .unwrap_or(DEFAULT_OTP_MAX_ATTEMPTS)
                .max(1),
        }
    }
}

// ============================================================================
// VONAGE CONFIGURATION
// ============================================================================

/// Credential that must never appear in logs or debug output.
#[derive(Clone)]
pub struct ProviderSecret(SecretString);

impl ProviderSecret {
    /// Returns `None` for an empty value.
    pub fn new(secret: String) -> Option<Self> {
        if secret.trim().is_empty() {
            None
        } else {
            Some(Self(SecretString::from(secret)))
        }
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ProviderSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ProviderSecret([REDACTED])")
    }
}

/// Vonage credentials.
///
/// SMS needs the API key and secret. Voice additionally needs an
/// application id, its RSA private key and a caller number.
#[derive(Debug, Clone)]
pub struct VonageConfig {
    pub api_key: String,
    pub api_secret: ProviderSecret,
    pub application_id: Option<String>,
    pub private_key: Option<ProviderSecret>,
    pub voice_from: Option<String>,
}

impl VonageConfig {
    /// Load from the environment. `None` when the SMS credentials are absent.
    ///
    /// Environment variables:
    /// - `SAFECONNECT_VONAGE_API_KEY`, `SAFECONNECT_VONAGE_API_SECRET`
    /// - `SAFECONNECT_VONAGE_APPLICATION_ID`
    /// - `SAFECONNECT_VONAGE_PRIVATE_KEY` (PEM) or `SAFECONNECT_VONAGE_PRIVATE_KEY_PATH`
    /// - `SAFECONNECT_VONAGE_VOICE_FROM`: caller number for voice calls
    pub fn from_env() -> Option<Self> {
        let api_key = env_non_empty("SAFECONNECT_VONAGE_API_KEY")?;
        let api_secret = ProviderSecret::new(env_non_empty("SAFECONNECT_VONAGE_API_SECRET")?)?;

        let private_key = env_non_empty("SAFECONNECT_VONAGE_PRIVATE_KEY")
            .map(|pem| pem.replace("\\n", "\n"))
            .or_else(|| {
                let path = env_non_empty("SAFECONNECT_VONAGE_PRIVATE_KEY_PATH")?;
                match std::fs::read_to_string(&path) {
                    Ok(pem) => Some(pem),
                    Err(e) => {
                        tracing::warn!(path = %path, error = %e, "Cannot read Vonage private key");
                        None
                    }
                }
            })
            .and_then(ProviderSecret::new);

        Some(Self {
            api_key,
            api_secret,
            application_id: env_non_empty("SAFECONNECT_VONAGE_APPLICATION_ID"),
            private_key,
            voice_from: env_non_empty("SAFECONNECT_VONAGE_VOICE_FROM"),
        })
    }

    /// Whether every credential needed for voice calls is present.
    pub fn voice_configured(&self) -> bool {
        self.application_id.is_some() && self.private_key.is_some() && self.voice_from.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert!(config.cors_origins.is_empty());
        assert!(!config.cors_allow_credentials);
        assert_eq!(config.cors_max_age_secs, 86400);
        assert!(config.rate_limit_enabled);
        assert_eq!(config.otp_rate_limit_per_minute, 5);
        assert_eq!(config.otp_rate_limit_burst, 3);
    }

    #[test]
    fn test_origin_allowed_dev_mode() {
        let config = ApiConfig::default();
        assert!(!config.is_production());
        assert!(config.is_origin_allowed("https://anything.com"));
    }

    #[test]
    fn test_origin_allowed_production() {
        let config = ApiConfig {
            cors_origins: vec![
                "https://safeconnect.app".to_string(),
                "*.safeconnect.app".to_string(),
            ],
            ..ApiConfig::default()
        };
        assert!(config.is_production());
        assert!(config.is_origin_allowed("https://safeconnect.app"));
        assert!(config.is_origin_allowed("https://m.safeconnect.app"));
        assert!(!config.is_origin_allowed("https://notsafeconnect.app"));
        assert!(!config.is_origin_allowed("https://evil.com"));
    }

    #[test]
    fn test_dispatch_defaults() {
        let config = DispatchConfig::default();
        assert_eq!(config.call_timeout, Duration::from_secs(10));
        assert_eq!(config.max_concurrency, 16);
    }

    #[test]
    fn test_verification_defaults() {
        let config = VerificationConfig::default();
        assert_eq!(config.code_ttl, Duration::from_secs(600));
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn test_provider_secret_is_redacted() {
        let secret = ProviderSecret::new("hunter2".to_string()).expect("non-empty");
        assert_eq!(secret.expose(), "hunter2");
        assert!(!format!("{:?}", secret).contains("hunter2"));
        assert!(ProviderSecret::new("  ".to_string()).is_none());
    }

    #[test]
    fn test_voice_needs_all_credentials() {
        let mut config = VonageConfig {
            api_key: "key".to_string(),
            api_secret: ProviderSecret::new("secret".to_string()).expect("non-empty"),
            application_id: Some("app".to_string()),
            private_key: None,
            voice_from: Some("15550000000".to_string()),
        };
        assert!(!config.voice_configured());
        config.private_key = ProviderSecret::new("pem".to_string());
        assert!(config.voice_configured());
    }
}
