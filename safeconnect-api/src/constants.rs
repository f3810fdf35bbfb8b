//! Constants for SafeConnect API
//!
//! This module contains all constant values used throughout the API.

// ============================================================================
// CORS
// ============================================================================

/// Default CORS max age in seconds (24 hours)
pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86400;

// ============================================================================
// RATE LIMITING
// ============================================================================

/// Default verification-code requests per client per minute
pub const DEFAULT_OTP_RATE_LIMIT_PER_MINUTE: u32 = 5;

/// Default burst size for verification-code requests
pub const DEFAULT_OTP_RATE_LIMIT_BURST: u32 = 3;

// ============================================================================
// NOTIFICATIONS
// ============================================================================

/// Timeout applied to every single gateway call
pub const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 10;

/// Contacts notified concurrently per dispatch
pub const DEFAULT_NOTIFY_CONCURRENCY: usize = 16;

/// Sender id shown on outgoing SMS
pub const SMS_SENDER_ID: &str = "SafeConnect";

/// Vonage SMS endpoint
pub const VONAGE_SMS_URL: &str = "https://rest.nexmo.com/sms/json";

/// Vonage voice call endpoint
pub const VONAGE_VOICE_URL: &str = "https://api.nexmo.com/v1/calls";

/// Lifetime of the JWT minted for each voice call
pub const VONAGE_JWT_TTL_SECS: i64 = 900;

// ============================================================================
// VERIFICATION CODES
// ============================================================================

/// Lifetime of a verification code (10 minutes)
pub const DEFAULT_OTP_TTL_SECS: u64 = 600;

/// Wrong guesses allowed before a code is burned
pub const DEFAULT_OTP_MAX_ATTEMPTS: u32 = 3;

// ============================================================================
// ESCALATION ENGINE
// ============================================================================

/// How long settled timer cells are kept for inspection (1 hour)
pub const DEFAULT_TIMER_RETENTION_SECS: u64 = 3600;

// ============================================================================
// HOUSEKEEPING
// ============================================================================

/// How often settled timers and expired codes are swept
pub const DEFAULT_HOUSEKEEPING_INTERVAL_SECS: u64 = 60;

/// How often active journeys are reconciled against the engine
pub const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 300;

// ============================================================================
// SERVER
// ============================================================================

pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

pub const DEFAULT_PORT: u16 = 3000;
