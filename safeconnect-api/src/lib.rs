//! SafeConnect API - Journey Safety Timers and Emergency Alerts
//!
//! REST layer (Axum) over the journey store, together with the services
//! that make the product work:
//!
//! - the escalation engine, which tracks every active journey's deadline
//!   on a single scheduler task and escalates a missed check-in exactly once
//! - the alert dispatcher, which records an alert and then notifies all
//!   emergency contacts by SMS and voice concurrently
//! - phone verification with short-lived, attempt-limited codes
//! - notification providers (Vonage, or a logging console gateway)

#[macro_use]
pub mod macros;

pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod extractors;
pub mod jobs;
pub mod middleware;
#[cfg(feature = "openapi")]
pub mod openapi;
pub mod providers;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use config::{ApiConfig, DispatchConfig, VerificationConfig, VonageConfig};
pub use engine::{
    ClaimOutcome, CompletionOutcome, EngineConfig, EscalationEngine, FireHandler, FireSource,
    FiredJourney, OverdueEscalation, RecoverySummary, TimerState,
};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use jobs::{housekeeping_task, HousekeepingConfig};
#[cfg(feature = "openapi")]
pub use openapi::ApiDoc;
pub use providers::{gateway_from_env, ConsoleGateway, VonageGateway};
pub use routes::create_api_router;
pub use services::{
    AlertDispatcher, AlertTrigger, DeliveryStatus, DispatchOutcome, DispatchReport,
    JourneyService, VerificationOutcome, VerificationService,
};
pub use state::AppState;
pub use types::*;
