//! Notification Providers
//!
//! Concrete [`NotificationGateway`] adapters. The trait itself lives in
//! `safeconnect_core::notify`.

pub mod console;
pub mod vonage;

pub use console::ConsoleGateway;
pub use safeconnect_core::NotificationGateway;
pub use vonage::VonageGateway;

use std::sync::Arc;

use crate::config::VonageConfig;

/// Pick the gateway from the environment: Vonage when its credentials are
/// present, otherwise the console gateway.
pub fn gateway_from_env() -> Arc<dyn NotificationGateway> {
    let Some(config) = VonageConfig::from_env() else {
        tracing::warn!("No notification provider configured, messages will only be logged");
        return Arc::new(ConsoleGateway::new());
    };

    match VonageGateway::new(config) {
        Ok(gateway) => {
            tracing::info!(voice = gateway.voice_available(), "Vonage gateway configured");
            Arc::new(gateway)
        }
        Err(e) => {
            tracing::error!(error = %e, "Vonage gateway unavailable, falling back to console");
            Arc::new(ConsoleGateway::new())
        }
    }
}
