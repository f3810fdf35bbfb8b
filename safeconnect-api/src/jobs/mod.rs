//! Background Jobs for the SafeConnect API
//!
//! - `housekeeping`: prunes settled timers and expired verification codes,
//!   reconciles active journeys with the escalation engine
//!
//! Jobs are spawned at server startup with a `watch` shutdown channel:
//!
//! ```ignore
//! use safeconnect_api::jobs::{housekeeping_task, HousekeepingConfig};
//!
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! tokio::spawn(housekeeping_task(engine, store, verification, HousekeepingConfig::default(), shutdown_rx));
//! let _ = shutdown_tx.send(true);
//! ```

pub mod housekeeping;

pub use housekeeping::{
    housekeeping_task, HousekeepingConfig, HousekeepingMetrics, HousekeepingSnapshot,
};
