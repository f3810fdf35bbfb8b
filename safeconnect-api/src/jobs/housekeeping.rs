//! Housekeeping Background Task
//!
//! Keeps the in-process state bounded and consistent with the store:
//!
//! - drops settled timer cells older than the retention window
//! - purges expired verification codes
//! - re-runs the engine's recovery scan so active journeys whose deadline
//!   was never armed (a failed schedule, a journey written by another
//!   process) are armed or escalated
//! - refreshes the armed-timer gauge
//!
//! ```ignore
//! use safeconnect_api::jobs::{housekeeping_task, HousekeepingConfig};
//! use tokio::sync::watch;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let handle = tokio::spawn(housekeeping_task(
//!     state.engine.clone(),
//!     state.store.clone(),
//!     state.verification.clone(),
//!     HousekeepingConfig::from_env(),
//!     shutdown_rx,
//! ));
//!
//! let _ = shutdown_tx.send(true);
//! let metrics = handle.await?;
//! ```

use safeconnect_storage::JourneyStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::constants::{DEFAULT_HOUSEKEEPING_INTERVAL_SECS, DEFAULT_RECONCILE_INTERVAL_SECS};
use crate::engine::{EngineConfig, EscalationEngine};
use crate::services::VerificationService;
use crate::telemetry::METRICS;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the housekeeping task.
#[derive(Debug, Clone)]
pub struct HousekeepingConfig {
    /// How often cells and codes are swept (default: 60 seconds)
    pub sweep_interval: Duration,

    /// How often active journeys are reconciled (default: 5 minutes)
    pub reconcile_interval: Duration,

    /// How long settled timer cells are kept (default: 1 hour)
    pub timer_retention: Duration,
}

impl Default for HousekeepingConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(DEFAULT_HOUSEKEEPING_INTERVAL_SECS),
            reconcile_interval: Duration::from_secs(DEFAULT_RECONCILE_INTERVAL_SECS),
            timer_retention: EngineConfig::default().retention,
        }
    }
}

impl HousekeepingConfig {
    /// Create HousekeepingConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `SAFECONNECT_HOUSEKEEPING_INTERVAL_SECS`: Sweep interval (default: 60)
    /// - `SAFECONNECT_HOUSEKEEPING_RECONCILE_SECS`: Reconcile interval (default: 300)
    /// - `SAFECONNECT_TIMER_RETENTION_SECS`: Settled cell retention (default: 3600)
    pub fn from_env() -> Self {
        let sweep_interval = Duration::from_secs(
            std::env::var("SAFECONNECT_HOUSEKEEPING_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_HOUSEKEEPING_INTERVAL_SECS),
        );

        let reconcile_interval = Duration::from_secs(
            std::env::var("SAFECONNECT_HOUSEKEEPING_RECONCILE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_RECONCILE_INTERVAL_SECS),
        );

        Self {
            sweep_interval,
            reconcile_interval,
            timer_retention: EngineConfig::from_env().retention,
        }
    }

    /// Short intervals for development and tests.
    pub fn development() -> Self {
        Self {
            sweep_interval: Duration::from_secs(10),
            reconcile_interval: Duration::from_secs(30),
            timer_retention: Duration::from_secs(300),
        }
    }

    pub fn production() -> Self {
        Self {
            sweep_interval: Duration::from_secs(DEFAULT_HOUSEKEEPING_INTERVAL_SECS),
            reconcile_interval: Duration::from_secs(DEFAULT_RECONCILE_INTERVAL_SECS),
            timer_retention: Duration::from_secs(6 * 3600),
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for housekeeping activity since startup.
#[derive(Debug, Default)]
pub struct HousekeepingMetrics {
    pub timer_cells_pruned: AtomicU64,
    pub codes_purged: AtomicU64,
    /// Deadlines armed by reconciliation
    pub journeys_rearmed: AtomicU64,
    /// Past-due journeys escalated by reconciliation
    pub journeys_fired: AtomicU64,
    pub sweep_cycles: AtomicU64,
    pub reconcile_errors: AtomicU64,
}

impl HousekeepingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> HousekeepingSnapshot {
        HousekeepingSnapshot {
            timer_cells_pruned: self.timer_cells_pruned.load(Ordering::Relaxed),
            codes_purged: self.codes_purged.load(Ordering::Relaxed),
            journeys_rearmed: self.journeys_rearmed.load(Ordering::Relaxed),
            journeys_fired: self.journeys_fired.load(Ordering::Relaxed),
            sweep_cycles: self.sweep_cycles.load(Ordering::Relaxed),
            reconcile_errors: self.reconcile_errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of housekeeping metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HousekeepingSnapshot {
    pub timer_cells_pruned: u64,
    pub codes_purged: u64,
    pub journeys_rearmed: u64,
    pub journeys_fired: u64,
    pub sweep_cycles: u64,
    pub reconcile_errors: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Run housekeeping until the shutdown signal flips to `true`.
///
/// Returns the metrics collected during the task's lifetime.
pub async fn housekeeping_task(
    engine: EscalationEngine,
    store: Arc<dyn JourneyStore>,
    verification: VerificationService,
    config: HousekeepingConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<HousekeepingMetrics> {
    let metrics = Arc::new(HousekeepingMetrics::new());

    let mut sweep_interval = interval(config.sweep_interval);
    sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut reconcile_interval = interval(config.reconcile_interval);
    reconcile_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // Startup already ran a recovery scan
    reconcile_interval.reset();

    tracing::info!(
        sweep_interval_secs = config.sweep_interval.as_secs(),
        reconcile_interval_secs = config.reconcile_interval.as_secs(),
        timer_retention_secs = config.timer_retention.as_secs(),
        "Housekeeping task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Housekeeping task shutting down");
                    break;
                }
            }

            _ = sweep_interval.tick() => {
                sweep(&engine, &verification, &config, &metrics);
            }

            _ = reconcile_interval.tick() => {
                reconcile(&engine, store.as_ref(), &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        timer_cells_pruned = snapshot.timer_cells_pruned,
        codes_purged = snapshot.codes_purged,
        journeys_rearmed = snapshot.journeys_rearmed,
        journeys_fired = snapshot.journeys_fired,
        sweep_cycles = snapshot.sweep_cycles,
        reconcile_errors = snapshot.reconcile_errors,
        "Housekeeping task completed"
    );

    metrics
}

fn sweep(
    engine: &EscalationEngine,
    verification: &VerificationService,
    config: &HousekeepingConfig,
    metrics: &HousekeepingMetrics,
) {
    metrics.sweep_cycles.fetch_add(1, Ordering::Relaxed);

    let pruned = engine.prune_settled(config.timer_retention);
    let purged = verification.purge_expired();
    metrics
        .timer_cells_pruned
        .fetch_add(pruned as u64, Ordering::Relaxed);
    metrics.codes_purged.fetch_add(purged as u64, Ordering::Relaxed);
    METRICS.set_armed_timers(engine.armed_count());

    if pruned > 0 || purged > 0 {
        tracing::debug!(pruned, purged, "Housekeeping sweep completed");
    } else {
        tracing::trace!("Housekeeping sweep found nothing to drop");
    }
}

async fn reconcile(engine: &EscalationEngine, store: &dyn JourneyStore, metrics: &HousekeepingMetrics) {
    match engine.recover(store).await {
        Ok(summary) => {
            metrics
                .journeys_rearmed
                .fetch_add(summary.scheduled as u64, Ordering::Relaxed);
            metrics
                .journeys_fired
                .fetch_add(summary.fired as u64, Ordering::Relaxed);
        }
        Err(e) => {
            tracing::error!(error = %e, "Journey reconciliation failed");
            metrics.reconcile_errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}
