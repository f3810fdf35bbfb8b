//! Journey deadline timers and exactly-once escalation.
//!
//! Every scheduled journey owns a [`TimerCell`] whose state starts at
//! `Scheduled` and leaves it through exactly one compare-and-swap, either to
//! `Resolved` (the person checked in) or to `Fired` (the deadline elapsed or
//! a caller claimed the escalation). Whichever side loses the race observes
//! the winner's state and does nothing.
//!
//! Deadlines are multiplexed on a single scheduler task that owns a min-heap
//! of `(instant, journey)` entries. Resolved journeys are not removed from
//! the heap; their entries are dropped when popped.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use safeconnect_core::{Clock, EngineError, JourneyId, StoreError, Timestamp};
use safeconnect_storage::JourneyStore;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::constants::DEFAULT_TIMER_RETENTION_SECS;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Escalation engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long settled cells stay inspectable before housekeeping drops them.
    pub retention: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(DEFAULT_TIMER_RETENTION_SECS),
        }
    }
}

impl EngineConfig {
    /// Environment variables:
    /// - `SAFECONNECT_TIMER_RETENTION_SECS` (default: 3600)
    pub fn from_env() -> Self {
        let retention = std::env::var("SAFECONNECT_TIMER_RETENTION_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Self::default().retention);
        Self { retention }
    }
}

// ============================================================================
// TIMER STATE
// ============================================================================

/// Lifecycle of one journey deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TimerState {
    Scheduled = 0,
    Resolved = 1,
    Fired = 2,
}

impl TimerState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => TimerState::Scheduled,
            1 => TimerState::Resolved,
            _ => TimerState::Fired,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimerState::Scheduled => "scheduled",
            TimerState::Resolved => "resolved",
            TimerState::Fired => "fired",
        }
    }
}

#[derive(Debug)]
struct TimerCell {
    state: AtomicU8,
    deadline: Timestamp,
    settled_at: OnceLock<Instant>,
}

impl TimerCell {
    fn new(deadline: Timestamp, state: TimerState) -> Self {
        let cell = Self {
            state: AtomicU8::new(state as u8),
            deadline,
            settled_at: OnceLock::new(),
        };
        if state != TimerState::Scheduled {
            let _ = cell.settled_at.set(Instant::now());
        }
        cell
    }

    fn state(&self) -> TimerState {
        TimerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Leave `Scheduled` for `to`. On failure returns the state some other
    /// caller already settled on.
    fn settle(&self, to: TimerState) -> Result<(), TimerState> {
        match self.state.compare_exchange(
            TimerState::Scheduled as u8,
            to as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                let _ = self.settled_at.set(Instant::now());
                Ok(())
            }
            Err(current) => Err(TimerState::from_u8(current)),
        }
    }

    fn settled_longer_than(&self, retention: Duration) -> bool {
        self.settled_at
            .get()
            .is_some_and(|at| at.elapsed() >= retention)
    }
}

// ============================================================================
// OUTCOMES
// ============================================================================

/// Result of [`EscalationEngine::complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The deadline was disarmed by this call.
    Resolved,
    AlreadyResolved,
    /// The escalation won the race; contacts have been or are being notified.
    AlreadyFired,
    NotScheduled,
}

/// Result of [`EscalationEngine::claim`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The caller now owns the escalation and must run it.
    Claimed,
    AlreadyFired,
    AlreadyResolved,
    NotScheduled,
}

/// What caused an escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FireSource {
    /// The scheduler saw the deadline elapse.
    Timer,
    /// The startup or periodic scan found a journey already past its deadline.
    Recovery,
    /// A client reported the missed check-in.
    Manual,
}

impl FireSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FireSource::Timer => "timer",
            FireSource::Recovery => "recovery",
            FireSource::Manual => "manual",
        }
    }
}

/// A journey whose deadline fired.
#[derive(Debug, Clone, PartialEq)]
pub struct FiredJourney {
    pub journey_id: JourneyId,
    pub deadline: Timestamp,
    pub fired_at: Timestamp,
    pub source: FireSource,
}

/// Counts from one [`EscalationEngine::recover`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoverySummary {
    pub scanned: usize,
    pub scheduled: usize,
    pub fired: usize,
    pub already_tracked: usize,
}

/// Receives every fired journey exactly once.
#[async_trait]
pub trait FireHandler: Send + Sync {
    async fn on_fire(&self, fired: FiredJourney);
}

// ============================================================================
// ENGINE
// ============================================================================

type DeadlineQueue = BinaryHeap<Reverse<(Instant, JourneyId)>>;

struct EngineInner {
    cells: DashMap<JourneyId, Arc<TimerCell>>,
    queue: Mutex<DeadlineQueue>,
    wake: Notify,
    armed: AtomicUsize,
    shut_down: AtomicBool,
    clock: Arc<dyn Clock>,
    handler: Arc<dyn FireHandler>,
}

/// Authoritative per-journey deadline state.
///
/// Cheap to clone; clones share the same timers.
#[derive(Clone)]
pub struct EscalationEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for EscalationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EscalationEngine")
            .field("tracked", &self.inner.cells.len())
            .field("armed", &self.armed_count())
            .finish()
    }
}

impl EscalationEngine {
    pub fn new(clock: Arc<dyn Clock>, handler: Arc<dyn FireHandler>) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                cells: DashMap::new(),
                queue: Mutex::new(BinaryHeap::new()),
                wake: Notify::new(),
                armed: AtomicUsize::new(0),
                shut_down: AtomicBool::new(false),
                clock,
                handler,
            }),
        }
    }

    /// Arm the deadline of `journey_id`.
    ///
    /// A deadline already in the past fires on the next scheduler turn.
    pub fn schedule(&self, journey_id: JourneyId, deadline: Timestamp) -> Result<(), EngineError> {
        if self.inner.shut_down.load(Ordering::Acquire) {
            return Err(EngineError::ShutDown);
        }

        match self.inner.cells.entry(journey_id) {
            Entry::Occupied(_) => {
                return Err(EngineError::DuplicateSchedule {
                    journey_id: journey_id.into(),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(TimerCell::new(deadline, TimerState::Scheduled)));
            }
        }
        self.inner.armed.fetch_add(1, Ordering::AcqRel);

        let at = self.instant_for(deadline);
        self.inner
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Reverse((at, journey_id)));
        self.inner.wake.notify_one();

        tracing::debug!(journey_id = %journey_id, deadline = %deadline, "Deadline armed");
        Ok(())
    }

    /// Disarm the deadline because the person checked in (`arrived`) or cancelled.
    pub fn complete(&self, journey_id: JourneyId, arrived: bool) -> CompletionOutcome {
        let Some(cell) = self.cell(journey_id) else {
            return CompletionOutcome::NotScheduled;
        };
        let outcome = match cell.settle(TimerState::Resolved) {
            Ok(()) => {
                self.inner.armed.fetch_sub(1, Ordering::AcqRel);
                CompletionOutcome::Resolved
            }
            Err(TimerState::Fired) => CompletionOutcome::AlreadyFired,
            Err(_) => CompletionOutcome::AlreadyResolved,
        };
        tracing::debug!(
            journey_id = %journey_id,
            arrived,
            outcome = ?outcome,
            "Deadline completion"
        );
        outcome
    }

    /// Take ownership of the escalation on behalf of an explicit caller.
    ///
    /// On [`ClaimOutcome::Claimed`] the timer will never fire and the caller
    /// is responsible for running the escalation.
    pub fn claim(&self, journey_id: JourneyId) -> ClaimOutcome {
        let Some(cell) = self.cell(journey_id) else {
            return ClaimOutcome::NotScheduled;
        };
        match cell.settle(TimerState::Fired) {
            Ok(()) => {
                self.inner.armed.fetch_sub(1, Ordering::AcqRel);
                tracing::info!(journey_id = %journey_id, "Escalation claimed by caller");
                ClaimOutcome::Claimed
            }
            Err(TimerState::Resolved) => ClaimOutcome::AlreadyResolved,
            Err(_) => ClaimOutcome::AlreadyFired,
        }
    }

    /// Like [`claim`](Self::claim), but also covers journeys the engine does
    /// not track (created before a restart and not yet recovered). Those get
    /// a cell that is `Fired` from the start, so the recovery scan and other
    /// callers see the escalation as taken. Never returns `NotScheduled`.
    pub fn claim_untracked(&self, journey_id: JourneyId, deadline: Timestamp) -> ClaimOutcome {
        if self.insert_fired(journey_id, deadline) {
            tracing::info!(journey_id = %journey_id, "Escalation claimed for untracked journey");
            return ClaimOutcome::Claimed;
        }
        match self.claim(journey_id) {
            // Pruned between the insert attempt and the claim
            ClaimOutcome::NotScheduled => ClaimOutcome::AlreadyFired,
            outcome => outcome,
        }
    }

    /// Current state of a journey's deadline, if tracked.
    pub fn state(&self, journey_id: JourneyId) -> Option<TimerState> {
        self.cell(journey_id).map(|cell| cell.state())
    }

    /// Deadlines still waiting to fire.
    pub fn armed_count(&self) -> usize {
        self.inner.armed.load(Ordering::Acquire)
    }

    /// Drop settled cells older than `retention`. Returns how many were dropped.
    pub fn prune_settled(&self, retention: Duration) -> usize {
        let before = self.inner.cells.len();
        self.inner.cells.retain(|_, cell| {
            cell.state() == TimerState::Scheduled || !cell.settled_longer_than(retention)
        });
        before.saturating_sub(self.inner.cells.len())
    }

    /// Reconcile engine state with the store's active journeys.
    ///
    /// Journeys without a cell are armed when their deadline is ahead, or
    /// fired right away when it has passed. Safe to run repeatedly.
    pub async fn recover(&self, store: &dyn JourneyStore) -> Result<RecoverySummary, StoreError> {
        let active = store.journey_list_active().await?;
        let now = self.inner.clock.now();
        let mut summary = RecoverySummary {
            scanned: active.len(),
            ..RecoverySummary::default()
        };

        for journey in active {
            if self.inner.cells.contains_key(&journey.id) {
                summary.already_tracked += 1;
                continue;
            }

            if journey.expected_arrival > now {
                match self.schedule(journey.id, journey.expected_arrival) {
                    Ok(()) => summary.scheduled += 1,
                    Err(EngineError::DuplicateSchedule { .. }) => summary.already_tracked += 1,
                    Err(EngineError::ShutDown) => break,
                }
                continue;
            }

            if self.insert_fired(journey.id, journey.expected_arrival) {
                tracing::warn!(
                    journey_id = %journey.id,
                    deadline = %journey.expected_arrival,
                    "Active journey found past its deadline"
                );
                self.dispatch_fire(FiredJourney {
                    journey_id: journey.id,
                    deadline: journey.expected_arrival,
                    fired_at: now,
                    source: FireSource::Recovery,
                });
                summary.fired += 1;
            } else {
                summary.already_tracked += 1;
            }
        }

        if summary.scheduled > 0 || summary.fired > 0 {
            tracing::info!(
                scanned = summary.scanned,
                scheduled = summary.scheduled,
                fired = summary.fired,
                "Recovery scan reconciled journeys"
            );
        }
        Ok(summary)
    }

    /// Spawn the scheduler task. It runs until `shutdown` flips to `true`.
    pub fn start(&self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            tracing::info!("Escalation scheduler started");
            loop {
                let next = engine.fire_due();

                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = engine.inner.wake.notified() => {}
                    _ = sleep_until_next(next) => {}
                }
            }
            engine.inner.shut_down.store(true, Ordering::Release);
            tracing::info!(armed = engine.armed_count(), "Escalation scheduler stopped");
        })
    }

    /// Pop and fire every due entry. Returns the next pending instant.
    fn fire_due(&self) -> Option<Instant> {
        loop {
            let due = {
                let mut queue = self.inner.queue.lock().unwrap_or_else(|e| e.into_inner());
                match queue.peek() {
                    Some(Reverse((at, _))) if *at <= Instant::now() => queue.pop(),
                    Some(Reverse((at, _))) => return Some(*at),
                    None => return None,
                }
            };
            if let Some(Reverse((_, journey_id))) = due {
                self.fire_if_scheduled(journey_id);
            }
        }
    }

    fn fire_if_scheduled(&self, journey_id: JourneyId) {
        let Some(cell) = self.cell(journey_id) else {
            return;
        };
        match cell.settle(TimerState::Fired) {
            Ok(()) => {
                self.inner.armed.fetch_sub(1, Ordering::AcqRel);
                tracing::info!(
                    journey_id = %journey_id,
                    deadline = %cell.deadline,
                    "Journey deadline elapsed"
                );
                self.dispatch_fire(FiredJourney {
                    journey_id,
                    deadline: cell.deadline,
                    fired_at: self.inner.clock.now(),
                    source: FireSource::Timer,
                });
            }
            Err(state) => {
                tracing::trace!(journey_id = %journey_id, state = state.as_str(), "Stale deadline discarded");
            }
        }
    }

    fn dispatch_fire(&self, fired: FiredJourney) {
        let handler = Arc::clone(&self.inner.handler);
        tokio::spawn(async move {
            handler.on_fire(fired).await;
        });
    }

    /// Insert an already-fired cell. False when the journey has one.
    fn insert_fired(&self, journey_id: JourneyId, deadline: Timestamp) -> bool {
        match self.inner.cells.entry(journey_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(TimerCell::new(deadline, TimerState::Fired)));
                true
            }
        }
    }

    fn cell(&self, journey_id: JourneyId) -> Option<Arc<TimerCell>> {
        self.inner.cells.get(&journey_id).map(|c| Arc::clone(c.value()))
    }

    fn instant_for(&self, deadline: Timestamp) -> Instant {
        let remaining = (deadline - self.inner.clock.now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        Instant::now() + remaining
    }
}

async fn sleep_until_next(next: Option<Instant>) {
    match next {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use safeconnect_core::{EntityIdType, SystemClock};

    #[derive(Default)]
    struct CountingHandler {
        fired: Mutex<Vec<FiredJourney>>,
    }

    #[async_trait]
    impl FireHandler for CountingHandler {
        async fn on_fire(&self, fired: FiredJourney) {
            self.fired.lock().expect("lock").push(fired);
        }
    }

    fn engine() -> (EscalationEngine, Arc<CountingHandler>) {
        let handler = Arc::new(CountingHandler::default());
        let engine = EscalationEngine::new(Arc::new(SystemClock), handler.clone());
        (engine, handler)
    }

    #[test]
    fn test_cell_settles_once() {
        let cell = TimerCell::new(chrono::Utc::now(), TimerState::Scheduled);
        assert_eq!(cell.settle(TimerState::Resolved), Ok(()));
        assert_eq!(cell.settle(TimerState::Fired), Err(TimerState::Resolved));
        assert_eq!(cell.state(), TimerState::Resolved);
    }

    #[tokio::test]
    async fn test_duplicate_schedule_rejected() {
        let (engine, _) = engine();
        let id = JourneyId::now_v7();
        let deadline = chrono::Utc::now() + ChronoDuration::minutes(5);
        engine.schedule(id, deadline).expect("first schedule");
        assert!(matches!(
            engine.schedule(id, deadline),
            Err(EngineError::DuplicateSchedule { .. })
        ));
        assert_eq!(engine.armed_count(), 1);
    }

    #[tokio::test]
    async fn test_complete_then_claim() {
        let (engine, _) = engine();
        let id = JourneyId::now_v7();
        engine
            .schedule(id, chrono::Utc::now() + ChronoDuration::minutes(5))
            .expect("schedule");

        assert_eq!(engine.complete(id, true), CompletionOutcome::Resolved);
        assert_eq!(engine.complete(id, true), CompletionOutcome::AlreadyResolved);
        assert_eq!(engine.claim(id), ClaimOutcome::AlreadyResolved);
        assert_eq!(engine.armed_count(), 0);
        assert_eq!(engine.complete(JourneyId::now_v7(), true), CompletionOutcome::NotScheduled);
    }

    #[tokio::test]
    async fn test_claim_blocks_completion() {
        let (engine, _) = engine();
        let id = JourneyId::now_v7();
        engine
            .schedule(id, chrono::Utc::now() + ChronoDuration::minutes(5))
            .expect("schedule");

        assert_eq!(engine.claim(id), ClaimOutcome::Claimed);
        assert_eq!(engine.claim(id), ClaimOutcome::AlreadyFired);
        assert_eq!(engine.complete(id, true), CompletionOutcome::AlreadyFired);
        assert_eq!(engine.state(id), Some(TimerState::Fired));
    }

    #[tokio::test]
    async fn test_claim_untracked_takes_escalation_once() {
        let (engine, _) = engine();
        let id = JourneyId::now_v7();
        let deadline = chrono::Utc::now() - ChronoDuration::minutes(5);

        assert_eq!(engine.claim(id), ClaimOutcome::NotScheduled);
        assert_eq!(engine.claim_untracked(id, deadline), ClaimOutcome::Claimed);
        assert_eq!(engine.state(id), Some(TimerState::Fired));
        assert_eq!(engine.claim_untracked(id, deadline), ClaimOutcome::AlreadyFired);
        assert_eq!(engine.complete(id, true), CompletionOutcome::AlreadyFired);
        assert_eq!(engine.armed_count(), 0);
    }

    #[tokio::test]
    async fn test_claim_untracked_respects_armed_deadline() {
        let (engine, _) = engine();
        let resolved = JourneyId::now_v7();
        let armed = JourneyId::now_v7();
        let deadline = chrono::Utc::now() + ChronoDuration::minutes(5);
        engine.schedule(resolved, deadline).expect("schedule");
        engine.schedule(armed, deadline).expect("schedule");
        engine.complete(resolved, true);

        assert_eq!(
            engine.claim_untracked(resolved, deadline),
            ClaimOutcome::AlreadyResolved
        );
        assert_eq!(engine.claim_untracked(armed, deadline), ClaimOutcome::Claimed);
        assert_eq!(engine.armed_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prune_keeps_armed_cells() {
        let (engine, _) = engine();
        let armed = JourneyId::now_v7();
        let settled = JourneyId::now_v7();
        let deadline = chrono::Utc::now() + ChronoDuration::hours(5);
        engine.schedule(armed, deadline).expect("schedule");
        engine.schedule(settled, deadline).expect("schedule");
        engine.complete(settled, false);

        assert_eq!(engine.prune_settled(Duration::from_secs(60)), 0);
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(engine.prune_settled(Duration::from_secs(60)), 1);
        assert_eq!(engine.state(settled), None);
        assert_eq!(engine.state(armed), Some(TimerState::Scheduled));
    }
}
