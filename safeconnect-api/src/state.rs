//! Shared application state for Axum routers.

use std::sync::Arc;

use safeconnect_core::{Clock, NotificationGateway};
use safeconnect_storage::JourneyStore;

use crate::config::{DispatchConfig, VerificationConfig};
use crate::engine::{EscalationEngine, OverdueEscalation};
use crate::services::{
    AlertDispatcher, DashMapVerificationStore, JourneyService, VerificationService,
};

/// Application-wide state shared across all routes.
///
/// Every component is cheap to clone; clones share the same engine, store
/// and verification codes.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JourneyStore>,
    pub clock: Arc<dyn Clock>,
    pub engine: EscalationEngine,
    pub dispatcher: AlertDispatcher,
    /// Overdue escalation, also installed as the engine's fire handler.
    pub escalation: OverdueEscalation,
    pub journeys: JourneyService,
    pub verification: VerificationService,
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Wire the services together. The engine is created but not started;
    /// call [`EscalationEngine::start`] on `state.engine` to run it.
    pub fn new(
        store: Arc<dyn JourneyStore>,
        gateway: Arc<dyn NotificationGateway>,
        clock: Arc<dyn Clock>,
        dispatch_config: DispatchConfig,
        verification_config: VerificationConfig,
    ) -> Self {
        let dispatcher = AlertDispatcher::new(
            store.clone(),
            gateway.clone(),
            clock.clone(),
            dispatch_config,
        );
        let escalation = OverdueEscalation::new(store.clone(), dispatcher.clone());
        let engine = EscalationEngine::new(clock.clone(), Arc::new(escalation.clone()));
        let journeys = JourneyService::new(
            store.clone(),
            engine.clone(),
            dispatcher.clone(),
            clock.clone(),
        );
        let verification = VerificationService::new(
            Arc::new(DashMapVerificationStore::new()),
            gateway,
            clock.clone(),
            verification_config,
            dispatch_config.call_timeout,
        );

        Self {
            store,
            clock,
            engine,
            dispatcher,
            escalation,
            journeys,
            verification,
            start_time: std::time::Instant::now(),
        }
    }
}

crate::impl_from_ref!(Arc<dyn JourneyStore>, store);
crate::impl_from_ref!(Arc<dyn Clock>, clock);
crate::impl_from_ref!(EscalationEngine, engine);
crate::impl_from_ref!(AlertDispatcher, dispatcher);
crate::impl_from_ref!(OverdueEscalation, escalation);
crate::impl_from_ref!(JourneyService, journeys);
crate::impl_from_ref!(VerificationService, verification);
crate::impl_from_ref!(std::time::Instant, start_time);
