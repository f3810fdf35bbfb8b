//! Overdue escalation.
//!
//! Runs once per journey that missed its check-in: records the overdue
//! alert, moves the journey from `active` to `overdue` and notifies the
//! contacts.

use async_trait::async_trait;
use safeconnect_core::{Coordinates, JourneyId, JourneyStatus};
use safeconnect_storage::{JourneyStore, TransitionResult};
use std::sync::Arc;

use super::escalation::{FireHandler, FireSource, FiredJourney};
use crate::error::{ApiError, ApiResult};
use crate::services::{AlertDispatcher, AlertTrigger, DispatchOutcome};
use crate::telemetry::METRICS;

/// [`FireHandler`] that escalates missed check-ins to emergency contacts.
#[derive(Clone)]
pub struct OverdueEscalation {
    store: Arc<dyn JourneyStore>,
    dispatcher: AlertDispatcher,
}

impl OverdueEscalation {
    pub fn new(store: Arc<dyn JourneyStore>, dispatcher: AlertDispatcher) -> Self {
        Self { store, dispatcher }
    }

    /// Escalate `journey_id`. The caller must own the escalation, either as
    /// the engine's fire callback or through a successful claim, which means
    /// the journey's cell is `Fired`.
    ///
    /// A check-in that lands after the cell fired still finishes the journey,
    /// but it no longer stops the escalation: the alert is opened and
    /// delivered whatever the stored status is by now.
    ///
    /// `location` is the last position the client reported, if any.
    pub async fn escalate(
        &self,
        journey_id: JourneyId,
        location: Option<Coordinates>,
        source: FireSource,
    ) -> ApiResult<DispatchOutcome> {
        let journey = self
            .store
            .journey_get(journey_id)
            .await?
            .ok_or_else(|| ApiError::journey_not_found(journey_id))?;

        if journey.status.is_terminal() {
            tracing::info!(
                journey_id = %journey_id,
                status = %journey.status,
                "Journey finished after its deadline fired, escalating anyway"
            );
        }

        METRICS.record_escalation(source.as_str());

        let opened = self
            .dispatcher
            .open(AlertTrigger::overdue(journey.user_id, journey_id, location))
            .await?;

        let transition = self
            .store
            .journey_transition(
                journey_id,
                JourneyStatus::sources_for(JourneyStatus::Overdue),
                JourneyStatus::Overdue,
                None,
            )
            .await;
        match transition {
            Ok(TransitionResult::Applied(_)) => {
                tracing::info!(journey_id = %journey_id, source = source.as_str(), "Journey marked overdue");
            }
            Ok(TransitionResult::Rejected(current)) => {
                tracing::warn!(
                    journey_id = %journey_id,
                    status = %current.status,
                    "Journey status moved on before escalation, left unchanged"
                );
            }
            Ok(TransitionResult::NotFound) => {
                tracing::warn!(journey_id = %journey_id, "Journey vanished during escalation");
            }
            Err(e) => {
                tracing::error!(journey_id = %journey_id, error = %e, "Failed to mark journey overdue");
            }
        }

        Ok(self.dispatcher.deliver(opened).await)
    }
}

#[async_trait]
impl FireHandler for OverdueEscalation {
    async fn on_fire(&self, fired: FiredJourney) {
        match self.escalate(fired.journey_id, None, fired.source).await {
            Ok(outcome) => {
                tracing::info!(
                    journey_id = %fired.journey_id,
                    alert_id = %outcome.alert.id,
                    status = outcome.delivery.status.as_str(),
                    any_succeeded = outcome.delivery.any_succeeded,
                    "Overdue escalation finished"
                );
            }
            Err(e) => {
                tracing::error!(
                    journey_id = %fired.journey_id,
                    code = %e.code,
                    error = %e.message,
                    "Overdue escalation failed"
                );
            }
        }
    }
}
