//! Journey Service
//!
//! Starting and finishing journeys. Starting arms the deadline in the
//! escalation engine; finishing disarms it before the store transition so a
//! check-in that beats the deadline can never be followed by an escalation.

use safeconnect_core::{
    Clock, Coordinates, EntityIdType, Journey, JourneyId, JourneyPlan, JourneyStatus, Timestamp,
    UserId,
};
use safeconnect_storage::{JourneyStore, TransitionResult};
use std::sync::Arc;

use crate::engine::{CompletionOutcome, EscalationEngine};
use crate::error::{ApiError, ApiResult};
use crate::services::{messages, AlertDispatcher};

/// Validated request to start a journey.
#[derive(Debug, Clone)]
pub struct StartJourney {
    pub user_id: UserId,
    pub start_location: String,
    pub start: Option<Coordinates>,
    pub destination: String,
    pub estimated_duration: i32,
    pub buffer_time: Option<i32>,
    pub note: Option<String>,
}

/// Journey lifecycle operations.
#[derive(Clone)]
pub struct JourneyService {
    store: Arc<dyn JourneyStore>,
    engine: EscalationEngine,
    dispatcher: AlertDispatcher,
    clock: Arc<dyn Clock>,
}

impl JourneyService {
    pub fn new(
        store: Arc<dyn JourneyStore>,
        engine: EscalationEngine,
        dispatcher: AlertDispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            engine,
            dispatcher,
            clock,
        }
    }

    /// Persist a new active journey, arm its deadline and tell the contacts.
    ///
    /// # Errors
    /// - 400 if the plan is invalid
    /// - 404 if the user does not exist
    /// - 409 if the user already has an active journey
    pub async fn start(&self, request: StartJourney) -> ApiResult<Journey> {
        let user = self
            .store
            .user_get(request.user_id)
            .await?
            .ok_or_else(|| ApiError::user_not_found(request.user_id))?;

        let plan = JourneyPlan::new(
            request.start_location,
            request.destination,
            request.estimated_duration,
            request.buffer_time,
        )?
        .with_start(request.start)
        .with_note(request.note);

        let journey = Journey::start(JourneyId::now_v7(), user.id, plan, self.clock.now());
        self.store.journey_insert(&journey).await?;

        if let Err(e) = self.engine.schedule(journey.id, journey.expected_arrival) {
            // The housekeeping reconciliation arms it on its next pass
            tracing::error!(journey_id = %journey.id, error = %e, "Failed to arm journey deadline");
        }

        tracing::info!(
            journey_id = %journey.id,
            user_id = %user.id,
            expected_arrival = %journey.expected_arrival,
            "Journey started"
        );

        let dispatcher = self.dispatcher.clone();
        let body = messages::journey_start_sms(
            &user.name,
            &journey.start_location,
            &journey.destination,
            journey.estimated_duration,
            journey.expected_arrival,
        );
        let user_id = user.id;
        tokio::spawn(async move {
            dispatcher.broadcast_text(user_id, &body).await;
        });

        Ok(journey)
    }

    /// Finish a journey as `completed` or `cancelled`.
    ///
    /// Finishing an `overdue` journey is allowed: the late check-in is
    /// recorded and contacts learn the person is safe. Repeating the same
    /// finish is a no-op that returns the stored journey.
    pub async fn finish(
        &self,
        journey_id: JourneyId,
        status: JourneyStatus,
        completed_at: Option<Timestamp>,
    ) -> ApiResult<Journey> {
        if !matches!(status, JourneyStatus::Completed | JourneyStatus::Cancelled) {
            return Err(ApiError::invalid_input(format!(
                "Journey status can only be set to completed or cancelled, got {}",
                status
            )));
        }

        let arrived = status == JourneyStatus::Completed;
        match self.engine.complete(journey_id, arrived) {
            CompletionOutcome::AlreadyFired => {
                tracing::info!(journey_id = %journey_id, "Check-in after escalation fired");
            }
            outcome => {
                tracing::debug!(journey_id = %journey_id, outcome = ?outcome, "Deadline disarmed");
            }
        }

        let completed_at = if arrived {
            Some(completed_at.unwrap_or_else(|| self.clock.now()))
        } else {
            None
        };

        let journey = match self
            .store
            .journey_transition(
                journey_id,
                JourneyStatus::sources_for(status),
                status,
                completed_at,
            )
            .await?
        {
            TransitionResult::Applied(journey) => journey,
            TransitionResult::Rejected(current) if current.status == status => return Ok(current),
            TransitionResult::Rejected(current) => {
                return Err(ApiError::state_conflict(format!(
                    "Journey {} is already {}",
                    journey_id, current.status
                )))
            }
            TransitionResult::NotFound => return Err(ApiError::journey_not_found(journey_id)),
        };

        tracing::info!(journey_id = %journey.id, status = %journey.status, "Journey finished");

        if arrived {
            self.spawn_completion_notice(&journey).await;
        }
        Ok(journey)
    }

    async fn spawn_completion_notice(&self, journey: &Journey) {
        let user_name = match self.store.user_get(journey.user_id).await {
            Ok(Some(user)) => user.name,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(journey_id = %journey.id, error = %e, "Cannot load user for completion notice");
                return;
            }
        };
        let body = messages::journey_completed_sms(&user_name, &journey.destination);
        let dispatcher = self.dispatcher.clone();
        let user_id = journey.user_id;
        tokio::spawn(async move {
            dispatcher.broadcast_text(user_id, &body).await;
        });
    }
}
