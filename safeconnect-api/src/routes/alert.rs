//! Alert REST API Routes
//!
//! `POST /alerts` persists the alert and fans it out before answering, so
//! the client learns right away whether anybody was reached. A manual
//! `overdue` alert always takes the journey's engine cell first, so it can
//! never double up with the deadline timer or the recovery scan.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use safeconnect_core::{
    Alert, AlertId, AlertStatus, AlertType, Clock, Coordinates, JourneyId, JourneyStatus, UserId,
};
use safeconnect_storage::JourneyStore;
use std::sync::Arc;

use crate::engine::{ClaimOutcome, EscalationEngine, FireSource, OverdueEscalation};
use crate::error::{ApiError, ApiResult};
use crate::extractors::PathId;
use crate::services::{AlertDispatcher, AlertTrigger, DispatchOutcome};
use crate::state::AppState;
use crate::types::{CreateAlertRequest, UpdateAlertRequest};

/// POST /api/alerts - Raise an SOS or overdue alert
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/api/alerts",
    tag = "Alerts",
    request_body = CreateAlertRequest,
    responses(
        (status = 201, description = "Alert recorded; delivery report attached", body = DispatchOutcome),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "User or journey not found", body = ApiError),
        (status = 409, description = "Journey already escalated or finished", body = ApiError),
    ),
))]
pub async fn create_alert(
    State(store): State<Arc<dyn JourneyStore>>,
    State(engine): State<EscalationEngine>,
    State(dispatcher): State<AlertDispatcher>,
    State(escalation): State<OverdueEscalation>,
    Json(req): Json<CreateAlertRequest>,
) -> ApiResult<impl IntoResponse> {
    let location = req.location()?;

    let outcome = match req.alert_type {
        AlertType::Sos => {
            let trigger = AlertTrigger {
                journey_id: req.journey_id,
                ..AlertTrigger::sos(req.user_id, location)
            };
            dispatcher.dispatch(trigger).await?
        }
        AlertType::Overdue => {
            let journey_id = req
                .journey_id
                .ok_or_else(|| ApiError::missing_field("journeyId"))?;
            manual_overdue(
                store.as_ref(),
                &engine,
                &escalation,
                req.user_id,
                journey_id,
                location,
            )
            .await?
        }
    };

    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn manual_overdue(
    store: &dyn JourneyStore,
    engine: &EscalationEngine,
    escalation: &OverdueEscalation,
    user_id: UserId,
    journey_id: JourneyId,
    location: Option<Coordinates>,
) -> ApiResult<DispatchOutcome> {
    let journey = store
        .journey_get(journey_id)
        .await?
        .ok_or_else(|| ApiError::journey_not_found(journey_id))?;
    if journey.user_id != user_id {
        return Err(ApiError::invalid_input(format!(
            "Journey {} does not belong to user {}",
            journey_id, user_id
        )));
    }

    // An untracked journey is only escalated while still active; a tracked
    // one is decided by its cell.
    if engine.state(journey_id).is_none() && journey.status != JourneyStatus::Active {
        return Err(ApiError::state_conflict(format!(
            "Journey {} is already {}",
            journey_id, journey.status
        )));
    }

    match engine.claim_untracked(journey_id, journey.expected_arrival) {
        ClaimOutcome::Claimed => {}
        ClaimOutcome::AlreadyFired => {
            return Err(ApiError::state_conflict(format!(
                "Journey {} has already been escalated",
                journey_id
            )))
        }
        ClaimOutcome::AlreadyResolved | ClaimOutcome::NotScheduled => {
            return Err(ApiError::state_conflict(format!(
                "Journey {} has already finished",
                journey_id
            )))
        }
    }

    escalation
        .escalate(journey_id, location, FireSource::Manual)
        .await
}

/// PATCH /api/alerts/{id} - Resolve an alert
#[cfg_attr(feature = "openapi", utoipa::path(
    patch,
    path = "/api/alerts/{id}",
    tag = "Alerts",
    params(("id" = String, Path, description = "Alert ID")),
    request_body = UpdateAlertRequest,
    responses(
        (status = 200, description = "Alert resolved", body = Alert),
        (status = 400, description = "Unsupported status", body = ApiError),
        (status = 404, description = "Alert not found", body = ApiError),
    ),
))]
pub async fn update_alert(
    State(store): State<Arc<dyn JourneyStore>>,
    State(clock): State<Arc<dyn Clock>>,
    PathId(alert_id): PathId<AlertId>,
    Json(req): Json<UpdateAlertRequest>,
) -> ApiResult<Json<Alert>> {
    if req.status != AlertStatus::Resolved {
        return Err(ApiError::invalid_input(format!(
            "Alert status can only be set to resolved, got {}",
            req.status
        )));
    }
    let alert = store
        .alert_resolve(alert_id, clock.now())
        .await?
        .ok_or_else(|| ApiError::alert_not_found(alert_id))?;
    tracing::info!(alert_id = %alert_id, "Alert resolved");
    Ok(Json(alert))
}

/// GET /api/users/{id}/alerts - Alerts of a user, newest first
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/users/{id}/alerts",
    tag = "Alerts",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Alerts, newest first", body = Vec<Alert>),
    ),
))]
pub async fn list_user_alerts(
    State(store): State<Arc<dyn JourneyStore>>,
    PathId(user_id): PathId<UserId>,
) -> ApiResult<Json<Vec<Alert>>> {
    Ok(Json(store.alert_list_by_user(user_id).await?))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/alerts", post(create_alert))
        .route("/alerts/:id", patch(update_alert))
        .route("/users/:id/alerts", get(list_user_alerts))
}
