//! Journey REST API Routes
//!
//! Starting a journey arms its deadline; finishing it disarms the deadline
//! before the status change is stored.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use safeconnect_core::{Coordinates, Journey, JourneyId, UserId};
use safeconnect_storage::JourneyStore;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::extractors::PathId;
use crate::services::{JourneyService, StartJourney};
use crate::state::AppState;
use crate::types::{CreateJourneyRequest, UpdateJourneyRequest};

/// POST /api/journeys - Start a journey
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/api/journeys",
    tag = "Journeys",
    request_body = CreateJourneyRequest,
    responses(
        (status = 201, description = "Journey started and deadline armed", body = Journey),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
        (status = 409, description = "User already has an active journey", body = ApiError),
    ),
))]
pub async fn create_journey(
    State(journeys): State<JourneyService>,
    Json(req): Json<CreateJourneyRequest>,
) -> ApiResult<impl IntoResponse> {
    let start = Coordinates::from_parts(req.start_latitude, req.start_longitude)?;
    let journey = journeys
        .start(StartJourney {
            user_id: req.user_id,
            start_location: req.start_location,
            start,
            destination: req.destination,
            estimated_duration: req.estimated_duration,
            buffer_time: req.buffer_time,
            note: req.note,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(journey)))
}

/// PATCH /api/journeys/{id} - Complete or cancel a journey
#[cfg_attr(feature = "openapi", utoipa::path(
    patch,
    path = "/api/journeys/{id}",
    tag = "Journeys",
    params(("id" = String, Path, description = "Journey ID")),
    request_body = UpdateJourneyRequest,
    responses(
        (status = 200, description = "Journey finished", body = Journey),
        (status = 400, description = "Unsupported status", body = ApiError),
        (status = 404, description = "Journey not found", body = ApiError),
        (status = 409, description = "Journey already finished differently", body = ApiError),
    ),
))]
pub async fn update_journey(
    State(journeys): State<JourneyService>,
    PathId(journey_id): PathId<JourneyId>,
    Json(req): Json<UpdateJourneyRequest>,
) -> ApiResult<Json<Journey>> {
    let journey = journeys
        .finish(journey_id, req.status, req.completed_at)
        .await?;
    Ok(Json(journey))
}

/// GET /api/journeys/{id}
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/journeys/{id}",
    tag = "Journeys",
    params(("id" = String, Path, description = "Journey ID")),
    responses(
        (status = 200, description = "Journey found", body = Journey),
        (status = 404, description = "Journey not found", body = ApiError),
    ),
))]
pub async fn get_journey(
    State(store): State<Arc<dyn JourneyStore>>,
    PathId(journey_id): PathId<JourneyId>,
) -> ApiResult<Json<Journey>> {
    let journey = store
        .journey_get(journey_id)
        .await?
        .ok_or_else(|| ApiError::journey_not_found(journey_id))?;
    Ok(Json(journey))
}

/// GET /api/users/{id}/journeys - Journeys of a user, newest first
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/users/{id}/journeys",
    tag = "Journeys",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Journeys, newest first", body = Vec<Journey>),
    ),
))]
pub async fn list_user_journeys(
    State(store): State<Arc<dyn JourneyStore>>,
    PathId(user_id): PathId<UserId>,
) -> ApiResult<Json<Vec<Journey>>> {
    Ok(Json(store.journey_list_by_user(user_id).await?))
}

/// GET /api/users/{id}/journeys/active - The active journey, or `null`
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/users/{id}/journeys/active",
    tag = "Journeys",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Active journey, or null when there is none", body = Journey),
    ),
))]
pub async fn get_active_journey(
    State(store): State<Arc<dyn JourneyStore>>,
    PathId(user_id): PathId<UserId>,
) -> ApiResult<Json<Option<Journey>>> {
    Ok(Json(store.journey_get_active(user_id).await?))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/journeys", post(create_journey))
        .route("/journeys/:id", get(get_journey).patch(update_journey))
        .route("/users/:id/journeys", get(list_user_journeys))
        .route("/users/:id/journeys/active", get(get_active_journey))
}
