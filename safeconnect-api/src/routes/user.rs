//! User REST API Routes

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use safeconnect_core::{normalize_phone, Clock, EntityIdType, User, UserId};
use safeconnect_storage::JourneyStore;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::extractors::PathId;
use crate::state::AppState;
use crate::types::{normalize_user_patch, CreateUserRequest};

/// POST /api/users - Create a user profile
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/api/users",
    tag = "Users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid request", body = ApiError),
    ),
))]
pub async fn create_user(
    State(store): State<Arc<dyn JourneyStore>>,
    State(clock): State<Arc<dyn Clock>>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    let phone = normalize_phone(&req.phone)?;
    let now = clock.now();

    let mut user = User::new(UserId::now_v7(), req.display_name(), phone, now);
    user.apply(&req.profile(), now);
    store.user_insert(&user).await?;

    tracing::info!(user_id = %user.id, "User created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/users/{id} - Get a user profile
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "Users",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "User found", body = User),
        (status = 404, description = "User not found", body = ApiError),
    ),
))]
pub async fn get_user(
    State(store): State<Arc<dyn JourneyStore>>,
    PathId(user_id): PathId<UserId>,
) -> ApiResult<Json<User>> {
    let user = store
        .user_get(user_id)
        .await?
        .ok_or_else(|| ApiError::user_not_found(user_id))?;
    Ok(Json(user))
}

/// PATCH /api/users/{id} - Update a user profile
#[cfg_attr(feature = "openapi", utoipa::path(
    patch,
    path = "/api/users/{id}",
    tag = "Users",
    params(("id" = String, Path, description = "User ID")),
    request_body = safeconnect_core::UserPatch,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
    ),
))]
pub async fn update_user(
    State(store): State<Arc<dyn JourneyStore>>,
    State(clock): State<Arc<dyn Clock>>,
    PathId(user_id): PathId<UserId>,
    Json(patch): Json<safeconnect_core::UserPatch>,
) -> ApiResult<Json<User>> {
    let patch = normalize_user_patch(patch)?;
    let user = store
        .user_update(user_id, &patch, clock.now())
        .await?
        .ok_or_else(|| ApiError::user_not_found(user_id))?;
    Ok(Json(user))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/:id", get(get_user).patch(update_user))
}
