//! Emergency Contact REST API Routes

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use safeconnect_core::{Clock, ContactId, ContactPatch, EmergencyContact, EntityIdType, UserId};
use safeconnect_storage::JourneyStore;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::extractors::PathId;
use crate::state::AppState;
use crate::types::{normalize_contact_patch, CreateContactRequest};

async fn insert_contact(
    store: &dyn JourneyStore,
    clock: &dyn Clock,
    user_id: UserId,
    req: CreateContactRequest,
) -> ApiResult<EmergencyContact> {
    let phone = req.validate()?;
    store
        .user_get(user_id)
        .await?
        .ok_or_else(|| ApiError::user_not_found(user_id))?;

    let contact = EmergencyContact {
        id: ContactId::now_v7(),
        user_id,
        name: req.name.trim().to_string(),
        phone,
        relationship: req.relationship.trim().to_string(),
        is_primary: req.is_primary,
        created_at: clock.now(),
    };
    store.contact_insert(&contact).await?;
    tracing::info!(contact_id = %contact.id, user_id = %user_id, "Emergency contact added");
    Ok(contact)
}

/// POST /api/contacts - Add an emergency contact (user in body)
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/api/contacts",
    tag = "Contacts",
    request_body = CreateContactRequest,
    responses(
        (status = 201, description = "Contact created", body = EmergencyContact),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
    ),
))]
pub async fn create_contact(
    State(store): State<Arc<dyn JourneyStore>>,
    State(clock): State<Arc<dyn Clock>>,
    Json(req): Json<CreateContactRequest>,
) -> ApiResult<impl IntoResponse> {
    let user_id = req.user_id.ok_or_else(|| ApiError::missing_field("userId"))?;
    let contact = insert_contact(store.as_ref(), clock.as_ref(), user_id, req).await?;
    Ok((StatusCode::CREATED, Json(contact)))
}

/// POST /api/users/{id}/contacts - Add an emergency contact for a user
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/api/users/{id}/contacts",
    tag = "Contacts",
    params(("id" = String, Path, description = "User ID")),
    request_body = CreateContactRequest,
    responses(
        (status = 201, description = "Contact created", body = EmergencyContact),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
    ),
))]
pub async fn create_user_contact(
    State(store): State<Arc<dyn JourneyStore>>,
    State(clock): State<Arc<dyn Clock>>,
    PathId(user_id): PathId<UserId>,
    Json(req): Json<CreateContactRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.user_id.is_some_and(|id| id != user_id) {
        return Err(ApiError::invalid_input("userId does not match the path"));
    }
    let contact = insert_contact(store.as_ref(), clock.as_ref(), user_id, req).await?;
    Ok((StatusCode::CREATED, Json(contact)))
}

/// GET /api/users/{id}/contacts - List a user's emergency contacts
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/users/{id}/contacts",
    tag = "Contacts",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Contacts in creation order", body = Vec<EmergencyContact>),
    ),
))]
pub async fn list_user_contacts(
    State(store): State<Arc<dyn JourneyStore>>,
    PathId(user_id): PathId<UserId>,
) -> ApiResult<Json<Vec<EmergencyContact>>> {
    Ok(Json(store.contact_list_by_user(user_id).await?))
}

/// GET /api/contacts/{id}
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/contacts/{id}",
    tag = "Contacts",
    params(("id" = String, Path, description = "Contact ID")),
    responses(
        (status = 200, description = "Contact found", body = EmergencyContact),
        (status = 404, description = "Contact not found", body = ApiError),
    ),
))]
pub async fn get_contact(
    State(store): State<Arc<dyn JourneyStore>>,
    PathId(contact_id): PathId<ContactId>,
) -> ApiResult<Json<EmergencyContact>> {
    let contact = store
        .contact_get(contact_id)
        .await?
        .ok_or_else(|| ApiError::contact_not_found(contact_id))?;
    Ok(Json(contact))
}

/// PATCH /api/contacts/{id}
#[cfg_attr(feature = "openapi", utoipa::path(
    patch,
    path = "/api/contacts/{id}",
    tag = "Contacts",
    params(("id" = String, Path, description = "Contact ID")),
    request_body = ContactPatch,
    responses(
        (status = 200, description = "Contact updated", body = EmergencyContact),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Contact not found", body = ApiError),
    ),
))]
pub async fn update_contact(
    State(store): State<Arc<dyn JourneyStore>>,
    PathId(contact_id): PathId<ContactId>,
    Json(patch): Json<ContactPatch>,
) -> ApiResult<Json<EmergencyContact>> {
    let patch = normalize_contact_patch(patch)?;
    let contact = store
        .contact_update(contact_id, &patch)
        .await?
        .ok_or_else(|| ApiError::contact_not_found(contact_id))?;
    Ok(Json(contact))
}

/// DELETE /api/contacts/{id}
#[cfg_attr(feature = "openapi", utoipa::path(
    delete,
    path = "/api/contacts/{id}",
    tag = "Contacts",
    params(("id" = String, Path, description = "Contact ID")),
    responses(
        (status = 204, description = "Contact deleted"),
        (status = 404, description = "Contact not found", body = ApiError),
    ),
))]
pub async fn delete_contact(
    State(store): State<Arc<dyn JourneyStore>>,
    PathId(contact_id): PathId<ContactId>,
) -> ApiResult<StatusCode> {
    if store.contact_delete(contact_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::contact_not_found(contact_id))
    }
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/contacts", post(create_contact))
        .route(
            "/contacts/:id",
            get(get_contact).patch(update_contact).delete(delete_contact),
        )
        .route(
            "/users/:id/contacts",
            get(list_user_contacts).post(create_user_contact),
        )
}
