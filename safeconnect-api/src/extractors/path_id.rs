//! Typed path extractor for entity ids.
//!
//! `PathId<JourneyId>` parses the path segment as a UUID and wraps it in the
//! id newtype, rejecting malformed ids with the API's JSON error body.

use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use safeconnect_core::EntityIdType;
use uuid::Uuid;

use crate::error::ApiError;

/// Extractor for one typed entity id from the path.
///
/// ```rust,ignore
/// async fn get_journey(PathId(journey_id): PathId<JourneyId>) -> ApiResult<Json<Journey>> {
///     // journey_id is a JourneyId, not a Uuid
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PathId<T: EntityIdType>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for PathId<T>
where
    S: Send + Sync,
    T: EntityIdType,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(uuid): Path<Uuid> = Path::from_request_parts(parts, state)
            .await
            .map_err(|e| {
                ApiError::invalid_format(
                    "id",
                    &format!("{} id as UUID ({})", T::ENTITY_NAME, e.body_text()),
                )
            })?;

        Ok(PathId(T::new(uuid)))
    }
}
