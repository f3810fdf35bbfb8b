//! Phone Verification Routes
//!
//! Both routes sit behind the per-IP rate limit.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};

use crate::error::{ApiError, ApiResult};
use crate::services::VerificationService;
use crate::state::AppState;
use crate::types::{SendCodeRequest, SendCodeResponse, VerifyCodeRequest, VerifyCodeResponse};

/// POST /api/otp/send - Text a verification code
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/api/otp/send",
    tag = "Verification",
    request_body = SendCodeRequest,
    responses(
        (status = 200, description = "Code sent", body = SendCodeResponse),
        (status = 400, description = "Missing or invalid phone", body = ApiError),
        (status = 429, description = "Too many requests", body = ApiError),
        (status = 502, description = "SMS could not be sent", body = SendCodeResponse),
    ),
))]
pub async fn send_code(
    State(verification): State<VerificationService>,
    Json(req): Json<SendCodeRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.phone.trim().is_empty() {
        return Err(ApiError::missing_field("phone"));
    }

    match verification.send_code(&req.phone).await {
        Ok(_) => Ok((StatusCode::OK, Json(SendCodeResponse::sent()))),
        Err(e) if e.status_code().is_client_error() => Err(e),
        Err(e) => Ok((StatusCode::BAD_GATEWAY, Json(SendCodeResponse::failed(e.message)))),
    }
}

/// POST /api/otp/verify - Check a verification code
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/api/otp/verify",
    tag = "Verification",
    request_body = VerifyCodeRequest,
    responses(
        (status = 200, description = "Code accepted", body = VerifyCodeResponse),
        (status = 400, description = "Code rejected; reason says why", body = VerifyCodeResponse),
        (status = 429, description = "Too many requests", body = ApiError),
    ),
))]
pub async fn verify_code(
    State(verification): State<VerificationService>,
    Json(req): Json<VerifyCodeRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.phone.trim().is_empty() {
        return Err(ApiError::missing_field("phone"));
    }
    if req.code.trim().is_empty() {
        return Err(ApiError::missing_field("code"));
    }

    let outcome = verification.check(&req.phone, &req.code);
    let status = if outcome.is_valid() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    Ok((status, Json(VerifyCodeResponse::from(outcome))))
}

/// Verification routes. The caller wraps them in the rate limit layer.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/otp/send", post(send_code))
        .route("/otp/verify", post(verify_code))
}
