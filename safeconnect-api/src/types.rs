//! Request and response bodies of the REST API.
//!
//! Field names are camelCase on the wire to match the mobile client.

use safeconnect_core::{
    normalize_phone, AlertStatus, AlertType, ContactPatch, Coordinates, JourneyId, JourneyStatus,
    Timestamp, UserId, UserPatch, ValidationError, DEFAULT_USER_NAME,
};
use serde::{Deserialize, Serialize};

use crate::services::VerificationOutcome;

// ============================================================================
// USERS
// ============================================================================

/// Request to create a user profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    /// Display name; "User" when omitted.
    pub name: Option<String>,
    pub phone: String,
    #[serde(default)]
    pub avatar_index: Option<i32>,
    pub height: Option<String>,
    pub weight: Option<String>,
    pub skin_tone: Option<String>,
    pub eye_color: Option<String>,
    pub distinguishing_features: Option<String>,
    pub medical_info: Option<String>,
    pub code_word: Option<String>,
}

impl CreateUserRequest {
    pub fn display_name(&self) -> String {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_USER_NAME)
            .to_string()
    }

    /// Profile fields beyond name and phone, expressed as a patch.
    pub fn profile(&self) -> UserPatch {
        UserPatch {
            height: self.height.clone(),
            weight: self.weight.clone(),
            skin_tone: self.skin_tone.clone(),
            eye_color: self.eye_color.clone(),
            distinguishing_features: self.distinguishing_features.clone(),
            medical_info: self.medical_info.clone(),
            code_word: self.code_word.clone(),
            avatar_index: self.avatar_index,
            ..UserPatch::default()
        }
    }
}

/// Normalise the phone number of a user patch, if one is present.
pub fn normalize_user_patch(mut patch: UserPatch) -> Result<UserPatch, ValidationError> {
    if let Some(phone) = patch.phone.take() {
        patch.phone = Some(normalize_phone(&phone)?);
    }
    if let Some(name) = &patch.name {
        if name.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "name".to_string(),
            });
        }
    }
    Ok(patch)
}

// ============================================================================
// CONTACTS
// ============================================================================

/// Request to add an emergency contact.
///
/// `userId` may be omitted when the user is given by the path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CreateContactRequest {
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = Uuid))]
    pub user_id: Option<UserId>,
    pub name: String,
    pub phone: String,
    pub relationship: String,
    #[serde(default)]
    pub is_primary: bool,
}

impl CreateContactRequest {
    pub fn validate(&self) -> Result<String, ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "name".to_string(),
            });
        }
        if self.relationship.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "relationship".to_string(),
            });
        }
        normalize_phone(&self.phone)
    }
}

pub fn normalize_contact_patch(mut patch: ContactPatch) -> Result<ContactPatch, ValidationError> {
    if let Some(phone) = patch.phone.take() {
        patch.phone = Some(normalize_phone(&phone)?);
    }
    Ok(patch)
}

// ============================================================================
// JOURNEYS
// ============================================================================

/// Request to start a journey. Durations are minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CreateJourneyRequest {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = Uuid))]
    pub user_id: UserId,
    pub start_location: String,
    pub start_latitude: Option<f64>,
    pub start_longitude: Option<f64>,
    pub destination: String,
    pub estimated_duration: i32,
    pub buffer_time: Option<i32>,
    pub note: Option<String>,
}

/// Request to finish a journey.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct UpdateJourneyRequest {
    /// `completed` or `cancelled`.
    pub status: JourneyStatus,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = DateTime))]
    pub completed_at: Option<Timestamp>,
}

// ============================================================================
// ALERTS
// ============================================================================

/// Request to raise an alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CreateAlertRequest {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = Uuid))]
    pub user_id: UserId,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = Uuid))]
    pub journey_id: Option<JourneyId>,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl CreateAlertRequest {
    pub fn location(&self) -> Result<Option<Coordinates>, ValidationError> {
        Coordinates::from_parts(self.latitude, self.longitude)
    }
}

/// Request to change an alert's status. Only `resolved` is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct UpdateAlertRequest {
    pub status: AlertStatus,
}

// ============================================================================
// PHONE VERIFICATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SendCodeRequest {
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct VerifyCodeRequest {
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SendCodeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendCodeResponse {
    pub fn sent() -> Self {
        Self {
            success: true,
            message: Some("Verification code sent".to_string()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}

/// Result of a code check. `reason` is set on every rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct VerifyCodeResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<VerificationOutcome>,
}

impl From<VerificationOutcome> for VerifyCodeResponse {
    fn from(outcome: VerificationOutcome) -> Self {
        if outcome.is_valid() {
            Self {
                valid: true,
                message: Some(outcome.message().to_string()),
                error: None,
                reason: None,
            }
        } else {
            Self {
                valid: false,
                message: None,
                error: Some(outcome.message().to_string()),
                reason: Some(outcome),
            }
        }
    }
}
