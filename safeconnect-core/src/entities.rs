//! Entity records persisted by the journey store.
//!
//! Field names are serialised in camelCase to match the mobile client.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::{
    AlertId, AlertStatus, AlertType, ContactId, JourneyId, JourneyStatus, Timestamp, UserId,
    ValidationError,
};

/// Grace period added to every journey when the client does not supply one.
pub const DEFAULT_BUFFER_MINUTES: i32 = 10;

/// Longest journey the service will arm a timer for.
pub const MAX_JOURNEY_MINUTES: i32 = 24 * 60;

/// Longest grace period accepted.
pub const MAX_BUFFER_MINUTES: i32 = 24 * 60;

/// Default display name for users who skip onboarding.
pub const DEFAULT_USER_NAME: &str = "User";

// ============================================================================
// COORDINATES
// ============================================================================

/// A WGS84 position reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(ValidationError::OutOfRange {
                field: "latitude".to_string(),
                min: -90,
                max: 90,
            });
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(ValidationError::OutOfRange {
                field: "longitude".to_string(),
                min: -180,
                max: 180,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Build from an optional latitude/longitude pair. Both or neither must be present.
    pub fn from_parts(
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<Option<Self>, ValidationError> {
        match (latitude, longitude) {
            (Some(lat), Some(lng)) => Self::new(lat, lng).map(Some),
            (None, None) => Ok(None),
            (Some(_), None) => Err(ValidationError::RequiredFieldMissing {
                field: "longitude".to_string(),
            }),
            (None, Some(_)) => Err(ValidationError::RequiredFieldMissing {
                field: "latitude".to_string(),
            }),
        }
    }

    /// Link that opens the position in a map application.
    pub fn maps_url(&self) -> String {
        format!(
            "https://maps.google.com/maps?q={},{}",
            self.latitude, self.longitude
        )
    }
}

// ============================================================================
// USER
// ============================================================================

/// A person who plans journeys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub phone: String,
    pub phone_verified: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub phone_verified_at: Option<Timestamp>,
    pub height: Option<String>,
    pub weight: Option<String>,
    pub skin_tone: Option<String>,
    pub eye_color: Option<String>,
    pub distinguishing_features: Option<String>,
    pub medical_info: Option<String>,
    pub code_word: Option<String>,
    pub avatar_index: i32,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
}

impl User {
    pub fn new(id: UserId, name: impl Into<String>, phone: impl Into<String>, now: Timestamp) -> Self {
        Self {
            id,
            name: name.into(),
            phone: phone.into(),
            phone_verified: false,
            phone_verified_at: None,
            height: None,
            weight: None,
            skin_tone: None,
            eye_color: None,
            distinguishing_features: None,
            medical_info: None,
            code_word: None,
            avatar_index: 0,
            created_at: now,
        }
    }

    /// Apply a partial update.
    ///
    /// Changing the phone number clears verification unless the patch
    /// explicitly marks the new number verified.
    pub fn apply(&mut self, patch: &UserPatch, now: Timestamp) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(phone) = &patch.phone {
            if *phone != self.phone {
                self.phone = phone.clone();
                self.phone_verified = false;
                self.phone_verified_at = None;
            }
        }
        if let Some(verified) = patch.phone_verified {
            if verified && !self.phone_verified {
                self.phone_verified_at = Some(now);
            }
            if !verified {
                self.phone_verified_at = None;
            }
            self.phone_verified = verified;
        }
        macro_rules! set_opt {
            ($($field:ident),*) => {
                $(if let Some(value) = &patch.$field {
                    self.$field = Some(value.clone());
                })*
            };
        }
        set_opt!(
            height,
            weight,
            skin_tone,
            eye_color,
            distinguishing_features,
            medical_info,
            code_word
        );
        if let Some(avatar_index) = patch.avatar_index {
            self.avatar_index = avatar_index;
        }
    }
}

/// Partial update of a user profile. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub phone_verified: Option<bool>,
    pub height: Option<String>,
    pub weight: Option<String>,
    pub skin_tone: Option<String>,
    pub eye_color: Option<String>,
    pub distinguishing_features: Option<String>,
    pub medical_info: Option<String>,
    pub code_word: Option<String>,
    pub avatar_index: Option<i32>,
}

// ============================================================================
// EMERGENCY CONTACT
// ============================================================================

/// Someone notified when one of the user's alerts fires.
///
/// `is_primary` is informational and never changes dispatch order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContact {
    pub id: ContactId,
    pub user_id: UserId,
    pub name: String,
    pub phone: String,
    pub relationship: String,
    pub is_primary: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
}

impl EmergencyContact {
    pub fn apply(&mut self, patch: &ContactPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(phone) = &patch.phone {
            self.phone = phone.clone();
        }
        if let Some(relationship) = &patch.relationship {
            self.relationship = relationship.clone();
        }
        if let Some(is_primary) = patch.is_primary {
            self.is_primary = is_primary;
        }
    }
}

/// Partial update of an emergency contact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ContactPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub relationship: Option<String>,
    pub is_primary: Option<bool>,
}

// ============================================================================
// JOURNEY
// ============================================================================

/// Deadline after which a still-active journey escalates.
///
/// `created_at + estimated_duration + buffer`, both in minutes.
pub fn expected_arrival(
    created_at: Timestamp,
    estimated_duration_minutes: i32,
    buffer_minutes: i32,
) -> Timestamp {
    created_at
        + Duration::minutes(i64::from(estimated_duration_minutes))
        + Duration::minutes(i64::from(buffer_minutes))
}

/// Validated parameters of a journey about to start.
#[derive(Debug, Clone, PartialEq)]
pub struct JourneyPlan {
    pub start_location: String,
    pub start: Option<Coordinates>,
    pub destination: String,
    pub estimated_duration: i32,
    pub buffer_time: i32,
    pub note: Option<String>,
}

impl JourneyPlan {
    pub fn new(
        start_location: impl Into<String>,
        destination: impl Into<String>,
        estimated_duration: i32,
        buffer_time: Option<i32>,
    ) -> Result<Self, ValidationError> {
        let start_location = start_location.into();
        let destination = destination.into();
        if start_location.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "startLocation".to_string(),
            });
        }
        if destination.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "destination".to_string(),
            });
        }
        if !(1..=MAX_JOURNEY_MINUTES).contains(&estimated_duration) {
            return Err(ValidationError::OutOfRange {
                field: "estimatedDuration".to_string(),
                min: 1,
                max: i64::from(MAX_JOURNEY_MINUTES),
            });
        }
        let buffer_time = buffer_time.unwrap_or(DEFAULT_BUFFER_MINUTES);
        if !(0..=MAX_BUFFER_MINUTES).contains(&buffer_time) {
            return Err(ValidationError::OutOfRange {
                field: "bufferTime".to_string(),
                min: 0,
                max: i64::from(MAX_BUFFER_MINUTES),
            });
        }
        Ok(Self {
            start_location,
            start: None,
            destination,
            estimated_duration,
            buffer_time,
            note: None,
        })
    }

    pub fn with_start(mut self, start: Option<Coordinates>) -> Self {
        self.start = start;
        self
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note.filter(|n| !n.trim().is_empty());
        self
    }
}

/// A planned trip with a check-in deadline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Journey {
    pub id: JourneyId,
    pub user_id: UserId,
    pub start_location: String,
    pub start_latitude: Option<f64>,
    pub start_longitude: Option<f64>,
    pub destination: String,
    /// Minutes.
    pub estimated_duration: i32,
    /// Minutes.
    pub buffer_time: i32,
    pub note: Option<String>,
    pub status: JourneyStatus,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub expected_arrival: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub completed_at: Option<Timestamp>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
}

impl Journey {
    /// Start a journey now. The deadline is computed once here and never moves.
    pub fn start(id: JourneyId, user_id: UserId, plan: JourneyPlan, created_at: Timestamp) -> Self {
        Self {
            id,
            user_id,
            start_location: plan.start_location,
            start_latitude: plan.start.map(|c| c.latitude),
            start_longitude: plan.start.map(|c| c.longitude),
            destination: plan.destination,
            estimated_duration: plan.estimated_duration,
            buffer_time: plan.buffer_time,
            note: plan.note,
            status: JourneyStatus::Active,
            expected_arrival: expected_arrival(created_at, plan.estimated_duration, plan.buffer_time),
            completed_at: None,
            created_at,
        }
    }

    pub fn start_coordinates(&self) -> Option<Coordinates> {
        match (self.start_latitude, self.start_longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == JourneyStatus::Active
    }
}

// ============================================================================
// ALERT
// ============================================================================

/// One escalation event. Exactly one alert exists per trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: AlertId,
    pub user_id: UserId,
    pub journey_id: Option<JourneyId>,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: AlertStatus,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub resolved_at: Option<Timestamp>,
}

impl Alert {
    pub fn new(
        id: AlertId,
        user_id: UserId,
        journey_id: Option<JourneyId>,
        alert_type: AlertType,
        location: Option<Coordinates>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            user_id,
            journey_id,
            alert_type,
            latitude: location.map(|c| c.latitude),
            longitude: location.map(|c| c.longitude),
            status: AlertStatus::Sent,
            created_at,
            resolved_at: None,
        }
    }

    pub fn location(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntityIdType;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).single().expect("valid date")
    }

    #[test]
    fn test_expected_arrival_thirty_plus_default_buffer() {
        let plan = JourneyPlan::new("Home", "Office", 30, None).expect("valid plan");
        let journey = Journey::start(JourneyId::now_v7(), UserId::now_v7(), plan, t0());
        assert_eq!(journey.buffer_time, DEFAULT_BUFFER_MINUTES);
        assert_eq!(journey.expected_arrival, t0() + Duration::minutes(40));
        assert_eq!(journey.status, JourneyStatus::Active);
    }

    #[test]
    fn test_plan_rejects_non_positive_duration() {
        assert!(JourneyPlan::new("Home", "Office", 0, None).is_err());
        assert!(JourneyPlan::new("Home", "Office", -5, None).is_err());
        assert!(JourneyPlan::new("Home", "Office", 5, Some(-1)).is_err());
    }

    #[test]
    fn test_plan_requires_labels() {
        assert!(matches!(
            JourneyPlan::new("  ", "Office", 10, None),
            Err(ValidationError::RequiredFieldMissing { .. })
        ));
        assert!(JourneyPlan::new("Home", "", 10, None).is_err());
    }

    #[test]
    fn test_coordinates_need_both_parts() {
        assert_eq!(Coordinates::from_parts(None, None), Ok(None));
        assert!(Coordinates::from_parts(Some(1.0), None).is_err());
        assert!(Coordinates::new(91.0, 0.0).is_err());
        assert!(Coordinates::new(0.0, f64::NAN).is_err());
        let coords = Coordinates::new(51.5, -0.12).expect("valid");
        assert_eq!(coords.maps_url(), "https://maps.google.com/maps?q=51.5,-0.12");
    }

    #[test]
    fn test_user_phone_change_clears_verification() {
        let mut user = User::new(UserId::now_v7(), "Ana", "+15550001", t0());
        user.apply(
            &UserPatch {
                phone_verified: Some(true),
                ..Default::default()
            },
            t0(),
        );
        assert!(user.phone_verified);
        assert_eq!(user.phone_verified_at, Some(t0()));

        user.apply(
            &UserPatch {
                phone: Some("+15550002".to_string()),
                ..Default::default()
            },
            t0(),
        );
        assert!(!user.phone_verified);
        assert_eq!(user.phone_verified_at, None);
    }

    #[test]
    fn test_alert_serializes_type_field() {
        let alert = Alert::new(
            AlertId::now_v7(),
            UserId::now_v7(),
            None,
            AlertType::Sos,
            None,
            t0(),
        );
        let json = serde_json::to_value(&alert).expect("serialize");
        assert_eq!(json["type"], "sos");
        assert_eq!(json["status"], "sent");
        assert!(json.get("userId").is_some());
    }

    proptest! {
        #[test]
        fn prop_expected_arrival_is_sum_of_minutes(
            duration in 1i32..=MAX_JOURNEY_MINUTES,
            buffer in proptest::option::of(0i32..=MAX_BUFFER_MINUTES),
        ) {
            let plan = JourneyPlan::new("A", "B", duration, buffer).expect("in range");
            let journey = Journey::start(JourneyId::now_v7(), UserId::now_v7(), plan, t0());
            let expected_minutes = i64::from(duration) + i64::from(buffer.unwrap_or(DEFAULT_BUFFER_MINUTES));
            prop_assert_eq!(journey.expected_arrival - t0(), Duration::minutes(expected_minutes));
        }
    }
}
