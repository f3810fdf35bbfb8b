//! Status and type enums shared by the store, the engine and the wire format.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a stored or submitted enum value is not recognised.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid {kind}: {value}")]
pub struct EnumParseError {
    pub kind: &'static str,
    pub value: String,
}

fn normalize_token(s: &str) -> String {
    s.trim().to_ascii_lowercase().replace(['-', ' '], "_")
}

// ============================================================================
// JOURNEY STATUS
// ============================================================================

/// Lifecycle status of a journey.
///
/// `Active` is the only non-terminal status that the deadline can act on.
/// `Overdue` still accepts a late check-in so contacts learn the person is safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum JourneyStatus {
    #[default]
    Active,
    Completed,
    Cancelled,
    Overdue,
}

impl JourneyStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            JourneyStatus::Active => "active",
            JourneyStatus::Completed => "completed",
            JourneyStatus::Cancelled => "cancelled",
            JourneyStatus::Overdue => "overdue",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        s.parse()
    }

    /// Whether no further transition can leave this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JourneyStatus::Completed | JourneyStatus::Cancelled)
    }

    /// Allowed status graph for journeys.
    pub fn can_transition_to(&self, next: JourneyStatus) -> bool {
        use JourneyStatus::*;
        matches!(
            (self, next),
            (Active, Completed)
                | (Active, Cancelled)
                | (Active, Overdue)
                | (Overdue, Completed)
                | (Overdue, Cancelled)
        )
    }

    /// Statuses a journey may be in for a transition to `next` to apply.
    pub fn sources_for(next: JourneyStatus) -> &'static [JourneyStatus] {
        match next {
            JourneyStatus::Active => &[],
            JourneyStatus::Overdue => &[JourneyStatus::Active],
            JourneyStatus::Completed | JourneyStatus::Cancelled => {
                &[JourneyStatus::Active, JourneyStatus::Overdue]
            }
        }
    }
}

impl fmt::Display for JourneyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

impl FromStr for JourneyStatus {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "active" => Ok(JourneyStatus::Active),
            "completed" | "complete" => Ok(JourneyStatus::Completed),
            "cancelled" | "canceled" => Ok(JourneyStatus::Cancelled),
            "overdue" => Ok(JourneyStatus::Overdue),
            _ => Err(EnumParseError {
                kind: "JourneyStatus",
                value: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// ALERT TYPE / STATUS
// ============================================================================

/// What triggered an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    /// Explicit emergency trigger by the user.
    Sos,
    /// Missed check-in after the journey deadline.
    Overdue,
}

impl AlertType {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            AlertType::Sos => "sos",
            AlertType::Overdue => "overdue",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        s.parse()
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

impl FromStr for AlertType {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "sos" => Ok(AlertType::Sos),
            "overdue" => Ok(AlertType::Overdue),
            _ => Err(EnumParseError {
                kind: "AlertType",
                value: s.to_string(),
            }),
        }
    }
}

/// Alert lifecycle. Only `sent -> resolved` is possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    #[default]
    Sent,
    Resolved,
}

impl AlertStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            AlertStatus::Sent => "sent",
            AlertStatus::Resolved => "resolved",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        s.parse()
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

impl FromStr for AlertStatus {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "sent" => Ok(AlertStatus::Sent),
            "resolved" => Ok(AlertStatus::Resolved),
            _ => Err(EnumParseError {
                kind: "AlertStatus",
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_journey_status_graph() {
        use JourneyStatus::*;
        assert!(Active.can_transition_to(Completed));
        assert!(Active.can_transition_to(Overdue));
        assert!(Overdue.can_transition_to(Completed));
        assert!(!Overdue.can_transition_to(Active));
        assert!(!Completed.can_transition_to(Overdue));
        assert!(!Cancelled.can_transition_to(Completed));
        assert!(!Active.can_transition_to(Active));
    }

    #[test]
    fn test_sources_match_graph() {
        for next in [
            JourneyStatus::Active,
            JourneyStatus::Completed,
            JourneyStatus::Cancelled,
            JourneyStatus::Overdue,
        ] {
            for from in JourneyStatus::sources_for(next) {
                assert!(from.can_transition_to(next), "{} -> {}", from, next);
            }
        }
    }

    #[test]
    fn test_status_db_roundtrip_and_aliases() {
        assert_eq!(
            JourneyStatus::from_db_str("canceled"),
            Ok(JourneyStatus::Cancelled)
        );
        assert_eq!(JourneyStatus::from_db_str(" Overdue "), Ok(JourneyStatus::Overdue));
        assert!(JourneyStatus::from_db_str("lost").is_err());
        assert_eq!(AlertType::from_db_str("SOS"), Ok(AlertType::Sos));
        assert_eq!(AlertStatus::Resolved.as_db_str(), "resolved");
    }

    #[test]
    fn test_wire_format_is_lowercase() {
        let json = serde_json::to_string(&JourneyStatus::Overdue).expect("serialize");
        assert_eq!(json, "\"overdue\"");
        let parsed: AlertType = serde_json::from_str("\"sos\"").expect("deserialize");
        assert_eq!(parsed, AlertType::Sos);
    }
}
