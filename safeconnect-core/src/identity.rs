//! Identity types for SafeConnect entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Common behaviour of the strongly-typed entity identifiers.
///
/// Every id wraps a UUIDv7 so ids sort by creation time.
pub trait EntityIdType:
    Copy + Eq + std::hash::Hash + fmt::Debug + fmt::Display + FromStr + Send + Sync + 'static
{
    /// Human-readable entity name used in error messages ("Journey", "Alert", ...).
    const ENTITY_NAME: &'static str;

    fn new(uuid: Uuid) -> Self;

    fn as_uuid(&self) -> Uuid;

    /// Generate a fresh time-sortable id.
    fn now_v7() -> Self {
        Self::new(Uuid::now_v7())
    }

    fn nil() -> Self {
        Self::new(Uuid::nil())
    }
}

macro_rules! define_entity_id {
    ($(#[$meta:meta])* $name:ident, $entity:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        #[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
        #[cfg_attr(feature = "openapi", schema(value_type = String, format = Uuid))]
        pub struct $name(Uuid);

        impl EntityIdType for $name {
            const ENTITY_NAME: &'static str = $entity;

            fn new(uuid: Uuid) -> Self {
                Self(uuid)
            }

            fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_entity_id!(
    /// Identifier of a [`crate::User`].
    UserId,
    "User"
);
define_entity_id!(
    /// Identifier of an [`crate::EmergencyContact`].
    ContactId,
    "Contact"
);
define_entity_id!(
    /// Identifier of a [`crate::Journey`].
    JourneyId,
    "Journey"
);
define_entity_id!(
    /// Identifier of an [`crate::Alert`].
    AlertId,
    "Alert"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_time_sortable() {
        let first = JourneyId::now_v7();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = JourneyId::now_v7();
        assert!(first < second);
    }

    #[test]
    fn test_id_parses_from_display() {
        let id = AlertId::now_v7();
        let parsed: AlertId = id.to_string().parse().expect("display output should parse");
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_id_serializes_as_bare_uuid() {
        let uuid = Uuid::now_v7();
        let id = UserId::new(uuid);
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, format!("\"{}\"", uuid));
    }

    #[test]
    fn test_invalid_id_rejected() {
        assert!("not-a-uuid".parse::<ContactId>().is_err());
    }
}
