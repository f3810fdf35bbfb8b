//! SafeConnect Core - Entity Types and Contracts
//!
//! Pure data structures and capability traits shared by the store, the
//! escalation engine and the HTTP layer. No I/O happens in this crate.

pub mod clock;
pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;
pub mod notify;
pub mod phone;

pub use clock::{Clock, SystemClock};
pub use entities::{
    expected_arrival, Alert, ContactPatch, Coordinates, EmergencyContact, Journey, JourneyPlan,
    User, UserPatch, DEFAULT_BUFFER_MINUTES, DEFAULT_USER_NAME, MAX_BUFFER_MINUTES,
    MAX_JOURNEY_MINUTES,
};
pub use enums::{AlertStatus, AlertType, EnumParseError, JourneyStatus};
pub use error::{
    EngineError, GatewayError, SafeConnectError, SafeConnectResult, StoreError, StoreResult,
    ValidationError,
};
pub use identity::{AlertId, ContactId, EntityIdType, JourneyId, Timestamp, UserId};
pub use notify::{Channel, MessageRef, NotificationGateway};
pub use phone::{mask_phone, normalize_phone, sanitize_phone};
