//! Service Layer
//!
//! Business logic sitting between the route handlers and the store,
//! the escalation engine and the notification gateway.

pub mod dispatch_service;
pub mod journey_service;
pub mod messages;
pub mod verification_service;

pub use dispatch_service::{
    AlertDispatcher, AlertTrigger, ChannelOutcome, ContactDelivery, DeliveryStatus,
    DispatchOutcome, DispatchReport, OpenedAlert,
};
pub use journey_service::{JourneyService, StartJourney};
pub use verification_service::{
    DashMapVerificationStore, PendingCode, VerificationOutcome, VerificationService,
    VerificationStore,
};
