//! OpenAPI Specification for the SafeConnect API
//!
//! Generated by utoipa from the route annotations and schema derives.

use utoipa::OpenApi;

use crate::error::{ApiError, ErrorCode};
use crate::routes::{alert, contact, health, journey, otp, user};
use crate::services::{
    ChannelOutcome, ContactDelivery, DeliveryStatus, DispatchOutcome, DispatchReport,
    VerificationOutcome,
};
use crate::types::*;

use safeconnect_core::{
    Alert, AlertStatus, AlertType, Channel, ContactPatch, Coordinates, EmergencyContact, Journey,
    JourneyStatus, MessageRef, User, UserPatch,
};

/// OpenAPI document for the SafeConnect API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "SafeConnect API",
        version = "0.4.0",
        description = "Journey safety timers, emergency alerts and contact notification",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Users", description = "User profiles"),
        (name = "Contacts", description = "Emergency contacts"),
        (name = "Journeys", description = "Journeys and their check-in deadlines"),
        (name = "Alerts", description = "SOS and overdue alerts with delivery reports"),
        (name = "Verification", description = "Phone number verification codes"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        user::create_user,
        user::get_user,
        user::update_user,
        contact::create_contact,
        contact::create_user_contact,
        contact::list_user_contacts,
        contact::get_contact,
        contact::update_contact,
        contact::delete_contact,
        journey::create_journey,
        journey::update_journey,
        journey::get_journey,
        journey::list_user_journeys,
        journey::get_active_journey,
        alert::create_alert,
        alert::update_alert,
        alert::list_user_alerts,
        otp::send_code,
        otp::verify_code,
        health::ping,
        health::liveness,
        health::readiness,
        crate::telemetry::metrics::metrics_handler,
    ),
    components(schemas(
        ApiError,
        ErrorCode,
        User,
        UserPatch,
        EmergencyContact,
        ContactPatch,
        Journey,
        JourneyStatus,
        Alert,
        AlertType,
        AlertStatus,
        Coordinates,
        Channel,
        MessageRef,
        CreateUserRequest,
        CreateContactRequest,
        CreateJourneyRequest,
        UpdateJourneyRequest,
        CreateAlertRequest,
        UpdateAlertRequest,
        SendCodeRequest,
        SendCodeResponse,
        VerifyCodeRequest,
        VerifyCodeResponse,
        VerificationOutcome,
        DispatchOutcome,
        DispatchReport,
        ContactDelivery,
        ChannelOutcome,
        DeliveryStatus,
        health::HealthResponse,
        health::HealthStatus,
        health::HealthDetails,
        health::ComponentHealth,
    ))
)]
pub struct ApiDoc;
