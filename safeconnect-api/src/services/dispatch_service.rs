//! Alert Dispatch Service
//!
//! Turns one trigger (SOS or a missed check-in) into exactly one persisted
//! [`Alert`] and a concurrent fan-out to every emergency contact of the user.
//!
//! SMS and voice are attempted independently for each contact, every gateway
//! call is bounded by a timeout, and no call is retried. The outcome of each
//! attempt is collected into a [`DispatchReport`]; delivery failures never
//! surface as errors.

use futures_util::stream::{self, StreamExt};
use safeconnect_core::{
    mask_phone, sanitize_phone, Alert, AlertId, AlertType, Channel, Clock, ContactId, Coordinates,
    EmergencyContact, EntityIdType, GatewayError, Journey, JourneyId, MessageRef,
    NotificationGateway, User, UserId,
};
use safeconnect_storage::JourneyStore;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::config::DispatchConfig;
use crate::error::{ApiError, ApiResult};
use crate::services::messages;
use crate::telemetry::METRICS;

// ============================================================================
// TRIGGER & REPORT TYPES
// ============================================================================

/// What caused an alert.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertTrigger {
    pub user_id: UserId,
    pub journey_id: Option<JourneyId>,
    pub alert_type: AlertType,
    pub location: Option<Coordinates>,
}

impl AlertTrigger {
    pub fn sos(user_id: UserId, location: Option<Coordinates>) -> Self {
        Self {
            user_id,
            journey_id: None,
            alert_type: AlertType::Sos,
            location,
        }
    }

    pub fn overdue(user_id: UserId, journey_id: JourneyId, location: Option<Coordinates>) -> Self {
        Self {
            user_id,
            journey_id: Some(journey_id),
            alert_type: AlertType::Overdue,
            location,
        }
    }
}

/// Outcome of one channel for one contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChannelOutcome {
    Delivered { reference: String },
    Failed { reason: String },
    /// Not attempted, e.g. voice without a configured voice provider.
    Skipped,
}

impl ChannelOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, ChannelOutcome::Delivered { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ChannelOutcome::Failed { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            ChannelOutcome::Delivered { .. } => "delivered",
            ChannelOutcome::Failed { .. } => "failed",
            ChannelOutcome::Skipped => "skipped",
        }
    }
}

/// Both channels for one contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ContactDelivery {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = Uuid))]
    pub contact_id: ContactId,
    pub contact_name: String,
    /// Masked to the last four digits.
    pub phone: String,
    pub sms: ChannelOutcome,
    pub voice: ChannelOutcome,
}

impl ContactDelivery {
    pub fn reached(&self) -> bool {
        self.sms.is_delivered() || self.voice.is_delivered()
    }

    fn any_failed(&self) -> bool {
        self.sms.is_failed() || self.voice.is_failed()
    }
}

/// Overall result of a fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Every attempted channel succeeded.
    Delivered,
    /// Some attempts succeeded and some failed.
    Partial,
    /// Nothing was delivered.
    Failed,
    /// The user has no emergency contacts.
    NoContacts,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Partial => "partial",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::NoContacts => "no_contacts",
        }
    }
}

/// Per-contact, per-channel result of one alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = Uuid))]
    pub alert_id: AlertId,
    pub alert_type: AlertType,
    pub total_contacts: usize,
    pub contacts: Vec<ContactDelivery>,
    pub any_succeeded: bool,
    pub status: DeliveryStatus,
    /// Advice for the user when nobody could be reached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_hint: Option<String>,
}

impl DispatchReport {
    fn build(alert: &Alert, contacts: Vec<ContactDelivery>) -> Self {
        let total_contacts = contacts.len();
        let any_succeeded = contacts.iter().any(ContactDelivery::reached);
        let any_failed = contacts.iter().any(ContactDelivery::any_failed);

        let status = if total_contacts == 0 {
            DeliveryStatus::NoContacts
        } else if !any_succeeded {
            DeliveryStatus::Failed
        } else if any_failed || contacts.iter().any(|c| !c.reached()) {
            DeliveryStatus::Partial
        } else {
            DeliveryStatus::Delivered
        };

        let action_hint = match status {
            DeliveryStatus::NoContacts => Some(
                "No emergency contacts are set up. Call emergency services directly if you need help."
                    .to_string(),
            ),
            DeliveryStatus::Failed => Some(
                "None of your contacts could be reached. Call emergency services directly."
                    .to_string(),
            ),
            _ => None,
        };

        Self {
            alert_id: alert.id,
            alert_type: alert.alert_type,
            total_contacts,
            contacts,
            any_succeeded,
            status,
            action_hint,
        }
    }
}

/// The persisted alert together with its delivery report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub alert: Alert,
    pub delivery: DispatchReport,
}

// ============================================================================
// DISPATCHER
// ============================================================================

struct AlertContent {
    sms: String,
    voice: Vec<String>,
}

/// An alert that is persisted but not yet delivered.
pub struct OpenedAlert {
    alert: Alert,
    contacts: Vec<EmergencyContact>,
    content: AlertContent,
}

impl OpenedAlert {
    pub fn alert(&self) -> &Alert {
        &self.alert
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }
}

/// Creates alerts and fans them out to emergency contacts.
#[derive(Clone)]
pub struct AlertDispatcher {
    store: Arc<dyn JourneyStore>,
    gateway: Arc<dyn NotificationGateway>,
    clock: Arc<dyn Clock>,
    config: DispatchConfig,
}

impl AlertDispatcher {
    pub fn new(
        store: Arc<dyn JourneyStore>,
        gateway: Arc<dyn NotificationGateway>,
        clock: Arc<dyn Clock>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            clock,
            config,
        }
    }

    pub fn gateway(&self) -> &Arc<dyn NotificationGateway> {
        &self.gateway
    }

    /// Persist one alert for `trigger` and notify every contact.
    ///
    /// # Errors
    /// Fails only before any notification is attempted: unknown user or
    /// journey, or the store being unavailable. Delivery failures are
    /// reported in the returned [`DispatchReport`].
    pub async fn dispatch(&self, trigger: AlertTrigger) -> ApiResult<DispatchOutcome> {
        let opened = self.open(trigger).await?;
        Ok(self.deliver(opened).await)
    }

    /// Validate the trigger, load the recipients and persist the alert.
    ///
    /// No notification is attempted until [`AlertDispatcher::deliver`].
    pub async fn open(&self, trigger: AlertTrigger) -> ApiResult<OpenedAlert> {
        let user = self
            .store
            .user_get(trigger.user_id)
            .await?
            .ok_or_else(|| ApiError::user_not_found(trigger.user_id))?;

        let journey = match trigger.journey_id {
            Some(journey_id) => {
                let journey = self
                    .store
                    .journey_get(journey_id)
                    .await?
                    .ok_or_else(|| ApiError::journey_not_found(journey_id))?;
                if journey.user_id != user.id {
                    return Err(ApiError::invalid_input(format!(
                        "Journey {} does not belong to user {}",
                        journey_id, user.id
                    )));
                }
                Some(journey)
            }
            None => None,
        };

        let contacts = self.store.contact_list_by_user(user.id).await?;

        let alert = Alert::new(
            AlertId::now_v7(),
            user.id,
            trigger.journey_id,
            trigger.alert_type,
            trigger.location,
            self.clock.now(),
        );
        self.store.alert_insert(&alert).await?;

        tracing::info!(
            alert_id = %alert.id,
            user_id = %user.id,
            alert_type = %alert.alert_type,
            contacts = contacts.len(),
            "Alert recorded"
        );

        let content = compose(&user, journey.as_ref(), &trigger);
        Ok(OpenedAlert {
            alert,
            contacts,
            content,
        })
    }

    /// Fan an opened alert out to its contacts.
    pub async fn deliver(&self, opened: OpenedAlert) -> DispatchOutcome {
        let started = Instant::now();
        let OpenedAlert {
            alert,
            contacts,
            content,
        } = opened;

        let deliveries = self.fan_out(contacts, &content).await;
        let report = DispatchReport::build(&alert, deliveries);

        METRICS.record_dispatch(
            alert.alert_type.as_db_str(),
            report.status.as_str(),
            started.elapsed().as_secs_f64(),
        );
        if report.any_succeeded || report.status == DeliveryStatus::NoContacts {
            tracing::info!(
                alert_id = %alert.id,
                status = report.status.as_str(),
                total_contacts = report.total_contacts,
                "Alert dispatch finished"
            );
        } else {
            tracing::error!(
                alert_id = %alert.id,
                total_contacts = report.total_contacts,
                "Alert reached no contact"
            );
        }

        DispatchOutcome {
            alert,
            delivery: report,
        }
    }

    /// Send an informational SMS to every contact of `user_id`.
    ///
    /// Failures are logged and counted, never returned. Returns the number of
    /// contacts that received the message.
    pub async fn broadcast_text(&self, user_id: UserId, body: &str) -> usize {
        let contacts = match self.store.contact_list_by_user(user_id).await {
            Ok(contacts) => contacts,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Cannot load contacts for notice");
                return 0;
            }
        };

        let outcomes: Vec<ChannelOutcome> = stream::iter(contacts)
            .map(|contact| async move {
                let phone = sanitize_phone(&contact.phone);
                if phone.is_empty() {
                    return invalid_phone();
                }
                self.attempt(Channel::Sms, &phone, self.gateway.send_text(&phone, body))
                    .await
            })
            .buffer_unordered(self.config.max_concurrency)
            .collect()
            .await;

        let delivered = outcomes.iter().filter(|o| o.is_delivered()).count();
        tracing::debug!(
            user_id = %user_id,
            delivered,
            total = outcomes.len(),
            "Informational notice sent"
        );
        delivered
    }

    async fn fan_out(
        &self,
        contacts: Vec<EmergencyContact>,
        content: &AlertContent,
    ) -> Vec<ContactDelivery> {
        let mut deliveries: Vec<(usize, ContactDelivery)> = stream::iter(contacts.into_iter().enumerate())
            .map(|(index, contact)| async move { (index, self.notify_contact(contact, content).await) })
            .buffer_unordered(self.config.max_concurrency)
            .collect()
            .await;
        deliveries.sort_by_key(|(index, _)| *index);
        deliveries.into_iter().map(|(_, delivery)| delivery).collect()
    }

    async fn notify_contact(&self, contact: EmergencyContact, content: &AlertContent) -> ContactDelivery {
        let phone = sanitize_phone(&contact.phone);
        let (sms, voice) = if phone.is_empty() {
            (invalid_phone(), invalid_phone())
        } else {
            let sms = self.attempt(Channel::Sms, &phone, self.gateway.send_text(&phone, &content.sms));
            let voice = async {
                if self.gateway.voice_available() {
                    self.attempt(
                        Channel::Voice,
                        &phone,
                        self.gateway.place_voice_call(&phone, &content.voice),
                    )
                    .await
                } else {
                    METRICS.record_notification(Channel::Voice.as_str(), "skipped");
                    ChannelOutcome::Skipped
                }
            };
            tokio::join!(sms, voice)
        };

        ContactDelivery {
            contact_id: contact.id,
            contact_name: contact.name,
            phone: mask_phone(&phone),
            sms,
            voice,
        }
    }

    /// One bounded gateway call.
    async fn attempt<F>(&self, channel: Channel, phone: &str, call: F) -> ChannelOutcome
    where
        F: Future<Output = Result<MessageRef, GatewayError>>,
    {
        let outcome = match tokio::time::timeout(self.config.call_timeout, call).await {
            Ok(Ok(reference)) => ChannelOutcome::Delivered {
                reference: reference.0,
            },
            Ok(Err(e)) if e.is_skip() => ChannelOutcome::Skipped,
            Ok(Err(e)) => ChannelOutcome::Failed {
                reason: e.to_string(),
            },
            Err(_) => ChannelOutcome::Failed {
                reason: GatewayError::Timeout {
                    provider: self.gateway.provider_id().to_string(),
                    timeout_ms: self.config.call_timeout.as_millis() as u64,
                }
                .to_string(),
            },
        };

        METRICS.record_notification(channel.as_str(), outcome.label());
        if let ChannelOutcome::Failed { reason } = &outcome {
            tracing::warn!(
                channel = %channel,
                phone = %mask_phone(phone),
                reason = %reason,
                "Notification attempt failed"
            );
        }
        outcome
    }
}

fn invalid_phone() -> ChannelOutcome {
    ChannelOutcome::Failed {
        reason: "Contact phone number has no digits".to_string(),
    }
}

fn compose(user: &User, journey: Option<&Journey>, trigger: &AlertTrigger) -> AlertContent {
    match trigger.alert_type {
        AlertType::Sos => AlertContent {
            sms: messages::sos_sms(&user.name, trigger.location.as_ref()),
            voice: messages::sos_voice(&user.name, trigger.location.is_some()),
        },
        AlertType::Overdue => {
            let (start, destination) = journey
                .map(|j| (j.start_location.as_str(), j.destination.as_str()))
                .unwrap_or(("their starting point", "their destination"));
            let last_known = trigger
                .location
                .or_else(|| journey.and_then(Journey::start_coordinates));
            AlertContent {
                sms: messages::overdue_sms(&user.name, start, destination, last_known.as_ref()),
                voice: messages::overdue_voice(&user.name, start, destination),
            }
        }
    }
}
