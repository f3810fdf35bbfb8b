//! Async journey store contract.
//!
//! The store is the durable record of users, contacts, journeys and alerts.
//! Journey status changes go through [`JourneyStore::journey_transition`],
//! which only applies when the current status is one of the allowed sources,
//! so a late writer can never overwrite a terminal status.

use ::async_trait::async_trait;
use safeconnect_core::{
    Alert, AlertId, ContactId, ContactPatch, EmergencyContact, Journey, JourneyId, JourneyStatus,
    StoreResult, Timestamp, User, UserId, UserPatch,
};

/// Result of a conditional journey status change.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionResult {
    /// The journey was in an allowed status and now has the new one.
    Applied(Journey),
    /// The journey exists but its status was not an allowed source. Carries the current record.
    Rejected(Journey),
    /// No journey with that id.
    NotFound,
}

impl TransitionResult {
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionResult::Applied(_))
    }

    /// The journey record, whichever way the transition went.
    pub fn journey(&self) -> Option<&Journey> {
        match self {
            TransitionResult::Applied(j) | TransitionResult::Rejected(j) => Some(j),
            TransitionResult::NotFound => None,
        }
    }
}

/// Durable storage for SafeConnect entities.
#[async_trait]
pub trait JourneyStore: Send + Sync {
    // ========================================================================
    // USER OPERATIONS
    // ========================================================================

    async fn user_insert(&self, user: &User) -> StoreResult<()>;

    async fn user_get(&self, id: UserId) -> StoreResult<Option<User>>;

    /// Apply a partial update. `None` when the user does not exist.
    async fn user_update(
        &self,
        id: UserId,
        patch: &UserPatch,
        now: Timestamp,
    ) -> StoreResult<Option<User>>;

    // ========================================================================
    // CONTACT OPERATIONS
    // ========================================================================

    async fn contact_insert(&self, contact: &EmergencyContact) -> StoreResult<()>;

    async fn contact_get(&self, id: ContactId) -> StoreResult<Option<EmergencyContact>>;

    /// Contacts of a user in creation order.
    async fn contact_list_by_user(&self, user_id: UserId) -> StoreResult<Vec<EmergencyContact>>;

    async fn contact_update(
        &self,
        id: ContactId,
        patch: &ContactPatch,
    ) -> StoreResult<Option<EmergencyContact>>;

    /// Returns `false` when the contact did not exist.
    async fn contact_delete(&self, id: ContactId) -> StoreResult<bool>;

    // ========================================================================
    // JOURNEY OPERATIONS
    // ========================================================================

    /// Insert a new active journey.
    ///
    /// Fails with `StoreError::ActiveJourneyExists` when the user already has one.
    async fn journey_insert(&self, journey: &Journey) -> StoreResult<()>;

    async fn journey_get(&self, id: JourneyId) -> StoreResult<Option<Journey>>;

    /// Journeys of a user, newest first.
    async fn journey_list_by_user(&self, user_id: UserId) -> StoreResult<Vec<Journey>>;

    /// The user's latest journey, only if it is still active.
    async fn journey_get_active(&self, user_id: UserId) -> StoreResult<Option<Journey>>;

    /// Every active journey across all users. Used by the startup recovery scan.
    async fn journey_list_active(&self) -> StoreResult<Vec<Journey>>;

    /// Set `to` only if the current status is in `from`.
    ///
    /// `completed_at` is recorded when provided.
    async fn journey_transition(
        &self,
        id: JourneyId,
        from: &[JourneyStatus],
        to: JourneyStatus,
        completed_at: Option<Timestamp>,
    ) -> StoreResult<TransitionResult>;

    // ========================================================================
    // ALERT OPERATIONS
    // ========================================================================

    async fn alert_insert(&self, alert: &Alert) -> StoreResult<()>;

    async fn alert_get(&self, id: AlertId) -> StoreResult<Option<Alert>>;

    /// Alerts of a user, newest first.
    async fn alert_list_by_user(&self, user_id: UserId) -> StoreResult<Vec<Alert>>;

    /// Mark an alert resolved. Resolving twice keeps the first `resolved_at`.
    async fn alert_resolve(&self, id: AlertId, resolved_at: Timestamp) -> StoreResult<Option<Alert>>;

    // ========================================================================
    // HEALTH
    // ========================================================================

    /// Cheap round-trip proving the backing store is reachable.
    async fn health_check(&self) -> StoreResult<()>;
}
