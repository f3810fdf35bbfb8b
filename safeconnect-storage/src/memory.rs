//! In-memory journey store.
//!
//! Backs development servers and the test suite. Each table sits behind its
//! own `tokio::sync::RwLock`; locks are always taken users-first so the
//! referential checks cannot deadlock.

use ::async_trait::async_trait;
use safeconnect_core::{
    Alert, AlertId, AlertStatus, ContactId, ContactPatch, EmergencyContact, EntityIdType, Journey,
    JourneyId, JourneyStatus, StoreError, StoreResult, Timestamp, User, UserId, UserPatch,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::store::{JourneyStore, TransitionResult};

/// In-memory store. Cloning shares the underlying tables.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    users: Arc<RwLock<HashMap<UserId, User>>>,
    contacts: Arc<RwLock<HashMap<ContactId, EmergencyContact>>>,
    journeys: Arc<RwLock<HashMap<JourneyId, Journey>>>,
    alerts: Arc<RwLock<HashMap<AlertId, Alert>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn alert_count(&self) -> usize {
        self.alerts.read().await.len()
    }

    pub async fn journey_count(&self) -> usize {
        self.journeys.read().await.len()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                reason: "in-memory store marked unavailable".to_string(),
            });
        }
        Ok(())
    }

    async fn require_user(&self, user_id: UserId) -> StoreResult<()> {
        if self.users.read().await.contains_key(&user_id) {
            Ok(())
        } else {
            Err(not_found(user_id))
        }
    }
}

fn not_found<T: EntityIdType>(id: T) -> StoreError {
    StoreError::NotFound {
        entity: T::ENTITY_NAME,
        id: id.as_uuid(),
    }
}

fn duplicate<T: EntityIdType>(id: T) -> StoreError {
    StoreError::Conflict {
        entity: T::ENTITY_NAME,
        reason: format!("{} {} already exists", T::ENTITY_NAME, id),
    }
}

#[async_trait]
impl JourneyStore for InMemoryStore {
    // === User Operations ===

    async fn user_insert(&self, user: &User) -> StoreResult<()> {
        self.check_available()?;
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) {
            return Err(duplicate(user.id));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn user_get(&self, id: UserId) -> StoreResult<Option<User>> {
        self.check_available()?;
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn user_update(
        &self,
        id: UserId,
        patch: &UserPatch,
        now: Timestamp,
    ) -> StoreResult<Option<User>> {
        self.check_available()?;
        let mut users = self.users.write().await;
        Ok(users.get_mut(&id).map(|user| {
            user.apply(patch, now);
            user.clone()
        }))
    }

    // === Contact Operations ===

    async fn contact_insert(&self, contact: &EmergencyContact) -> StoreResult<()> {
        self.check_available()?;
        self.require_user(contact.user_id).await?;
        let mut contacts = self.contacts.write().await;
        if contacts.contains_key(&contact.id) {
            return Err(duplicate(contact.id));
        }
        contacts.insert(contact.id, contact.clone());
        Ok(())
    }

    async fn contact_get(&self, id: ContactId) -> StoreResult<Option<EmergencyContact>> {
        self.check_available()?;
        Ok(self.contacts.read().await.get(&id).cloned())
    }

    async fn contact_list_by_user(&self, user_id: UserId) -> StoreResult<Vec<EmergencyContact>> {
        self.check_available()?;
        let contacts = self.contacts.read().await;
        let mut list: Vec<EmergencyContact> = contacts
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(list)
    }

    async fn contact_update(
        &self,
        id: ContactId,
        patch: &ContactPatch,
    ) -> StoreResult<Option<EmergencyContact>> {
        self.check_available()?;
        let mut contacts = self.contacts.write().await;
        Ok(contacts.get_mut(&id).map(|contact| {
            contact.apply(patch);
            contact.clone()
        }))
    }

    async fn contact_delete(&self, id: ContactId) -> StoreResult<bool> {
        self.check_available()?;
        Ok(self.contacts.write().await.remove(&id).is_some())
    }

    // === Journey Operations ===

    async fn journey_insert(&self, journey: &Journey) -> StoreResult<()> {
        self.check_available()?;
        self.require_user(journey.user_id).await?;
        let mut journeys = self.journeys.write().await;
        if journeys.contains_key(&journey.id) {
            return Err(duplicate(journey.id));
        }
        if journey.is_active()
            && journeys
                .values()
                .any(|j| j.user_id == journey.user_id && j.is_active())
        {
            return Err(StoreError::ActiveJourneyExists {
                user_id: journey.user_id.as_uuid(),
            });
        }
        journeys.insert(journey.id, journey.clone());
        Ok(())
    }

    async fn journey_get(&self, id: JourneyId) -> StoreResult<Option<Journey>> {
        self.check_available()?;
        Ok(self.journeys.read().await.get(&id).cloned())
    }

    async fn journey_list_by_user(&self, user_id: UserId) -> StoreResult<Vec<Journey>> {
        self.check_available()?;
        let journeys = self.journeys.read().await;
        let mut list: Vec<Journey> = journeys
            .values()
            .filter(|j| j.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(list)
    }

    async fn journey_get_active(&self, user_id: UserId) -> StoreResult<Option<Journey>> {
        let latest = self.journey_list_by_user(user_id).await?.into_iter().next();
        Ok(latest.filter(Journey::is_active))
    }

    async fn journey_list_active(&self) -> StoreResult<Vec<Journey>> {
        self.check_available()?;
        let journeys = self.journeys.read().await;
        let mut list: Vec<Journey> = journeys.values().filter(|j| j.is_active()).cloned().collect();
        list.sort_by(|a, b| a.expected_arrival.cmp(&b.expected_arrival));
        Ok(list)
    }

    async fn journey_transition(
        &self,
        id: JourneyId,
        from: &[JourneyStatus],
        to: JourneyStatus,
        completed_at: Option<Timestamp>,
    ) -> StoreResult<TransitionResult> {
        self.check_available()?;
        let mut journeys = self.journeys.write().await;
        let Some(journey) = journeys.get_mut(&id) else {
            return Ok(TransitionResult::NotFound);
        };
        if !from.contains(&journey.status) {
            return Ok(TransitionResult::Rejected(journey.clone()));
        }
        journey.status = to;
        if completed_at.is_some() {
            journey.completed_at = completed_at;
        }
        Ok(TransitionResult::Applied(journey.clone()))
    }

    // === Alert Operations ===

    async fn alert_insert(&self, alert: &Alert) -> StoreResult<()> {
        self.check_available()?;
        self.require_user(alert.user_id).await?;
        let mut alerts = self.alerts.write().await;
        if alerts.contains_key(&alert.id) {
            return Err(duplicate(alert.id));
        }
        alerts.insert(alert.id, alert.clone());
        Ok(())
    }

    async fn alert_get(&self, id: AlertId) -> StoreResult<Option<Alert>> {
        self.check_available()?;
        Ok(self.alerts.read().await.get(&id).cloned())
    }

    async fn alert_list_by_user(&self, user_id: UserId) -> StoreResult<Vec<Alert>> {
        self.check_available()?;
        let alerts = self.alerts.read().await;
        let mut list: Vec<Alert> = alerts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(list)
    }

    async fn alert_resolve(&self, id: AlertId, resolved_at: Timestamp) -> StoreResult<Option<Alert>> {
        self.check_available()?;
        let mut alerts = self.alerts.write().await;
        Ok(alerts.get_mut(&id).map(|alert| {
            if alert.status != AlertStatus::Resolved {
                alert.status = AlertStatus::Resolved;
                alert.resolved_at = Some(resolved_at);
            }
            alert.clone()
        }))
    }

    // === Health ===

    async fn health_check(&self) -> StoreResult<()> {
        self.check_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use safeconnect_core::{AlertType, JourneyPlan};

    async fn store_with_user() -> (InMemoryStore, User) {
        let store = InMemoryStore::new();
        let user = User::new(UserId::now_v7(), "Ana", "+15550100", Utc::now());
        store.user_insert(&user).await.expect("insert user");
        (store, user)
    }

    fn journey_for(user_id: UserId, created_at: Timestamp) -> Journey {
        let plan = JourneyPlan::new("Home", "Office", 30, None).expect("valid plan");
        Journey::start(JourneyId::now_v7(), user_id, plan, created_at)
    }

    #[tokio::test]
    async fn test_second_active_journey_conflicts() {
        let (store, user) = store_with_user().await;
        store
            .journey_insert(&journey_for(user.id, Utc::now()))
            .await
            .expect("first journey");

        let err = store
            .journey_insert(&journey_for(user.id, Utc::now()))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::ActiveJourneyExists {
                user_id: user.id.as_uuid()
            }
        );
    }

    #[tokio::test]
    async fn test_transition_is_conditional_on_current_status() {
        let (store, user) = store_with_user().await;
        let journey = journey_for(user.id, Utc::now());
        store.journey_insert(&journey).await.expect("insert");

        let done = store
            .journey_transition(
                journey.id,
                JourneyStatus::sources_for(JourneyStatus::Completed),
                JourneyStatus::Completed,
                Some(Utc::now()),
            )
            .await
            .expect("transition");
        assert!(done.is_applied());

        // A late overdue write must not clobber the terminal status.
        let late = store
            .journey_transition(
                journey.id,
                &[JourneyStatus::Active],
                JourneyStatus::Overdue,
                None,
            )
            .await
            .expect("transition");
        match late {
            TransitionResult::Rejected(current) => {
                assert_eq!(current.status, JourneyStatus::Completed)
            }
            other => panic!("expected rejection, got {:?}", other),
        }

        let missing = store
            .journey_transition(
                JourneyId::now_v7(),
                &[JourneyStatus::Active],
                JourneyStatus::Overdue,
                None,
            )
            .await
            .expect("transition");
        assert_eq!(missing, TransitionResult::NotFound);
    }

    #[tokio::test]
    async fn test_active_journey_is_latest_only() {
        let (store, user) = store_with_user().await;
        let t0 = Utc::now();
        let first = journey_for(user.id, t0);
        store.journey_insert(&first).await.expect("insert");
        store
            .journey_transition(
                first.id,
                &[JourneyStatus::Active],
                JourneyStatus::Cancelled,
                None,
            )
            .await
            .expect("cancel");
        assert_eq!(store.journey_get_active(user.id).await.expect("query"), None);

        let second = journey_for(user.id, t0 + Duration::minutes(5));
        store.journey_insert(&second).await.expect("insert");
        let active = store.journey_get_active(user.id).await.expect("query");
        assert_eq!(active.map(|j| j.id), Some(second.id));

        let listed = store.journey_list_by_user(user.id).await.expect("list");
        assert_eq!(listed.first().map(|j| j.id), Some(second.id));
    }

    #[tokio::test]
    async fn test_inserts_require_existing_user() {
        let store = InMemoryStore::new();
        let alert = Alert::new(
            AlertId::now_v7(),
            UserId::now_v7(),
            None,
            AlertType::Sos,
            None,
            Utc::now(),
        );
        let err = store.alert_insert(&alert).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "User", .. }));
    }

    #[tokio::test]
    async fn test_resolve_keeps_first_timestamp() {
        let (store, user) = store_with_user().await;
        let alert = Alert::new(
            AlertId::now_v7(),
            user.id,
            None,
            AlertType::Sos,
            None,
            Utc::now(),
        );
        store.alert_insert(&alert).await.expect("insert");
        let first = Utc::now();
        let resolved = store
            .alert_resolve(alert.id, first)
            .await
            .expect("resolve")
            .expect("exists");
        assert_eq!(resolved.resolved_at, Some(first));
        let again = store
            .alert_resolve(alert.id, first + Duration::minutes(1))
            .await
            .expect("resolve")
            .expect("exists");
        assert_eq!(again.resolved_at, Some(first));
    }

    #[tokio::test]
    async fn test_unavailable_flag_fails_operations() {
        let (store, user) = store_with_user().await;
        store.set_unavailable(true);
        assert!(matches!(
            store.user_get(user.id).await,
            Err(StoreError::Unavailable { .. })
        ));
        assert!(store.health_check().await.is_err());
        store.set_unavailable(false);
        assert!(store.health_check().await.is_ok());
    }
}
