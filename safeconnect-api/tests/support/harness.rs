//! Shared wiring for the integration tests: an in-memory store, a recording
//! gateway and a manual clock behind a fully built [`AppState`].
//!
//! Tests run on a paused tokio clock. [`Harness::advance_minutes`] moves the
//! wall clock and tokio time together so engine deadlines line up with the
//! timestamps the services write.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use safeconnect_api::{create_api_router, ApiConfig, AppState, DispatchConfig, VerificationConfig};
use safeconnect_test_utils::{
    Alert, AlertType, Clock, InMemoryStore, JourneyStore, ManualClock, RecordingGateway, UserId,
};
use tokio::sync::watch;
use tower::ServiceExt;

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub gateway: Arc<RecordingGateway>,
    pub clock: Arc<ManualClock>,
    pub state: AppState,
    shutdown: watch::Sender<bool>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_gateway(RecordingGateway::new())
    }

    /// Build the state and start the escalation scheduler.
    pub fn with_gateway(gateway: RecordingGateway) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(gateway);
        let clock = Arc::new(ManualClock::at_t0());

        let state = AppState::new(
            store.clone(),
            gateway.clone(),
            clock.clone() as Arc<dyn Clock>,
            DispatchConfig::default(),
            VerificationConfig::default(),
        );

        let (shutdown, shutdown_rx) = watch::channel(false);
        state.engine.start(shutdown_rx);

        Self {
            store,
            gateway,
            clock,
            state,
            shutdown,
        }
    }

    pub fn store(&self) -> &dyn JourneyStore {
        self.store.as_ref()
    }

    /// Move wall clock and tokio time forward, then let spawned work run.
    pub async fn advance_minutes(&self, minutes: u64) {
        self.clock.advance_minutes(minutes as i64);
        tokio::time::advance(Duration::from_secs(minutes * 60)).await;
        settle().await;
    }

    pub async fn overdue_alerts(&self, user_id: UserId) -> Vec<Alert> {
        self.store
            .alert_list_by_user(user_id)
            .await
            .expect("list alerts")
            .into_iter()
            .filter(|a| a.alert_type == AlertType::Overdue)
            .collect()
    }

    pub fn router(&self) -> Router {
        create_api_router(self.state.clone(), &ApiConfig::default())
    }

    /// Send one JSON request through the full router.
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.router().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, json)
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Yield until spawned tasks (fire handlers, notices) have had a chance to run.
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}
