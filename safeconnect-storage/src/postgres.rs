//! PostgreSQL journey store.
//!
//! Uses a deadpool connection pool. The one-active-journey-per-user rule is
//! enforced by a partial unique index, and status transitions are a single
//! conditional `UPDATE ... WHERE status = ANY($2)`.

use ::async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolError, RecyclingMethod, Runtime};
use safeconnect_core::{
    Alert, AlertId, AlertStatus, AlertType, ContactId, ContactPatch, EmergencyContact,
    EntityIdType, Journey, JourneyId, JourneyStatus, StoreError, StoreResult, Timestamp, User,
    UserId, UserPatch,
};
use std::time::Duration;
use tokio_postgres::error::SqlState;
use tokio_postgres::{NoTls, Row};
use uuid::Uuid;

use crate::store::{JourneyStore, TransitionResult};

/// Idempotent schema. Applied by [`PgStore::migrate`].
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL DEFAULT 'User',
    phone TEXT NOT NULL,
    phone_verified BOOLEAN NOT NULL DEFAULT FALSE,
    phone_verified_at TIMESTAMPTZ,
    height TEXT,
    weight TEXT,
    skin_tone TEXT,
    eye_color TEXT,
    distinguishing_features TEXT,
    medical_info TEXT,
    code_word TEXT,
    avatar_index INTEGER NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS emergency_contacts (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    phone TEXT NOT NULL,
    relationship TEXT NOT NULL,
    is_primary BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS emergency_contacts_user_idx ON emergency_contacts (user_id, created_at);

CREATE TABLE IF NOT EXISTS journeys (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    start_location TEXT NOT NULL,
    start_latitude DOUBLE PRECISION,
    start_longitude DOUBLE PRECISION,
    destination TEXT NOT NULL,
    estimated_duration INTEGER NOT NULL CHECK (estimated_duration > 0),
    buffer_time INTEGER NOT NULL DEFAULT 10 CHECK (buffer_time >= 0),
    note TEXT,
    status TEXT NOT NULL DEFAULT 'active',
    expected_arrival TIMESTAMPTZ NOT NULL,
    completed_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE UNIQUE INDEX IF NOT EXISTS journeys_one_active_per_user ON journeys (user_id) WHERE status = 'active';
CREATE INDEX IF NOT EXISTS journeys_user_created_idx ON journeys (user_id, created_at DESC);

CREATE TABLE IF NOT EXISTS alerts (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    journey_id UUID REFERENCES journeys(id) ON DELETE SET NULL,
    alert_type TEXT NOT NULL,
    latitude DOUBLE PRECISION,
    longitude DOUBLE PRECISION,
    status TEXT NOT NULL DEFAULT 'sent',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    resolved_at TIMESTAMPTZ
);
CREATE INDEX IF NOT EXISTS alerts_user_created_idx ON alerts (user_id, created_at DESC);
"#;

const USER_COLUMNS: &str = "id, name, phone, phone_verified, phone_verified_at, height, weight, \
     skin_tone, eye_color, distinguishing_features, medical_info, code_word, avatar_index, created_at";

const CONTACT_COLUMNS: &str = "id, user_id, name, phone, relationship, is_primary, created_at";

const JOURNEY_COLUMNS: &str = "id, user_id, start_location, start_latitude, start_longitude, \
     destination, estimated_duration, buffer_time, note, status, expected_arrival, completed_at, created_at";

const ALERT_COLUMNS: &str =
    "id, user_id, journey_id, alert_type, latitude, longitude, status, created_at, resolved_at";

/// Partial unique index backing the one-active-journey rule.
const ONE_ACTIVE_JOURNEY_INDEX: &str = "journeys_one_active_per_user";

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Wait/create timeout for pooled connections
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "safeconnect".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a database configuration from environment variables.
    ///
    /// - `SAFECONNECT_DB_HOST` (default: localhost)
    /// - `SAFECONNECT_DB_PORT` (default: 5432)
    /// - `SAFECONNECT_DB_NAME` (default: safeconnect)
    /// - `SAFECONNECT_DB_USER` (default: postgres)
    /// - `SAFECONNECT_DB_PASSWORD` (default: empty)
    /// - `SAFECONNECT_DB_POOL_SIZE` (default: 16)
    /// - `SAFECONNECT_DB_TIMEOUT` seconds (default: 30)
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("SAFECONNECT_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("SAFECONNECT_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("SAFECONNECT_DB_NAME")
                .unwrap_or_else(|_| "safeconnect".to_string()),
            user: std::env::var("SAFECONNECT_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("SAFECONNECT_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("SAFECONNECT_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("SAFECONNECT_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> StoreResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        let mut pool_cfg = deadpool_postgres::PoolConfig::new(self.max_size);
        pool_cfg.timeouts.wait = Some(self.timeout);
        pool_cfg.timeouts.create = Some(self.timeout);
        cfg.pool = Some(pool_cfg);

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Unavailable {
                reason: format!("Failed to create pool: {}", e),
            })
    }
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

fn pool_error(e: PoolError) -> StoreError {
    StoreError::Unavailable {
        reason: format!("Connection pool error: {}", e),
    }
}

fn query_error(entity: &'static str, e: tokio_postgres::Error) -> StoreError {
    if let Some(db) = e.as_db_error() {
        if *db.code() == SqlState::UNIQUE_VIOLATION {
            return StoreError::Conflict {
                entity,
                reason: db.message().to_string(),
            };
        }
        if *db.code() == SqlState::FOREIGN_KEY_VIOLATION {
            return StoreError::Conflict {
                entity,
                reason: format!("referenced record does not exist: {}", db.message()),
            };
        }
    }
    StoreError::Unavailable {
        reason: e.to_string(),
    }
}

fn decode_error(entity: &'static str, reason: impl std::fmt::Display) -> StoreError {
    StoreError::Decode {
        entity,
        reason: reason.to_string(),
    }
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn get<'a, T: tokio_postgres::types::FromSql<'a>>(
    row: &'a Row,
    entity: &'static str,
    column: &str,
) -> StoreResult<T> {
    row.try_get(column)
        .map_err(|e| decode_error(entity, format!("{}: {}", column, e)))
}

fn row_to_user(row: &Row) -> StoreResult<User> {
    const E: &str = UserId::ENTITY_NAME;
    Ok(User {
        id: UserId::new(get::<Uuid>(row, E, "id")?),
        name: get(row, E, "name")?,
        phone: get(row, E, "phone")?,
        phone_verified: get(row, E, "phone_verified")?,
        phone_verified_at: get(row, E, "phone_verified_at")?,
        height: get(row, E, "height")?,
        weight: get(row, E, "weight")?,
        skin_tone: get(row, E, "skin_tone")?,
        eye_color: get(row, E, "eye_color")?,
        distinguishing_features: get(row, E, "distinguishing_features")?,
        medical_info: get(row, E, "medical_info")?,
        code_word: get(row, E, "code_word")?,
        avatar_index: get(row, E, "avatar_index")?,
        created_at: get(row, E, "created_at")?,
    })
}

fn row_to_contact(row: &Row) -> StoreResult<EmergencyContact> {
    const E: &str = ContactId::ENTITY_NAME;
    Ok(EmergencyContact {
        id: ContactId::new(get::<Uuid>(row, E, "id")?),
        user_id: UserId::new(get::<Uuid>(row, E, "user_id")?),
        name: get(row, E, "name")?,
        phone: get(row, E, "phone")?,
        relationship: get(row, E, "relationship")?,
        is_primary: get(row, E, "is_primary")?,
        created_at: get(row, E, "created_at")?,
    })
}

fn row_to_journey(row: &Row) -> StoreResult<Journey> {
    const E: &str = JourneyId::ENTITY_NAME;
    let status: String = get(row, E, "status")?;
    Ok(Journey {
        id: JourneyId::new(get::<Uuid>(row, E, "id")?),
        user_id: UserId::new(get::<Uuid>(row, E, "user_id")?),
        start_location: get(row, E, "start_location")?,
        start_latitude: get(row, E, "start_latitude")?,
        start_longitude: get(row, E, "start_longitude")?,
        destination: get(row, E, "destination")?,
        estimated_duration: get(row, E, "estimated_duration")?,
        buffer_time: get(row, E, "buffer_time")?,
        note: get(row, E, "note")?,
        status: JourneyStatus::from_db_str(&status).map_err(|e| decode_error(E, e))?,
        expected_arrival: get(row, E, "expected_arrival")?,
        completed_at: get(row, E, "completed_at")?,
        created_at: get(row, E, "created_at")?,
    })
}

fn row_to_alert(row: &Row) -> StoreResult<Alert> {
    const E: &str = AlertId::ENTITY_NAME;
    let alert_type: String = get(row, E, "alert_type")?;
    let status: String = get(row, E, "status")?;
    Ok(Alert {
        id: AlertId::new(get::<Uuid>(row, E, "id")?),
        user_id: UserId::new(get::<Uuid>(row, E, "user_id")?),
        journey_id: get::<Option<Uuid>>(row, E, "journey_id")?.map(JourneyId::new),
        alert_type: AlertType::from_db_str(&alert_type).map_err(|e| decode_error(E, e))?,
        latitude: get(row, E, "latitude")?,
        longitude: get(row, E, "longitude")?,
        status: AlertStatus::from_db_str(&status).map_err(|e| decode_error(E, e))?,
        created_at: get(row, E, "created_at")?,
        resolved_at: get(row, E, "resolved_at")?,
    })
}

// ============================================================================
// STORE
// ============================================================================

/// PostgreSQL-backed [`JourneyStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &DbConfig) -> StoreResult<Self> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Create tables and indexes if they do not exist.
    pub async fn migrate(&self) -> StoreResult<()> {
        let client = self.pool.get().await.map_err(pool_error)?;
        client
            .batch_execute(SCHEMA_SQL)
            .await
            .map_err(|e| query_error("schema", e))?;
        tracing::info!("Journey store schema is up to date");
        Ok(())
    }

    async fn query_journeys(
        &self,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> StoreResult<Vec<Journey>> {
        let client = self.pool.get().await.map_err(pool_error)?;
        let rows = client
            .query(sql, params)
            .await
            .map_err(|e| query_error(JourneyId::ENTITY_NAME, e))?;
        rows.iter().map(row_to_journey).collect()
    }
}

#[async_trait]
impl JourneyStore for PgStore {
    // === User Operations ===

    async fn user_insert(&self, user: &User) -> StoreResult<()> {
        let client = self.pool.get().await.map_err(pool_error)?;
        client
            .execute(
                &format!(
                    "INSERT INTO users ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
                    USER_COLUMNS
                ),
                &[
                    &user.id.as_uuid(),
                    &user.name,
                    &user.phone,
                    &user.phone_verified,
                    &user.phone_verified_at,
                    &user.height,
                    &user.weight,
                    &user.skin_tone,
                    &user.eye_color,
                    &user.distinguishing_features,
                    &user.medical_info,
                    &user.code_word,
                    &user.avatar_index,
                    &user.created_at,
                ],
            )
            .await
            .map_err(|e| query_error(UserId::ENTITY_NAME, e))?;
        Ok(())
    }

    async fn user_get(&self, id: UserId) -> StoreResult<Option<User>> {
        let client = self.pool.get().await.map_err(pool_error)?;
        let row = client
            .query_opt(
                &format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS),
                &[&id.as_uuid()],
            )
            .await
            .map_err(|e| query_error(UserId::ENTITY_NAME, e))?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn user_update(
        &self,
        id: UserId,
        patch: &UserPatch,
        now: Timestamp,
    ) -> StoreResult<Option<User>> {
        let mut client = self.pool.get().await.map_err(pool_error)?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| query_error(UserId::ENTITY_NAME, e))?;
        let row = tx
            .query_opt(
                &format!("SELECT {} FROM users WHERE id = $1 FOR UPDATE", USER_COLUMNS),
                &[&id.as_uuid()],
            )
            .await
            .map_err(|e| query_error(UserId::ENTITY_NAME, e))?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut user = row_to_user(&row)?;
        user.apply(patch, now);
        tx.execute(
            "UPDATE users SET name = $2, phone = $3, phone_verified = $4, phone_verified_at = $5, \
             height = $6, weight = $7, skin_tone = $8, eye_color = $9, distinguishing_features = $10, \
             medical_info = $11, code_word = $12, avatar_index = $13 WHERE id = $1",
            &[
                &user.id.as_uuid(),
                &user.name,
                &user.phone,
                &user.phone_verified,
                &user.phone_verified_at,
                &user.height,
                &user.weight,
                &user.skin_tone,
                &user.eye_color,
                &user.distinguishing_features,
                &user.medical_info,
                &user.code_word,
                &user.avatar_index,
            ],
        )
        .await
        .map_err(|e| query_error(UserId::ENTITY_NAME, e))?;
        tx.commit()
            .await
            .map_err(|e| query_error(UserId::ENTITY_NAME, e))?;
        Ok(Some(user))
    }

    // === Contact Operations ===

    async fn contact_insert(&self, contact: &EmergencyContact) -> StoreResult<()> {
        let client = self.pool.get().await.map_err(pool_error)?;
        client
            .execute(
                &format!(
                    "INSERT INTO emergency_contacts ({}) VALUES ($1, $2, $3, $4, $5, $6, $7)",
                    CONTACT_COLUMNS
                ),
                &[
                    &contact.id.as_uuid(),
                    &contact.user_id.as_uuid(),
                    &contact.name,
                    &contact.phone,
                    &contact.relationship,
                    &contact.is_primary,
                    &contact.created_at,
                ],
            )
            .await
            .map_err(|e| query_error(ContactId::ENTITY_NAME, e))?;
        Ok(())
    }

    async fn contact_get(&self, id: ContactId) -> StoreResult<Option<EmergencyContact>> {
        let client = self.pool.get().await.map_err(pool_error)?;
        let row = client
            .query_opt(
                &format!("SELECT {} FROM emergency_contacts WHERE id = $1", CONTACT_COLUMNS),
                &[&id.as_uuid()],
            )
            .await
            .map_err(|e| query_error(ContactId::ENTITY_NAME, e))?;
        row.as_ref().map(row_to_contact).transpose()
    }

    async fn contact_list_by_user(&self, user_id: UserId) -> StoreResult<Vec<EmergencyContact>> {
        let client = self.pool.get().await.map_err(pool_error)?;
        let rows = client
            .query(
                &format!(
                    "SELECT {} FROM emergency_contacts WHERE user_id = $1 ORDER BY created_at, id",
                    CONTACT_COLUMNS
                ),
                &[&user_id.as_uuid()],
            )
            .await
            .map_err(|e| query_error(ContactId::ENTITY_NAME, e))?;
        rows.iter().map(row_to_contact).collect()
    }

    async fn contact_update(
        &self,
        id: ContactId,
        patch: &ContactPatch,
    ) -> StoreResult<Option<EmergencyContact>> {
        let client = self.pool.get().await.map_err(pool_error)?;
        let row = client
            .query_opt(
                &format!(
                    "UPDATE emergency_contacts SET name = COALESCE($2, name), phone = COALESCE($3, phone), \
                     relationship = COALESCE($4, relationship), is_primary = COALESCE($5, is_primary) \
                     WHERE id = $1 RETURNING {}",
                    CONTACT_COLUMNS
                ),
                &[
                    &id.as_uuid(),
                    &patch.name,
                    &patch.phone,
                    &patch.relationship,
                    &patch.is_primary,
                ],
            )
            .await
            .map_err(|e| query_error(ContactId::ENTITY_NAME, e))?;
        row.as_ref().map(row_to_contact).transpose()
    }

    async fn contact_delete(&self, id: ContactId) -> StoreResult<bool> {
        let client = self.pool.get().await.map_err(pool_error)?;
        let deleted = client
            .execute("DELETE FROM emergency_contacts WHERE id = $1", &[&id.as_uuid()])
            .await
            .map_err(|e| query_error(ContactId::ENTITY_NAME, e))?;
        Ok(deleted > 0)
    }

    // === Journey Operations ===

    async fn journey_insert(&self, journey: &Journey) -> StoreResult<()> {
        let client = self.pool.get().await.map_err(pool_error)?;
        client
            .execute(
                &format!(
                    "INSERT INTO journeys ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
                    JOURNEY_COLUMNS
                ),
                &[
                    &journey.id.as_uuid(),
                    &journey.user_id.as_uuid(),
                    &journey.start_location,
                    &journey.start_latitude,
                    &journey.start_longitude,
                    &journey.destination,
                    &journey.estimated_duration,
                    &journey.buffer_time,
                    &journey.note,
                    &journey.status.as_db_str(),
                    &journey.expected_arrival,
                    &journey.completed_at,
                    &journey.created_at,
                ],
            )
            .await
            .map_err(|e| {
                let one_active = e.as_db_error().is_some_and(|db| {
                    *db.code() == SqlState::UNIQUE_VIOLATION
                        && db.constraint() == Some(ONE_ACTIVE_JOURNEY_INDEX)
                });
                if one_active {
                    StoreError::ActiveJourneyExists {
                        user_id: journey.user_id.as_uuid(),
                    }
                } else {
                    query_error(JourneyId::ENTITY_NAME, e)
                }
            })?;
        Ok(())
    }

    async fn journey_get(&self, id: JourneyId) -> StoreResult<Option<Journey>> {
        let mut journeys = self
            .query_journeys(
                &format!("SELECT {} FROM journeys WHERE id = $1", JOURNEY_COLUMNS),
                &[&id.as_uuid()],
            )
            .await?;
        Ok(journeys.pop())
    }

    async fn journey_list_by_user(&self, user_id: UserId) -> StoreResult<Vec<Journey>> {
        self.query_journeys(
            &format!(
                "SELECT {} FROM journeys WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
                JOURNEY_COLUMNS
            ),
            &[&user_id.as_uuid()],
        )
        .await
    }

    async fn journey_get_active(&self, user_id: UserId) -> StoreResult<Option<Journey>> {
        let mut latest = self
            .query_journeys(
                &format!(
                    "SELECT {} FROM journeys WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT 1",
                    JOURNEY_COLUMNS
                ),
                &[&user_id.as_uuid()],
            )
            .await?;
        Ok(latest.pop().filter(Journey::is_active))
    }

    async fn journey_list_active(&self) -> StoreResult<Vec<Journey>> {
        self.query_journeys(
            &format!(
                "SELECT {} FROM journeys WHERE status = 'active' ORDER BY expected_arrival",
                JOURNEY_COLUMNS
            ),
            &[],
        )
        .await
    }

    async fn journey_transition(
        &self,
        id: JourneyId,
        from: &[JourneyStatus],
        to: JourneyStatus,
        completed_at: Option<Timestamp>,
    ) -> StoreResult<TransitionResult> {
        let sources: Vec<&str> = from.iter().map(JourneyStatus::as_db_str).collect();
        let mut applied = self
            .query_journeys(
                &format!(
                    "UPDATE journeys SET status = $3, completed_at = COALESCE($4, completed_at) \
                     WHERE id = $1 AND status = ANY($2) RETURNING {}",
                    JOURNEY_COLUMNS
                ),
                &[&id.as_uuid(), &sources, &to.as_db_str(), &completed_at],
            )
            .await?;
        if let Some(journey) = applied.pop() {
            return Ok(TransitionResult::Applied(journey));
        }
        match self.journey_get(id).await? {
            Some(current) => Ok(TransitionResult::Rejected(current)),
            None => Ok(TransitionResult::NotFound),
        }
    }

    // === Alert Operations ===

    async fn alert_insert(&self, alert: &Alert) -> StoreResult<()> {
        let client = self.pool.get().await.map_err(pool_error)?;
        client
            .execute(
                &format!(
                    "INSERT INTO alerts ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
                    ALERT_COLUMNS
                ),
                &[
                    &alert.id.as_uuid(),
                    &alert.user_id.as_uuid(),
                    &alert.journey_id.map(|id| id.as_uuid()),
                    &alert.alert_type.as_db_str(),
                    &alert.latitude,
                    &alert.longitude,
                    &alert.status.as_db_str(),
                    &alert.created_at,
                    &alert.resolved_at,
                ],
            )
            .await
            .map_err(|e| query_error(AlertId::ENTITY_NAME, e))?;
        Ok(())
    }

    async fn alert_get(&self, id: AlertId) -> StoreResult<Option<Alert>> {
        let client = self.pool.get().await.map_err(pool_error)?;
        let row = client
            .query_opt(
                &format!("SELECT {} FROM alerts WHERE id = $1", ALERT_COLUMNS),
                &[&id.as_uuid()],
            )
            .await
            .map_err(|e| query_error(AlertId::ENTITY_NAME, e))?;
        row.as_ref().map(row_to_alert).transpose()
    }

    async fn alert_list_by_user(&self, user_id: UserId) -> StoreResult<Vec<Alert>> {
        let client = self.pool.get().await.map_err(pool_error)?;
        let rows = client
            .query(
                &format!(
                    "SELECT {} FROM alerts WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
                    ALERT_COLUMNS
                ),
                &[&user_id.as_uuid()],
            )
            .await
            .map_err(|e| query_error(AlertId::ENTITY_NAME, e))?;
        rows.iter().map(row_to_alert).collect()
    }

    async fn alert_resolve(&self, id: AlertId, resolved_at: Timestamp) -> StoreResult<Option<Alert>> {
        let client = self.pool.get().await.map_err(pool_error)?;
        let row = client
            .query_opt(
                &format!(
                    "UPDATE alerts SET status = 'resolved', resolved_at = COALESCE(resolved_at, $2) \
                     WHERE id = $1 RETURNING {}",
                    ALERT_COLUMNS
                ),
                &[&id.as_uuid(), &resolved_at],
            )
            .await
            .map_err(|e| query_error(AlertId::ENTITY_NAME, e))?;
        row.as_ref().map(row_to_alert).transpose()
    }

    // === Health ===

    async fn health_check(&self) -> StoreResult<()> {
        let client = self.pool.get().await.map_err(pool_error)?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| query_error("health", e))?;
        Ok(())
    }
}
