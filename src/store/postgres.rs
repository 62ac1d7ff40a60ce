//! Postgres-backed implementation of the queue store.
//!
//! # What this module is
//! Implements `QueueStore` using Postgres (via `sqlx`) as the durable store
//! for tenants, the per-tenant event row, and request rows.
//!
//! # Key invariants
//! - Every tenant-scoped query carries `tenant_id` in its WHERE clause; the
//!   row-level filter is what collapses "owned by someone else" and
//!   "does not exist" into one outcome.
//! - Event writes are conditional on the stored `version`
//!   (`WHERE version = $n`), so a stale writer loses without locking.
//! - Request status transitions are single-row conditional updates
//!   (`WHERE status = ANY($expected)`), so two racing transitions resolve to
//!   exactly one winner.
//!
//! # Operational notes
//! - Migrations run at startup via `sqlx::migrate!("./migrations")`.
//! - Pool connect/acquire timeouts are explicit: an unreachable database
//!   fails the call with `StoreError::Unavailable` instead of hanging, which
//!   is the fail-closed behavior mutations rely on.
use super::{QueueStore, StatusUpdate, StoreError, StoreResult};
use crate::config::PostgresConfig;
use crate::model::{
    EventConfig, EventStatus, HostSession, LiveEvent, QueueStats, RequestStatus, SongRequest,
    Tenant, TrackRef,
};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use std::time::Duration;

/// Durable queue store backed by Postgres.
pub struct PostgresStore {
    pool: PgPool,
}

/// Row shape for the `events` table.
///
/// DB-facing structs are kept separate from domain types to isolate column
/// names and storage formats (string enums) from the API model.
#[derive(Debug, Clone, FromRow)]
struct DbEvent {
    tenant_id: String,
    event_id: String,
    status: String,
    version: i64,
    submission_page_enabled: bool,
    display_page_enabled: bool,
    welcome_text: Option<String>,
    display_notice: Option<String>,
    max_requests_per_guest: Option<i32>,
    active_controller_id: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct DbRequest {
    request_id: String,
    tenant_id: String,
    event_id: String,
    status: String,
    track_id: String,
    title: String,
    artist: Option<String>,
    requester_name: Option<String>,
    created_at: DateTime<Utc>,
    approved_at: Option<DateTime<Utc>>,
    reject_reason: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
struct DbTenant {
    tenant_id: String,
    display_name: String,
    public_code: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct DbHostSession {
    token_hash: String,
    tenant_id: String,
    operator_id: String,
}

impl TryFrom<DbEvent> for LiveEvent {
    type Error = StoreError;

    fn try_from(row: DbEvent) -> Result<Self, Self::Error> {
        let status = EventStatus::from_str(&row.status)
            .map_err(|err| StoreError::Unexpected(anyhow!(err)))?;
        Ok(LiveEvent {
            event_id: row.event_id,
            tenant_id: row.tenant_id,
            status,
            version: row.version,
            config: EventConfig {
                submission_page_enabled: row.submission_page_enabled,
                display_page_enabled: row.display_page_enabled,
                welcome_text: row.welcome_text,
                display_notice: row.display_notice,
                max_requests_per_guest: row.max_requests_per_guest.map(|v| v as u32),
            },
            active_controller_id: row.active_controller_id,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<DbRequest> for SongRequest {
    type Error = StoreError;

    fn try_from(row: DbRequest) -> Result<Self, Self::Error> {
        let status = RequestStatus::from_str(&row.status)
            .map_err(|err| StoreError::Unexpected(anyhow!(err)))?;
        Ok(SongRequest {
            request_id: row.request_id,
            tenant_id: row.tenant_id,
            event_id: row.event_id,
            status,
            track: TrackRef {
                track_id: row.track_id,
                title: row.title,
                artist: row.artist,
            },
            requester_name: row.requester_name,
            created_at: row.created_at,
            approved_at: row.approved_at,
            reject_reason: row.reject_reason,
        })
    }
}

impl From<DbTenant> for Tenant {
    fn from(row: DbTenant) -> Self {
        Tenant {
            tenant_id: row.tenant_id,
            display_name: row.display_name,
            public_code: row.public_code,
            created_at: row.created_at,
        }
    }
}

impl From<DbHostSession> for HostSession {
    fn from(row: DbHostSession) -> Self {
        HostSession {
            token_hash: row.token_hash,
            tenant_id: row.tenant_id,
            operator_id: row.operator_id,
        }
    }
}

fn translate(err: sqlx::Error, what: &str) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound(what.to_string()),
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("{what}: connection pool exhausted"))
        }
        sqlx::Error::Io(io) => StoreError::Unavailable(format!("{what}: {io}")),
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(what.to_string())
        }
        other => StoreError::Unexpected(anyhow!(other)),
    }
}

impl PostgresStore {
    pub async fn connect(pg: &PostgresConfig) -> anyhow::Result<Self> {
        let options = PgConnectOptions::from_str(&pg.url)?;
        let pool = PgPoolOptions::new()
            .max_connections(pg.max_connections)
            .acquire_timeout(Duration::from_millis(pg.acquire_timeout_ms))
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    async fn current_request_status(
        &self,
        tenant_id: &str,
        request_id: &str,
    ) -> StoreResult<Option<RequestStatus>> {
        let status: Option<(String,)> = sqlx::query_as(
            "SELECT status FROM requests WHERE request_id = $1 AND tenant_id = $2",
        )
        .bind(request_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| translate(err, "request status"))?;
        match status {
            Some((raw,)) => Ok(Some(
                RequestStatus::from_str(&raw)
                    .map_err(|err| StoreError::Unexpected(anyhow!(err)))?,
            )),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl QueueStore for PostgresStore {
    async fn create_tenant(&self, tenant: Tenant) -> StoreResult<Tenant> {
        sqlx::query(
            "INSERT INTO tenants (tenant_id, display_name, public_code, created_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&tenant.tenant_id)
        .bind(&tenant.display_name)
        .bind(&tenant.public_code)
        .bind(tenant.created_at)
        .execute(&self.pool)
        .await
        .map_err(|err| translate(err, "tenant"))?;
        metrics::counter!("setlist_tenants_created_total").increment(1);
        Ok(tenant)
    }

    async fn list_tenants(&self) -> StoreResult<Vec<Tenant>> {
        let rows: Vec<DbTenant> = sqlx::query_as(
            "SELECT tenant_id, display_name, public_code, created_at
             FROM tenants ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|err| translate(err, "tenants"))?;
        Ok(rows.into_iter().map(Tenant::from).collect())
    }

    async fn tenant_exists(&self, tenant_id: &str) -> StoreResult<bool> {
        let row: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM tenants WHERE tenant_id = $1")
                .bind(tenant_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|err| translate(err, "tenant"))?;
        Ok(row.is_some())
    }

    async fn tenant_by_public_code(&self, code: &str) -> StoreResult<Tenant> {
        let row: DbTenant = sqlx::query_as(
            "SELECT tenant_id, display_name, public_code, created_at
             FROM tenants WHERE public_code = $1",
        )
        .bind(code)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| translate(err, "tenant"))?;
        Ok(row.into())
    }

    async fn insert_host_session(&self, session: HostSession) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO host_sessions (token_hash, tenant_id, operator_id)
             VALUES ($1, $2, $3)
             ON CONFLICT (token_hash) DO UPDATE
                SET tenant_id = EXCLUDED.tenant_id,
                    operator_id = EXCLUDED.operator_id",
        )
        .bind(&session.token_hash)
        .bind(&session.tenant_id)
        .bind(&session.operator_id)
        .execute(&self.pool)
        .await
        .map_err(|err| translate(err, "host session"))?;
        Ok(())
    }

    async fn resolve_host_session(&self, token_hash: &str) -> StoreResult<HostSession> {
        let row: DbHostSession = sqlx::query_as(
            "SELECT token_hash, tenant_id, operator_id
             FROM host_sessions WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| translate(err, "host session"))?;
        Ok(row.into())
    }

    async fn load_event(&self, tenant_id: &str) -> StoreResult<Option<LiveEvent>> {
        let row: Option<DbEvent> = sqlx::query_as(
            "SELECT tenant_id, event_id, status, version, submission_page_enabled,
                    display_page_enabled, welcome_text, display_notice,
                    max_requests_per_guest, active_controller_id, created_at
             FROM events WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| translate(err, "event"))?;
        row.map(LiveEvent::try_from).transpose()
    }

    async fn insert_event(&self, event: LiveEvent) -> StoreResult<LiveEvent> {
        sqlx::query(
            "INSERT INTO events (tenant_id, event_id, status, version,
                 submission_page_enabled, display_page_enabled, welcome_text,
                 display_notice, max_requests_per_guest, active_controller_id,
                 created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&event.tenant_id)
        .bind(&event.event_id)
        .bind(event.status.as_str())
        .bind(event.version)
        .bind(event.config.submission_page_enabled)
        .bind(event.config.display_page_enabled)
        .bind(&event.config.welcome_text)
        .bind(&event.config.display_notice)
        .bind(event.config.max_requests_per_guest.map(|v| v as i32))
        .bind(&event.active_controller_id)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(|err| translate(err, "event"))?;
        Ok(event)
    }

    async fn update_event(
        &self,
        event: LiveEvent,
        expected_version: i64,
    ) -> StoreResult<LiveEvent> {
        // Conditional write: the row is replaced only if nobody else has
        // bumped the version since the caller read it.
        let result = sqlx::query(
            "UPDATE events
             SET event_id = $2, status = $3, version = $4,
                 submission_page_enabled = $5, display_page_enabled = $6,
                 welcome_text = $7, display_notice = $8,
                 max_requests_per_guest = $9, active_controller_id = $10
             WHERE tenant_id = $1 AND version = $11",
        )
        .bind(&event.tenant_id)
        .bind(&event.event_id)
        .bind(event.status.as_str())
        .bind(event.version)
        .bind(event.config.submission_page_enabled)
        .bind(event.config.display_page_enabled)
        .bind(&event.config.welcome_text)
        .bind(&event.config.display_notice)
        .bind(event.config.max_requests_per_guest.map(|v| v as i32))
        .bind(&event.active_controller_id)
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(|err| translate(err, "event"))?;

        if result.rows_affected() == 0 {
            let actual: Option<(i64,)> =
                sqlx::query_as("SELECT version FROM events WHERE tenant_id = $1")
                    .bind(&event.tenant_id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|err| translate(err, "event version"))?;
            return match actual {
                Some((actual,)) => Err(StoreError::VersionConflict {
                    expected: expected_version,
                    actual,
                }),
                None => Err(StoreError::NotFound("event".into())),
            };
        }
        metrics::counter!("setlist_event_writes_total").increment(1);
        Ok(event)
    }

    async fn insert_request(&self, request: SongRequest) -> StoreResult<SongRequest> {
        sqlx::query(
            "INSERT INTO requests (request_id, tenant_id, event_id, status,
                 track_id, title, artist, requester_name, created_at,
                 approved_at, reject_reason)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&request.request_id)
        .bind(&request.tenant_id)
        .bind(&request.event_id)
        .bind(request.status.as_str())
        .bind(&request.track.track_id)
        .bind(&request.track.title)
        .bind(&request.track.artist)
        .bind(&request.requester_name)
        .bind(request.created_at)
        .bind(request.approved_at)
        .bind(&request.reject_reason)
        .execute(&self.pool)
        .await
        .map_err(|err| translate(err, "request"))?;
        Ok(request)
    }

    async fn get_request(&self, tenant_id: &str, request_id: &str) -> StoreResult<SongRequest> {
        let row: DbRequest = sqlx::query_as(
            "SELECT request_id, tenant_id, event_id, status, track_id, title,
                    artist, requester_name, created_at, approved_at, reject_reason
             FROM requests WHERE request_id = $1 AND tenant_id = $2",
        )
        .bind(request_id)
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| translate(err, "request"))?;
        row.try_into()
    }

    async fn list_requests(
        &self,
        tenant_id: &str,
        status: Option<RequestStatus>,
    ) -> StoreResult<Vec<SongRequest>> {
        let rows: Vec<DbRequest> = match status {
            Some(status) => {
                sqlx::query_as(
                    "SELECT request_id, tenant_id, event_id, status, track_id, title,
                            artist, requester_name, created_at, approved_at, reject_reason
                     FROM requests WHERE tenant_id = $1 AND status = $2",
                )
                .bind(tenant_id)
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as(
                    "SELECT request_id, tenant_id, event_id, status, track_id, title,
                            artist, requester_name, created_at, approved_at, reject_reason
                     FROM requests WHERE tenant_id = $1",
                )
                .bind(tenant_id)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|err| translate(err, "requests"))?;
        rows.into_iter().map(SongRequest::try_from).collect()
    }

    async fn transition_request(
        &self,
        tenant_id: &str,
        request_id: &str,
        expected: &[RequestStatus],
        update: StatusUpdate,
    ) -> StoreResult<SongRequest> {
        let expected_raw: Vec<String> =
            expected.iter().map(|s| s.as_str().to_string()).collect();
        let row: Option<DbRequest> = sqlx::query_as(
            "UPDATE requests
             SET status = $3,
                 approved_at = COALESCE($4, approved_at),
                 reject_reason = COALESCE($5, reject_reason)
             WHERE request_id = $1 AND tenant_id = $2 AND status = ANY($6)
             RETURNING request_id, tenant_id, event_id, status, track_id, title,
                       artist, requester_name, created_at, approved_at, reject_reason",
        )
        .bind(request_id)
        .bind(tenant_id)
        .bind(update.status.as_str())
        .bind(update.approved_at)
        .bind(&update.reject_reason)
        .bind(&expected_raw)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| translate(err, "request"))?;

        match row {
            Some(row) => {
                metrics::counter!("setlist_request_transitions_total", "to" => update.status.as_str())
                    .increment(1);
                row.try_into()
            }
            // Distinguish a missing/foreign row from a row that already
            // moved to another status; the tenant filter applies to both.
            None => match self.current_request_status(tenant_id, request_id).await? {
                Some(current) => Err(StoreError::IllegalState { current }),
                None => Err(StoreError::NotFound("request".into())),
            },
        }
    }

    async fn delete_request(&self, tenant_id: &str, request_id: &str) -> StoreResult<()> {
        let result =
            sqlx::query("DELETE FROM requests WHERE request_id = $1 AND tenant_id = $2")
                .bind(request_id)
                .bind(tenant_id)
                .execute(&self.pool)
                .await
                .map_err(|err| translate(err, "request"))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("request".into()));
        }
        Ok(())
    }

    async fn delete_tenant_requests(&self, tenant_id: &str) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM requests WHERE tenant_id = $1")
            .bind(tenant_id)
            .execute(&self.pool)
            .await
            .map_err(|err| translate(err, "requests"))?;
        Ok(result.rows_affected())
    }

    async fn request_stats(&self, tenant_id: &str, event_id: &str) -> StoreResult<QueueStats> {
        let counts: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM requests
             WHERE tenant_id = $1 AND event_id = $2 GROUP BY status",
        )
        .bind(tenant_id)
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| translate(err, "stats"))?;
        let (requesters,): (i64,) = sqlx::query_as(
            "SELECT COUNT(DISTINCT requester_name) FROM requests
             WHERE tenant_id = $1 AND event_id = $2
               AND requester_name IS NOT NULL AND requester_name <> ''",
        )
        .bind(tenant_id)
        .bind(event_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| translate(err, "stats"))?;

        let mut stats = QueueStats {
            distinct_requesters: requesters as u64,
            ..QueueStats::default()
        };
        for (status, count) in counts {
            match RequestStatus::from_str(&status) {
                Ok(RequestStatus::Pending) => stats.pending = count as u64,
                Ok(RequestStatus::Approved) => stats.approved = count as u64,
                Ok(RequestStatus::Rejected) => stats.rejected = count as u64,
                Ok(RequestStatus::Played) => stats.played = count as u64,
                Err(err) => return Err(StoreError::Unexpected(anyhow!(err))),
            }
        }
        Ok(stats)
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|err| translate(err, "health"))?;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
