//! Storage abstraction for tenants, events, and requests.
//!
//! # Purpose
//! Defines the `QueueStore` trait implemented by the in-memory and Postgres
//! backends. Every tenant-scoped read and write takes the owning tenant id
//! as a mandatory filter; a row owned by another tenant is indistinguishable
//! from a missing row at this layer.
use crate::model::{
    HostSession, LiveEvent, QueueStats, RequestStatus, SongRequest, Tenant,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    /// Optimistic write lost the race: the event row's version moved on.
    #[error("version conflict: expected {expected}, found {actual}")]
    VersionConflict { expected: i64, actual: i64 },
    /// A request-row CAS found the row in a status outside the expected set.
    #[error("request is {current}")]
    IllegalState { current: RequestStatus },
    /// Transient infrastructure failure; safe to retry with backoff.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Field updates applied atomically with a request status transition.
/// `None` fields are left unchanged.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub status: RequestStatus,
    pub approved_at: Option<DateTime<Utc>>,
    pub reject_reason: Option<String>,
}

#[async_trait]
pub trait QueueStore: Send + Sync {
    // Tenants and credentials.
    async fn create_tenant(&self, tenant: Tenant) -> StoreResult<Tenant>;
    async fn list_tenants(&self) -> StoreResult<Vec<Tenant>>;
    async fn tenant_exists(&self, tenant_id: &str) -> StoreResult<bool>;
    async fn tenant_by_public_code(&self, code: &str) -> StoreResult<Tenant>;
    async fn insert_host_session(&self, session: HostSession) -> StoreResult<()>;
    async fn resolve_host_session(&self, token_hash: &str) -> StoreResult<HostSession>;

    // Events.
    async fn load_event(&self, tenant_id: &str) -> StoreResult<Option<LiveEvent>>;
    async fn insert_event(&self, event: LiveEvent) -> StoreResult<LiveEvent>;
    /// Conditional write: replaces the tenant's event row only if its stored
    /// version equals `expected_version`; fails with `VersionConflict`
    /// otherwise. `event.version` carries the new (incremented) value.
    async fn update_event(
        &self,
        event: LiveEvent,
        expected_version: i64,
    ) -> StoreResult<LiveEvent>;

    // Requests.
    async fn insert_request(&self, request: SongRequest) -> StoreResult<SongRequest>;
    async fn get_request(&self, tenant_id: &str, request_id: &str) -> StoreResult<SongRequest>;
    async fn list_requests(
        &self,
        tenant_id: &str,
        status: Option<RequestStatus>,
    ) -> StoreResult<Vec<SongRequest>>;
    /// Atomic per-row status transition: applies `update` only if the row
    /// belongs to `tenant_id` and its status is in `expected`. Two racing
    /// callers resolve to exactly one winner; the loser observes
    /// `IllegalState` with the already-changed status.
    async fn transition_request(
        &self,
        tenant_id: &str,
        request_id: &str,
        expected: &[RequestStatus],
        update: StatusUpdate,
    ) -> StoreResult<SongRequest>;
    async fn delete_request(&self, tenant_id: &str, request_id: &str) -> StoreResult<()>;
    /// Cascade used when an event transitions into offline. Returns the
    /// number of rows removed.
    async fn delete_tenant_requests(&self, tenant_id: &str) -> StoreResult<u64>;
    async fn request_stats(&self, tenant_id: &str, event_id: &str) -> StoreResult<QueueStats>;

    async fn health_check(&self) -> StoreResult<()>;
    fn is_durable(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}
