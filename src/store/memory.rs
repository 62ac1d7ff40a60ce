//! In-memory implementation of the queue store.
//!
//! # Purpose
//! Implements `QueueStore` entirely in memory using `HashMap`s guarded by
//! `tokio::sync::RwLock`. It exists for:
//! - local development and tests (no external dependencies)
//! - deployments where durability is not required
//!
//! # Consistency
//! - **Not durable**: all state is lost on process restart.
//! - **Single-process consistency**: mutations take the write lock for the
//!   map they touch, so the version CAS on events and the status CAS on
//!   requests are atomic within one process, matching the conditional-write
//!   contract the Postgres backend gets from the database.
use super::{QueueStore, StatusUpdate, StoreError, StoreResult};
use crate::model::{
    HostSession, LiveEvent, QueueStats, RequestStatus, SongRequest, Tenant,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory queue store.
///
/// Maps are wrapped in `Arc<RwLock<...>>` so the store can be cloned and
/// shared across async request handlers; reads proceed concurrently while
/// writes are serialized per map.
pub struct InMemoryStore {
    /// Tenants keyed by `tenant_id`.
    tenants: Arc<RwLock<HashMap<String, Tenant>>>,
    /// Host sessions keyed by token hash.
    sessions: Arc<RwLock<HashMap<String, HostSession>>>,
    /// Current event per tenant, keyed by `tenant_id`.
    events: Arc<RwLock<HashMap<String, LiveEvent>>>,
    /// Requests keyed by `request_id`; every access filters by tenant.
    requests: Arc<RwLock<HashMap<String, SongRequest>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tenants: Arc::new(RwLock::new(HashMap::new())),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            events: Arc::new(RwLock::new(HashMap::new())),
            requests: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueStore for InMemoryStore {
    async fn create_tenant(&self, tenant: Tenant) -> StoreResult<Tenant> {
        let mut tenants = self.tenants.write().await;
        if tenants.contains_key(&tenant.tenant_id) {
            return Err(StoreError::Conflict("tenant exists".into()));
        }
        if tenants
            .values()
            .any(|t| t.public_code == tenant.public_code)
        {
            return Err(StoreError::Conflict("public code exists".into()));
        }
        tenants.insert(tenant.tenant_id.clone(), tenant.clone());
        metrics::gauge!("setlist_tenants_total").set(tenants.len() as f64);
        Ok(tenant)
    }

    async fn list_tenants(&self) -> StoreResult<Vec<Tenant>> {
        Ok(self.tenants.read().await.values().cloned().collect())
    }

    async fn tenant_exists(&self, tenant_id: &str) -> StoreResult<bool> {
        Ok(self.tenants.read().await.contains_key(tenant_id))
    }

    async fn tenant_by_public_code(&self, code: &str) -> StoreResult<Tenant> {
        self.tenants
            .read()
            .await
            .values()
            .find(|t| t.public_code == code)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("tenant".into()))
    }

    async fn insert_host_session(&self, session: HostSession) -> StoreResult<()> {
        self.sessions
            .write()
            .await
            .insert(session.token_hash.clone(), session);
        Ok(())
    }

    async fn resolve_host_session(&self, token_hash: &str) -> StoreResult<HostSession> {
        self.sessions
            .read()
            .await
            .get(token_hash)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("host session".into()))
    }

    async fn load_event(&self, tenant_id: &str) -> StoreResult<Option<LiveEvent>> {
        Ok(self.events.read().await.get(tenant_id).cloned())
    }

    async fn insert_event(&self, event: LiveEvent) -> StoreResult<LiveEvent> {
        let mut events = self.events.write().await;
        if events.contains_key(&event.tenant_id) {
            return Err(StoreError::Conflict("event exists".into()));
        }
        events.insert(event.tenant_id.clone(), event.clone());
        Ok(event)
    }

    async fn update_event(
        &self,
        event: LiveEvent,
        expected_version: i64,
    ) -> StoreResult<LiveEvent> {
        // The CAS and the replacement happen under one write lock, which is
        // what gives this backend the conditional-write atomicity the
        // Postgres backend gets from `WHERE version = $n`.
        let mut events = self.events.write().await;
        let current = events
            .get(&event.tenant_id)
            .ok_or_else(|| StoreError::NotFound("event".into()))?;
        if current.version != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                actual: current.version,
            });
        }
        events.insert(event.tenant_id.clone(), event.clone());
        metrics::counter!("setlist_event_writes_total").increment(1);
        Ok(event)
    }

    async fn insert_request(&self, request: SongRequest) -> StoreResult<SongRequest> {
        let mut requests = self.requests.write().await;
        if requests.contains_key(&request.request_id) {
            return Err(StoreError::Conflict("request exists".into()));
        }
        requests.insert(request.request_id.clone(), request.clone());
        metrics::gauge!("setlist_requests_total").set(requests.len() as f64);
        Ok(request)
    }

    async fn get_request(&self, tenant_id: &str, request_id: &str) -> StoreResult<SongRequest> {
        self.requests
            .read()
            .await
            .get(request_id)
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("request".into()))
    }

    async fn list_requests(
        &self,
        tenant_id: &str,
        status: Option<RequestStatus>,
    ) -> StoreResult<Vec<SongRequest>> {
        Ok(self
            .requests
            .read()
            .await
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect())
    }

    async fn transition_request(
        &self,
        tenant_id: &str,
        request_id: &str,
        expected: &[RequestStatus],
        update: StatusUpdate,
    ) -> StoreResult<SongRequest> {
        let mut requests = self.requests.write().await;
        let request = requests
            .get_mut(request_id)
            .filter(|r| r.tenant_id == tenant_id)
            .ok_or_else(|| StoreError::NotFound("request".into()))?;
        if !expected.contains(&request.status) {
            return Err(StoreError::IllegalState {
                current: request.status,
            });
        }
        request.status = update.status;
        if let Some(at) = update.approved_at {
            request.approved_at = Some(at);
        }
        if let Some(reason) = update.reject_reason {
            request.reject_reason = Some(reason);
        }
        metrics::counter!("setlist_request_transitions_total", "to" => update.status.as_str())
            .increment(1);
        Ok(request.clone())
    }

    async fn delete_request(&self, tenant_id: &str, request_id: &str) -> StoreResult<()> {
        let mut requests = self.requests.write().await;
        let owned = requests
            .get(request_id)
            .map_or(false, |r| r.tenant_id == tenant_id);
        if !owned {
            return Err(StoreError::NotFound("request".into()));
        }
        requests.remove(request_id);
        metrics::gauge!("setlist_requests_total").set(requests.len() as f64);
        Ok(())
    }

    async fn delete_tenant_requests(&self, tenant_id: &str) -> StoreResult<u64> {
        let mut requests = self.requests.write().await;
        let before = requests.len();
        requests.retain(|_, r| r.tenant_id != tenant_id);
        let deleted = (before - requests.len()) as u64;
        metrics::gauge!("setlist_requests_total").set(requests.len() as f64);
        Ok(deleted)
    }

    async fn request_stats(&self, tenant_id: &str, event_id: &str) -> StoreResult<QueueStats> {
        let requests = self.requests.read().await;
        let mut stats = QueueStats::default();
        let mut requesters = HashSet::new();
        for request in requests
            .values()
            .filter(|r| r.tenant_id == tenant_id && r.event_id == event_id)
        {
            match request.status {
                RequestStatus::Pending => stats.pending += 1,
                RequestStatus::Approved => stats.approved += 1,
                RequestStatus::Rejected => stats.rejected += 1,
                RequestStatus::Played => stats.played += 1,
            }
            if let Some(name) = request.requester_name.as_deref() {
                if !name.is_empty() {
                    requesters.insert(name.to_string());
                }
            }
        }
        stats.distinct_requesters = requesters.len() as u64;
        Ok(stats)
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrackRef;
    use chrono::Utc;

    fn store() -> InMemoryStore {
        InMemoryStore::new()
    }

    fn tenant(id: &str, code: &str) -> Tenant {
        Tenant {
            tenant_id: id.to_string(),
            display_name: format!("Tenant {id}"),
            public_code: code.to_string(),
            created_at: Utc::now(),
        }
    }

    fn pending_request(id: &str, tenant_id: &str) -> SongRequest {
        SongRequest {
            request_id: id.to_string(),
            tenant_id: tenant_id.to_string(),
            event_id: "e1".to_string(),
            status: RequestStatus::Pending,
            track: TrackRef {
                track_id: format!("track-{id}"),
                title: format!("Title {id}"),
                artist: None,
            },
            requester_name: Some("casey".to_string()),
            created_at: Utc::now(),
            approved_at: None,
            reject_reason: None,
        }
    }

    #[tokio::test]
    async fn tenant_conflicts_on_id_and_public_code() {
        let store = store();
        store.create_tenant(tenant("t1", "abc123")).await.expect("tenant");

        let err = store.create_tenant(tenant("t1", "zzz999")).await.expect_err("dup id");
        assert!(matches!(err, StoreError::Conflict(_)));

        let err = store.create_tenant(tenant("t2", "abc123")).await.expect_err("dup code");
        assert!(matches!(err, StoreError::Conflict(_)));

        let found = store.tenant_by_public_code("abc123").await.expect("by code");
        assert_eq!(found.tenant_id, "t1");
    }

    #[tokio::test]
    async fn event_version_cas_rejects_stale_writers() {
        let store = store();
        let event = LiveEvent::new_offline("t1");
        store.insert_event(event.clone()).await.expect("insert");

        let mut first = event.clone();
        first.version = 1;
        store.update_event(first, 0).await.expect("first write");

        let mut stale = event.clone();
        stale.version = 1;
        let err = store.update_event(stale, 0).await.expect_err("stale");
        assert!(matches!(
            err,
            StoreError::VersionConflict { expected: 0, actual: 1 }
        ));
    }

    #[tokio::test]
    async fn request_reads_are_tenant_scoped() {
        let store = store();
        store
            .insert_request(pending_request("r1", "t1"))
            .await
            .expect("insert");

        // A request owned by another tenant looks exactly like a missing id.
        let err = store.get_request("t2", "r1").await.expect_err("foreign");
        assert!(matches!(err, StoreError::NotFound(_)));
        let err = store.get_request("t2", "missing").await.expect_err("missing");
        assert!(matches!(err, StoreError::NotFound(_)));

        store.get_request("t1", "r1").await.expect("owned");
    }

    #[tokio::test]
    async fn transition_cas_yields_one_winner() {
        let store = Arc::new(store());
        store
            .insert_request(pending_request("r1", "t1"))
            .await
            .expect("insert");

        let approve = StatusUpdate {
            status: RequestStatus::Approved,
            approved_at: Some(Utc::now()),
            reject_reason: None,
        };
        let reject = StatusUpdate {
            status: RequestStatus::Rejected,
            approved_at: None,
            reject_reason: Some("duplicate".to_string()),
        };

        let a = {
            let store = Arc::clone(&store);
            let update = approve.clone();
            tokio::spawn(async move {
                store
                    .transition_request("t1", "r1", &[RequestStatus::Pending], update)
                    .await
            })
        };
        let b = {
            let store = Arc::clone(&store);
            let update = reject.clone();
            tokio::spawn(async move {
                store
                    .transition_request("t1", "r1", &[RequestStatus::Pending], update)
                    .await
            })
        };

        let results = [a.await.expect("join"), b.await.expect("join")];
        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        let loser = results
            .iter()
            .find(|r| r.is_err())
            .and_then(|r| r.as_ref().err());
        assert!(matches!(loser, Some(StoreError::IllegalState { current })
            if *current != RequestStatus::Pending));
    }

    #[tokio::test]
    async fn cascade_delete_spares_other_tenants() {
        let store = store();
        store.insert_request(pending_request("r1", "t1")).await.expect("r1");
        store.insert_request(pending_request("r2", "t1")).await.expect("r2");
        store.insert_request(pending_request("r3", "t2")).await.expect("r3");

        let deleted = store.delete_tenant_requests("t1").await.expect("cascade");
        assert_eq!(deleted, 2);
        assert!(store.list_requests("t1", None).await.expect("t1").is_empty());
        assert_eq!(store.list_requests("t2", None).await.expect("t2").len(), 1);
    }

    #[tokio::test]
    async fn stats_count_by_status_and_distinct_requesters() {
        let store = store();
        let mut r1 = pending_request("r1", "t1");
        r1.requester_name = Some("alex".to_string());
        let mut r2 = pending_request("r2", "t1");
        r2.requester_name = Some("alex".to_string());
        let mut r3 = pending_request("r3", "t1");
        r3.status = RequestStatus::Approved;
        r3.requester_name = Some("sam".to_string());
        for r in [r1, r2, r3] {
            store.insert_request(r).await.expect("insert");
        }

        let stats = store.request_stats("t1", "e1").await.expect("stats");
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.approved, 1);
        assert_eq!(stats.distinct_requesters, 2);
    }

    #[tokio::test]
    async fn backend_health_and_identity() {
        let store = store();
        store.health_check().await.expect("health");
        assert!(!store.is_durable());
        assert_eq!(store.backend_name(), "memory");
    }
}
