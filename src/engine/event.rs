//! Event state machine and configuration mutations.
use super::{Engine, EngineError, EngineResult};
use crate::fanout::EventKind;
use crate::model::{EventConfigPatch, EventStatus, LiveEvent};
use crate::store::StoreError;

impl Engine {
    /// Load the tenant's current event, creating the default offline event on
    /// first access. The insert race between two first readers resolves by
    /// reloading the winner's row.
    pub async fn get_or_create_event(&self, tenant_id: &str) -> EngineResult<LiveEvent> {
        if let Some(event) = self.store.load_event(tenant_id).await? {
            return Ok(event);
        }
        match self.store.insert_event(LiveEvent::new_offline(tenant_id)).await {
            Ok(event) => Ok(event),
            Err(StoreError::Conflict(_)) => self
                .store
                .load_event(tenant_id)
                .await?
                .ok_or(EngineError::NotFound),
            Err(err) => Err(err.into()),
        }
    }

    /// Transition the tenant's event to `target`.
    ///
    /// Identity transitions are rejected. When `expected_version` is given,
    /// the write fails fast if the caller's view is stale; the store-level
    /// version CAS closes the remaining race either way. A transition into
    /// offline cascades: every request row for the tenant is deleted and a
    /// `queue-cleanup` push precedes the `state-changed` push.
    pub async fn transition_event(
        &self,
        tenant_id: &str,
        target: EventStatus,
        expected_version: Option<i64>,
        operator: Option<&str>,
    ) -> EngineResult<LiveEvent> {
        let current = self.get_or_create_event(tenant_id).await?;
        if let Some(expected) = expected_version {
            if expected != current.version {
                return Err(EngineError::ConcurrentModification);
            }
        }
        if target == current.status {
            return Err(EngineError::InvalidTransition {
                current: current.status,
                requested: target,
                allowed: current.status.legal_targets(),
            });
        }

        let mut next = current.clone();
        next.status = target;
        next.version = current.version + 1;
        next.active_controller_id = operator.map(str::to_string);
        let updated = self.store.update_event(next, current.version).await?;
        tracing::info!(
            tenant_id,
            from = current.status.as_str(),
            to = target.as_str(),
            version = updated.version,
            "event transitioned"
        );
        metrics::counter!("setlist_event_transitions_total", "to" => target.as_str())
            .increment(1);

        if target == EventStatus::Offline {
            let removed = self.store.delete_tenant_requests(tenant_id).await?;
            self.publish(
                tenant_id,
                EventKind::QueueCleanup,
                serde_json::json!({ "removed": removed }),
                operator,
            )
            .await;
        }
        self.publish(
            tenant_id,
            EventKind::StateChanged,
            Self::payload(&updated),
            operator,
        )
        .await;
        Ok(updated)
    }

    /// Apply a partial config update. An empty patch is a no-op and does not
    /// bump the version or publish.
    pub async fn update_event_config(
        &self,
        tenant_id: &str,
        patch: EventConfigPatch,
        expected_version: Option<i64>,
        operator: Option<&str>,
    ) -> EngineResult<LiveEvent> {
        let current = self.get_or_create_event(tenant_id).await?;
        if patch.is_empty() {
            return Ok(current);
        }
        if let Some(expected) = expected_version {
            if expected != current.version {
                return Err(EngineError::ConcurrentModification);
            }
        }

        let mut next = current.clone();
        next.config = patch.apply(&current.config);
        next.version = current.version + 1;
        next.active_controller_id = operator.map(str::to_string);
        let updated = self.store.update_event(next, current.version).await?;
        tracing::info!(tenant_id, version = updated.version, "event config updated");

        self.publish(
            tenant_id,
            EventKind::PageControlChanged,
            Self::payload(&updated),
            operator,
        )
        .await;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::Fanout;
    use crate::playback::LogOnlyPlayback;
    use crate::store::memory::InMemoryStore;
    use std::sync::Arc;

    fn engine() -> (Engine, Arc<Fanout>) {
        let store = Arc::new(InMemoryStore::new());
        let fanout = Arc::new(Fanout::new(16));
        let engine = Engine::new(store, Arc::clone(&fanout), Arc::new(LogOnlyPlayback));
        (engine, fanout)
    }

    #[tokio::test]
    async fn first_access_creates_offline_event() {
        let (engine, _) = engine();
        let event = engine.get_or_create_event("t1").await.expect("event");
        assert_eq!(event.status, EventStatus::Offline);
        assert_eq!(event.version, 0);
        assert!(event.config.submission_page_enabled);

        // Second access returns the same event, not a new one.
        let again = engine.get_or_create_event("t1").await.expect("event");
        assert_eq!(again.event_id, event.event_id);
    }

    #[tokio::test]
    async fn every_non_identity_transition_is_legal() {
        let (engine, _) = engine();
        engine.get_or_create_event("t1").await.expect("event");

        let path = [
            EventStatus::Standby,
            EventStatus::Live,
            EventStatus::Standby,
            EventStatus::Offline,
            EventStatus::Live,
            EventStatus::Offline,
        ];
        let mut version = 0;
        for target in path {
            let event = engine
                .transition_event("t1", target, None, None)
                .await
                .expect("transition");
            assert_eq!(event.status, target);
            version += 1;
            assert_eq!(event.version, version);
        }
    }

    #[tokio::test]
    async fn identity_transition_is_rejected_with_alternatives() {
        let (engine, _) = engine();
        engine.get_or_create_event("t1").await.expect("event");

        let err = engine
            .transition_event("t1", EventStatus::Offline, None, None)
            .await
            .expect_err("identity");
        match err {
            EngineError::InvalidTransition {
                current,
                requested,
                allowed,
            } => {
                assert_eq!(current, EventStatus::Offline);
                assert_eq!(requested, EventStatus::Offline);
                assert_eq!(allowed, vec![EventStatus::Standby, EventStatus::Live]);
            }
            other => panic!("unexpected error: {other}"),
        }

        // Rejected transitions leave the version untouched.
        let event = engine.get_or_create_event("t1").await.expect("event");
        assert_eq!(event.version, 0);
    }

    #[tokio::test]
    async fn stale_expected_version_is_rejected() {
        let (engine, _) = engine();
        engine.get_or_create_event("t1").await.expect("event");
        engine
            .transition_event("t1", EventStatus::Live, Some(0), None)
            .await
            .expect("first");

        let err = engine
            .transition_event("t1", EventStatus::Standby, Some(0), None)
            .await
            .expect_err("stale");
        assert!(matches!(err, EngineError::ConcurrentModification));
    }

    #[tokio::test]
    async fn offline_transition_publishes_cleanup_before_state_change() {
        let (engine, fanout) = engine();
        engine
            .transition_event("t1", EventStatus::Live, None, None)
            .await
            .expect("go live");

        let mut rx = fanout.subscribe("t1").await;
        engine
            .transition_event("t1", EventStatus::Offline, None, Some("op-1"))
            .await
            .expect("offline");

        let first = rx.recv().await.expect("cleanup");
        assert_eq!(first.event_type, EventKind::QueueCleanup);
        let second = rx.recv().await.expect("state");
        assert_eq!(second.event_type, EventKind::StateChanged);
        assert_eq!(second.emitting_actor.as_deref(), Some("op-1"));
    }

    #[tokio::test]
    async fn empty_config_patch_is_a_no_op() {
        let (engine, fanout) = engine();
        engine.get_or_create_event("t1").await.expect("event");
        let mut rx = fanout.subscribe("t1").await;

        let event = engine
            .update_event_config("t1", EventConfigPatch::default(), None, None)
            .await
            .expect("noop");
        assert_eq!(event.version, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn config_patch_bumps_version_and_publishes() {
        let (engine, fanout) = engine();
        engine.get_or_create_event("t1").await.expect("event");
        let mut rx = fanout.subscribe("t1").await;

        let patch = EventConfigPatch {
            submission_page_enabled: Some(false),
            welcome_text: Some("Requests open at 9".to_string()),
            ..EventConfigPatch::default()
        };
        let event = engine
            .update_event_config("t1", patch, Some(0), Some("op-1"))
            .await
            .expect("patch");
        assert_eq!(event.version, 1);
        assert!(!event.config.submission_page_enabled);
        assert!(event.config.display_page_enabled);
        assert_eq!(event.active_controller_id.as_deref(), Some("op-1"));

        let push = rx.recv().await.expect("push");
        assert_eq!(push.event_type, EventKind::PageControlChanged);
    }
}
