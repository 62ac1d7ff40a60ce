//! Request lifecycle: submit, approve, reject, played, replay, remove.
use super::{Engine, EngineError, EngineResult};
use crate::fanout::EventKind;
use crate::model::{queue_sort, QueueStats, RequestStatus, SongRequest, TrackRef};
use crate::store::{StatusUpdate, StoreError};
use chrono::Utc;

/// Map a store CAS miss onto the named lifecycle action.
fn lifecycle_err(action: &'static str) -> impl FnOnce(StoreError) -> EngineError {
    move |err| match err {
        StoreError::IllegalState { current } => {
            EngineError::IllegalRequestState { action, current }
        }
        other => other.into(),
    }
}

impl Engine {
    /// Guest submission. Gated on the event accepting requests (standby or
    /// live AND submission page enabled) and on the per-guest limit when one
    /// is configured.
    pub async fn submit_request(
        &self,
        tenant_id: &str,
        track: TrackRef,
        requester_name: Option<String>,
    ) -> EngineResult<SongRequest> {
        let event = self.get_or_create_event(tenant_id).await?;
        if !event.status.accepts_requests() || !event.config.submission_page_enabled {
            return Err(EngineError::NotAcceptingRequests {
                status: event.status,
            });
        }
        if let (Some(limit), Some(name)) = (
            event.config.max_requests_per_guest,
            requester_name.as_deref().filter(|n| !n.is_empty()),
        ) {
            let submitted = self
                .store
                .list_requests(tenant_id, None)
                .await?
                .iter()
                .filter(|r| r.event_id == event.event_id)
                .filter(|r| r.requester_name.as_deref() == Some(name))
                .count();
            if submitted as u32 >= limit {
                return Err(EngineError::NotAcceptingRequests {
                    status: event.status,
                });
            }
        }

        let request = SongRequest {
            request_id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            event_id: event.event_id.clone(),
            status: RequestStatus::Pending,
            track,
            requester_name,
            created_at: Utc::now(),
            approved_at: None,
            reject_reason: None,
        };
        let request = self.store.insert_request(request).await?;
        tracing::info!(
            tenant_id,
            request_id = %request.request_id,
            track_id = %request.track.track_id,
            "request submitted"
        );

        self.publish(
            tenant_id,
            EventKind::RequestSubmitted,
            Self::payload(&request),
            None,
        )
        .await;
        self.publish_stats(tenant_id, &request.event_id, None).await;
        Ok(request)
    }

    /// Approve a pending request, stamp `approved_at`, and hand the track to
    /// the playback collaborator.
    pub async fn approve_request(
        &self,
        tenant_id: &str,
        request_id: &str,
        play_next: bool,
        operator: Option<&str>,
    ) -> EngineResult<SongRequest> {
        let update = StatusUpdate {
            status: RequestStatus::Approved,
            approved_at: Some(Utc::now()),
            reject_reason: None,
        };
        let request = self
            .store
            .transition_request(tenant_id, request_id, &[RequestStatus::Pending], update)
            .await
            .map_err(lifecycle_err("approve"))?;

        self.playback
            .enqueue(tenant_id, &request.track, play_next)
            .await;
        self.publish(
            tenant_id,
            EventKind::RequestApproved,
            Self::payload(&request),
            operator,
        )
        .await;
        self.publish_stats(tenant_id, &request.event_id, operator).await;
        Ok(request)
    }

    /// Reject a pending request with an optional reason.
    pub async fn reject_request(
        &self,
        tenant_id: &str,
        request_id: &str,
        reason: Option<String>,
        operator: Option<&str>,
    ) -> EngineResult<SongRequest> {
        let update = StatusUpdate {
            status: RequestStatus::Rejected,
            approved_at: None,
            reject_reason: reason,
        };
        let request = self
            .store
            .transition_request(tenant_id, request_id, &[RequestStatus::Pending], update)
            .await
            .map_err(lifecycle_err("reject"))?;

        self.publish(
            tenant_id,
            EventKind::RequestRejected,
            Self::payload(&request),
            operator,
        )
        .await;
        self.publish_stats(tenant_id, &request.event_id, operator).await;
        Ok(request)
    }

    /// Mark an approved request as played.
    pub async fn mark_played(
        &self,
        tenant_id: &str,
        request_id: &str,
        operator: Option<&str>,
    ) -> EngineResult<SongRequest> {
        let update = StatusUpdate {
            status: RequestStatus::Played,
            approved_at: None,
            reject_reason: None,
        };
        let request = self
            .store
            .transition_request(tenant_id, request_id, &[RequestStatus::Approved], update)
            .await
            .map_err(lifecycle_err("mark played"))?;

        self.publish_stats(tenant_id, &request.event_id, operator).await;
        Ok(request)
    }

    /// Re-enter a played or rejected request into the approved queue. A
    /// fresh `approved_at` puts it at the tail of the approved group.
    pub async fn replay_request(
        &self,
        tenant_id: &str,
        request_id: &str,
        play_next: bool,
        operator: Option<&str>,
    ) -> EngineResult<SongRequest> {
        let update = StatusUpdate {
            status: RequestStatus::Approved,
            approved_at: Some(Utc::now()),
            reject_reason: None,
        };
        let request = self
            .store
            .transition_request(
                tenant_id,
                request_id,
                &[RequestStatus::Played, RequestStatus::Rejected],
                update,
            )
            .await
            .map_err(lifecycle_err("replay"))?;

        self.playback
            .enqueue(tenant_id, &request.track, play_next)
            .await;
        self.publish(
            tenant_id,
            EventKind::RequestApproved,
            Self::payload(&request),
            operator,
        )
        .await;
        self.publish_stats(tenant_id, &request.event_id, operator).await;
        Ok(request)
    }

    /// Remove a request outright, regardless of its status.
    pub async fn remove_request(
        &self,
        tenant_id: &str,
        request_id: &str,
        operator: Option<&str>,
    ) -> EngineResult<()> {
        let request = self.store.get_request(tenant_id, request_id).await?;
        self.store.delete_request(tenant_id, request_id).await?;
        tracing::info!(tenant_id, request_id, "request removed");

        self.publish_stats(tenant_id, &request.event_id, operator).await;
        Ok(())
    }

    /// List the tenant's requests in user-visible queue order, optionally
    /// filtered to one status.
    pub async fn list_requests(
        &self,
        tenant_id: &str,
        status: Option<RequestStatus>,
    ) -> EngineResult<Vec<SongRequest>> {
        let mut requests = self.store.list_requests(tenant_id, status).await?;
        queue_sort(&mut requests);
        Ok(requests)
    }

    pub async fn queue_stats(&self, tenant_id: &str) -> EngineResult<QueueStats> {
        let event = self.get_or_create_event(tenant_id).await?;
        Ok(self.store.request_stats(tenant_id, &event.event_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::Fanout;
    use crate::model::{EventConfigPatch, EventStatus};
    use crate::playback::PlaybackControl;
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    struct RecordingPlayback {
        enqueued: Mutex<Vec<(String, bool)>>,
    }

    #[async_trait]
    impl PlaybackControl for RecordingPlayback {
        async fn enqueue(&self, _tenant_id: &str, track: &TrackRef, play_next: bool) {
            self.enqueued
                .lock()
                .await
                .push((track.track_id.clone(), play_next));
        }
    }

    fn engine() -> (Engine, Arc<Fanout>, Arc<RecordingPlayback>) {
        let store = Arc::new(InMemoryStore::new());
        let fanout = Arc::new(Fanout::new(32));
        let playback = Arc::new(RecordingPlayback {
            enqueued: Mutex::new(Vec::new()),
        });
        let engine = Engine::new(store, Arc::clone(&fanout), playback.clone());
        (engine, fanout, playback)
    }

    fn track(id: &str) -> TrackRef {
        TrackRef {
            track_id: id.to_string(),
            title: format!("Title {id}"),
            artist: Some("Artist".to_string()),
        }
    }

    async fn live_engine() -> (Engine, Arc<Fanout>, Arc<RecordingPlayback>) {
        let (engine, fanout, playback) = engine();
        engine
            .transition_event("t1", EventStatus::Live, None, None)
            .await
            .expect("go live");
        (engine, fanout, playback)
    }

    #[tokio::test]
    async fn offline_event_rejects_submissions() {
        let (engine, _, _) = engine();
        let err = engine
            .submit_request("t1", track("s1"), None)
            .await
            .expect_err("offline");
        assert!(matches!(
            err,
            EngineError::NotAcceptingRequests {
                status: EventStatus::Offline
            }
        ));
    }

    #[tokio::test]
    async fn disabled_submission_page_rejects_even_while_live() {
        let (engine, _, _) = live_engine().await;
        engine
            .update_event_config(
                "t1",
                EventConfigPatch {
                    submission_page_enabled: Some(false),
                    ..EventConfigPatch::default()
                },
                None,
                None,
            )
            .await
            .expect("patch");

        let err = engine
            .submit_request("t1", track("s1"), None)
            .await
            .expect_err("page off");
        assert!(matches!(
            err,
            EngineError::NotAcceptingRequests {
                status: EventStatus::Live
            }
        ));
    }

    #[tokio::test]
    async fn guest_limit_is_enforced_per_requester() {
        let (engine, _, _) = live_engine().await;
        engine
            .update_event_config(
                "t1",
                EventConfigPatch {
                    max_requests_per_guest: Some(2),
                    ..EventConfigPatch::default()
                },
                None,
                None,
            )
            .await
            .expect("patch");

        let casey = Some("casey".to_string());
        engine
            .submit_request("t1", track("s1"), casey.clone())
            .await
            .expect("first");
        engine
            .submit_request("t1", track("s2"), casey.clone())
            .await
            .expect("second");
        let err = engine
            .submit_request("t1", track("s3"), casey)
            .await
            .expect_err("limit");
        assert!(matches!(err, EngineError::NotAcceptingRequests { .. }));

        // Other guests (and anonymous submissions) are unaffected.
        engine
            .submit_request("t1", track("s4"), Some("sam".to_string()))
            .await
            .expect("other guest");
        engine
            .submit_request("t1", track("s5"), None)
            .await
            .expect("anonymous");
    }

    #[tokio::test]
    async fn approve_stamps_time_and_enqueues_playback() {
        let (engine, _, playback) = live_engine().await;
        let submitted = engine
            .submit_request("t1", track("s1"), None)
            .await
            .expect("submit");

        let approved = engine
            .approve_request("t1", &submitted.request_id, true, Some("op-1"))
            .await
            .expect("approve");
        assert_eq!(approved.status, RequestStatus::Approved);
        assert!(approved.approved_at.is_some());
        assert_eq!(
            playback.enqueued.lock().await.as_slice(),
            &[("s1".to_string(), true)]
        );
    }

    #[tokio::test]
    async fn lifecycle_actions_reject_wrong_source_status() {
        let (engine, _, _) = live_engine().await;
        let submitted = engine
            .submit_request("t1", track("s1"), None)
            .await
            .expect("submit");
        let id = submitted.request_id.clone();

        // played requires approved
        let err = engine
            .mark_played("t1", &id, None)
            .await
            .expect_err("pending cannot be played");
        assert!(matches!(
            err,
            EngineError::IllegalRequestState {
                action: "mark played",
                current: RequestStatus::Pending
            }
        ));

        engine.approve_request("t1", &id, false, None).await.expect("approve");

        // approve requires pending
        let err = engine
            .approve_request("t1", &id, false, None)
            .await
            .expect_err("double approve");
        assert!(matches!(
            err,
            EngineError::IllegalRequestState {
                action: "approve",
                current: RequestStatus::Approved
            }
        ));

        // replay requires played or rejected
        let err = engine
            .replay_request("t1", &id, false, None)
            .await
            .expect_err("replay approved");
        assert!(matches!(
            err,
            EngineError::IllegalRequestState { action: "replay", .. }
        ));
    }

    #[tokio::test]
    async fn replay_assigns_fresh_approved_at() {
        let (engine, _, _) = live_engine().await;
        let submitted = engine
            .submit_request("t1", track("s1"), None)
            .await
            .expect("submit");
        let id = submitted.request_id.clone();

        let approved = engine
            .approve_request("t1", &id, false, None)
            .await
            .expect("approve");
        engine.mark_played("t1", &id, None).await.expect("played");

        let replayed = engine
            .replay_request("t1", &id, false, None)
            .await
            .expect("replay");
        assert_eq!(replayed.status, RequestStatus::Approved);
        assert!(replayed.approved_at.expect("fresh") >= approved.approved_at.expect("orig"));
    }

    #[tokio::test]
    async fn submit_publishes_request_then_stats_on_owning_channel_only() {
        let (engine, fanout, _) = live_engine().await;
        let mut rx = fanout.subscribe("t1").await;
        let mut other = fanout.subscribe("t2").await;

        engine
            .submit_request("t1", track("s1"), Some("casey".to_string()))
            .await
            .expect("submit");

        let first = rx.recv().await.expect("submitted");
        assert_eq!(first.event_type, EventKind::RequestSubmitted);
        let second = rx.recv().await.expect("stats");
        assert_eq!(second.event_type, EventKind::StatsChanged);
        assert_eq!(second.payload["pending"], 1);
        assert!(rx.try_recv().is_err());
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn remove_publishes_stats_and_unknown_id_is_not_found() {
        let (engine, fanout, _) = live_engine().await;
        let submitted = engine
            .submit_request("t1", track("s1"), None)
            .await
            .expect("submit");

        let mut rx = fanout.subscribe("t1").await;
        engine
            .remove_request("t1", &submitted.request_id, Some("op-1"))
            .await
            .expect("remove");
        let push = rx.recv().await.expect("stats");
        assert_eq!(push.event_type, EventKind::StatsChanged);
        assert_eq!(push.payload["pending"], 0);

        let err = engine
            .remove_request("t1", &submitted.request_id, None)
            .await
            .expect_err("gone");
        assert!(matches!(err, EngineError::NotFound));
    }

    #[tokio::test]
    async fn foreign_tenant_mutations_read_as_not_found() {
        let (engine, _, _) = live_engine().await;
        let submitted = engine
            .submit_request("t1", track("s1"), None)
            .await
            .expect("submit");

        let err = engine
            .approve_request("t2", &submitted.request_id, false, None)
            .await
            .expect_err("foreign");
        assert!(matches!(err, EngineError::NotFound));
    }

    #[tokio::test]
    async fn list_returns_queue_order_and_respects_filter() {
        let (engine, _, _) = live_engine().await;
        let a = engine.submit_request("t1", track("a"), None).await.expect("a");
        let b = engine.submit_request("t1", track("b"), None).await.expect("b");
        let c = engine.submit_request("t1", track("c"), None).await.expect("c");
        engine.approve_request("t1", &a.request_id, false, None).await.expect("approve a");
        engine
            .reject_request("t1", &b.request_id, Some("wrong vibe".to_string()), None)
            .await
            .expect("reject b");

        let all = engine.list_requests("t1", None).await.expect("list");
        let order: Vec<_> = all.iter().map(|r| r.request_id.as_str()).collect();
        assert_eq!(
            order,
            [c.request_id.as_str(), a.request_id.as_str(), b.request_id.as_str()]
        );

        let pending = engine
            .list_requests("t1", Some(RequestStatus::Pending))
            .await
            .expect("pending");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].request_id, c.request_id);
    }

    #[tokio::test]
    async fn offline_transition_clears_queue_and_stats() {
        let (engine, _, _) = live_engine().await;
        engine.submit_request("t1", track("a"), None).await.expect("a");
        engine.submit_request("t1", track("b"), None).await.expect("b");

        engine
            .transition_event("t1", EventStatus::Offline, None, None)
            .await
            .expect("offline");

        assert!(engine.list_requests("t1", None).await.expect("list").is_empty());
        let stats = engine.queue_stats("t1").await.expect("stats");
        assert_eq!(stats, QueueStats::default());
    }
}
