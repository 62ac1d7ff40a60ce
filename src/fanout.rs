//! Tenant-scoped publish/subscribe fan-out.
//!
//! # Purpose
//! After any successful event or request mutation, the engine publishes one
//! typed envelope on the owning tenant's channel so every open screen (host
//! console, public display, submission page) can update without polling.
//!
//! # Isolation
//! Channel names are derived deterministically and exclusively from the
//! tenant id; no channel is ever shared across tenants. Subscribers only
//! ever receive envelopes published on the channel they subscribed to.
//!
//! # Delivery semantics
//! Fire-and-forget. Publish failures (including "no subscribers yet") are
//! logged and swallowed; the mutation that triggered the publish has already
//! committed and must not fail or roll back. Screens that miss a push fall
//! back to polling the plain read endpoints.
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

/// Typed fan-out event kinds, one per mutation family.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    StateChanged,
    PageControlChanged,
    RequestSubmitted,
    RequestApproved,
    RequestRejected,
    StatsChanged,
    QueueCleanup,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::StateChanged => "state-changed",
            EventKind::PageControlChanged => "page-control-changed",
            EventKind::RequestSubmitted => "request-submitted",
            EventKind::RequestApproved => "request-approved",
            EventKind::RequestRejected => "request-rejected",
            EventKind::StatsChanged => "stats-changed",
            EventKind::QueueCleanup => "queue-cleanup",
        }
    }
}

/// Message envelope delivered to subscribers.
///
/// Subscribers apply the payload as the new source of truth for the fields
/// it contains; a `stats-changed` payload replaces cached stats wholesale.
#[derive(Debug, Serialize, Clone)]
pub struct Envelope {
    pub channel: String,
    pub event_type: EventKind,
    pub payload: Value,
    /// Operator identity of the mutating host session, when one exists.
    /// Stripped before delivery on public (unauthenticated) streams.
    pub emitting_actor: Option<String>,
}

impl Envelope {
    /// Copy safe for unauthenticated display/submission screens.
    pub fn into_public(mut self) -> Envelope {
        self.emitting_actor = None;
        self
    }
}

/// Deterministic channel name for a tenant. The only function allowed to
/// construct channel names.
pub fn channel_name(tenant_id: &str) -> String {
    format!("setlist.tenant.{tenant_id}")
}

/// In-process fan-out over per-tenant broadcast channels.
pub struct Fanout {
    capacity: usize,
    channels: RwLock<HashMap<String, broadcast::Sender<Envelope>>>,
}

impl Fanout {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            channels: RwLock::new(HashMap::new()),
        }
    }

    async fn sender(&self, tenant_id: &str) -> broadcast::Sender<Envelope> {
        if let Some(sender) = self.channels.read().await.get(tenant_id) {
            return sender.clone();
        }
        let mut channels = self.channels.write().await;
        channels
            .entry(tenant_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Subscribe to a tenant's channel. Slow subscribers that overflow the
    /// channel capacity observe a lag error and should re-sync via the read
    /// endpoints.
    pub async fn subscribe(&self, tenant_id: &str) -> broadcast::Receiver<Envelope> {
        self.sender(tenant_id).await.subscribe()
    }

    /// Publish an envelope on the tenant's channel. Never fails: delivery
    /// problems are logged and counted, not propagated.
    pub async fn publish(
        &self,
        tenant_id: &str,
        event_type: EventKind,
        payload: Value,
        emitting_actor: Option<String>,
    ) {
        let envelope = Envelope {
            channel: channel_name(tenant_id),
            event_type,
            payload,
            emitting_actor,
        };
        let sender = self.sender(tenant_id).await;
        match sender.send(envelope) {
            Ok(receivers) => {
                metrics::counter!("setlist_fanout_published_total", "type" => event_type.as_str())
                    .increment(1);
                tracing::debug!(tenant_id, event = event_type.as_str(), receivers, "published");
            }
            Err(_) => {
                // No live subscribers; the push is an optimization, not a
                // delivery guarantee.
                metrics::counter!("setlist_fanout_dropped_total", "type" => event_type.as_str())
                    .increment(1);
                tracing::debug!(tenant_id, event = event_type.as_str(), "no subscribers");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn channel_names_are_deterministic_and_distinct() {
        assert_eq!(channel_name("t1"), channel_name("t1"));
        assert_ne!(channel_name("t1"), channel_name("t2"));
    }

    #[test]
    fn event_kinds_serialize_kebab_case() {
        let value = serde_json::to_value(EventKind::PageControlChanged).expect("json");
        assert_eq!(value, json!("page-control-changed"));
        assert_eq!(EventKind::QueueCleanup.as_str(), "queue-cleanup");
    }

    #[tokio::test]
    async fn publish_reaches_only_the_owning_tenants_channel() {
        let fanout = Fanout::new(16);
        let mut rx_a = fanout.subscribe("tenant-a").await;
        let mut rx_b = fanout.subscribe("tenant-b").await;

        fanout
            .publish("tenant-a", EventKind::RequestApproved, json!({"id": "r1"}), None)
            .await;

        let envelope = rx_a.recv().await.expect("tenant-a envelope");
        assert_eq!(envelope.event_type, EventKind::RequestApproved);
        assert_eq!(envelope.channel, channel_name("tenant-a"));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_swallowed() {
        let fanout = Fanout::new(16);
        // Must not panic or error.
        fanout
            .publish("lonely", EventKind::StatsChanged, json!({}), None)
            .await;
    }

    #[tokio::test]
    async fn public_copy_strips_actor() {
        let fanout = Fanout::new(16);
        let mut rx = fanout.subscribe("t1").await;
        fanout
            .publish(
                "t1",
                EventKind::StateChanged,
                json!({}),
                Some("operator-1".to_string()),
            )
            .await;
        let envelope = rx.recv().await.expect("envelope");
        assert_eq!(envelope.emitting_actor.as_deref(), Some("operator-1"));
        assert!(envelope.into_public().emitting_actor.is_none());
    }
}
