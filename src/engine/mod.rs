//! Domain engine: event state machine, request lifecycle, and fan-out.
//!
//! # Purpose
//! The engine owns every mutation rule. HTTP handlers resolve the caller's
//! tenant and delegate here; backends only provide conditional writes. The
//! order of effects in every mutating operation is fixed: validate, persist,
//! then publish. A fan-out publish failure never rolls the mutation back.
use crate::fanout::{EventKind, Fanout};
use crate::model::{EventStatus, RequestStatus};
use crate::playback::PlaybackControl;
use crate::store::{QueueStore, StoreError};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

mod event;
mod requests;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Target equals the current status, or the record moved underneath the
    /// caller into a status the action does not accept.
    #[error("cannot transition from {current} to {requested}")]
    InvalidTransition {
        current: EventStatus,
        requested: EventStatus,
        allowed: Vec<EventStatus>,
    },
    #[error("not found")]
    NotFound,
    /// Submission gate closed: event offline or submission page disabled.
    #[error("event is not accepting requests (status: {status})")]
    NotAcceptingRequests { status: EventStatus },
    /// Request-lifecycle action applied to a request outside its accepted
    /// source statuses.
    #[error("cannot {action} a request that is {current}")]
    IllegalRequestState {
        action: &'static str,
        current: RequestStatus,
    },
    /// Optimistic write lost; the caller should re-read and retry.
    #[error("concurrent modification")]
    ConcurrentModification,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => EngineError::NotFound,
            StoreError::VersionConflict { .. } => EngineError::ConcurrentModification,
            // Callers that can name the action map IllegalState themselves;
            // this fallback covers everything else.
            StoreError::IllegalState { .. } | StoreError::Conflict(_) => {
                EngineError::ConcurrentModification
            }
            StoreError::Unavailable(reason) => EngineError::Unavailable(reason),
            StoreError::Unexpected(err) => EngineError::Internal(err),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

pub struct Engine {
    store: Arc<dyn QueueStore>,
    fanout: Arc<Fanout>,
    playback: Arc<dyn PlaybackControl>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn QueueStore>,
        fanout: Arc<Fanout>,
        playback: Arc<dyn PlaybackControl>,
    ) -> Self {
        Self {
            store,
            fanout,
            playback,
        }
    }

    fn payload<T: Serialize>(value: &T) -> Value {
        serde_json::to_value(value).unwrap_or_else(|err| {
            tracing::error!(error = %err, "serialize fan-out payload");
            Value::Null
        })
    }

    async fn publish(
        &self,
        tenant_id: &str,
        kind: EventKind,
        payload: Value,
        operator: Option<&str>,
    ) {
        self.fanout
            .publish(tenant_id, kind, payload, operator.map(str::to_string))
            .await;
    }

    /// Secondary push after any mutation that changes queue counts.
    async fn publish_stats(&self, tenant_id: &str, event_id: &str, operator: Option<&str>) {
        match self.store.request_stats(tenant_id, event_id).await {
            Ok(stats) => {
                self.publish(tenant_id, EventKind::StatsChanged, Self::payload(&stats), operator)
                    .await;
            }
            Err(err) => {
                tracing::warn!(tenant_id, error = %err, "stats refresh after mutation failed");
            }
        }
    }
}
