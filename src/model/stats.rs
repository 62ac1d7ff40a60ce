//! Derived queue statistics.
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Counts of requests by status plus distinct requesters, scoped to the
/// tenant's current event. Never persisted; computed on demand and pushed
/// wholesale on `stats-changed` envelopes.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
    pub played: u64,
    /// Distinct non-empty requester names among the event's requests.
    pub distinct_requesters: u64,
}
