//! Song-request model and the user-visible queue ordering.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request lifecycle status: pending -> approved/rejected -> played.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Played,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Played => "played",
        }
    }

    /// Group priority in the "all requests" view.
    fn group_rank(self) -> u8 {
        match self {
            RequestStatus::Pending => 0,
            RequestStatus::Approved => 1,
            RequestStatus::Rejected => 2,
            RequestStatus::Played => 3,
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            "played" => Ok(RequestStatus::Played),
            other => Err(format!("unknown request status: {other}")),
        }
    }
}

/// Guest-supplied track identity. Opaque to the engine; forwarded verbatim
/// to the playback collaborator.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
pub struct TrackRef {
    pub track_id: String,
    pub title: String,
    pub artist: Option<String>,
}

/// A single guest-submitted song request.
///
/// `tenant_id` is immutable after creation and must match the authenticated
/// mutator's tenant for every subsequent write.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct SongRequest {
    pub request_id: String,
    pub tenant_id: String,
    pub event_id: String,
    pub status: RequestStatus,
    pub track: TrackRef,
    pub requester_name: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set only on transition to approved; replay assigns a fresh value so a
    /// replayed request re-joins the queue at the current time.
    pub approved_at: Option<DateTime<Utc>>,
    pub reject_reason: Option<String>,
}

/// Sort requests into the user-visible queue order.
///
/// Groups by status (pending > approved > rejected > played); pending
/// oldest-first by `created_at`, approved oldest-first by `approved_at`,
/// rejected and played newest-first by `created_at`.
pub fn queue_sort(requests: &mut [SongRequest]) {
    requests.sort_by(|a, b| {
        a.status
            .group_rank()
            .cmp(&b.status.group_rank())
            .then_with(|| match a.status {
                RequestStatus::Pending => a.created_at.cmp(&b.created_at),
                RequestStatus::Approved => a.approved_at.cmp(&b.approved_at),
                RequestStatus::Rejected | RequestStatus::Played => {
                    b.created_at.cmp(&a.created_at)
                }
            })
            .then_with(|| a.request_id.cmp(&b.request_id))
    });
}
