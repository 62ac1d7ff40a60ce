//! HTTP API request/response types.
//!
//! # Purpose
//! Defines shared payload shapes for the setlist REST API and OpenAPI schema
//! generation.
use crate::model::{EventStatus, QueueStats, SongRequest, Tenant, TrackRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub request_id: Option<String>,
    /// Machine-readable context for errors that carry it, e.g. the current
    /// status and allowed targets of a rejected transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct SystemInfo {
    pub api_version: String,
    pub storage_backend: String,
    pub durable: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct HealthStatus {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct StatusChangeRequest {
    pub status: EventStatus,
    /// Optional optimistic guard: the mutation fails with
    /// `concurrent_modification` if the event version has moved on.
    pub expected_version: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default)]
pub struct ConfigPatchRequest {
    pub expected_version: Option<i64>,
    pub submission_page_enabled: Option<bool>,
    pub display_page_enabled: Option<bool>,
    pub welcome_text: Option<String>,
    pub display_notice: Option<String>,
    pub max_requests_per_guest: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct SubmitRequestBody {
    pub track_id: String,
    pub title: String,
    pub artist: Option<String>,
    pub requester_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default)]
pub struct ApproveRequestBody {
    #[serde(default)]
    pub play_next: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default)]
pub struct RejectRequestBody {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RequestListResponse {
    pub items: Vec<SongRequest>,
    pub stats: QueueStats,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TenantListResponse {
    pub items: Vec<Tenant>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct TenantCreateRequest {
    /// Stable id; generated when omitted.
    pub tenant_id: Option<String>,
    pub display_name: String,
    /// Operator label stamped on the minted host session.
    pub operator_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TenantCreatedResponse {
    pub tenant: Tenant,
    /// Plaintext host session token; shown exactly once, only a hash is
    /// stored.
    pub host_token: String,
    pub operator_id: String,
}

/// Event fields safe for the unauthenticated display and submission pages.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PublicEventView {
    pub display_name: String,
    pub status: EventStatus,
    pub submission_page_enabled: bool,
    pub display_page_enabled: bool,
    pub welcome_text: Option<String>,
    pub display_notice: Option<String>,
    pub max_requests_per_guest: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PublicQueueEntry {
    pub request_id: String,
    pub track: TrackRef,
    pub requester_name: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PublicQueueResponse {
    pub items: Vec<PublicQueueEntry>,
}

impl From<SongRequest> for PublicQueueEntry {
    fn from(request: SongRequest) -> Self {
        Self {
            request_id: request.request_id,
            track: request.track,
            requester_name: request.requester_name,
            approved_at: request.approved_at,
        }
    }
}
