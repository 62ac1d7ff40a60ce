//! OpenAPI schema aggregation for the setlist API.
//!
//! # Purpose
//! Collects all routes and schema types into a single OpenAPI document for
//! docs and client generation.
use crate::api::{
    events, public, requests, support, system,
    types::{
        ApproveRequestBody, ConfigPatchRequest, ErrorResponse, HealthStatus, PublicEventView,
        PublicQueueEntry, PublicQueueResponse, RejectRequestBody, RequestListResponse,
        StatusChangeRequest, SubmitRequestBody, SystemInfo, TenantCreateRequest,
        TenantCreatedResponse, TenantListResponse,
    },
};
use crate::model::{
    EventConfig, EventConfigPatch, EventStatus, LiveEvent, QueueStats, RequestStatus, SongRequest,
    Tenant, TrackRef,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

struct BearerSchemes;

impl Modify for BearerSchemes {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let bearer = SecurityScheme::Http(
                HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build(),
            );
            components.add_security_scheme("host_token", bearer.clone());
            components.add_security_scheme("support_token", bearer);
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "setlist",
        version = "v1",
        description = "Live song-request queue HTTP API"
    ),
    paths(
        system::system_info,
        system::system_health,
        events::get_event,
        events::change_status,
        events::patch_config,
        events::host_stream,
        requests::list_requests,
        requests::queue_stats,
        requests::approve_request,
        requests::reject_request,
        requests::mark_played,
        requests::replay_request,
        requests::remove_request,
        public::get_event,
        public::get_queue,
        public::submit_request,
        public::public_stream,
        support::create_tenant,
        support::list_tenants,
        support::tenant_requests
    ),
    components(schemas(
        ErrorResponse,
        SystemInfo,
        HealthStatus,
        EventStatus,
        EventConfig,
        EventConfigPatch,
        LiveEvent,
        RequestStatus,
        TrackRef,
        SongRequest,
        QueueStats,
        StatusChangeRequest,
        ConfigPatchRequest,
        SubmitRequestBody,
        ApproveRequestBody,
        RejectRequestBody,
        RequestListResponse,
        PublicEventView,
        PublicQueueEntry,
        PublicQueueResponse,
        Tenant,
        TenantCreateRequest,
        TenantCreatedResponse,
        TenantListResponse
    )),
    modifiers(&BearerSchemes)
)]
pub struct ApiDoc;
