//! Host request-queue endpoints: listing, stats, and lifecycle actions.
use crate::api::error::{api_validation_error, ApiError};
use crate::api::types::{ApproveRequestBody, RejectRequestBody, RequestListResponse};
use crate::app::AppState;
use crate::auth;
use crate::model::{QueueStats, RequestStatus, SongRequest};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    status: Option<String>,
}

#[utoipa::path(
    get,
    path = "/v1/host/requests",
    tag = "host",
    params(
        ("status" = Option<String>, Query, description = "Filter to one request status")
    ),
    responses(
        (status = 200, description = "Requests in queue order plus current stats", body = RequestListResponse),
        (status = 400, description = "Unknown status filter", body = crate::api::types::ErrorResponse)
    ),
    security(("host_token" = []))
)]
pub(crate) async fn list_requests(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<RequestListResponse>, ApiError> {
    let identity = auth::resolve_host(&state, &headers).await?;
    let status = query
        .status
        .as_deref()
        .map(str::parse::<RequestStatus>)
        .transpose()
        .map_err(|err| api_validation_error(&err))?;
    let items = state.engine.list_requests(&identity.tenant_id, status).await?;
    let stats = state.engine.queue_stats(&identity.tenant_id).await?;
    Ok(Json(RequestListResponse { items, stats }))
}

#[utoipa::path(
    get,
    path = "/v1/host/stats",
    tag = "host",
    responses(
        (status = 200, description = "Per-status counts and distinct requesters", body = QueueStats)
    ),
    security(("host_token" = []))
)]
pub(crate) async fn queue_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<QueueStats>, ApiError> {
    let identity = auth::resolve_host(&state, &headers).await?;
    let stats = state.engine.queue_stats(&identity.tenant_id).await?;
    Ok(Json(stats))
}

#[utoipa::path(
    post,
    path = "/v1/host/requests/{request_id}/approve",
    tag = "host",
    params(("request_id" = String, Path, description = "Request identifier")),
    request_body = ApproveRequestBody,
    responses(
        (status = 200, description = "Request approved", body = SongRequest),
        (status = 404, description = "Unknown request", body = crate::api::types::ErrorResponse),
        (status = 409, description = "Request is not pending", body = crate::api::types::ErrorResponse)
    ),
    security(("host_token" = []))
)]
pub(crate) async fn approve_request(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    headers: HeaderMap,
    body: Option<Json<ApproveRequestBody>>,
) -> Result<Json<SongRequest>, ApiError> {
    let identity = auth::resolve_host(&state, &headers).await?;
    let play_next = body.map(|Json(b)| b.play_next).unwrap_or_default();
    let request = state
        .engine
        .approve_request(
            &identity.tenant_id,
            &request_id,
            play_next,
            Some(&identity.operator_id),
        )
        .await?;
    Ok(Json(request))
}

#[utoipa::path(
    post,
    path = "/v1/host/requests/{request_id}/reject",
    tag = "host",
    params(("request_id" = String, Path, description = "Request identifier")),
    request_body = RejectRequestBody,
    responses(
        (status = 200, description = "Request rejected", body = SongRequest),
        (status = 409, description = "Request is not pending", body = crate::api::types::ErrorResponse)
    ),
    security(("host_token" = []))
)]
pub(crate) async fn reject_request(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    headers: HeaderMap,
    body: Option<Json<RejectRequestBody>>,
) -> Result<Json<SongRequest>, ApiError> {
    let identity = auth::resolve_host(&state, &headers).await?;
    let reason = body.and_then(|Json(b)| b.reason);
    let request = state
        .engine
        .reject_request(
            &identity.tenant_id,
            &request_id,
            reason,
            Some(&identity.operator_id),
        )
        .await?;
    Ok(Json(request))
}

#[utoipa::path(
    post,
    path = "/v1/host/requests/{request_id}/played",
    tag = "host",
    params(("request_id" = String, Path, description = "Request identifier")),
    responses(
        (status = 200, description = "Request marked played", body = SongRequest),
        (status = 409, description = "Request is not approved", body = crate::api::types::ErrorResponse)
    ),
    security(("host_token" = []))
)]
pub(crate) async fn mark_played(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<SongRequest>, ApiError> {
    let identity = auth::resolve_host(&state, &headers).await?;
    let request = state
        .engine
        .mark_played(&identity.tenant_id, &request_id, Some(&identity.operator_id))
        .await?;
    Ok(Json(request))
}

#[utoipa::path(
    post,
    path = "/v1/host/requests/{request_id}/replay",
    tag = "host",
    params(("request_id" = String, Path, description = "Request identifier")),
    request_body = ApproveRequestBody,
    responses(
        (status = 200, description = "Request re-entered the approved queue", body = SongRequest),
        (status = 409, description = "Request is not played or rejected", body = crate::api::types::ErrorResponse)
    ),
    security(("host_token" = []))
)]
pub(crate) async fn replay_request(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    headers: HeaderMap,
    body: Option<Json<ApproveRequestBody>>,
) -> Result<Json<SongRequest>, ApiError> {
    let identity = auth::resolve_host(&state, &headers).await?;
    let play_next = body.map(|Json(b)| b.play_next).unwrap_or_default();
    let request = state
        .engine
        .replay_request(
            &identity.tenant_id,
            &request_id,
            play_next,
            Some(&identity.operator_id),
        )
        .await?;
    Ok(Json(request))
}

#[utoipa::path(
    delete,
    path = "/v1/host/requests/{request_id}",
    tag = "host",
    params(("request_id" = String, Path, description = "Request identifier")),
    responses(
        (status = 204, description = "Request removed"),
        (status = 404, description = "Unknown request", body = crate::api::types::ErrorResponse)
    ),
    security(("host_token" = []))
)]
pub(crate) async fn remove_request(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let identity = auth::resolve_host(&state, &headers).await?;
    state
        .engine
        .remove_request(&identity.tenant_id, &request_id, Some(&identity.operator_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
