//! Host event endpoints: read, status transitions, config, live stream.
//!
//! # Purpose
//! Every handler here resolves the caller's tenant from the bearer host
//! token first; no tenant id is ever read from the payload or path.
use crate::api::error::ApiError;
use crate::api::types::{ConfigPatchRequest, StatusChangeRequest};
use crate::app::AppState;
use crate::auth;
use crate::model::{EventConfigPatch, LiveEvent};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use std::convert::Infallible;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

#[utoipa::path(
    get,
    path = "/v1/host/event",
    tag = "host",
    responses(
        (status = 200, description = "Current event, created offline on first access", body = LiveEvent),
        (status = 401, description = "Missing or invalid host token", body = crate::api::types::ErrorResponse)
    ),
    security(("host_token" = []))
)]
pub(crate) async fn get_event(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<LiveEvent>, ApiError> {
    let identity = auth::resolve_host(&state, &headers).await?;
    let event = state.engine.get_or_create_event(&identity.tenant_id).await?;
    Ok(Json(event))
}

#[utoipa::path(
    post,
    path = "/v1/host/event/status",
    tag = "host",
    request_body = StatusChangeRequest,
    responses(
        (status = 200, description = "Event transitioned", body = LiveEvent),
        (status = 409, description = "Invalid transition or stale version", body = crate::api::types::ErrorResponse)
    ),
    security(("host_token" = []))
)]
pub(crate) async fn change_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<StatusChangeRequest>,
) -> Result<Json<LiveEvent>, ApiError> {
    let identity = auth::resolve_host(&state, &headers).await?;
    let event = state
        .engine
        .transition_event(
            &identity.tenant_id,
            body.status,
            body.expected_version,
            Some(&identity.operator_id),
        )
        .await?;
    Ok(Json(event))
}

#[utoipa::path(
    patch,
    path = "/v1/host/event/config",
    tag = "host",
    request_body = ConfigPatchRequest,
    responses(
        (status = 200, description = "Config updated", body = LiveEvent),
        (status = 409, description = "Stale version", body = crate::api::types::ErrorResponse)
    ),
    security(("host_token" = []))
)]
pub(crate) async fn patch_config(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ConfigPatchRequest>,
) -> Result<Json<LiveEvent>, ApiError> {
    let identity = auth::resolve_host(&state, &headers).await?;
    let patch = EventConfigPatch {
        submission_page_enabled: body.submission_page_enabled,
        display_page_enabled: body.display_page_enabled,
        welcome_text: body.welcome_text,
        display_notice: body.display_notice,
        max_requests_per_guest: body.max_requests_per_guest,
    };
    let event = state
        .engine
        .update_event_config(
            &identity.tenant_id,
            patch,
            body.expected_version,
            Some(&identity.operator_id),
        )
        .await?;
    Ok(Json(event))
}

#[utoipa::path(
    get,
    path = "/v1/host/stream",
    tag = "host",
    responses(
        (status = 200, description = "SSE stream of the tenant's fan-out envelopes"),
        (status = 401, description = "Missing or invalid host token", body = crate::api::types::ErrorResponse)
    ),
    security(("host_token" = []))
)]
pub(crate) async fn host_stream(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let identity = auth::resolve_host(&state, &headers).await?;
    let rx = state.fanout.subscribe(&identity.tenant_id).await;
    let stream = BroadcastStream::new(rx).filter_map(|item| match item {
        Ok(envelope) => {
            match Event::default()
                .event(envelope.event_type.as_str())
                .json_data(&envelope)
            {
                Ok(event) => Some(Ok(event)),
                Err(err) => {
                    tracing::warn!(error = %err, "encode sse envelope");
                    None
                }
            }
        }
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            // The subscriber fell behind; it re-syncs via the read endpoints.
            tracing::warn!(skipped, "sse subscriber lagged");
            None
        }
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
