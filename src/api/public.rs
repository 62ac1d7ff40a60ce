//! Public (unauthenticated) endpoints, resolved by opaque public code.
//!
//! # Purpose
//! Serves the guest submission page and the venue display. The public code
//! is the only tenant selector accepted here; an unknown code reads exactly
//! like a missing resource.
use crate::api::error::{
    api_internal, api_not_enabled, api_not_found, api_unavailable, api_validation_error, ApiError,
};
use crate::api::types::{
    PublicEventView, PublicQueueResponse, SubmitRequestBody,
};
use crate::app::AppState;
use crate::model::{RequestStatus, SongRequest, Tenant, TrackRef};
use crate::store::StoreError;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use std::convert::Infallible;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

async fn resolve_code(state: &AppState, code: &str) -> Result<Tenant, ApiError> {
    match state.store.tenant_by_public_code(code).await {
        Ok(tenant) => Ok(tenant),
        Err(StoreError::NotFound(_)) => Err(api_not_found("unknown code")),
        Err(StoreError::Unavailable(reason)) => {
            tracing::warn!(reason, "public code lookup unavailable");
            Err(api_unavailable("storage temporarily unavailable"))
        }
        Err(err) => Err(api_internal("code lookup failed", &anyhow::anyhow!(err))),
    }
}

#[utoipa::path(
    get,
    path = "/v1/public/{code}/event",
    tag = "public",
    params(("code" = String, Path, description = "Tenant public code")),
    responses(
        (status = 200, description = "Public event view", body = PublicEventView),
        (status = 404, description = "Unknown code", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn get_event(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<PublicEventView>, ApiError> {
    let tenant = resolve_code(&state, &code).await?;
    let event = state.engine.get_or_create_event(&tenant.tenant_id).await?;
    Ok(Json(PublicEventView {
        display_name: tenant.display_name,
        status: event.status,
        submission_page_enabled: event.config.submission_page_enabled,
        display_page_enabled: event.config.display_page_enabled,
        welcome_text: event.config.welcome_text,
        display_notice: event.config.display_notice,
        max_requests_per_guest: event.config.max_requests_per_guest,
    }))
}

#[utoipa::path(
    get,
    path = "/v1/public/{code}/queue",
    tag = "public",
    params(("code" = String, Path, description = "Tenant public code")),
    responses(
        (status = 200, description = "Approved queue for the display page", body = PublicQueueResponse),
        (status = 404, description = "Unknown code or display page disabled", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn get_queue(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<PublicQueueResponse>, ApiError> {
    let tenant = resolve_code(&state, &code).await?;
    let event = state.engine.get_or_create_event(&tenant.tenant_id).await?;
    if !event.config.display_page_enabled {
        return Err(api_not_enabled("display page is disabled"));
    }
    let items = state
        .engine
        .list_requests(&tenant.tenant_id, Some(RequestStatus::Approved))
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(PublicQueueResponse { items }))
}

#[utoipa::path(
    post,
    path = "/v1/public/{code}/requests",
    tag = "public",
    params(("code" = String, Path, description = "Tenant public code")),
    request_body = SubmitRequestBody,
    responses(
        (status = 201, description = "Request submitted", body = SongRequest),
        (status = 409, description = "Event is not accepting requests", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn submit_request(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<SubmitRequestBody>,
) -> Result<(StatusCode, Json<SongRequest>), ApiError> {
    if body.track_id.trim().is_empty() {
        return Err(api_validation_error("track_id must not be empty"));
    }
    if body.title.trim().is_empty() {
        return Err(api_validation_error("title must not be empty"));
    }
    let tenant = resolve_code(&state, &code).await?;
    let track = TrackRef {
        track_id: body.track_id,
        title: body.title,
        artist: body.artist,
    };
    let request = state
        .engine
        .submit_request(&tenant.tenant_id, track, body.requester_name)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

#[utoipa::path(
    get,
    path = "/v1/public/{code}/stream",
    tag = "public",
    params(("code" = String, Path, description = "Tenant public code")),
    responses(
        (status = 200, description = "SSE stream with operator identity stripped"),
        (status = 404, description = "Unknown code", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn public_stream(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let tenant = resolve_code(&state, &code).await?;
    let rx = state.fanout.subscribe(&tenant.tenant_id).await;
    let stream = BroadcastStream::new(rx).filter_map(|item| match item {
        Ok(envelope) => {
            let envelope = envelope.into_public();
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
            tracing::warn!(skipped, "sse subscriber lagged");
            None
        }
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
