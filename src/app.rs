//! HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared
//! application state injected into handlers.
use crate::api;
use crate::api::openapi::ApiDoc;
use crate::engine::Engine;
use crate::fanout::Fanout;
use crate::store::QueueStore;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

#[derive(Clone)]
pub struct AppState {
    pub api_version: String,
    pub store: Arc<dyn QueueStore>,
    pub engine: Arc<Engine>,
    pub fanout: Arc<Fanout>,
    pub support_token: Option<String>,
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            )
        });

    Router::new()
        .route(
            "/v1/system/info",
            axum::routing::get(api::system::system_info),
        )
        .route(
            "/v1/system/health",
            axum::routing::get(api::system::system_health),
        )
        .route("/v1/host/event", axum::routing::get(api::events::get_event))
        .route(
            "/v1/host/event/status",
            axum::routing::post(api::events::change_status),
        )
        .route(
            "/v1/host/event/config",
            axum::routing::patch(api::events::patch_config),
        )
        .route(
            "/v1/host/requests",
            axum::routing::get(api::requests::list_requests),
        )
        .route(
            "/v1/host/stats",
            axum::routing::get(api::requests::queue_stats),
        )
        .route(
            "/v1/host/requests/:request_id/approve",
            axum::routing::post(api::requests::approve_request),
        )
        .route(
            "/v1/host/requests/:request_id/reject",
            axum::routing::post(api::requests::reject_request),
        )
        .route(
            "/v1/host/requests/:request_id/played",
            axum::routing::post(api::requests::mark_played),
        )
        .route(
            "/v1/host/requests/:request_id/replay",
            axum::routing::post(api::requests::replay_request),
        )
        .route(
            "/v1/host/requests/:request_id",
            axum::routing::delete(api::requests::remove_request),
        )
        .route(
            "/v1/host/stream",
            axum::routing::get(api::events::host_stream),
        )
        .route(
            "/v1/public/:code/event",
            axum::routing::get(api::public::get_event),
        )
        .route(
            "/v1/public/:code/queue",
            axum::routing::get(api::public::get_queue),
        )
        .route(
            "/v1/public/:code/requests",
            axum::routing::post(api::public::submit_request),
        )
        .route(
            "/v1/public/:code/stream",
            axum::routing::get(api::public::public_stream),
        )
        .route(
            "/v1/support/tenants",
            axum::routing::get(api::support::list_tenants).post(api::support::create_tenant),
        )
        .route(
            "/v1/support/tenants/:tenant_id/requests",
            axum::routing::get(api::support::tenant_requests),
        )
        .merge(
            utoipa_swagger_ui::SwaggerUi::new("/docs").url("/v1/openapi.json", ApiDoc::openapi()),
        )
        .layer(trace_layer)
        .with_state(state)
}
