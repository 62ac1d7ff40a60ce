//! Support surface: tenant provisioning and cross-tenant reads.
//!
//! # Purpose
//! Token-guarded operator tooling. The support token is a deployment-level
//! credential distinct from host tokens; it opens these routes only and is
//! never accepted on the host surface.
use crate::api::error::{api_conflict, api_internal, api_not_found, ApiError};
use crate::api::types::{
    RequestListResponse, TenantCreateRequest, TenantCreatedResponse, TenantListResponse,
};
use crate::app::AppState;
use crate::auth;
use crate::model::{HostSession, Tenant};
use crate::store::StoreError;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;

#[utoipa::path(
    post,
    path = "/v1/support/tenants",
    tag = "support",
    request_body = TenantCreateRequest,
    responses(
        (status = 201, description = "Tenant created with a freshly minted host token", body = TenantCreatedResponse),
        (status = 409, description = "Tenant already exists", body = crate::api::types::ErrorResponse)
    ),
    security(("support_token" = []))
)]
pub(crate) async fn create_tenant(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<TenantCreateRequest>,
) -> Result<(StatusCode, Json<TenantCreatedResponse>), ApiError> {
    auth::require_support(&state, &headers)?;
    let tenant = Tenant {
        tenant_id: body
            .tenant_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        display_name: body.display_name,
        public_code: auth::generate_public_code(),
        created_at: Utc::now(),
    };
    let tenant = match state.store.create_tenant(tenant).await {
        Ok(tenant) => tenant,
        Err(StoreError::Conflict(_)) => {
            return Err(api_conflict("already_exists", "tenant already exists"));
        }
        Err(err) => {
            return Err(api_internal("failed to create tenant", &anyhow::anyhow!(err)));
        }
    };

    let operator_id = body.operator_id.unwrap_or_else(|| "host".to_string());
    let token = auth::generate_token();
    state
        .store
        .insert_host_session(HostSession {
            token_hash: auth::token_hash(&token),
            tenant_id: tenant.tenant_id.clone(),
            operator_id: operator_id.clone(),
        })
        .await
        .map_err(|err| api_internal("failed to mint host session", &anyhow::anyhow!(err)))?;
    tracing::info!(tenant_id = %tenant.tenant_id, "tenant provisioned");

    Ok((
        StatusCode::CREATED,
        Json(TenantCreatedResponse {
            tenant,
            host_token: token,
            operator_id,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/v1/support/tenants",
    tag = "support",
    responses(
        (status = 200, description = "All tenants", body = TenantListResponse)
    ),
    security(("support_token" = []))
)]
pub(crate) async fn list_tenants(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TenantListResponse>, ApiError> {
    auth::require_support(&state, &headers)?;
    let items = state
        .store
        .list_tenants()
        .await
        .map_err(|err| api_internal("failed to list tenants", &anyhow::anyhow!(err)))?;
    Ok(Json(TenantListResponse { items }))
}

#[utoipa::path(
    get,
    path = "/v1/support/tenants/{tenant_id}/requests",
    tag = "support",
    params(("tenant_id" = String, Path, description = "Tenant identifier")),
    responses(
        (status = 200, description = "The tenant's requests in queue order", body = RequestListResponse),
        (status = 404, description = "Unknown tenant", body = crate::api::types::ErrorResponse)
    ),
    security(("support_token" = []))
)]
pub(crate) async fn tenant_requests(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<RequestListResponse>, ApiError> {
    auth::require_support(&state, &headers)?;
    let exists = state
        .store
        .tenant_exists(&tenant_id)
        .await
        .map_err(|err| api_internal("failed to check tenant", &anyhow::anyhow!(err)))?;
    if !exists {
        return Err(api_not_found("tenant not found"));
    }
    let items = state.engine.list_requests(&tenant_id, None).await?;
    let stats = state.engine.queue_stats(&tenant_id).await?;
    Ok(Json(RequestListResponse { items, stats }))
}
