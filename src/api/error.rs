//! API error types and helpers.
//!
//! # Purpose
//! Centralizes HTTP error response construction so every endpoint returns
//! the same `{code, message, request_id, details?}` shape, and maps engine
//! errors onto the HTTP taxonomy in exactly one place.
use crate::api::types::ErrorResponse;
use crate::engine::EngineError;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

/// Structured API error returned by handlers.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn build(status: StatusCode, code: &str, message: &str) -> ApiError {
    ApiError {
        status,
        body: ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
            request_id: None,
            details: None,
        },
    }
}

pub fn api_not_found(message: &str) -> ApiError {
    build(StatusCode::NOT_FOUND, "not_found", message)
}

/// 404 with a `not_enabled` code, used for pages the host has switched off
/// without revealing more than a missing resource would.
pub fn api_not_enabled(message: &str) -> ApiError {
    build(StatusCode::NOT_FOUND, "not_enabled", message)
}

/// 409 with a caller-provided conflict code for precise client handling.
pub fn api_conflict(code: &str, message: &str) -> ApiError {
    build(StatusCode::CONFLICT, code, message)
}

pub fn api_unauthorized(message: &str) -> ApiError {
    build(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

pub fn api_forbidden(message: &str) -> ApiError {
    build(StatusCode::FORBIDDEN, "forbidden", message)
}

pub fn api_validation_error(message: &str) -> ApiError {
    build(StatusCode::BAD_REQUEST, "validation_error", message)
}

pub fn api_unavailable(message: &str) -> ApiError {
    build(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", message)
}

/// Internal details are logged server-side; clients get a generic message.
pub fn api_internal(message: &str, err: &anyhow::Error) -> ApiError {
    tracing::error!(error = ?err, "setlist internal error");
    build(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidTransition {
                current,
                requested,
                allowed,
            } => {
                let mut api = api_conflict(
                    "invalid_transition",
                    &format!("cannot transition from {current} to {requested}"),
                );
                api.body.details = Some(serde_json::json!({
                    "current": current,
                    "requested": requested,
                    "allowed": allowed,
                }));
                api
            }
            EngineError::NotFound => api_not_found("resource not found"),
            EngineError::NotAcceptingRequests { status } => {
                let mut api = api_conflict(
                    "not_accepting_requests",
                    "event is not accepting requests",
                );
                api.body.details = Some(serde_json::json!({ "status": status }));
                api
            }
            EngineError::IllegalRequestState { action, current } => {
                let mut api = api_conflict(
                    "invalid_transition",
                    &format!("cannot {action} a request that is {current}"),
                );
                api.body.details = Some(serde_json::json!({ "current": current }));
                api
            }
            EngineError::ConcurrentModification => api_conflict(
                "concurrent_modification",
                "record changed underneath the request, re-read and retry",
            ),
            EngineError::Unavailable(reason) => {
                tracing::warn!(reason, "store unavailable");
                api_unavailable("storage temporarily unavailable")
            }
            EngineError::Internal(err) => api_internal("internal error", &err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EventStatus, RequestStatus};

    #[test]
    fn helpers_build_expected_codes() {
        let not_found = api_not_found("missing");
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);
        assert_eq!(not_found.body.code, "not_found");

        let conflict = api_conflict("concurrent_modification", "stale");
        assert_eq!(conflict.status, StatusCode::CONFLICT);
        assert_eq!(conflict.body.code, "concurrent_modification");

        let unavailable = api_unavailable("down");
        assert_eq!(unavailable.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(unavailable.body.code, "store_unavailable");

        let unauthorized = api_unauthorized("nope");
        assert_eq!(unauthorized.status, StatusCode::UNAUTHORIZED);

        let forbidden = api_forbidden("nope");
        assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

        let validation = api_validation_error("bad");
        assert_eq!(validation.status, StatusCode::BAD_REQUEST);
        assert_eq!(validation.body.code, "validation_error");
    }

    #[test]
    fn invalid_transition_carries_allowed_targets() {
        let err = EngineError::InvalidTransition {
            current: EventStatus::Live,
            requested: EventStatus::Live,
            allowed: EventStatus::Live.legal_targets(),
        };
        let api = ApiError::from(err);
        assert_eq!(api.status, StatusCode::CONFLICT);
        assert_eq!(api.body.code, "invalid_transition");
        let details = api.body.details.expect("details");
        assert_eq!(details["current"], "live");
        assert_eq!(details["allowed"], serde_json::json!(["offline", "standby"]));
    }

    #[test]
    fn lifecycle_state_errors_map_to_conflict() {
        let err = EngineError::IllegalRequestState {
            action: "approve",
            current: RequestStatus::Played,
        };
        let api = ApiError::from(err);
        assert_eq!(api.status, StatusCode::CONFLICT);
        assert_eq!(api.body.code, "invalid_transition");
        assert_eq!(api.body.details.expect("details")["current"], "played");
    }

    #[test]
    fn not_found_and_unavailable_map_to_their_statuses() {
        assert_eq!(
            ApiError::from(EngineError::NotFound).status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(EngineError::Unavailable("pool timeout".into())).status,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
