//! Credential resolution for the host and support surfaces.
//!
//! # Purpose
//! The tenant a mutation applies to is never taken from the request payload.
//! Host calls carry a bearer session token whose hash resolves to exactly one
//! tenant; support calls carry the deployment's support token. Public pages
//! resolve tenants through the opaque public code instead and never touch
//! this module's bearer path.
use crate::api::error::{api_forbidden, api_internal, api_unauthorized, api_unavailable, ApiError};
use crate::app::AppState;
use crate::store::StoreError;
use axum::http::HeaderMap;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Resolved host caller: the tenant every subsequent store access is scoped
/// to, plus the operator label stamped on mutations.
#[derive(Debug, Clone)]
pub struct HostIdentity {
    pub tenant_id: String,
    pub operator_id: String,
}

/// Stable hash of a session token; only hashes are stored.
pub fn token_hash(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?;
    let value = value.to_str().ok()?;
    value.strip_prefix("Bearer ")
}

/// Resolve the caller's host session. An unknown token is indistinguishable
/// from a missing one.
pub async fn resolve_host(state: &AppState, headers: &HeaderMap) -> Result<HostIdentity, ApiError> {
    let bearer =
        extract_bearer(headers).ok_or_else(|| api_unauthorized("missing bearer token"))?;
    match state.store.resolve_host_session(&token_hash(bearer)).await {
        Ok(session) => Ok(HostIdentity {
            tenant_id: session.tenant_id,
            operator_id: session.operator_id,
        }),
        Err(StoreError::NotFound(_)) => Err(api_unauthorized("invalid host token")),
        Err(StoreError::Unavailable(reason)) => {
            tracing::warn!(reason, "session lookup unavailable");
            Err(api_unavailable("storage temporarily unavailable"))
        }
        Err(err) => Err(api_internal("session lookup failed", &anyhow::anyhow!(err))),
    }
}

/// Gate for the support surface. A host token is never accepted here and the
/// support token opens no host route.
pub fn require_support(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let bearer =
        extract_bearer(headers).ok_or_else(|| api_unauthorized("missing bearer token"))?;
    match state.support_token.as_deref() {
        Some(expected) if expected == bearer => Ok(()),
        Some(_) => Err(api_forbidden("support token required")),
        None => Err(api_forbidden("support surface disabled")),
    }
}

/// Mint a host session token. Returned in plaintext exactly once.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// Short shareable code printed on venue signage. Opaque, no tenant
/// information embedded.
pub fn generate_public_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_hash_is_stable_and_input_sensitive() {
        assert_eq!(token_hash("abc"), token_hash("abc"));
        assert_ne!(token_hash("abc"), token_hash("abd"));
        assert_eq!(token_hash("abc").len(), 64);
    }

    #[test]
    fn bearer_extraction_requires_scheme() {
        let mut headers = HeaderMap::new();
        assert!(extract_bearer(&headers).is_none());

        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Basic dXNlcg==".parse().expect("header"),
        );
        assert!(extract_bearer(&headers).is_none());

        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Bearer tok-123".parse().expect("header"),
        );
        assert_eq!(extract_bearer(&headers), Some("tok-123"));
    }

    #[test]
    fn generated_credentials_have_expected_shape() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert_ne!(token, generate_token());

        let code = generate_public_code();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
}
