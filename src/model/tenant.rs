//! Tenant and host-session models.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// An account boundary. Every event, request, and fan-out channel is
/// partitioned by `tenant_id`; no cross-tenant reference is ever valid.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct Tenant {
    pub tenant_id: String,
    pub display_name: String,
    /// Opaque short code guests use to reach the submission and display
    /// pages without learning the tenant id.
    pub public_code: String,
    pub created_at: DateTime<Utc>,
}

/// A host console credential resolved from a bearer token.
///
/// Only the SHA-256 hash of the token is stored. The tenant id carried here
/// is the single source of tenant identity for every host mutation.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HostSession {
    pub token_hash: String,
    pub tenant_id: String,
    pub operator_id: String,
}
