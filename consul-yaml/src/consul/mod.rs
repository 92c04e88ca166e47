//! Consul ACL login.
//!
//! The auth-login layer only needs one call from Consul: exchange an auth
//! method name and a bearer token for an ACL token. [`AclLogin`] is that
//! seam; [`ConsulClient`] implements it over HTTP.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::AuthResult;

mod client;

pub use client::ConsulClient;

/// Body of `POST /v1/acl/login`
#[derive(Debug, Clone, Serialize)]
pub struct AclLoginRequest {
    #[serde(rename = "AuthMethod")]
    pub auth_method: String,

    #[serde(rename = "BearerToken")]
    pub bearer_token: String,

    #[serde(rename = "Meta", skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
}

/// Token issued by a successful ACL login
#[derive(Debug, Clone, Deserialize)]
pub struct AclToken {
    #[serde(rename = "AccessorID", default)]
    pub accessor_id: String,

    #[serde(rename = "SecretID")]
    pub secret_id: String,

    #[serde(rename = "Description", default)]
    pub description: String,

    #[serde(rename = "AuthMethod", default)]
    pub auth_method: String,

    #[serde(rename = "Local", default)]
    pub local: bool,
}

/// Per-request scoping for write endpoints
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub namespace: Option<String>,
    pub partition: Option<String>,
}

/// Performs the Consul ACL login call
#[async_trait]
pub trait AclLogin: Send + Sync {
    /// Exchange a bearer token for an ACL token. A single attempt; callers
    /// decide whether to retry.
    async fn acl_login(
        &self,
        request: &AclLoginRequest,
        options: &WriteOptions,
    ) -> AuthResult<AclToken>;
}
