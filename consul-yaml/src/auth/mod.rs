//! Pluggable Consul auth-login backends.
//!
//! Each backend owns one top-level config field (for example
//! `auth_login_aws`) and registers a constructor and schema factory in an
//! [`AuthLoginRegistry`]. The host configures at most one of those fields;
//! [`get_auth_login`] finds it and returns the initialized backend.

use async_trait::async_trait;
use tracing::debug;

use crate::common::{HostConfig, Params, SchemaMap};
use crate::consul::AclLogin;
use crate::error::AuthResult;

pub mod aws;
pub mod common;
pub mod registry;
pub mod schema;

pub use aws::AuthLoginAws;
pub use common::{AuthDefault, AuthLoginCommon};
pub use registry::{global_registry, AuthLoginDescriptor, AuthLoginRegistry};

/// A way of obtaining a Consul ACL token
#[async_trait]
pub trait AuthLogin: Send + Sync + std::fmt::Debug {
    /// Read and validate this backend's block from the host config. Fails
    /// when called a second time.
    fn init(&mut self, config: &HostConfig) -> AuthResult<()>;

    /// Name of the Consul auth method to log in with
    fn auth_method_name(&self) -> AuthResult<&str>;

    /// Exchange this backend's credentials for a Consul ACL secret token
    async fn login(&self, client: &dyn AclLogin) -> AuthResult<String>;

    fn common(&self) -> &AuthLoginCommon;

    fn namespace(&self) -> AuthResult<Option<&str>> {
        self.common().validate()?;
        Ok(self.common().namespace())
    }

    fn partition(&self) -> AuthResult<Option<&str>> {
        self.common().validate()?;
        Ok(self.common().partition())
    }

    fn params(&self) -> AuthResult<&Params> {
        self.common().validate()?;
        Ok(self.common().params())
    }
}

/// Initialized backend for the auth-login field set in `config`, or `None`
/// when no auth-login block is configured
pub fn get_auth_login(
    registry: &AuthLoginRegistry,
    config: &HostConfig,
) -> AuthResult<Option<Box<dyn AuthLogin>>> {
    let mut fields = registry.fields();
    fields.sort();

    for field in fields {
        if !config.is_set(&field) {
            continue;
        }
        debug!("Found auth login block {}", field);
        let auth_login = registry.get(&field)?.auth_login(config)?;
        return Ok(Some(auth_login));
    }

    Ok(None)
}

/// Add every registered backend's block to a provider schema.
///
/// # Panics
///
/// Panics if `schema` already has one of the auth-login fields.
pub fn must_add_auth_login_schema(registry: &AuthLoginRegistry, schema: &mut SchemaMap) {
    let mut descriptors = registry.values();
    descriptors.sort_by(|a, b| a.field().cmp(b.field()));

    for descriptor in descriptors {
        if schema.contains_key(descriptor.field()) {
            panic!("schema already has field {:?}", descriptor.field());
        }
        schema.insert(descriptor.field().to_string(), descriptor.schema(registry));
    }
}
