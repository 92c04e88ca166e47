//! Consul authentication for the consul-yaml provider.
//!
//! The host hands over its provider configuration as a [`HostConfig`];
//! [`auth::get_auth_login`] finds the configured auth-login block and
//! returns a backend whose [`AuthLogin::login`] exchanges credentials for a
//! Consul ACL token.

use percent_encoding::{AsciiSet, CONTROLS};

pub mod auth;
pub mod common;
pub mod consul;
pub mod error;
pub mod provider;

#[cfg(test)]
mod test_support;

pub use auth::{get_auth_login, global_registry, AuthLogin, AuthLoginRegistry};
pub use common::{ConsulConfig, HostConfig, Params};
pub use consul::{AclLogin, ConsulClient};
pub use error::{AuthError, AuthResult};

/// Characters escaped in AWS query-protocol bodies and Consul query strings
pub(crate) const QUERY_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'!')
    .add(b'"')
    .add(b'#')
    .add(b'$')
    .add(b'%')
    .add(b'&')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'*')
    .add(b'+')
    .add(b',')
    .add(b'/')
    .add(b':')
    .add(b';')
    .add(b'=')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b']');
