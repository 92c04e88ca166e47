use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::env;

use super::params::{env_or, is_zero};
use crate::error::AuthResult;

/// Configuration tree supplied by the host for one provider configuration.
///
/// Lookups use dotted paths where numeric segments index into lists, so
/// `auth_login_aws.0.aws_region` reads a field of the single element of the
/// `auth_login_aws` block.
#[derive(Debug, Clone, Default)]
pub struct HostConfig {
    root: Value,
}

impl HostConfig {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    pub fn from_yaml_str(yaml: &str) -> AuthResult<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        Ok(Self::new(serde_json::to_value(value)?))
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Value at `path`, if present
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('.').try_fold(&self.root, |node, segment| match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    /// Value at `path` when it is set to something other than its zero value
    pub fn get_ok(&self, path: &str) -> Option<&Value> {
        self.get(path).filter(|v| !is_zero(v))
    }

    pub fn is_set(&self, path: &str) -> bool {
        self.get_ok(path).is_some()
    }
}

/// Connection settings for the Consul HTTP API.
///
/// Empty or zero values fall back to the same defaults as absent ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsulConfig {
    /// Consul agent address (host:port)
    #[serde(default = "default_address", deserialize_with = "address_or_default")]
    pub address: String,

    /// URI scheme, http or https
    #[serde(default = "default_scheme", deserialize_with = "scheme_or_default")]
    pub scheme: String,

    /// Request timeout in seconds
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "request_timeout_or_default"
    )]
    pub request_timeout: u64,
}

impl ConsulConfig {
    pub fn base_url(&self) -> String {
        if self.address.contains("://") {
            self.address.trim_end_matches('/').to_string()
        } else {
            format!("{}://{}", self.scheme, self.address.trim_end_matches('/'))
        }
    }
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            scheme: default_scheme(),
            request_timeout: default_request_timeout(),
        }
    }
}

fn default_address() -> String {
    env_or(&["CONSUL_HTTP_ADDR"], "127.0.0.1:8500")
}

fn default_scheme() -> String {
    match env::var("CONSUL_HTTP_SSL") {
        Ok(v) if v.eq_ignore_ascii_case("true") || v == "1" => "https".to_string(),
        _ => "http".to_string(),
    }
}

fn default_request_timeout() -> u64 {
    30
}

fn address_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let address = Option::<String>::deserialize(deserializer)?;
    Ok(address.filter(|a| !a.is_empty()).unwrap_or_else(default_address))
}

fn scheme_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let scheme = Option::<String>::deserialize(deserializer)?;
    Ok(scheme.filter(|s| !s.is_empty()).unwrap_or_else(default_scheme))
}

fn request_timeout_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let timeout = Option::<u64>::deserialize(deserializer)?;
    Ok(timeout.filter(|t| *t > 0).unwrap_or_else(default_request_timeout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;

    #[test]
    fn test_get_paths() {
        let config = HostConfig::new(json!({
            "auth_login_aws": [{"auth_method": "aws-auth", "aws_region": ""}]
        }));

        assert_eq!(
            config.get("auth_login_aws.0.auth_method"),
            Some(&json!("aws-auth"))
        );
        assert_eq!(config.get("auth_login_aws.0.aws_region"), Some(&json!("")));
        assert!(config.get_ok("auth_login_aws.0.aws_region").is_none());
        assert!(config.get("auth_login_aws.1.auth_method").is_none());
        assert!(config.get("auth_login_aws.x").is_none());
        assert!(config.is_set("auth_login_aws"));
    }

    #[test]
    fn test_from_yaml() {
        let config = HostConfig::from_yaml_str(
            "auth_login_aws:\n  - auth_method: aws-auth\n    meta:\n      team: platform\n",
        )
        .unwrap();

        assert_eq!(
            config.get("auth_login_aws.0.meta.team"),
            Some(&json!("platform"))
        );
    }

    #[test]
    #[serial]
    fn test_consul_config_defaults() {
        env::remove_var("CONSUL_HTTP_ADDR");
        env::remove_var("CONSUL_HTTP_SSL");

        let config: ConsulConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config.base_url(), "http://127.0.0.1:8500");
        assert_eq!(config.request_timeout, 30);

        env::set_var("CONSUL_HTTP_ADDR", "consul.service:8501");
        env::set_var("CONSUL_HTTP_SSL", "true");
        let config = ConsulConfig::default();
        assert_eq!(config.base_url(), "https://consul.service:8501");

        env::remove_var("CONSUL_HTTP_ADDR");
        env::remove_var("CONSUL_HTTP_SSL");
    }

    #[test]
    #[serial]
    fn test_consul_config_zero_values_use_defaults() {
        env::remove_var("CONSUL_HTTP_ADDR");
        env::remove_var("CONSUL_HTTP_SSL");

        let config: ConsulConfig =
            serde_json::from_value(json!({"address": "", "scheme": "", "request_timeout": 0}))
                .unwrap();
        assert_eq!(config.address, "127.0.0.1:8500");
        assert_eq!(config.scheme, "http");
        assert_eq!(config.request_timeout, 30);

        let config: ConsulConfig =
            serde_json::from_value(json!({"address": null, "request_timeout": null})).unwrap();
        assert_eq!(config.base_url(), "http://127.0.0.1:8500");
        assert_eq!(config.request_timeout, 30);
    }

    #[test]
    fn test_base_url_keeps_explicit_scheme() {
        let config = ConsulConfig {
            address: "https://consul.example.com/".to_string(),
            scheme: "http".to_string(),
            request_timeout: 5,
        };
        assert_eq!(config.base_url(), "https://consul.example.com");
    }
}
