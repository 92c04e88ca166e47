use serde_json::Value;
use tracing::{info, warn};

use crate::auth::{get_auth_login, must_add_auth_login_schema, AuthLoginRegistry};
use crate::common::{ConsulConfig, HostConfig, Resource, Schema, SchemaMap};
use crate::consul::ConsulClient;
use crate::error::AuthResult;

/// Top-level provider schema: Consul connection settings plus one optional
/// block per registered auth-login backend
pub fn provider_schema(registry: &AuthLoginRegistry) -> SchemaMap {
    let mut schema = SchemaMap::new();
    schema.insert(
        "address".to_string(),
        Schema::string(
            "Address of the Consul agent (host:port). Defaults to CONSUL_HTTP_ADDR \
             or 127.0.0.1:8500.",
        ),
    );
    schema.insert(
        "scheme".to_string(),
        Schema::string("URI scheme of the Consul agent, http or https."),
    );
    schema.insert(
        "request_timeout".to_string(),
        Schema::int("Timeout of Consul requests in seconds."),
    );
    must_add_auth_login_schema(registry, &mut schema);
    schema
}

/// Validated provider configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub consul: ConsulConfig,
    pub host: HostConfig,
}

impl ProviderConfig {
    /// Parse a YAML provider configuration and validate it against
    /// [`provider_schema`]
    pub fn from_yaml_str(registry: &AuthLoginRegistry, yaml: &str) -> AuthResult<Self> {
        let host = HostConfig::from_yaml_str(yaml)?;
        Resource::new(provider_schema(registry)).validate(host.root())?;

        let root = match host.root() {
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };
        let consul: ConsulConfig = serde_json::from_value(root)?;

        Ok(Self { consul, host })
    }

    /// Log in with the configured auth-login block and return the ACL
    /// secret, or `None` when no block is configured
    pub async fn login(&self, registry: &AuthLoginRegistry) -> AuthResult<Option<String>> {
        let Some(auth_login) = get_auth_login(registry, &self.host)? else {
            warn!("No auth login block configured");
            return Ok(None);
        };

        let client = ConsulClient::new(&self.consul);
        info!(
            "Logging in to Consul at {} via {}",
            self.consul.base_url(),
            auth_login.common().auth_field()
        );
        let token = auth_login.login(&client).await?;
        Ok(Some(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use crate::test_support::MockConsul;
    use serial_test::serial;

    fn registry() -> AuthLoginRegistry {
        AuthLoginRegistry::with_builtins().unwrap()
    }

    #[test]
    fn test_provider_schema_fields() {
        let schema = provider_schema(&registry());

        let fields: Vec<&str> = schema.keys().map(String::as_str).collect();
        assert_eq!(
            fields,
            vec!["address", "auth_login_aws", "request_timeout", "scheme"]
        );
        assert_eq!(schema["auth_login_aws"].max_items, Some(1));
        assert!(schema["auth_login_aws"].conflicts_with.is_empty());
    }

    #[test]
    #[serial]
    fn test_from_yaml_reads_consul_settings() {
        let config = ProviderConfig::from_yaml_str(
            &registry(),
            "address: consul.internal:8501\nscheme: https\nrequest_timeout: 5\n",
        )
        .unwrap();

        assert_eq!(config.consul.base_url(), "https://consul.internal:8501");
        assert_eq!(config.consul.request_timeout, 5);
    }

    #[test]
    fn test_from_yaml_rejects_invalid_config() {
        let unknown = ProviderConfig::from_yaml_str(&registry(), "token: abc\n").unwrap_err();
        assert!(unknown.to_string().contains("unsupported argument"));

        let two_blocks = "auth_login_aws:\n  - auth_method: a\n  - auth_method: b\n";
        let err = ProviderConfig::from_yaml_str(&registry(), two_blocks).unwrap_err();
        assert!(err.to_string().contains("too many list items"));

        let bad_type = ProviderConfig::from_yaml_str(&registry(), "request_timeout: soon\n");
        assert!(matches!(bad_type, Err(AuthError::Config { .. })));
    }

    #[tokio::test]
    #[serial]
    async fn test_login_end_to_end() {
        let mock = MockConsul::start(200, r#"{"SecretID": "issued"}"#).await;
        let yaml = format!(
            "address: {}\nscheme: http\nauth_login_aws:\n  - auth_method: aws-auth\n    \
             bearer_token: token\n    meta:\n      team: platform\n",
            mock.address()
        );

        let config = ProviderConfig::from_yaml_str(&registry(), &yaml).unwrap();
        let token = config.login(&registry()).await.unwrap();
        assert_eq!(token.as_deref(), Some("issued"));

        let requests = mock.requests().await;
        assert_eq!(requests.len(), 1);
        assert!(requests[0].body.contains(r#""Meta":{"team":"platform"}"#));
    }

    #[test]
    #[serial]
    fn test_from_yaml_zero_values_use_defaults() {
        std::env::remove_var("CONSUL_HTTP_ADDR");
        std::env::remove_var("CONSUL_HTTP_SSL");

        let config = ProviderConfig::from_yaml_str(
            &registry(),
            "address: \"\"\nscheme: \"\"\nrequest_timeout: 0\n",
        )
        .unwrap();

        assert_eq!(config.consul.base_url(), "http://127.0.0.1:8500");
        assert_eq!(config.consul.request_timeout, 30);
    }

    #[tokio::test]
    #[serial]
    async fn test_login_drops_non_string_meta() {
        let mock = MockConsul::start(200, r#"{"SecretID": "issued"}"#).await;
        let yaml = format!(
            "address: {}\nscheme: http\nauth_login_aws:\n  - auth_method: aws-auth\n    \
             bearer_token: token\n    meta:\n      team: platform\n      replicas: 3\n",
            mock.address()
        );

        let config = ProviderConfig::from_yaml_str(&registry(), &yaml).unwrap();
        let token = config.login(&registry()).await.unwrap();
        assert_eq!(token.as_deref(), Some("issued"));

        let requests = mock.requests().await;
        assert!(requests[0].body.contains(r#""Meta":{"team":"platform"}"#));
        assert!(!requests[0].body.contains("replicas"));
    }

    #[tokio::test]
    async fn test_login_without_block() {
        let config = ProviderConfig::from_yaml_str(&registry(), "scheme: http\n").unwrap();
        assert_eq!(config.login(&registry()).await.unwrap(), None);
    }
}
