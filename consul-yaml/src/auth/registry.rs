use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, RwLock};
use tracing::debug;

use super::aws::{AuthLoginAws, FIELD_AUTH_LOGIN_AWS};
use super::AuthLogin;
use crate::common::{HostConfig, Schema};
use crate::error::{AuthError, AuthResult};

/// Builds an initialized backend from the host config
pub type AuthLoginFn = fn(&HostConfig) -> AuthResult<Box<dyn AuthLogin>>;

/// Builds the schema of a backend's top-level block
pub type SchemaFn = fn(&AuthLoginRegistry, &str) -> Schema;

/// A registered auth-login backend
pub struct AuthLoginDescriptor {
    field: String,
    auth_login_fn: AuthLoginFn,
    schema_fn: SchemaFn,
}

impl AuthLoginDescriptor {
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Construct and initialize the backend from `config`
    pub fn auth_login(&self, config: &HostConfig) -> AuthResult<Box<dyn AuthLogin>> {
        (self.auth_login_fn)(config)
    }

    pub fn schema(&self, registry: &AuthLoginRegistry) -> Schema {
        (self.schema_fn)(registry, &self.field)
    }
}

impl fmt::Debug for AuthLoginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthLoginDescriptor")
            .field("field", &self.field)
            .finish_non_exhaustive()
    }
}

/// Auth-login backends keyed by their top-level config field
#[derive(Debug, Default)]
pub struct AuthLoginRegistry {
    descriptors: RwLock<HashMap<String, Arc<AuthLoginDescriptor>>>,
}

impl AuthLoginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in backends
    pub fn with_builtins() -> AuthResult<Self> {
        let registry = Self::new();
        registry.register(
            FIELD_AUTH_LOGIN_AWS,
            AuthLoginAws::from_config,
            AuthLoginAws::schema,
        )?;
        Ok(registry)
    }

    pub fn register(
        &self,
        field: &str,
        auth_login_fn: AuthLoginFn,
        schema_fn: SchemaFn,
    ) -> AuthResult<()> {
        let mut descriptors = self
            .descriptors
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if descriptors.contains_key(field) {
            return Err(AuthError::already_registered(field));
        }

        descriptors.insert(
            field.to_string(),
            Arc::new(AuthLoginDescriptor {
                field: field.to_string(),
                auth_login_fn,
                schema_fn,
            }),
        );
        debug!("Registered auth login {}", field);
        Ok(())
    }

    pub fn get(&self, field: &str) -> AuthResult<Arc<AuthLoginDescriptor>> {
        self.descriptors
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(field)
            .cloned()
            .ok_or_else(|| AuthError::not_registered(field))
    }

    /// Snapshot of the registered fields, in no particular order
    pub fn fields(&self) -> Vec<String> {
        self.descriptors
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// Snapshot of the registered descriptors, in no particular order
    pub fn values(&self) -> Vec<Arc<AuthLoginDescriptor>> {
        self.descriptors
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .cloned()
            .collect()
    }
}

static GLOBAL_REGISTRY: LazyLock<AuthLoginRegistry> = LazyLock::new(|| {
    AuthLoginRegistry::with_builtins()
        .expect("built-in auth login fields must be distinct and non-empty")
});

/// Process-wide registry, populated with the built-in backends on first use
pub fn global_registry() -> &'static AuthLoginRegistry {
    &GLOBAL_REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn no_login(_: &HostConfig) -> AuthResult<Box<dyn AuthLogin>> {
        Err(AuthError::internal("not constructible"))
    }

    fn no_schema(_: &AuthLoginRegistry, _: &str) -> Schema {
        Schema::string("test")
    }

    #[test]
    fn test_register_twice_fails() {
        let registry = AuthLoginRegistry::new();
        registry.register("auth_login_test", no_login, no_schema).unwrap();

        let err = registry
            .register("auth_login_test", no_login, no_schema)
            .unwrap_err();
        assert!(matches!(err, AuthError::AlreadyRegistered { .. }));
        assert_eq!(registry.fields(), vec!["auth_login_test".to_string()]);
    }

    #[test]
    fn test_builtins_cannot_be_registered_again() {
        let registry = AuthLoginRegistry::with_builtins().unwrap();
        let err = registry.register(FIELD_AUTH_LOGIN_AWS, no_login, no_schema);
        assert!(matches!(err, Err(AuthError::AlreadyRegistered { .. })));
    }

    #[test]
    fn test_get_returns_registered_descriptor() {
        let registry = AuthLoginRegistry::new();
        registry.register("auth_login_test", no_login, no_schema).unwrap();

        let first = registry.get("auth_login_test").unwrap();
        let second = registry.get("auth_login_test").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.field(), "auth_login_test");
        assert!(Arc::ptr_eq(&first, &registry.values()[0]));

        assert!(matches!(
            registry.get("auth_login_missing"),
            Err(AuthError::NotRegistered { .. })
        ));
    }

    #[test]
    fn test_descriptor_delegates() {
        let registry = AuthLoginRegistry::new();
        registry.register("auth_login_test", no_login, no_schema).unwrap();
        let descriptor = registry.get("auth_login_test").unwrap();

        assert!(descriptor.auth_login(&HostConfig::default()).is_err());
        assert_eq!(descriptor.schema(&registry).description, "test");
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(AuthLoginRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                thread::spawn(move || {
                    // Every thread races for the shared field, then adds its own
                    let shared = registry.register("auth_login_shared", no_login, no_schema);
                    registry
                        .register(&format!("auth_login_{}", i), no_login, no_schema)
                        .unwrap();
                    shared.is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);

        let mut fields = registry.fields();
        fields.sort();
        assert_eq!(fields.len(), 9);
        assert_eq!(fields[0], "auth_login_0");
        assert!(fields.contains(&"auth_login_shared".to_string()));
        assert_eq!(registry.values().len(), 9);
    }

    #[test]
    fn test_builtins_register_once_each() {
        let registry = AuthLoginRegistry::with_builtins().unwrap();
        assert_eq!(registry.fields(), vec![FIELD_AUTH_LOGIN_AWS.to_string()]);

        let err = registry
            .register(FIELD_AUTH_LOGIN_AWS, no_login, no_schema)
            .unwrap_err();
        assert!(err.to_string().contains(FIELD_AUTH_LOGIN_AWS));
    }

    #[test]
    fn test_global_registry_has_aws() {
        let descriptor = global_registry().get(FIELD_AUTH_LOGIN_AWS).unwrap();
        assert_eq!(descriptor.field(), FIELD_AUTH_LOGIN_AWS);
        assert!(global_registry()
            .fields()
            .contains(&FIELD_AUTH_LOGIN_AWS.to_string()));
    }
}
