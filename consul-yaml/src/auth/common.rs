use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::common::params::{env_first, get_non_empty_string, is_zero, Params};
use crate::common::HostConfig;
use crate::consul::{AclLogin, AclLoginRequest, WriteOptions};
use crate::error::{AuthError, AuthResult};

pub const FIELD_NAMESPACE: &str = "namespace";
pub const FIELD_PARTITION: &str = "partition";

/// Validation step run by [`AuthLoginCommon::init`] on the block's params.
///
/// A validator may inject defaults into the params or reject them.
pub type Validator<'a> = &'a dyn Fn(&AuthLoginCommon, &HostConfig, &mut Params) -> AuthResult<()>;

/// Default applied to a field the host config leaves unset
#[derive(Debug, Clone)]
pub struct AuthDefault {
    pub field: &'static str,
    /// Checked in order, the first non-empty value wins
    pub env_vars: Vec<&'static str>,
    pub default_value: String,
}

/// State and behavior shared by every auth-login backend
#[derive(Debug, Clone, Default)]
pub struct AuthLoginCommon {
    auth_field: String,
    params: Params,
    initialized: bool,
}

impl AuthLoginCommon {
    /// Read the single `auth_field` block from `config`, run `validators` over
    /// its params in order and freeze the result.
    pub fn init(
        &mut self,
        config: &HostConfig,
        auth_field: &str,
        validators: &[Validator<'_>],
    ) -> AuthResult<()> {
        if self.initialized {
            return Err(AuthError::AlreadyInitialized);
        }

        let block = config
            .get_ok(auth_field)
            .ok_or_else(|| AuthError::missing_block(auth_field))?;
        let items = block.as_array().ok_or_else(|| {
            AuthError::config(format!("{:?} must be a list with one block", auth_field))
        })?;
        if items.len() != 1 {
            return Err(AuthError::invalid_block(auth_field, items.len()));
        }

        let mut params = match &items[0] {
            Value::Null => Params::new(),
            Value::Object(map) => map.clone(),
            _ => {
                return Err(AuthError::config(format!(
                    "{:?} block must be a mapping",
                    auth_field
                )))
            }
        };

        self.auth_field = auth_field.to_string();
        for validate in validators {
            validate(self, config, &mut params)?;
        }

        self.params = params;
        self.initialized = true;
        debug!("Initialized auth login {}", auth_field);
        Ok(())
    }

    pub fn auth_field(&self) -> &str {
        &self.auth_field
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Path of `field` inside this backend's block
    pub fn field_path(&self, field: &str) -> String {
        format!("{}.0.{}", self.auth_field, field)
    }

    pub fn namespace(&self) -> Option<&str> {
        get_non_empty_string(&self.params, FIELD_NAMESPACE)
    }

    pub fn partition(&self) -> Option<&str> {
        get_non_empty_string(&self.params, FIELD_PARTITION)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn validate(&self) -> AuthResult<()> {
        if !self.initialized {
            return Err(AuthError::NotInitialized);
        }
        Ok(())
    }

    /// Copy of the params restricted to `includes`, or all params when
    /// `includes` is empty. Every included key must be present.
    pub fn copy_params(&self, includes: &[&str]) -> AuthResult<Params> {
        if includes.is_empty() {
            return Ok(self.params.clone());
        }

        let missing: Vec<String> = includes
            .iter()
            .filter(|k| !self.params.contains_key(**k))
            .map(|k| k.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(AuthError::MissingParams { fields: missing });
        }

        Ok(includes
            .iter()
            .filter_map(|k| self.params.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    pub fn copy_params_excluding(&self, excludes: &[&str]) -> Params {
        self.params
            .iter()
            .filter(|(k, _)| !excludes.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Write env-var or literal defaults into `params` for each field the
    /// host config leaves unset
    pub fn set_default_fields(
        &self,
        config: &HostConfig,
        defaults: &[AuthDefault],
        params: &mut Params,
    ) -> AuthResult<()> {
        for default in defaults {
            if config.is_set(&self.field_path(default.field)) {
                continue;
            }
            let value =
                env_first(&default.env_vars).unwrap_or_else(|| default.default_value.clone());
            params.insert(default.field.to_string(), Value::String(value));
        }
        Ok(())
    }

    /// Fail with every `required` field that is unset in the host config and
    /// was not filled in by a default.
    ///
    /// Must run after [`Self::set_default_fields`].
    pub fn check_required_fields(
        &self,
        config: &HostConfig,
        params: &Params,
        required: &[&str],
    ) -> AuthResult<()> {
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|field| {
                !config.is_set(&self.field_path(field)) && params.get(*field).map_or(true, is_zero)
            })
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AuthError::missing_required_fields(missing))
        }
    }

    pub fn check_fields_one_of(&self, config: &HostConfig, fields: &[&str]) -> AuthResult<()> {
        if fields.iter().any(|f| config.is_set(&self.field_path(f))) {
            return Ok(());
        }
        Err(AuthError::AtLeastOneRequired {
            fields: fields.iter().map(|f| f.to_string()).collect(),
        })
    }

    /// Exchange `bearer_token` for a Consul ACL token and return its secret
    pub async fn login(
        &self,
        client: &dyn AclLogin,
        auth_method: &str,
        bearer_token: &str,
        meta: BTreeMap<String, String>,
    ) -> AuthResult<String> {
        self.validate()?;

        let request = AclLoginRequest {
            auth_method: auth_method.to_string(),
            bearer_token: bearer_token.to_string(),
            meta,
        };
        let options = WriteOptions {
            namespace: self.namespace().map(str::to_string),
            partition: self.partition().map(str::to_string),
        };

        let token = client.acl_login(&request, &options).await?;
        info!(
            "Logged in to Consul with auth method {} (accessor {})",
            auth_method, token.accessor_id
        );
        Ok(token.secret_id)
    }
}
