//! AWS IAM auth-login backend.
//!
//! Unless a `bearer_token` is configured, the token sent to Consul is the
//! JSON description of a signed `sts:GetCallerIdentity` request built by
//! [`signer`].

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use super::common::{AuthDefault, AuthLoginCommon};
use super::registry::AuthLoginRegistry;
use super::schema::{get_login_schema, must_add_login_schema};
use super::AuthLogin;
use crate::common::params::{get_non_empty_string, get_string, string_map, Params};
use crate::common::{HostConfig, Resource, Schema, SchemaMap};
use crate::consul::AclLogin;
use crate::error::{AuthError, AuthResult};

mod arn;
pub mod credentials;
pub mod signer;

use credentials::CredentialsConfig;
use signer::{consul_login_data, CallerIdentity, StsCallerIdentity};

pub const FIELD_AUTH_LOGIN_AWS: &str = "auth_login_aws";

pub const FIELD_AUTH_METHOD: &str = "auth_method";
pub const FIELD_BEARER_TOKEN: &str = "bearer_token";
pub const FIELD_AWS_ACCESS_KEY_ID: &str = "aws_access_key_id";
pub const FIELD_AWS_SECRET_ACCESS_KEY: &str = "aws_secret_access_key";
pub const FIELD_AWS_SESSION_TOKEN: &str = "aws_session_token";
pub const FIELD_AWS_PROFILE: &str = "aws_profile";
pub const FIELD_AWS_SHARED_CREDENTIALS_FILE: &str = "aws_shared_credentials_file";
pub const FIELD_AWS_WEB_IDENTITY_TOKEN_FILE: &str = "aws_web_identity_token_file";
pub const FIELD_AWS_ROLE_ARN: &str = "aws_role_arn";
pub const FIELD_AWS_ROLE_SESSION_NAME: &str = "aws_role_session_name";
pub const FIELD_AWS_REGION: &str = "aws_region";
pub const FIELD_AWS_STS_ENDPOINT: &str = "aws_sts_endpoint";
pub const FIELD_AWS_IAM_ENDPOINT: &str = "aws_iam_endpoint";
pub const FIELD_SERVER_ID_HEADER_VALUE: &str = "server_id_header_value";
pub const FIELD_META: &str = "meta";

/// Env-var fallbacks for the AWS fields, in lookup order
fn auth_defaults() -> Vec<AuthDefault> {
    [
        (FIELD_AWS_ACCESS_KEY_ID, vec!["AWS_ACCESS_KEY_ID"]),
        (FIELD_AWS_SECRET_ACCESS_KEY, vec!["AWS_SECRET_ACCESS_KEY"]),
        (FIELD_AWS_SESSION_TOKEN, vec!["AWS_SESSION_TOKEN"]),
        (FIELD_AWS_PROFILE, vec!["AWS_PROFILE"]),
        (
            FIELD_AWS_SHARED_CREDENTIALS_FILE,
            vec!["AWS_SHARED_CREDENTIALS_FILE"],
        ),
        (
            FIELD_AWS_WEB_IDENTITY_TOKEN_FILE,
            vec!["AWS_WEB_IDENTITY_TOKEN_FILE"],
        ),
        (FIELD_AWS_ROLE_ARN, vec!["AWS_ROLE_ARN"]),
        (FIELD_AWS_ROLE_SESSION_NAME, vec!["AWS_ROLE_SESSION_NAME"]),
        (FIELD_AWS_REGION, vec!["AWS_REGION", "AWS_DEFAULT_REGION"]),
    ]
    .into_iter()
    .map(|(field, env_vars)| AuthDefault {
        field,
        env_vars,
        default_value: String::new(),
    })
    .collect()
}

/// Logs in to Consul through an AWS IAM auth method
pub struct AuthLoginAws {
    common: AuthLoginCommon,
    caller_identity: Arc<dyn CallerIdentity>,
}

impl AuthLoginAws {
    pub fn new() -> Self {
        Self::with_caller_identity(Arc::new(StsCallerIdentity))
    }

    /// Use `caller_identity` to look up the IAM entity behind the resolved
    /// credentials
    pub fn with_caller_identity(caller_identity: Arc<dyn CallerIdentity>) -> Self {
        Self {
            common: AuthLoginCommon::default(),
            caller_identity,
        }
    }

    /// Registry constructor: build and initialize from the host config
    pub fn from_config(config: &HostConfig) -> AuthResult<Box<dyn AuthLogin>> {
        let mut auth_login = Self::new();
        auth_login.init(config)?;
        Ok(Box::new(auth_login))
    }

    /// Registry schema factory
    pub fn schema(registry: &AuthLoginRegistry, field: &str) -> Schema {
        get_login_schema(
            registry,
            field,
            "Login to Consul using the AWS IAM auth method",
            || Self::schema_resource(field),
        )
    }

    fn schema_resource(field: &str) -> Resource {
        let env_doc = |what: &str, vars: &str| {
            format!("{} If unset, the value of {} is used.", what, vars)
        };

        let mut schema = SchemaMap::new();
        schema.insert(
            FIELD_AUTH_METHOD.to_string(),
            Schema::string("The name of the Consul auth method.").required(),
        );
        schema.insert(
            FIELD_BEARER_TOKEN.to_string(),
            Schema::string(
                "Pre-computed bearer token to send instead of signing a request \
                 with AWS credentials.",
            )
            .sensitive(),
        );
        schema.insert(
            FIELD_AWS_ACCESS_KEY_ID.to_string(),
            Schema::string(&env_doc("The AWS access key ID.", "AWS_ACCESS_KEY_ID")),
        );
        schema.insert(
            FIELD_AWS_SECRET_ACCESS_KEY.to_string(),
            Schema::string(&env_doc(
                "The AWS secret access key.",
                "AWS_SECRET_ACCESS_KEY",
            ))
            .sensitive(),
        );
        schema.insert(
            FIELD_AWS_SESSION_TOKEN.to_string(),
            Schema::string(&env_doc("The AWS session token.", "AWS_SESSION_TOKEN"))
                .sensitive(),
        );
        schema.insert(
            FIELD_AWS_PROFILE.to_string(),
            Schema::string(&env_doc(
                "Name of the profile in the shared credentials file.",
                "AWS_PROFILE",
            )),
        );
        schema.insert(
            FIELD_AWS_SHARED_CREDENTIALS_FILE.to_string(),
            Schema::string(&env_doc(
                "Path to a shared credentials file.",
                "AWS_SHARED_CREDENTIALS_FILE",
            )),
        );
        schema.insert(
            FIELD_AWS_WEB_IDENTITY_TOKEN_FILE.to_string(),
            Schema::string(&env_doc(
                "Path to an OIDC token file used with aws_role_arn.",
                "AWS_WEB_IDENTITY_TOKEN_FILE",
            )),
        );
        schema.insert(
            FIELD_AWS_ROLE_ARN.to_string(),
            Schema::string(&env_doc("ARN of an IAM role to assume.", "AWS_ROLE_ARN")),
        );
        schema.insert(
            FIELD_AWS_ROLE_SESSION_NAME.to_string(),
            Schema::string(&env_doc(
                "Session name to use when assuming a role.",
                "AWS_ROLE_SESSION_NAME",
            )),
        );
        schema.insert(
            FIELD_AWS_REGION.to_string(),
            Schema::string(&env_doc(
                "The AWS region, us-east-1 when nothing is set.",
                "AWS_REGION or AWS_DEFAULT_REGION",
            )),
        );
        schema.insert(
            FIELD_AWS_STS_ENDPOINT.to_string(),
            Schema::string("URL of the STS endpoint used to assume roles."),
        );
        schema.insert(
            FIELD_AWS_IAM_ENDPOINT.to_string(),
            Schema::string("URL of the IAM endpoint used to look up the IAM entity."),
        );
        schema.insert(
            FIELD_SERVER_ID_HEADER_VALUE.to_string(),
            Schema::string(
                "Value of the X-Consul-IAM-ServerID header, when the auth method \
                 requires one.",
            ),
        );
        schema.insert(
            FIELD_META.to_string(),
            Schema::map(
                "Metadata attached to the issued ACL token. Values that are not \
                 strings are ignored.",
            ),
        );

        let mut resource = Resource::new(schema);
        must_add_login_schema(&mut resource, field);
        resource
    }

    async fn signed_bearer_token(&self) -> AuthResult<String> {
        let params = self.common.params();
        let config = CredentialsConfig::from_params(params);
        debug!("Resolving AWS credentials: {:?}", config);

        let credentials = config.resolve().await?;
        let login_data = consul_login_data(
            credentials,
            config.region(),
            get_non_empty_string(params, FIELD_SERVER_ID_HEADER_VALUE),
            config.iam_endpoint.as_deref(),
            self.caller_identity.as_ref(),
        )
        .await?;

        Ok(serde_json::to_string(&login_data)?)
    }
}

impl Default for AuthLoginAws {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AuthLoginAws {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthLoginAws")
            .field("auth_field", &self.common.auth_field())
            .field("initialized", &self.common.is_initialized())
            .field(
                "auth_method",
                &get_string(self.common.params(), FIELD_AUTH_METHOD),
            )
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AuthLogin for AuthLoginAws {
    fn init(&mut self, config: &HostConfig) -> AuthResult<()> {
        let defaults = auth_defaults();
        let set_defaults = |common: &AuthLoginCommon, config: &HostConfig, params: &mut Params| {
            common.set_default_fields(config, &defaults, params)
        };
        let check_required =
            |common: &AuthLoginCommon, config: &HostConfig, params: &mut Params| {
                common.check_required_fields(config, params, &[FIELD_AUTH_METHOD])
            };

        self.common
            .init(config, FIELD_AUTH_LOGIN_AWS, &[&set_defaults, &check_required])
    }

    fn auth_method_name(&self) -> AuthResult<&str> {
        self.common.validate()?;
        Ok(get_string(self.common.params(), FIELD_AUTH_METHOD).unwrap_or_default())
    }

    async fn login(&self, client: &dyn AclLogin) -> AuthResult<String> {
        let auth_method = self.auth_method_name()?;
        if auth_method.is_empty() {
            return Err(AuthError::config("auth_method is required"));
        }

        let params = self.common.params();
        let bearer_token = match get_non_empty_string(params, FIELD_BEARER_TOKEN) {
            Some(token) => {
                debug!("Using configured bearer token");
                token.to_string()
            }
            None => self.signed_bearer_token().await?,
        };
        let meta = string_map(params.get(FIELD_META));

        info!("Logging in to Consul with AWS auth method {}", auth_method);
        self.common
            .login(client, auth_method, &bearer_token, meta)
            .await
    }

    fn common(&self) -> &AuthLoginCommon {
        &self.common
    }
}
