use aws_config::default_provider::credentials::DefaultCredentialsChain;
use aws_config::profile::ProfileFileCredentialsProvider;
use aws_config::provider_config::ProviderConfig;
use aws_config::sts::AssumeRoleProvider;
use aws_config::web_identity_token::{StaticConfiguration, WebIdentityTokenCredentialsProvider};
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_credential_types::Credentials;
use aws_runtime::env_config::file::{EnvConfigFileKind, EnvConfigFiles};
use aws_sdk_sts::error::DisplayErrorContext;
use std::fmt;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

use super::signer::DEFAULT_STS_REGION;
use super::{
    FIELD_AWS_ACCESS_KEY_ID, FIELD_AWS_IAM_ENDPOINT, FIELD_AWS_PROFILE, FIELD_AWS_REGION,
    FIELD_AWS_ROLE_ARN, FIELD_AWS_ROLE_SESSION_NAME, FIELD_AWS_SECRET_ACCESS_KEY,
    FIELD_AWS_SESSION_TOKEN, FIELD_AWS_SHARED_CREDENTIALS_FILE, FIELD_AWS_STS_ENDPOINT,
    FIELD_AWS_WEB_IDENTITY_TOKEN_FILE,
};
use crate::common::params::{get_non_empty_string, Params};
use crate::error::{AuthError, AuthResult};

const STATIC_PROVIDER_NAME: &str = "ConsulYamlStatic";

/// AWS credential settings taken from an `auth_login_aws` block
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialsConfig {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub session_token: Option<String>,
    pub profile: Option<String>,
    pub shared_credentials_file: Option<String>,
    pub web_identity_token_file: Option<String>,
    pub role_arn: Option<String>,
    pub role_session_name: Option<String>,
    pub region: Option<String>,
    pub sts_endpoint: Option<String>,
    pub iam_endpoint: Option<String>,
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "** redacted **");
        f.debug_struct("CredentialsConfig")
            .field("access_key", &self.access_key)
            .field("secret_key", &redact(&self.secret_key))
            .field("session_token", &redact(&self.session_token))
            .field("profile", &self.profile)
            .field("shared_credentials_file", &self.shared_credentials_file)
            .field("web_identity_token_file", &self.web_identity_token_file)
            .field("role_arn", &self.role_arn)
            .field("role_session_name", &self.role_session_name)
            .field("region", &self.region)
            .field("sts_endpoint", &self.sts_endpoint)
            .field("iam_endpoint", &self.iam_endpoint)
            .finish()
    }
}

impl CredentialsConfig {
    /// Map the AWS params 1:1; empty values are treated as unset
    pub fn from_params(params: &Params) -> Self {
        let get = |key: &str| get_non_empty_string(params, key).map(str::to_string);
        Self {
            access_key: get(FIELD_AWS_ACCESS_KEY_ID),
            secret_key: get(FIELD_AWS_SECRET_ACCESS_KEY),
            session_token: get(FIELD_AWS_SESSION_TOKEN),
            profile: get(FIELD_AWS_PROFILE),
            shared_credentials_file: get(FIELD_AWS_SHARED_CREDENTIALS_FILE),
            web_identity_token_file: get(FIELD_AWS_WEB_IDENTITY_TOKEN_FILE),
            role_arn: get(FIELD_AWS_ROLE_ARN),
            role_session_name: get(FIELD_AWS_ROLE_SESSION_NAME),
            region: get(FIELD_AWS_REGION),
            sts_endpoint: get(FIELD_AWS_STS_ENDPOINT),
            iam_endpoint: get(FIELD_AWS_IAM_ENDPOINT),
        }
    }

    /// Region to sign for, `us-east-1` when unset
    pub fn region(&self) -> &str {
        self.region.as_deref().unwrap_or(DEFAULT_STS_REGION)
    }

    /// Resolve live credentials through the configured provider chain
    pub async fn resolve(&self) -> AuthResult<Credentials> {
        let provider = self.credentials_provider().await?;
        provider
            .provide_credentials()
            .await
            .map_err(|e| AuthError::credentials(DisplayErrorContext(&e).to_string()))
    }

    async fn credentials_provider(&self) -> AuthResult<SharedCredentialsProvider> {
        let region = Region::new(self.region().to_string());
        let provider_config = ProviderConfig::without_region().with_region(Some(region.clone()));

        let mut role_consumed = false;
        let base = match (self.access_key.as_deref(), self.secret_key.as_deref()) {
            (Some(access_key), Some(secret_key)) => {
                debug!("Using static AWS credentials");
                SharedCredentialsProvider::new(Credentials::new(
                    access_key,
                    secret_key,
                    self.session_token.clone(),
                    None,
                    STATIC_PROVIDER_NAME,
                ))
            }
            (None, None) => match (
                self.web_identity_token_file.as_deref(),
                self.role_arn.as_deref(),
            ) {
                (Some(token_file), Some(role_arn)) => {
                    debug!("Using web identity token for role {}", role_arn);
                    role_consumed = true;
                    SharedCredentialsProvider::new(
                        WebIdentityTokenCredentialsProvider::builder()
                            .configure(&provider_config)
                            .static_configuration(StaticConfiguration {
                                web_identity_token_file: PathBuf::from(token_file),
                                role_arn: role_arn.to_string(),
                                session_name: self.session_name(),
                            })
                            .build(),
                    )
                }
                _ if self.profile.is_some() || self.shared_credentials_file.is_some() => {
                    debug!("Using AWS shared credentials profile");
                    let mut builder =
                        ProfileFileCredentialsProvider::builder().configure(&provider_config);
                    if let Some(profile) = self.profile.as_deref() {
                        builder = builder.profile_name(profile);
                    }
                    if let Some(file) = self.shared_credentials_file.as_deref() {
                        builder = builder.profile_files(
                            EnvConfigFiles::builder()
                                .with_file(EnvConfigFileKind::Credentials, file)
                                .build(),
                        );
                    }
                    SharedCredentialsProvider::new(builder.build())
                }
                _ => {
                    debug!("Using default AWS credentials chain");
                    SharedCredentialsProvider::new(
                        DefaultCredentialsChain::builder()
                            .region(region.clone())
                            .build()
                            .await,
                    )
                }
            },
            _ => {
                return Err(AuthError::credentials(
                    "static credentials require both an access key and a secret key",
                ))
            }
        };

        let Some(role_arn) = self.role_arn.as_deref().filter(|_| !role_consumed) else {
            return Ok(base);
        };

        debug!("Assuming role {}", role_arn);
        let mut builder = AssumeRoleProvider::builder(role_arn)
            .region(region.clone())
            .session_name(self.session_name());
        if let Some(endpoint) = self.sts_endpoint.as_deref() {
            let sdk_config = aws_config::defaults(BehaviorVersion::latest())
                .region(region)
                .endpoint_url(endpoint)
                .load()
                .await;
            builder = builder.configure(&sdk_config);
        }

        Ok(SharedCredentialsProvider::new(
            builder.build_from_provider(base).await,
        ))
    }

    fn session_name(&self) -> String {
        self.role_session_name.clone().unwrap_or_else(|| {
            let secs = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default();
            format!("consul-yaml-{}", secs)
        })
    }
}
