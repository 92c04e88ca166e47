//! Signed `sts:GetCallerIdentity` request descriptions for the Consul AWS
//! IAM auth method.
//!
//! Consul authenticates an AWS principal by replaying a pre-signed
//! `sts:GetCallerIdentity` request against AWS STS. The client never sends
//! that request itself: it signs it and hands Consul a description of it
//! (method, URL, headers, body) as the bearer token. Consul must reproduce
//! the exact canonical request, so every header it inspects has to be
//! present before signing.
//!
//! The bearer token is therefore not a secret credential but a short-lived
//! description of a request. Rotating the AWS credentials does not revoke a
//! token Consul already accepted, and the Consul servers need egress to STS.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_sts::error::DisplayErrorContext;
use aws_sdk_sts::Client as StsClient;
use aws_sigv4::http_request::{
    sign, SignableBody, SignableRequest, SigningParams, SigningSettings,
};
use aws_sigv4::sign::v4;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::SystemTime;
use tracing::debug;

use super::arn::parse_arn;
use crate::error::{AuthError, AuthResult};

pub const STS_GET_CALLER_IDENTITY_BODY: &str = "Action=GetCallerIdentity&Version=2011-06-15";
pub const STS_REQUEST_METHOD: &str = "POST";
pub const DEFAULT_STS_REGION: &str = "us-east-1";

pub const SERVER_ID_HEADER: &str = "X-Consul-IAM-ServerID";
pub const GET_ENTITY_METHOD_HEADER: &str = "X-Consul-IAM-GetEntity-Method";
pub const GET_ENTITY_URL_HEADER: &str = "X-Consul-IAM-GetEntity-URL";
pub const GET_ENTITY_HEADERS_HEADER: &str = "X-Consul-IAM-GetEntity-Headers";
pub const GET_ENTITY_BODY_HEADER: &str = "X-Consul-IAM-GetEntity-Body";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

/// Global IAM endpoint and signing region of an AWS partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IamPartition {
    endpoint: &'static str,
    signing_region: &'static str,
}

const IAM_AWS: IamPartition = IamPartition {
    endpoint: "https://iam.amazonaws.com",
    signing_region: "us-east-1",
};
const IAM_AWS_CN: IamPartition = IamPartition {
    endpoint: "https://iam.cn-north-1.amazonaws.com.cn",
    signing_region: "cn-north-1",
};
const IAM_AWS_US_GOV: IamPartition = IamPartition {
    endpoint: "https://iam.us-gov.amazonaws.com",
    signing_region: "us-gov-west-1",
};

/// IAM partition that owns `region`
fn iam_partition(region: &str) -> IamPartition {
    if region.starts_with("cn-") {
        IAM_AWS_CN
    } else if region.starts_with("us-gov-") {
        IAM_AWS_US_GOV
    } else {
        IAM_AWS
    }
}

/// HTTP headers keyed by canonical name, each with its list of values
pub type HeaderBag = BTreeMap<String, Vec<String>>;

/// Inputs for generating the signed login request
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub credentials: Credentials,
    pub include_iam_entity: bool,
    /// STS endpoint override, empty for the regional AWS endpoint
    pub sts_endpoint: String,
    pub sts_region: String,
    /// IAM endpoint override, empty for the partition's global endpoint
    pub iam_endpoint: String,
    pub server_id_header_name: String,
    pub server_id_header_value: String,
    pub get_entity_method_header: String,
    pub get_entity_url_header: String,
    pub get_entity_headers_header: String,
    pub get_entity_body_header: String,
}

impl LoginInput {
    fn sts_url(&self) -> String {
        if !self.sts_endpoint.is_empty() {
            return endpoint_url(&self.sts_endpoint);
        }
        let suffix = if self.sts_region.starts_with("cn-") {
            "amazonaws.com.cn"
        } else {
            "amazonaws.com"
        };
        format!("https://sts.{}.{}/", self.sts_region, suffix)
    }

    fn iam_url(&self) -> String {
        if self.iam_endpoint.is_empty() {
            endpoint_url(iam_partition(&self.sts_region).endpoint)
        } else {
            endpoint_url(&self.iam_endpoint)
        }
    }

    fn iam_signing_region(&self) -> &'static str {
        iam_partition(&self.sts_region).signing_region
    }
}

/// Description of the signed `sts:GetCallerIdentity` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedRequest {
    pub iam_http_request_method: String,
    /// Base64 of the request URL
    pub iam_request_url: String,
    /// Base64 of the request body
    pub iam_request_body: String,
    /// Base64 of the JSON-encoded [`HeaderBag`]
    pub iam_request_headers: String,
}

/// Looks up the ARN of the principal owning a set of credentials
#[async_trait]
pub trait CallerIdentity: Send + Sync {
    async fn caller_arn(
        &self,
        credentials: &Credentials,
        region: &str,
        sts_endpoint: Option<&str>,
    ) -> AuthResult<String>;
}

/// [`CallerIdentity`] backed by a live `sts:GetCallerIdentity` call
#[derive(Debug, Clone, Copy, Default)]
pub struct StsCallerIdentity;

#[async_trait]
impl CallerIdentity for StsCallerIdentity {
    async fn caller_arn(
        &self,
        credentials: &Credentials,
        region: &str,
        sts_endpoint: Option<&str>,
    ) -> AuthResult<String> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials.clone());
        if let Some(endpoint) = sts_endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let config = loader.load().await;

        let identity = StsClient::new(&config)
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| {
                AuthError::credentials(format!(
                    "sts:GetCallerIdentity failed: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        identity
            .arn()
            .map(str::to_string)
            .ok_or_else(|| AuthError::credentials("sts:GetCallerIdentity returned no ARN"))
    }
}

/// Build the Consul login data for `input`.
///
/// With `include_iam_entity`, the caller's IAM role or user is looked up so a
/// signed `iam:GetRole` / `iam:GetUser` request can be embedded in the
/// `GetEntity` headers; Consul replays it to evaluate binding rules against
/// the entity's metadata.
pub async fn generate_login_data(
    input: &LoginInput,
    identity: &dyn CallerIdentity,
) -> AuthResult<SignedRequest> {
    let sts_url = input.sts_url();
    let mut headers = form_headers();

    if input.include_iam_entity {
        let entity = signed_entity_request(input, identity).await?;
        add_header(&mut headers, &input.get_entity_method_header, STS_REQUEST_METHOD);
        add_header(&mut headers, &input.get_entity_url_header, &entity.url);
        add_header(
            &mut headers,
            &input.get_entity_headers_header,
            &serde_json::to_string(&entity.headers)?,
        );
        add_header(&mut headers, &input.get_entity_body_header, &entity.body);
    }

    if !input.server_id_header_value.is_empty() {
        add_header(
            &mut headers,
            &input.server_id_header_name,
            &input.server_id_header_value,
        );
    }

    let headers = sign_request(
        &sts_url,
        headers,
        STS_GET_CALLER_IDENTITY_BODY,
        &input.credentials,
        &input.sts_region,
        "sts",
        SystemTime::now(),
    )?;

    debug!("Signed sts:GetCallerIdentity request for {}", sts_url);

    Ok(SignedRequest {
        iam_http_request_method: STS_REQUEST_METHOD.to_string(),
        iam_request_url: general_purpose::STANDARD.encode(&sts_url),
        iam_request_body: general_purpose::STANDARD.encode(STS_GET_CALLER_IDENTITY_BODY),
        iam_request_headers: general_purpose::STANDARD.encode(serde_json::to_string(&headers)?),
    })
}

/// Login data for the Consul AWS IAM auth method, with the header names
/// Consul expects.
///
/// The result is normalized through JSON into a plain mapping so callers
/// can serialize it again without depending on [`SignedRequest`].
pub async fn consul_login_data(
    credentials: Credentials,
    region: &str,
    server_id_header_value: Option<&str>,
    iam_endpoint: Option<&str>,
    identity: &dyn CallerIdentity,
) -> AuthResult<Map<String, Value>> {
    let input = LoginInput {
        credentials,
        include_iam_entity: true,
        sts_endpoint: String::new(),
        sts_region: region.to_string(),
        iam_endpoint: iam_endpoint.unwrap_or_default().to_string(),
        server_id_header_name: SERVER_ID_HEADER.to_string(),
        server_id_header_value: server_id_header_value.unwrap_or_default().to_string(),
        get_entity_method_header: GET_ENTITY_METHOD_HEADER.to_string(),
        get_entity_url_header: GET_ENTITY_URL_HEADER.to_string(),
        get_entity_headers_header: GET_ENTITY_HEADERS_HEADER.to_string(),
        get_entity_body_header: GET_ENTITY_BODY_HEADER.to_string(),
    };

    let signed = generate_login_data(&input, identity).await?;
    Ok(serde_json::from_value(serde_json::to_value(signed)?)?)
}

struct SignedEntityRequest {
    url: String,
    headers: HeaderBag,
    body: String,
}

async fn signed_entity_request(
    input: &LoginInput,
    identity: &dyn CallerIdentity,
) -> AuthResult<SignedEntityRequest> {
    let sts_endpoint = Some(input.sts_endpoint.as_str()).filter(|s| !s.is_empty());
    let arn = identity
        .caller_arn(&input.credentials, &input.sts_region, sts_endpoint)
        .await?;
    let entity = parse_arn(&arn)?;
    debug!(
        "Embedding iam:Get request for {} {}",
        entity.entity_type, entity.friendly_name
    );

    let body = entity.get_entity_body()?;
    let url = input.iam_url();

    let mut headers = form_headers();
    if !input.server_id_header_value.is_empty() {
        add_header(
            &mut headers,
            &input.server_id_header_name,
            &input.server_id_header_value,
        );
    }

    let headers = sign_request(
        &url,
        headers,
        &body,
        &input.credentials,
        input.iam_signing_region(),
        "iam",
        SystemTime::now(),
    )?;

    Ok(SignedEntityRequest { url, headers, body })
}

/// Sign a POST request with SigV4 and return its headers with the
/// signature headers added
pub(crate) fn sign_request(
    url: &str,
    mut headers: HeaderBag,
    body: &str,
    credentials: &Credentials,
    region: &str,
    service: &str,
    time: SystemTime,
) -> AuthResult<HeaderBag> {
    let identity = credentials.clone().into();
    let signing_params: SigningParams<'_> = v4::SigningParams::builder()
        .identity(&identity)
        .region(region)
        .name(service)
        .time(time)
        .settings(SigningSettings::default())
        .build()
        .map_err(|e| AuthError::signing(e.to_string()))?
        .into();

    let signed_headers: Vec<(String, String)> = {
        let pairs = headers.iter().flat_map(|(name, values)| {
            values.iter().map(move |value| (name.as_str(), value.as_str()))
        });
        let signable = SignableRequest::new(
            STS_REQUEST_METHOD,
            url,
            pairs,
            SignableBody::Bytes(body.as_bytes()),
        )
        .map_err(|e| AuthError::signing(e.to_string()))?;

        let (instructions, _signature) = sign(signable, &signing_params)
            .map_err(|e| AuthError::signing(e.to_string()))?
            .into_parts();

        instructions
            .headers()
            .map(|(name, value)| (canonical_header_key(name), value.to_string()))
            .collect()
    };

    for (name, value) in signed_headers {
        headers.insert(name, vec![value]);
    }
    Ok(headers)
}

fn form_headers() -> HeaderBag {
    let mut headers = HeaderBag::new();
    add_header(&mut headers, "Content-Type", FORM_CONTENT_TYPE);
    headers
}

fn add_header(headers: &mut HeaderBag, name: &str, value: &str) {
    headers
        .entry(canonical_header_key(name))
        .or_default()
        .push(value.to_string());
}

/// Canonical MIME form of a header name: `x-consul-iam-serverid` and
/// `X-Consul-IAM-ServerID` both become `X-Consul-Iam-Serverid`
pub fn canonical_header_key(name: &str) -> String {
    let mut upper = true;
    name.chars()
        .map(|c| {
            let out = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            out
        })
        .collect()
}

fn endpoint_url(endpoint: &str) -> String {
    let endpoint = endpoint.trim_end_matches('/');
    if endpoint.contains("://") {
        format!("{}/", endpoint)
    } else {
        format!("https://{}/", endpoint)
    }
}
