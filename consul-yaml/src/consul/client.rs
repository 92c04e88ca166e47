use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::{Body, Client as HttpClient, Method, Request};
use hyper_tls::HttpsConnector;
use percent_encoding::utf8_percent_encode;
use std::time::Duration;
use tracing::{debug, warn};

use super::{AclLogin, AclLoginRequest, AclToken, WriteOptions};
use crate::common::ConsulConfig;
use crate::error::{AuthError, AuthResult};
use crate::QUERY_ENCODE_SET;

/// HTTP client for the Consul ACL API
#[derive(Clone)]
pub struct ConsulClient {
    http_client: HttpClient<HttpsConnector<HttpConnector>>,
    base_url: String,
    request_timeout: Duration,
}

impl ConsulClient {
    pub fn new(config: &ConsulConfig) -> Self {
        let https = HttpsConnector::new();
        let http_client = HttpClient::builder().build::<_, Body>(https);

        Self {
            http_client,
            base_url: config.base_url(),
            request_timeout: Duration::from_secs(config.request_timeout),
        }
    }

    fn login_url(&self, options: &WriteOptions) -> String {
        let mut query = Vec::new();
        if let Some(ns) = options.namespace.as_deref() {
            query.push(format!("ns={}", utf8_percent_encode(ns, QUERY_ENCODE_SET)));
        }
        if let Some(partition) = options.partition.as_deref() {
            query.push(format!(
                "partition={}",
                utf8_percent_encode(partition, QUERY_ENCODE_SET)
            ));
        }

        if query.is_empty() {
            format!("{}/v1/acl/login", self.base_url)
        } else {
            format!("{}/v1/acl/login?{}", self.base_url, query.join("&"))
        }
    }
}

#[async_trait]
impl AclLogin for ConsulClient {
    async fn acl_login(
        &self,
        request: &AclLoginRequest,
        options: &WriteOptions,
    ) -> AuthResult<AclToken> {
        let url = self.login_url(options);
        let body = serde_json::to_vec(request)?;

        let http_request = Request::builder()
            .method(Method::POST)
            .uri(url.as_str())
            .header("content-type", "application/json")
            .body(Body::from(body))
            .map_err(|e| AuthError::internal(format!("invalid ACL login request: {}", e)))?;

        debug!("Sending ACL login for auth method {}", request.auth_method);

        let response = tokio::time::timeout(
            self.request_timeout,
            self.http_client.request(http_request),
        )
        .await
        .map_err(|_| {
            AuthError::internal(format!(
                "ACL login timed out after {}s",
                self.request_timeout.as_secs()
            ))
        })??;

        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes).trim().to_string();
            warn!(
                "ACL login for auth method {} rejected with status {}",
                request.auth_method, status
            );
            return Err(AuthError::AclLogin {
                auth_method: request.auth_method.clone(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockConsul;
    use std::collections::BTreeMap;

    fn client_for(mock: &MockConsul) -> ConsulClient {
        ConsulClient::new(&ConsulConfig {
            address: mock.address(),
            scheme: "http".to_string(),
            request_timeout: 5,
        })
    }

    fn request() -> AclLoginRequest {
        AclLoginRequest {
            auth_method: "aws-auth".to_string(),
            bearer_token: "test-bearer-token".to_string(),
            meta: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_acl_login_success() {
        let mock = MockConsul::start(200, r#"{"AccessorID":"a-1","SecretID":"secret-1"}"#).await;
        let client = client_for(&mock);

        let token = client
            .acl_login(&request(), &WriteOptions::default())
            .await
            .unwrap();

        assert_eq!(token.secret_id, "secret-1");
        assert_eq!(token.accessor_id, "a-1");

        let requests = mock.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].uri, "/v1/acl/login");
        assert!(requests[0].body.contains(r#""AuthMethod":"aws-auth""#));
    }

    #[tokio::test]
    async fn test_acl_login_scoping_query() {
        let mock = MockConsul::start(200, r#"{"SecretID":"secret-1"}"#).await;
        let client = client_for(&mock);
        let options = WriteOptions {
            namespace: Some("team a".to_string()),
            partition: Some("part1".to_string()),
        };

        client.acl_login(&request(), &options).await.unwrap();

        let requests = mock.requests().await;
        assert_eq!(requests[0].uri, "/v1/acl/login?ns=team%20a&partition=part1");
    }

    #[tokio::test]
    async fn test_acl_login_rejected() {
        let mock = MockConsul::start(403, "Permission denied").await;
        let client = client_for(&mock);

        let err = client
            .acl_login(&request(), &WriteOptions::default())
            .await
            .unwrap_err();

        match err {
            AuthError::AclLogin { status, body, .. } => {
                assert_eq!(status, 403);
                assert_eq!(body, "Permission denied");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(!mock.requests().await[0].body.is_empty());
    }
}
