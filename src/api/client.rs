//! HTTP client with credential injection, retry and token rotation.
//!
//! Every outbound call goes through [`ApiClient::send`]. The bearer header
//! comes from the [`CredentialStore`]; the same store's cookie jar is
//! installed on the client so the credential cookie (and its CSRF echo
//! header) travel with each request. A credential found in any successful
//! response body is committed back to the store before returning.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::retry::RetryPolicy;
use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::error::{ClientError, TransportError, ValidationError};

/// Response of a successful (2xx) request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// `None` when the body was empty.
    pub body: Option<Value>,
}

/// HTTP client for the expense tracker backend.
///
/// Shares its cookie jar with the [`CredentialStore`], so the credential
/// cookie and the bearer header always come from the same source.
pub struct ApiClient {
    client: Client,
    base_url: String,
    credentials: Arc<CredentialStore>,
    retry: RetryPolicy,
    csrf_header: HeaderName,
}

impl ApiClient {
    /// Create a client for `config.base_url` using the given credential store.
    ///
    /// Fails if the config does not validate or the CSRF header name is not
    /// a legal header name.
    pub fn new(config: &ClientConfig, credentials: Arc<CredentialStore>) -> Result<Self, ClientError> {
        config.validate()?;
        let csrf_header = HeaderName::from_bytes(config.csrf_header.as_bytes())
            .map_err(|e| ValidationError::new("csrf_header", e.to_string()))?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .cookie_provider(credentials.cookie_jar())
            .build()
            .map_err(|e| TransportError::network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
            retry: RetryPolicy::from_config(config),
            csrf_header,
        })
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Credential store the client reads from and commits rotated tokens to.
    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Send a request, retrying transport failures within the retry budget.
    ///
    /// Only the final outcome is observable. Cancelling `cancel` aborts the
    /// in-flight attempt (or pending backoff) with [`ClientError::Cancelled`].
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
        headers: &[(String, String)],
        cancel: &CancellationToken,
    ) -> Result<ApiResponse, ClientError> {
        let url = self.url_for(path);
        let mut retries = 0;
        loop {
            let request = self.build_request(&method, &url, payload, headers)?;
            log::debug!("REQUEST {} {} (attempt {})", method, url, retries + 1);

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log::debug!("Request cancelled: {} {}", method, url);
                    return Err(ClientError::Cancelled);
                }
                outcome = self.attempt(request) => outcome,
            };

            match outcome {
                Ok(response) => {
                    log::debug!("RESPONSE {} {} -> {}", method, url, response.status);
                    self.commit_credential(&response)?;
                    return Ok(response);
                }
                Err(err) if self.retry.should_retry(&method, &err, retries) => {
                    let delay = self.retry.delay_for_retry(retries);
                    retries += 1;
                    log::warn!(
                        "Request {} {} failed ({}), retry {}/{} in {:?}",
                        method,
                        url,
                        err,
                        retries,
                        self.retry.max_retries(),
                        delay
                    );
                    self.backoff(delay, cancel).await?;
                }
                Err(err) => {
                    log::warn!("ERROR {} {}: {}", method, url, err);
                    return Err(err.into());
                }
            }
        }
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn build_request(
        &self,
        method: &Method,
        url: &str,
        payload: Option<&Value>,
        overrides: &[(String, String)],
    ) -> Result<reqwest::RequestBuilder, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = self.credentials.get()? {
            let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ValidationError::new("credential", "token is not a valid header value"))?;
            headers.insert(AUTHORIZATION, bearer);
        }
        if let Some(csrf) = self.credentials.cookie_value() {
            if let Ok(value) = HeaderValue::from_str(&csrf) {
                headers.insert(self.csrf_header.clone(), value);
            }
        }

        headers.extend(header_overrides(overrides)?);

        let builder = self.client.request(method.clone(), url).headers(headers);
        Ok(match payload {
            Some(body) => builder.json(body),
            None => builder,
        })
    }

    async fn attempt(&self, request: reqwest::RequestBuilder) -> Result<ApiResponse, TransportError> {
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::network(e.to_string()))?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::network(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(TransportError::status(status, parse_error_body(&bytes)));
        }

        let body = if bytes.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            Some(
                serde_json::from_slice(&bytes)
                    .map_err(|e| TransportError::decode(Some(status), e.to_string()))?,
            )
        };
        Ok(ApiResponse { status, body })
    }

    async fn backoff(&self, delay: Duration, cancel: &CancellationToken) -> Result<(), ClientError> {
        if delay.is_zero() {
            return Ok(());
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// Token rotation piggybacked on any endpoint.
    fn commit_credential(&self, response: &ApiResponse) -> Result<(), ClientError> {
        let token = response
            .body
            .as_ref()
            .and_then(|b| b.get(self.credentials.key()))
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty());
        if let Some(token) = token {
            self.credentials.set(token)?;
            log::info!("Credential refreshed from response");
        }
        Ok(())
    }
}

/// Parse caller-supplied header overrides.
///
/// Query operations call this before dispatch so a malformed header is
/// reported as a [`ValidationError`] without issuing a request.
pub fn header_overrides(overrides: &[(String, String)]) -> Result<HeaderMap, ValidationError> {
    let mut headers = HeaderMap::new();
    for (name, value) in overrides {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ValidationError::new(format!("header {name}"), e.to_string()))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ValidationError::new(format!("header {name}"), e.to_string()))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// Error bodies are kept even when they are not JSON.
fn parse_error_body(bytes: &[u8]) -> Option<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    serde_json::from_slice(bytes)
        .ok()
        .or_else(|| Some(Value::String(String::from_utf8_lossy(bytes).into_owned())))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::CredentialBackend;
    use crate::error::TransportErrorKind;

    fn client_for(server: &MockServer) -> ApiClient {
        let config = ClientConfig::default()
            .with_base_url(&server.uri())
            .with_credential_backend(CredentialBackend::Memory);
        let credentials = Arc::new(CredentialStore::from_config(&config).unwrap());
        ApiClient::new(&config, credentials).unwrap()
    }

    #[tokio::test]
    async fn attaches_no_authorization_without_credential() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client
            .send(Method::GET, "/items", None, &[], &CancellationToken::new())
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn attaches_bearer_and_csrf_headers_with_credential() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .and(header("authorization", "Bearer abc"))
            .and(header("x-xsrf-token", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.credentials().set("abc").unwrap();
        client
            .send(Method::GET, "/items", None, &[], &CancellationToken::new())
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let cookie = requests[0]
            .headers
            .get("cookie")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(cookie.contains("token=abc"), "cookie header was {cookie:?}");
    }

    #[tokio::test]
    async fn commits_credential_from_successful_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/expense-tracker/user/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "fresh"})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let payload = json!({"email": "a@b.c", "password": "pw"});
        client
            .send(
                Method::POST,
                "/expense-tracker/user/login",
                Some(&payload),
                &[],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let store = client.credentials();
        assert_eq!(store.durable_value().unwrap().as_deref(), Some("fresh"));
        assert_eq!(store.cookie_value().as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn rotates_credential_on_any_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/profile"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"name": "ada", "token": "rotated"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.credentials().set("old").unwrap();
        client
            .send(Method::GET, "/profile", None, &[], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(client.credentials().get().unwrap().as_deref(), Some("rotated"));
    }

    #[tokio::test]
    async fn network_failure_makes_four_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .expect(4)
            .mount(&server)
            .await;

        let config = ClientConfig::default()
            .with_base_url(&server.uri())
            .with_credential_backend(CredentialBackend::Memory)
            .with_request_timeout(Duration::from_millis(50));
        let credentials = Arc::new(CredentialStore::from_config(&config).unwrap());
        let client = ApiClient::new(&config, credentials).unwrap();

        let err = client
            .send(Method::GET, "/slow", None, &[], &CancellationToken::new())
            .await
            .unwrap_err();
        let transport = err.as_transport().expect("transport error");
        assert_eq!(transport.kind, TransportErrorKind::Network);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/items/1"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "missing"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .send(Method::PUT, "/items/1", Some(&json!({})), &[], &CancellationToken::new())
            .await
            .unwrap_err();
        let transport = err.as_transport().unwrap();
        assert_eq!(transport.status, Some(404));
        assert_eq!(transport.body, Some(json!({"detail": "missing"})));
    }

    #[tokio::test]
    async fn empty_success_body_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/items/1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let response = client
            .send(Method::PUT, "/items/1", None, &[], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.status, 204);
        assert_eq!(response.body, None);
    }

    #[tokio::test]
    async fn header_overrides_replace_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .and(header("content-type", "text/plain"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let overrides = vec![("Content-Type".to_string(), "text/plain".to_string())];
        client
            .send(
                Method::POST,
                "/upload",
                Some(&json!("raw")),
                &overrides,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn invalid_header_override_is_rejected_before_dispatch() {
        let server = MockServer::start().await;
        let client = client_for(&server);
        let overrides = vec![("bad header".to_string(), "x".to_string())];

        let err = client
            .send(Method::GET, "/items", None, &overrides, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancellation_aborts_in_flight_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = client
            .send(Method::GET, "/slow", None, &[], &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
