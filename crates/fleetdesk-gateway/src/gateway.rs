//! Request gateway.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use fleetdesk_config::{ApiConfig, RequestConfig};
use fleetdesk_protocols::{CredentialSource, RequestError, SessionInvalidator};

use crate::envelope::{Envelope, error_message, parse_envelope};
use crate::retry::RetryPolicy;

/// Per-call overrides.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Force retry on or off. By default only GET is retried.
    pub retry: Option<bool>,
    /// Per-attempt timeout, replacing the configured one.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// Declare the request safe to repeat, opting it into retry.
    pub fn idempotent() -> Self {
        Self {
            retry: Some(true),
            timeout: None,
        }
    }

    pub fn no_retry() -> Self {
        Self {
            retry: Some(false),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone)]
enum Payload {
    Empty,
    Json(Value),
    Bytes { data: Vec<u8>, content_type: String },
}

/// Authenticated HTTP front door.
///
/// Holds no state across calls beyond configuration: the credential is read
/// from the [`CredentialSource`] on every attempt.
pub struct RequestGateway {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
    credentials: Arc<dyn CredentialSource>,
    invalidator: Arc<dyn SessionInvalidator>,
}

impl RequestGateway {
    pub fn new(
        api: &ApiConfig,
        request: &RequestConfig,
        credentials: Arc<dyn CredentialSource>,
        invalidator: Arc<dyn SessionInvalidator>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: api.base_url.clone(),
            timeout: request.timeout(),
            retry: RetryPolicy::from(request),
            credentials,
            invalidator,
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub async fn get(&self, endpoint: &str) -> Result<Envelope, RequestError> {
        self.request(Method::GET, endpoint, None, RequestOptions::default())
            .await
    }

    pub async fn post(&self, endpoint: &str, body: &Value) -> Result<Envelope, RequestError> {
        self.request(Method::POST, endpoint, Some(body), RequestOptions::default())
            .await
    }

    pub async fn put(&self, endpoint: &str, body: &Value) -> Result<Envelope, RequestError> {
        self.request(Method::PUT, endpoint, Some(body), RequestOptions::default())
            .await
    }

    pub async fn delete(&self, endpoint: &str) -> Result<Envelope, RequestError> {
        self.request(Method::DELETE, endpoint, None, RequestOptions::default())
            .await
    }

    /// GET and decode the envelope's data into `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, RequestError> {
        self.get(endpoint).await?.into_data()
    }

    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
        options: RequestOptions,
    ) -> Result<Envelope, RequestError> {
        let payload = match body {
            Some(value) => Payload::Json(value.clone()),
            None => Payload::Empty,
        };
        self.execute(method, endpoint, payload, options).await
    }

    /// Send a raw body, e.g. a file upload. Not retried unless `options`
    /// says so.
    pub async fn send_bytes(
        &self,
        method: Method,
        endpoint: &str,
        data: Vec<u8>,
        content_type: &str,
        options: RequestOptions,
    ) -> Result<Envelope, RequestError> {
        let payload = Payload::Bytes {
            data,
            content_type: content_type.to_string(),
        };
        self.execute(method, endpoint, payload, options).await
    }

    /// GET whose body the caller streams itself. Status handling and retry
    /// apply up to the response headers; the returned response is 2xx.
    ///
    /// The configured timeout is not applied, since it would bound the whole
    /// body transfer.
    pub async fn open_stream(&self, endpoint: &str) -> Result<reqwest::Response, RequestError> {
        let url = self.resolve(endpoint)?;
        let label = format!("GET {}", endpoint);
        self.retry
            .run(&label, || async {
                let (response, sent_token) = self
                    .send_once(Method::GET, url.clone(), &Payload::Empty, None)
                    .await?;
                self.check_status(endpoint, response, sent_token.as_deref()).await
            })
            .await
    }

    async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        payload: Payload,
        options: RequestOptions,
    ) -> Result<Envelope, RequestError> {
        let url = self.resolve(endpoint)?;
        let timeout = options.timeout.unwrap_or(self.timeout);
        let retry = if options.retry.unwrap_or(method == Method::GET) {
            self.retry.clone()
        } else {
            RetryPolicy::none()
        };

        let label = format!("{} {}", method, endpoint);
        retry
            .run(&label, || async {
                let (response, sent_token) = self
                    .send_once(method.clone(), url.clone(), &payload, Some(timeout))
                    .await?;
                let response = self
                    .check_status(endpoint, response, sent_token.as_deref())
                    .await?;
                let status = response.status().as_u16();
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| transport_error(e, timeout))?;
                debug!("{} answered {} ({} bytes)", label, status, body.len());
                parse_envelope(status, &body)
            })
            .await
    }

    /// Send one attempt. Returns the response together with the token the
    /// attempt carried.
    async fn send_once(
        &self,
        method: Method,
        url: Url,
        payload: &Payload,
        timeout: Option<Duration>,
    ) -> Result<(reqwest::Response, Option<String>), RequestError> {
        let mut builder = self.client.request(method, url);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let token = self.credentials.bearer_token();
        if let Some(token) = &token {
            builder = builder.bearer_auth(token);
        }
        builder = match payload {
            Payload::Empty => builder,
            Payload::Json(value) => builder.json(value),
            Payload::Bytes { data, content_type } => builder
                .header(reqwest::header::CONTENT_TYPE, content_type.as_str())
                .body(data.clone()),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(e, timeout.unwrap_or(self.timeout)))?;
        Ok((response, token))
    }

    /// Pass 2xx through. A 401 on a request that carried a token invalidates
    /// that token before the error is returned. An anonymous 401 leaves the
    /// session alone.
    async fn check_status(
        &self,
        endpoint: &str,
        response: reqwest::Response,
        sent_token: Option<&str>,
    ) -> Result<reqwest::Response, RequestError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let fallback = status.canonical_reason().unwrap_or("request failed");
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                debug!("Could not read {} error body from {}: {}", status, endpoint, e);
                Default::default()
            }
        };
        let message = error_message(&body, fallback);

        if status == StatusCode::UNAUTHORIZED {
            match sent_token {
                Some(token) => {
                    warn!("{} answered 401, clearing session", endpoint);
                    self.invalidator
                        .invalidate(token, &format!("401 from {}", endpoint))
                        .await;
                }
                None => debug!("{} answered 401 to an anonymous request", endpoint),
            }
            return Err(RequestError::Unauthorized(message));
        }

        Err(RequestError::Status {
            status: status.as_u16(),
            message,
        })
    }

    /// Absolute http(s) URLs are used as-is; anything else is joined to the
    /// configured base.
    fn resolve(&self, endpoint: &str) -> Result<Url, RequestError> {
        let raw = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                endpoint.trim_start_matches('/')
            )
        };
        Url::parse(&raw).map_err(|e| RequestError::InvalidEndpoint(format!("{}: {}", endpoint, e)))
    }
}

fn transport_error(e: reqwest::Error, timeout: Duration) -> RequestError {
    if e.is_timeout() {
        RequestError::Timeout(timeout.as_millis() as u64)
    } else if e.is_decode() {
        RequestError::Parse(e.to_string())
    } else {
        RequestError::Network(e.to_string())
    }
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;
