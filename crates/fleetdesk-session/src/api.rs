//! Authentication endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use fleetdesk_config::{ApiConfig, RequestConfig};
use fleetdesk_protocols::{AuthError, UserProfile};

/// Credential and profile returned by a successful login.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginGrant {
    pub token: String,
    pub user: UserProfile,
}

/// The authentication endpoints. None of these calls are retried.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, identifier: &str, secret: &str) -> Result<LoginGrant, AuthError>;

    /// Confirm `token` is still valid and return the current profile.
    async fn verify(&self, token: &str) -> Result<UserProfile, AuthError>;

    /// Tell the server the token is no longer used.
    async fn logout(&self, token: &str) -> Result<(), AuthError>;
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    identifier: &'a str,
    secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    user: Option<UserProfile>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl AuthResponse {
    fn succeeded(&self) -> bool {
        self.success.unwrap_or(true)
    }

    fn reason(&self, fallback: &str) -> String {
        self.message
            .clone()
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// `AuthApi` over HTTP.
pub struct HttpAuthApi {
    client: reqwest::Client,
    base_url: String,
    login_path: String,
    verify_path: String,
    logout_path: String,
    timeout: Duration,
}

impl HttpAuthApi {
    pub fn new(api: &ApiConfig, request: &RequestConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: api.base_url.trim_end_matches('/').to_string(),
            login_path: api.login_path.clone(),
            verify_path: api.verify_path.clone(),
            logout_path: api.logout_path.clone(),
            timeout: request.timeout(),
        }
    }

    /// Reuse an existing client, e.g. one shared with the request gateway.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn exchange(&self, request: reqwest::RequestBuilder) -> Result<(StatusCode, String), AuthError> {
        let response = request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        Ok((status, body))
    }

    fn transport_error(&self, e: reqwest::Error) -> AuthError {
        if e.is_timeout() {
            AuthError::Timeout(self.timeout.as_millis() as u64)
        } else {
            AuthError::Network(e.to_string())
        }
    }
}

fn parse_body(body: &str) -> Result<AuthResponse, AuthError> {
    serde_json::from_str(body).map_err(|e| AuthError::Protocol(e.to_string()))
}

/// Best-effort message from an error body that may not be JSON at all.
fn failure_message(body: &str, fallback: &str) -> String {
    match serde_json::from_str::<AuthResponse>(body) {
        Ok(response) => response.reason(fallback),
        Err(_) if !body.trim().is_empty() => body.trim().to_string(),
        Err(_) => fallback.to_string(),
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, identifier: &str, secret: &str) -> Result<LoginGrant, AuthError> {
        let request = self
            .client
            .post(self.endpoint(&self.login_path))
            .json(&LoginRequest { identifier, secret });
        let (status, body) = self.exchange(request).await?;
        debug!("Login endpoint answered {}", status);

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AuthError::InvalidCredentials(failure_message(&body, "invalid credentials")));
        }
        if status.is_server_error() {
            return Err(AuthError::Server {
                status: status.as_u16(),
                message: failure_message(&body, "server error"),
            });
        }

        let response = parse_body(&body)?;
        if !status.is_success() || !response.succeeded() {
            return Err(AuthError::InvalidCredentials(response.reason("invalid credentials")));
        }

        let token = response
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::Protocol("login response carried no token".to_string()))?;
        let user = response
            .user
            .ok_or_else(|| AuthError::Protocol("login response carried no user".to_string()))?;

        Ok(LoginGrant { token, user })
    }

    async fn verify(&self, token: &str) -> Result<UserProfile, AuthError> {
        let request = self
            .client
            .post(self.endpoint(&self.verify_path))
            .bearer_auth(token);
        let (status, body) = self.exchange(request).await?;
        debug!("Verify endpoint answered {}", status);

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AuthError::SessionExpired(failure_message(&body, "token rejected")));
        }
        if status.is_server_error() {
            return Err(AuthError::Server {
                status: status.as_u16(),
                message: failure_message(&body, "server error"),
            });
        }

        let response = parse_body(&body)?;
        if !status.is_success() || !response.succeeded() {
            return Err(AuthError::SessionExpired(response.reason("token rejected")));
        }

        response
            .user
            .ok_or_else(|| AuthError::Protocol("verify response carried no user".to_string()))
    }

    async fn logout(&self, token: &str) -> Result<(), AuthError> {
        let request = self
            .client
            .post(self.endpoint(&self.logout_path))
            .bearer_auth(token);
        let (status, body) = self.exchange(request).await?;

        if status.is_success() {
            Ok(())
        } else {
            Err(AuthError::Server {
                status: status.as_u16(),
                message: failure_message(&body, "logout rejected"),
            })
        }
    }
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
