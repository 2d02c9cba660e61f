//! HTTP client for the login, token refresh and logout endpoints.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use url::Url;

use crate::error::{AuthError, ErrorPayload};
use crate::store::secure::TokenPair;

/// HTTP request timeout.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// HTTP connection timeout.
pub const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const LOGIN_PATH: &str = "api/auth/login/";
const REFRESH_PATH: &str = "api/token/refresh/";
const LOGOUT_PATH: &str = "api/auth/logout/";

/// Client for the authentication endpoints.
#[derive(Debug, Clone)]
pub struct AuthClient {
    base_url: Url,
    http_client: reqwest::Client,
}

impl AuthClient {
    /// Create a new client with the default timeouts.
    pub fn new(base_url: Url) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .build()?;

        Ok(Self::with_http_client(base_url, http_client))
    }

    /// Create a client around an existing `reqwest::Client`.
    pub fn with_http_client(base_url: Url, http_client: reqwest::Client) -> Self {
        Self {
            base_url,
            http_client,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, String> {
        self.base_url.join(path).map_err(|e| e.to_string())
    }

    /// Exchange credentials for an access/refresh pair.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let url = self.endpoint(LOGIN_PATH).map_err(AuthError::LoginFailed)?;

        debug!("Signing in as {}", identifier);

        let response = self
            .http_client
            .post(url)
            .json(&LoginRequest {
                identifier,
                password,
            })
            .send()
            .await
            .map_err(|e| AuthError::LoginFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let payload = error_payload(status, response).await;
            // Log status only, the body may echo credentials back.
            error!("Login failed: HTTP {}", status);
            return Err(AuthError::LoginFailed(payload.message()));
        }

        response
            .json::<LoginResponse>()
            .await
            .map_err(|e| AuthError::LoginFailed(format!("Unexpected login response: {}", e)))
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let url = self.endpoint(REFRESH_PATH).map_err(AuthError::TokenRefreshFailed)?;

        let response = self
            .http_client
            .post(url)
            .json(&RefreshRequest {
                refresh: refresh_token,
            })
            .send()
            .await
            .map_err(|e| AuthError::TokenRefreshFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let payload = error_payload(status, response).await;
            error!("Token refresh failed: HTTP {} - {}", status, payload);
            return Err(AuthError::TokenRefreshFailed(format!(
                "HTTP {}",
                status.as_u16()
            )));
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| AuthError::TokenRefreshFailed(e.to_string()))?;

        Ok(body.tokens.access)
    }

    /// Revoke the refresh token on the server.
    pub async fn logout(&self, access_token: &str, refresh_token: &str) -> Result<(), AuthError> {
        let url = self.endpoint(LOGOUT_PATH).map_err(AuthError::LogoutFailed)?;

        let response = self
            .http_client
            .post(url)
            .bearer_auth(access_token)
            .json(&LogoutRequest { refresh_token })
            .send()
            .await
            .map_err(|e| AuthError::LogoutFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AuthError::LogoutFailed(format!("HTTP {}", status.as_u16())));
        }

        Ok(())
    }
}

async fn error_payload(status: StatusCode, response: reqwest::Response) -> ErrorPayload {
    let body = response.text().await.unwrap_or_default();
    ErrorPayload::from_body(status, &body)
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Serialize)]
struct LogoutRequest<'a> {
    refresh_token: &'a str,
}

/// Response of the login endpoint.
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub message: String,
    pub tokens: TokenPair,
}

#[derive(Deserialize)]
struct RefreshResponse {
    tokens: AccessOnly,
}

#[derive(Deserialize)]
struct AccessOnly {
    access: String,
}
