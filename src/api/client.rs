//! Authenticated client for the property-management REST API.
//!
//! Every call goes through two interception steps around the HTTP request:
//! an expired access token is refreshed before the request is sent, and a
//! 401 response triggers one refresh and one replay of the request.

use std::sync::{Arc, Mutex, MutexGuard};

use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use super::cache::UserCache;
use super::models::{ListResponse, RecordId, Resource, User};
use crate::auth::client::{HTTP_CONNECT_TIMEOUT, HTTP_TIMEOUT};
use crate::auth::token_manager::SessionManager;
use crate::error::{ApiError, AppError, ErrorPayload, StoreError};
use crate::store::SecureString;

/// Where to send the user when the session cannot be renewed.
pub const DEFAULT_LOGIN_PATH: &str = "/auth/login";

const ME_PATH: &str = "api/auth/me/";

/// Callback invoked with the login path when a request needs a new sign-in.
pub type LoginRedirect = Arc<dyn Fn(&str) + Send + Sync>;

/// Property-management API client.
pub struct ApiClient {
    base_url: Url,
    http_client: reqwest::Client,
    session: Arc<SessionManager>,
    login_path: String,
    on_login_required: Option<LoginRedirect>,
    user_cache: Mutex<UserCache>,
}

impl ApiClient {
    /// Create a new API client with the default timeouts.
    pub fn new(base_url: Url, session: Arc<SessionManager>) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .build()?;

        Ok(Self::with_http_client(base_url, http_client, session))
    }

    pub fn with_http_client(
        base_url: Url,
        http_client: reqwest::Client,
        session: Arc<SessionManager>,
    ) -> Self {
        Self {
            base_url,
            http_client,
            session,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            on_login_required: None,
            user_cache: Mutex::new(UserCache::new()),
        }
    }

    /// Override the login redirect target.
    pub fn with_login_path(mut self, login_path: impl Into<String>) -> Self {
        self.login_path = login_path.into();
        self
    }

    /// Register a callback for forced sign-in redirects.
    pub fn on_login_required(mut self, redirect: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_login_required = Some(Arc::new(redirect));
        self
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    fn user_cache(&self) -> MutexGuard<'_, UserCache> {
        self.user_cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sign in through the session manager, dropping any cached user.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<String, AppError> {
        self.user_cache().invalidate();
        self.session.login(identifier, password).await
    }

    /// Sign out through the session manager, dropping any cached user.
    pub async fn logout(&self) -> Result<(), StoreError> {
        self.user_cache().invalidate();
        self.session.logout().await
    }

    fn login_required(&self) -> ApiError {
        warn!("Session cannot be renewed, redirecting to {}", self.login_path);
        if let Some(redirect) = &self.on_login_required {
            redirect(&self.login_path);
        }
        self.session_error(ApiError::LoginRequired {
            redirect_to: self.login_path.clone(),
        })
    }

    fn session_error(&self, error: ApiError) -> ApiError {
        self.user_cache().observe(&error);
        error
    }

    /// Token for the next request, refreshing first when the cached one has expired.
    async fn authorize(&self) -> Result<SecureString, ApiError> {
        let observed = self.session.generation();
        if let Some(token) = self.session.get_access_token() {
            return Ok(token);
        }

        debug!("Access token missing or expired, refreshing before request");
        match self.session.refresh_since(observed).await {
            Some(token) => Ok(token),
            None => Err(self.login_required()),
        }
    }

    async fn dispatch(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&Value>,
        token: &SecureString,
    ) -> Result<Response, ApiError> {
        let mut request = self
            .http_client
            .request(method.clone(), url.clone())
            .bearer_auth(token.as_str());
        if let Some(body) = body {
            request = request.json(body);
        }

        Ok(request.send().await?)
    }

    /// Send an authenticated request, replaying it at most once after a 401.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response, ApiError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ApiError::ParseFailed(format!("invalid path {:?}: {}", path, e)))?;

        let token = self.authorize().await?;
        let sent_at = self.session.generation();
        debug!("{} {}", method, url.path());
        let response = self.dispatch(&method, &url, body, &token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!("{} {} returned 401, refreshing and retrying once", method, url.path());
        let Some(token) = self.session.refresh_since(sent_at).await else {
            return Err(self.login_required());
        };

        let retried = self.dispatch(&method, &url, body, &token).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            warn!("{} {} still unauthorized after refresh", method, url.path());
            return Err(self.session_error(ApiError::Unauthorized));
        }

        Ok(retried)
    }

    /// Fetch the signed-in user, bypassing the cache.
    pub async fn me(&self) -> Result<User, ApiError> {
        let response = self.send(Method::GET, ME_PATH, None).await?;
        let user: User = read_json(response).await?;

        info!("Fetched profile for {}", user.display_name_or_username());
        self.user_cache().set(user.clone());
        Ok(user)
    }

    /// The signed-in user, served from cache while fresh.
    pub async fn current_user(&self) -> Result<User, ApiError> {
        let owner = self.session.claims().and_then(|claims| claims.user_id);
        let cached = self.user_cache().get(owner.as_ref()).cloned();
        if let Some(user) = cached {
            return Ok(user);
        }
        self.me().await
    }

    /// List every record of a collection.
    pub async fn list(&self, resource: Resource) -> Result<Vec<Value>, ApiError> {
        let response = self
            .send(Method::GET, &resource.collection_path(), None)
            .await?;
        let list: ListResponse = read_json(response).await?;
        let records = list.into_records();

        debug!("Fetched {} {}", records.len(), resource);
        Ok(records)
    }

    pub async fn get(&self, resource: Resource, id: &RecordId) -> Result<Value, ApiError> {
        let response = self
            .send(Method::GET, &resource.record_path(id), None)
            .await?;
        read_json(response).await
    }

    pub async fn create(&self, resource: Resource, body: &Value) -> Result<Value, ApiError> {
        let response = self
            .send(Method::POST, &resource.collection_path(), Some(body))
            .await?;
        let created: Value = read_json(response).await?;

        info!("Created {} record", resource);
        Ok(created)
    }

    /// Partially update a record.
    pub async fn update(
        &self,
        resource: Resource,
        id: &RecordId,
        body: &Value,
    ) -> Result<Value, ApiError> {
        let response = self
            .send(Method::PATCH, &resource.record_path(id), Some(body))
            .await?;
        let updated: Value = read_json(response).await?;

        info!("Updated {} {}", resource, id);
        Ok(updated)
    }

    pub async fn delete(&self, resource: Resource, id: &RecordId) -> Result<(), ApiError> {
        let response = self
            .send(Method::DELETE, &resource.record_path(id), None)
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(rejected(status, response).await);
        }

        info!("Deleted {} {}", resource, id);
        Ok(())
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        return Err(rejected(status, response).await);
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ApiError::ParseFailed(e.to_string()))
}

async fn rejected(status: StatusCode, response: Response) -> ApiError {
    let body = response.text().await.unwrap_or_default();
    let payload = ErrorPayload::from_body(status, &body);
    debug!("Request rejected: HTTP {} - {}", status, payload);

    ApiError::Rejected {
        status: status.as_u16(),
        payload,
    }
}
