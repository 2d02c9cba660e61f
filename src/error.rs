//! Error types for the propdesk client.
//!
//! Uses `thiserror` for library-style errors with automatic `Display` and `Error` implementations.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Top-level application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Token store error: {0}")]
    Store(#[from] StoreError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

/// Authentication-related errors.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Logout failed: {0}")]
    LogoutFailed(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

/// Token store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to store cookie: {0}")]
    StoreFailed(String),

    #[error("Failed to read cookie: {0}")]
    RetrieveFailed(String),

    #[error("Failed to delete cookie: {0}")]
    DeleteFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by authenticated API calls.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request rejected (HTTP {status}): {payload}")]
    Rejected { status: u16, payload: ErrorPayload },

    #[error("Unauthorized (401): request was rejected after a token refresh")]
    Unauthorized,

    #[error("Login required, redirecting to {redirect_to}")]
    LoginRequired { redirect_to: String },

    #[error("Failed to parse API response: {0}")]
    ParseFailed(String),
}

/// Field name to messages, as returned by form validation endpoints.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Parsed body of a non-2xx API response.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorPayload {
    /// Per-field validation errors.
    Validation(FieldErrors),
    /// A single human-readable message.
    Message(String),
}

impl ErrorPayload {
    /// Parse an error body.
    ///
    /// Objects carrying `message`, `detail` or `error` become a `Message`; other
    /// objects whose values are strings or string arrays become `Validation`.
    /// Anything else falls back to the raw text, or the status reason when empty.
    pub fn from_body(status: reqwest::StatusCode, body: &str) -> Self {
        if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(body) {
            for key in ["message", "detail", "error"] {
                if let Some(serde_json::Value::String(message)) = map.get(key) {
                    return Self::Message(message.clone());
                }
            }

            let mut fields = FieldErrors::new();
            for (field, value) in &map {
                let messages = match value {
                    serde_json::Value::String(s) => vec![s.clone()],
                    serde_json::Value::Array(items) => items
                        .iter()
                        .filter_map(|item| item.as_str().map(str::to_string))
                        .collect(),
                    _ => continue,
                };
                if !messages.is_empty() {
                    fields.insert(field.clone(), messages);
                }
            }
            if !fields.is_empty() {
                return Self::Validation(fields);
            }
        }

        let text = body.trim();
        if text.is_empty() || text.starts_with('{') || text.starts_with('<') {
            Self::Message(
                status
                    .canonical_reason()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            )
        } else {
            Self::Message(text.to_string())
        }
    }

    /// The message shown to the user.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(message) => f.write_str(message),
            Self::Validation(fields) => {
                let parts: Vec<String> = fields
                    .iter()
                    .map(|(field, messages)| format!("{}: {}", field, messages.join(" ")))
                    .collect();
                f.write_str(&parts.join("; "))
            }
        }
    }
}

impl ApiError {
    /// Returns true if this error should trigger a sign-out.
    pub fn requires_sign_out(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::LoginRequired { .. })
    }
}

impl AppError {
    /// Returns a user-friendly message for display.
    pub fn user_message(&self) -> String {
        match self {
            Self::Auth(AuthError::LoginFailed(msg)) => format!("Sign-in failed: {}", msg),
            Self::Auth(AuthError::TokenRefreshFailed(_)) => {
                "Session expired. Please sign in again.".to_string()
            }
            Self::Auth(AuthError::InvalidToken(_)) => {
                "Stored credentials are invalid. Please sign in again.".to_string()
            }
            Self::Store(_) => "Failed to access saved credentials.".to_string(),
            Self::Api(ApiError::Rejected { payload, .. }) => payload.message(),
            Self::Api(ApiError::Unauthorized) => {
                "Authentication expired. Sign in again.".to_string()
            }
            Self::Api(ApiError::LoginRequired { redirect_to }) => {
                format!("Please sign in ({}).", redirect_to)
            }
            Self::Api(ApiError::Network(_)) => "Network error. Check your connection.".to_string(),
            _ => "An error occurred. Please try again.".to_string(),
        }
    }

    /// Returns true if this error should trigger a sign-out.
    pub fn requires_sign_out(&self) -> bool {
        match self {
            Self::Auth(AuthError::TokenRefreshFailed(_)) => true,
            Self::Api(e) => e.requires_sign_out(),
            _ => false,
        }
    }
}
