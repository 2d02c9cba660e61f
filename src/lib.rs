//! propdesk: client library for the property-management backend.
//!
//! The core is [`auth::SessionManager`], which keeps the access/refresh token
//! pair in a [`store::TokenStore`] and refreshes it on demand.
//! [`api::ApiClient`] attaches the token to every call and recovers from
//! expired or rejected tokens.

#![deny(clippy::all)]

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod store;

pub use api::ApiClient;
pub use auth::{AuthClient, SessionManager, SessionState};
pub use error::{ApiError, AppError, AuthError, ErrorPayload, StoreError};
pub use store::{FileCookieJar, MemoryCookieJar, TokenStore};
