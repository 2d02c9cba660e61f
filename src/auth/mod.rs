//! Authentication module.
//!
//! Provides the login/refresh/logout endpoint client, client-side JWT
//! inspection, and the session manager that keeps one usable access token.

pub mod client;
pub mod jwt;
pub mod token_manager;

pub use client::AuthClient;
pub use token_manager::{SessionManager, SessionState};
