//! Property-management backend API.
//!
//! This module provides:
//! - An authenticated client with transparent token refresh
//! - Typed models for the current user and resource collections
//! - A short-lived cache for the current user

pub mod cache;
pub mod client;
pub mod models;

pub use cache::UserCache;
pub use client::{ApiClient, LoginRedirect, DEFAULT_LOGIN_PATH};
pub use models::{RecordId, Resource, Role, User};
