//! Cookie-style storage for the session tokens.
//!
//! Tokens are kept as two expiring cookies. The `TokenStore` trait lets the
//! session manager run against an in-process jar or a jar persisted on disk.

pub mod file;
pub mod memory;
pub mod secure;

pub use file::FileCookieJar;
pub use memory::MemoryCookieJar;
pub use secure::SecureString;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::StoreError;

/// Cookie holding the short-lived access token.
pub const ACCESS_COOKIE: &str = "access_token";
/// Cookie holding the refresh token.
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Lifetime of the access cookie.
pub fn access_cookie_ttl() -> Duration {
    Duration::hours(2)
}

/// Lifetime of the refresh cookie.
pub fn refresh_cookie_ttl() -> Duration {
    Duration::days(7)
}

/// Storage backend for session cookies.
pub trait TokenStore: Send + Sync {
    /// Read a cookie value. Expired cookies read as `None`.
    fn get(&self, name: &str) -> Result<Option<Zeroizing<String>>, StoreError>;

    /// Write a cookie that expires after `ttl`.
    fn set(&self, name: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Remove a cookie. Removing a missing cookie is not an error.
    fn remove(&self, name: &str) -> Result<(), StoreError>;
}

/// A stored cookie with the attributes the session policy requires.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    /// URL-encoded value.
    pub value: String,
    pub path: String,
    pub secure: bool,
    pub same_site: SameSite,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl Cookie {
    /// Build a session cookie: `path=/`, `secure`, `samesite=strict`.
    pub fn session(name: &str, raw_value: &str, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(),
            value: urlencoding::encode(raw_value).into_owned(),
            path: "/".to_string(),
            secure: true,
            same_site: SameSite::Strict,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// The decoded value.
    pub fn decoded_value(&self) -> Result<Zeroizing<String>, StoreError> {
        urlencoding::decode(&self.value)
            .map(|v| Zeroizing::new(v.into_owned()))
            .map_err(|e| StoreError::RetrieveFailed(format!("{}: {}", self.name, e)))
    }
}

impl std::fmt::Debug for Cookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cookie")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .field("path", &self.path)
            .field("secure", &self.secure)
            .field("same_site", &self.same_site)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
