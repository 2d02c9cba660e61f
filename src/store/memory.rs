//! In-process cookie jar.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{Duration, Utc};
use zeroize::Zeroizing;

use super::{Cookie, TokenStore};
use crate::error::StoreError;

/// Cookie jar that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    cookies: Mutex<HashMap<String, Cookie>>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unexpired cookies.
    pub fn len(&self) -> usize {
        let now = Utc::now();
        self.cookies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|c| !c.is_expired_at(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a fully built cookie, e.g. one with an explicit expiry.
    pub fn insert(&self, cookie: Cookie) {
        self.cookies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(cookie.name.clone(), cookie);
    }
}

impl TokenStore for MemoryCookieJar {
    fn get(&self, name: &str) -> Result<Option<Zeroizing<String>>, StoreError> {
        let mut cookies = self.cookies.lock().unwrap_or_else(|e| e.into_inner());
        match cookies.get(name) {
            Some(cookie) if cookie.is_expired_at(Utc::now()) => {
                cookies.remove(name);
                Ok(None)
            }
            Some(cookie) => cookie.decoded_value().map(Some),
            None => Ok(None),
        }
    }

    fn set(&self, name: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.insert(Cookie::session(name, value, ttl, Utc::now()));
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), StoreError> {
        self.cookies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name);
        Ok(())
    }
}
