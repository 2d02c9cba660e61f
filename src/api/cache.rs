//! Cache for the signed-in user profile.

use chrono::{DateTime, Duration, Utc};

use super::models::{RecordId, User};
use crate::error::ApiError;

/// Minutes a fetched profile is served without asking the backend again.
pub const USER_CACHE_TTL_MINUTES: i64 = 5;

#[derive(Debug, Clone)]
struct Entry {
    user: User,
    fetched_at: DateTime<Utc>,
}

/// Holds the last `/me` response.
///
/// An entry is only served while it is younger than the TTL and belongs to
/// the account named by the current access token.
#[derive(Debug, Clone)]
pub struct UserCache {
    entry: Option<Entry>,
    ttl: Duration,
}

impl Default for UserCache {
    fn default() -> Self {
        Self::with_ttl(Duration::minutes(USER_CACHE_TTL_MINUTES))
    }
}

impl UserCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self { entry: None, ttl }
    }

    /// The cached user for the account `owner`, if still fresh.
    ///
    /// Tokens without a `user_id` claim cannot contradict the entry, so
    /// `None` only applies the TTL.
    pub fn get(&self, owner: Option<&RecordId>) -> Option<&User> {
        self.get_at(owner, Utc::now())
    }

    fn get_at(&self, owner: Option<&RecordId>, now: DateTime<Utc>) -> Option<&User> {
        let entry = self.entry.as_ref()?;
        if now - entry.fetched_at >= self.ttl {
            return None;
        }
        match owner {
            Some(id) if *id != entry.user.id => None,
            _ => Some(&entry.user),
        }
    }

    pub fn set(&mut self, user: User) {
        self.entry = Some(Entry {
            user,
            fetched_at: Utc::now(),
        });
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    /// Drop the entry if `error` ends the session.
    pub fn observe(&mut self, error: &ApiError) {
        if error.requires_sign_out() {
            self.invalidate();
        }
    }
}
