//! Session token lifecycle: storage, validity checks and refresh.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};

use crate::auth::client::AuthClient;
use crate::auth::jwt::{self, Claims};
use crate::error::{AppError, StoreError};
use crate::store::{
    access_cookie_ttl, refresh_cookie_ttl, SecureString, TokenStore, ACCESS_COOKIE, REFRESH_COOKIE,
};

/// Where the session stands, derived from the stored tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing stored.
    NoSession,
    /// Access token present and unexpired.
    ValidAccess,
    /// Access token gone or expired, refresh token still usable.
    ExpiredAccessValidRefresh,
    /// Token material present but neither token is usable.
    FullyExpired,
}

impl SessionState {
    pub fn is_authenticated(self) -> bool {
        matches!(self, Self::ValidAccess | Self::ExpiredAccessValidRefresh)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NoSession => "signed out",
            Self::ValidAccess => "signed in",
            Self::ExpiredAccessValidRefresh => "signed in (access token needs refresh)",
            Self::FullyExpired => "session expired",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy)]
enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn cookie(self) -> &'static str {
        match self {
            Self::Access => ACCESS_COOKIE,
            Self::Refresh => REFRESH_COOKIE,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        })
    }
}

/// In-memory copy of the stored cookies.
#[derive(Debug, Default)]
struct CachedTokens {
    access: Option<SecureString>,
    refresh: Option<SecureString>,
}

impl CachedTokens {
    fn slot(&mut self, kind: TokenKind) -> &mut Option<SecureString> {
        match kind {
            TokenKind::Access => &mut self.access,
            TokenKind::Refresh => &mut self.refresh,
        }
    }
}

/// Owns the session tokens for one API client.
///
/// The in-memory cache always mirrors the cookie store: it is only filled by
/// `set_tokens` or by reading a cookie back.
pub struct SessionManager {
    auth_client: AuthClient,
    store: Arc<dyn TokenStore>,
    memory: Mutex<CachedTokens>,
    /// Serialises refresh attempts.
    refresh_lock: tokio::sync::Mutex<()>,
    /// Bumped on every `set_tokens` and `clear_tokens`.
    generation: AtomicU64,
}

impl SessionManager {
    pub fn new(auth_client: AuthClient, store: Arc<dyn TokenStore>) -> Self {
        Self {
            auth_client,
            store,
            memory: Mutex::new(CachedTokens::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn auth_client(&self) -> &AuthClient {
        &self.auth_client
    }

    fn memory(&self) -> MutexGuard<'_, CachedTokens> {
        self.memory.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// A token that is unexpired right now, or `None`.
    pub fn get_access_token(&self) -> Option<SecureString> {
        self.valid_token(TokenKind::Access, Utc::now())
    }

    /// The refresh token if it is unexpired right now.
    pub fn get_refresh_token(&self) -> Option<SecureString> {
        self.valid_token(TokenKind::Refresh, Utc::now())
    }

    fn valid_token(&self, kind: TokenKind, now: DateTime<Utc>) -> Option<SecureString> {
        {
            let mut memory = self.memory();
            let slot = memory.slot(kind);
            if let Some(token) = slot.as_ref() {
                if jwt::valid_claims_at(token.as_str(), now).is_some() {
                    return Some(token.clone());
                }
                debug!("Discarding expired {} token from memory", kind);
                *slot = None;
            }
        }

        let stored = match self.store.get(kind.cookie()) {
            Ok(stored) => stored?,
            Err(e) => {
                warn!("Failed to read {} cookie: {}", kind, e);
                return None;
            }
        };

        match jwt::decode_claims(&stored) {
            Ok(claims) if claims.is_expired_at(now) => {
                debug!("Stored {} token has expired", kind);
                None
            }
            Ok(_) => {
                let token = SecureString::new(stored.as_str().to_string());
                *self.memory().slot(kind) = Some(token.clone());
                Some(token)
            }
            Err(e) => {
                warn!("Discarding undecodable {} token: {}", kind, e);
                if let Err(e) = self.store.remove(kind.cookie()) {
                    warn!("Failed to remove {} cookie: {}", kind, e);
                }
                None
            }
        }
    }

    /// Store a fresh token pair in memory and in both cookies.
    ///
    /// Memory is only updated once both cookies are written.
    pub fn set_tokens(&self, access: &str, refresh: &str) -> Result<(), StoreError> {
        self.store.set(ACCESS_COOKIE, access, access_cookie_ttl())?;
        if let Err(e) = self.store.set(REFRESH_COOKIE, refresh, refresh_cookie_ttl()) {
            if let Err(cleanup) = self.store.remove(ACCESS_COOKIE) {
                warn!("Failed to roll back access cookie: {}", cleanup);
            }
            return Err(e);
        }

        {
            let mut memory = self.memory();
            memory.access = Some(SecureString::from(access));
            memory.refresh = Some(SecureString::from(refresh));
        }
        self.generation.fetch_add(1, Ordering::SeqCst);

        debug!("Session tokens stored");
        Ok(())
    }

    /// Remove both cookies and the cached tokens. Safe to call repeatedly.
    pub fn clear_tokens(&self) -> Result<(), StoreError> {
        {
            let mut memory = self.memory();
            memory.access = None;
            memory.refresh = None;
        }
        self.generation.fetch_add(1, Ordering::SeqCst);

        let access = self.store.remove(ACCESS_COOKIE);
        let refresh = self.store.remove(REFRESH_COOKIE);
        access.and(refresh)
    }

    fn clear_after_failure(&self) {
        if let Err(e) = self.clear_tokens() {
            error!("Failed to clear session cookies: {}", e);
        }
    }

    /// Counter bumped whenever the stored tokens change.
    ///
    /// Read it before deciding a refresh is needed and pass it to
    /// [`refresh_since`](Self::refresh_since).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Any failure clears the whole session and yields `None`.
    pub async fn refresh_access_token(&self) -> Option<SecureString> {
        self.refresh_since(self.generation()).await
    }

    /// Refresh unless the tokens changed after generation `observed`.
    ///
    /// Concurrent callers share one exchange: a caller whose view predates a
    /// completed refresh reuses the token it stored.
    pub async fn refresh_since(&self, observed: u64) -> Option<SecureString> {
        let _guard = self.refresh_lock.lock().await;

        if self.generation() != observed {
            if let Some(token) = self.get_access_token() {
                debug!("Reusing access token from a concurrent refresh");
                return Some(token);
            }
        }

        let Some(refresh) = self.get_refresh_token() else {
            info!("No usable refresh token, clearing session");
            self.clear_after_failure();
            return None;
        };

        let access = match self.auth_client.refresh(refresh.as_str()).await {
            Ok(access) => access,
            Err(e) => {
                warn!("{}, clearing session", e);
                self.clear_after_failure();
                return None;
            }
        };

        if jwt::valid_claims_at(&access, Utc::now()).is_none() {
            warn!("Refresh returned an unusable access token, clearing session");
            self.clear_after_failure();
            return None;
        }

        if let Err(e) = self.set_tokens(&access, refresh.as_str()) {
            error!("Failed to store refreshed token: {}", e);
            self.clear_after_failure();
            return None;
        }

        info!("Access token refreshed");
        Some(SecureString::new(access))
    }

    /// Sign in and store the returned tokens. Returns the server's message.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<String, AppError> {
        let response = self.auth_client.login(identifier, password).await?;
        self.set_tokens(&response.tokens.access, &response.tokens.refresh)?;

        info!("Signed in as {}", identifier);
        Ok(response.message.clone())
    }

    /// Sign out. The server call is best-effort; local state is always cleared.
    pub async fn logout(&self) -> Result<(), StoreError> {
        let access = self.get_access_token();
        let refresh = self.get_refresh_token();

        match (access, refresh) {
            (Some(access), Some(refresh)) => {
                if let Err(e) = self
                    .auth_client
                    .logout(access.as_str(), refresh.as_str())
                    .await
                {
                    warn!("Ignoring server logout failure: {}", e);
                }
            }
            _ => debug!("No usable tokens, skipping server logout"),
        }

        self.clear_tokens()?;
        info!("Signed out");
        Ok(())
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        if self.get_access_token().is_some() {
            return SessionState::ValidAccess;
        }
        if self.get_refresh_token().is_some() {
            return SessionState::ExpiredAccessValidRefresh;
        }
        if self.has_token_material() {
            SessionState::FullyExpired
        } else {
            SessionState::NoSession
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    fn has_token_material(&self) -> bool {
        {
            let memory = self.memory();
            if memory.access.is_some() || memory.refresh.is_some() {
                return true;
            }
        }
        [ACCESS_COOKIE, REFRESH_COOKIE]
            .into_iter()
            .any(|name| matches!(self.store.get(name), Ok(Some(_))))
    }

    /// Claims of the current access token.
    pub fn claims(&self) -> Option<Claims> {
        self.get_access_token()
            .and_then(|token| jwt::decode_claims(token.as_str()).ok())
    }

    pub fn access_expires_at(&self) -> Option<DateTime<Utc>> {
        self.claims().and_then(|claims| claims.expires_at())
    }

    pub fn refresh_expires_at(&self) -> Option<DateTime<Utc>> {
        self.get_refresh_token()
            .and_then(|token| jwt::decode_claims(token.as_str()).ok())
            .and_then(|claims| claims.expires_at())
    }
}

/// Calculate the remaining time until `expiry`.
pub fn time_until_expiry(expiry: DateTime<Utc>) -> Option<Duration> {
    let now = Utc::now();

    if expiry > now {
        Some(expiry - now)
    } else {
        None
    }
}

/// Format duration as human-readable string (e.g., "45 min", "1 hour").
pub fn format_duration(duration: Duration) -> String {
    let total_minutes = duration.num_minutes();

    if total_minutes < 1 {
        "< 1 min".to_string()
    } else if total_minutes < 60 {
        format!("{} min", total_minutes)
    } else if total_minutes < 60 * 24 {
        let hours = total_minutes / 60;
        let mins = total_minutes % 60;
        if mins == 0 {
            format!("{} hour{}", hours, if hours == 1 { "" } else { "s" })
        } else {
            format!("{}h {}m", hours, mins)
        }
    } else {
        let days = total_minutes / (60 * 24);
        let hours = (total_minutes % (60 * 24)) / 60;
        if hours == 0 {
            format!("{} day{}", days, if days == 1 { "" } else { "s" })
        } else {
            format!("{}d {}h", days, hours)
        }
    }
}
