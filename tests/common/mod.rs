#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;
use url::Url;
use wiremock::MockServer;

use propdesk::store::{access_cookie_ttl, refresh_cookie_ttl, ACCESS_COOKIE, REFRESH_COOKIE};
use propdesk::{ApiClient, AuthClient, MemoryCookieJar, SessionManager, TokenStore};

/// A signed token whose `exp` lies `lifetime` from now, tagged so tokens differ.
pub fn token(tag: &str, lifetime: Duration) -> String {
    let now = Utc::now();
    encode(
        &Header::new(Algorithm::HS256),
        &json!({
            "exp": (now + lifetime).timestamp(),
            "iat": now.timestamp(),
            "user_id": 12,
            "role": "property_manager",
            "jti": tag,
        }),
        &EncodingKey::from_secret(b"backend-secret"),
    )
    .unwrap()
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

pub struct Harness {
    pub client: ApiClient,
    pub jar: Arc<MemoryCookieJar>,
    pub redirects: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    pub fn new(server: &MockServer) -> Self {
        let base = Url::parse(&format!("{}/", server.uri())).unwrap();
        let jar = Arc::new(MemoryCookieJar::new());
        let session = Arc::new(SessionManager::new(
            AuthClient::new(base.clone()).unwrap(),
            jar.clone(),
        ));

        let redirects = Arc::new(Mutex::new(Vec::new()));
        let seen = redirects.clone();
        let client = ApiClient::new(base, session)
            .unwrap()
            .on_login_required(move |path| seen.lock().unwrap().push(path.to_string()));

        Self {
            client,
            jar,
            redirects,
        }
    }

    /// Put tokens straight into the cookie jar, as a previous process would have.
    pub fn seed_cookies(&self, access: &str, refresh: &str) {
        self.jar.set(ACCESS_COOKIE, access, access_cookie_ttl()).unwrap();
        self.jar
            .set(REFRESH_COOKIE, refresh, refresh_cookie_ttl())
            .unwrap();
    }

    pub fn redirects(&self) -> Vec<String> {
        self.redirects.lock().unwrap().clone()
    }
}
