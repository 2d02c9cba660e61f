//! Cookie jar persisted as JSON under the user's data directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Duration, Utc};
use directories::ProjectDirs;
use tracing::{debug, error};
use zeroize::Zeroizing;

use super::{Cookie, TokenStore};
use crate::error::StoreError;

/// Cookie jar file name.
const COOKIE_FILE: &str = "cookies.json";

/// Get the default path of the cookie jar.
///
/// Returns `~/.local/share/propdesk/cookies.json` on Linux.
pub fn default_jar_path() -> Option<PathBuf> {
    ProjectDirs::from("io", "propdesk", "propdesk").map(|dirs| dirs.data_dir().join(COOKIE_FILE))
}

/// Cookie jar shared between processes through a file.
///
/// Every operation re-reads the file so that a login or logout in another
/// process is seen by the next lookup.
#[derive(Debug)]
pub struct FileCookieJar {
    path: PathBuf,
    /// Serialises read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileCookieJar {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Jar at the default location.
    pub fn open_default() -> Result<Self, StoreError> {
        let path = default_jar_path().ok_or_else(|| {
            StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine data directory",
            ))
        })?;
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load cookies from disk.
    ///
    /// A missing file is an empty jar; a corrupt file is logged and treated as empty.
    fn load(&self) -> Result<Vec<Cookie>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|e| StoreError::RetrieveFailed(e.to_string()))?;

        match serde_json::from_str(&content) {
            Ok(cookies) => Ok(cookies),
            Err(e) => {
                error!("Failed to parse cookie jar {:?}: {}, starting empty", self.path, e);
                Ok(Vec::new())
            }
        }
    }

    fn save(&self, cookies: &[Cookie]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(cookies)
            .map_err(|e| StoreError::StoreFailed(e.to_string()))?;

        fs::write(&self.path, content).map_err(|e| StoreError::StoreFailed(e.to_string()))?;

        debug!("Saved {} cookies to {:?}", cookies.len(), self.path);
        Ok(())
    }
}

impl TokenStore for FileCookieJar {
    fn get(&self, name: &str) -> Result<Option<Zeroizing<String>>, StoreError> {
        let now = Utc::now();
        self.load()?
            .into_iter()
            .find(|c| c.name == name && !c.is_expired_at(now))
            .map(|c| c.decoded_value())
            .transpose()
    }

    fn set(&self, name: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let now = Utc::now();

        let mut cookies = self.load()?;
        cookies.retain(|c| c.name != name && !c.is_expired_at(now));
        cookies.push(Cookie::session(name, value, ttl, now));

        self.save(&cookies)
    }

    fn remove(&self, name: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        if !self.path.exists() {
            return Ok(());
        }

        let mut cookies = self.load()?;
        let before = cookies.len();
        cookies.retain(|c| c.name != name);
        if cookies.len() == before {
            return Ok(());
        }

        self.save(&cookies)
            .map_err(|e| StoreError::DeleteFailed(e.to_string()))
    }
}
