//! Configuration loading and management.
//!
//! Loads configuration from embedded config.toml with environment variable overrides.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

/// Embedded configuration file content.
const CONFIG_TOML: &str = include_str!("../config.toml");

/// Port the backend listens on when the base URL is inferred.
const DEFAULT_API_PORT: u16 = 8000;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub base_url: String,
    pub timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    File,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub login_path: String,
    pub store: StoreKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    /// Load configuration from embedded config.toml with environment variable overrides.
    pub fn load() -> Result<Self> {
        let mut config: Config =
            toml::from_str(CONFIG_TOML).context("Failed to parse embedded config.toml")?;

        if let Ok(base_url) = env::var("PROPDESK_API_BASE_URL") {
            config.api.base_url = base_url;
        }

        if config.api.base_url.trim().is_empty() {
            let host = env::var("PROPDESK_API_HOST").unwrap_or_else(|_| "localhost".to_string());
            config.api.base_url = infer_base_url(&host);
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            config.logging.level = log_level;
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate that required configuration is present.
    fn validate(&self) -> Result<()> {
        self.base_url()?;

        if !self.session.login_path.starts_with('/') {
            anyhow::bail!(
                "session.login_path must be an absolute path, got {:?}",
                self.session.login_path
            );
        }

        if self.api.timeout_seconds == 0 {
            anyhow::bail!("api.timeout_seconds must be greater than zero");
        }

        Ok(())
    }

    /// Parsed API base URL, always ending in `/` so endpoint paths join onto it.
    pub fn base_url(&self) -> Result<Url> {
        let raw = self.api.base_url.trim();
        let normalized = if raw.ends_with('/') {
            raw.to_string()
        } else {
            format!("{}/", raw)
        };
        Url::parse(&normalized).with_context(|| format!("Invalid API base URL: {:?}", raw))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.api.connect_timeout_seconds)
    }
}

/// Base URL used when none is configured: the backend on the given host.
pub fn infer_base_url(host: &str) -> String {
    format!("http://{}:{}/", host.trim(), DEFAULT_API_PORT)
}
