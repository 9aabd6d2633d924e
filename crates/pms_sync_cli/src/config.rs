//! Configuration file support for pms-sync.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (`PMS_SYNC_<SECTION>__<KEY>`, e.g. `PMS_SYNC_AUTH__CLIENT_ID`)
//! 3. Config file (./pms-sync.toml, then ~/.config/pms-sync/config.toml)
//! 4. Built-in defaults
//!
//! The database URL defaults to `sqlite://~/.local/state/pms-sync/mirror.db` on Linux
//! (using the XDG state directory) if not explicitly configured.
//!
//! Example config file:
//! ```toml
//! [database]
//! url = "postgres:///pms_mirror"  # optional, SQLite in the state dir by default
//!
//! [source]
//! api_base = "https://api.pms.example/"
//! page_size = 100
//! max_pages = 50
//! requests_per_second = 0  # 0 = unpaced
//!
//! [auth]
//! token_url = "https://api.pms.example/oauth/token"
//! client_id = "..."
//! client_secret = "..."  # or PMS_SYNC_AUTH__CLIENT_SECRET
//! safety_margin_secs = 60
//!
//! [sync]
//! time_budget_secs = 270
//! batch_size = 50
//! incremental_threshold = 100
//! incremental_lookback_hours = 25
//! persist_retries = 3
//!
//! [trigger]
//! bind = "0.0.0.0:8080"
//! secret = "..."  # unset = open trigger
//! manual_sentinel = "manual-console"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use chrono::TimeDelta;
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;

use pms_sync::credential::{CredentialConfig, DEFAULT_SAFETY_MARGIN_SECS};
use pms_sync::http::reqwest_transport::DEFAULT_TIMEOUT;
use pms_sync::source::{DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE};
use pms_sync::store::{DEFAULT_BATCH_SIZE, DEFAULT_PERSIST_RETRIES, PersistOptions};
use pms_sync::sync::{
    DEFAULT_INCREMENTAL_THRESHOLD, DEFAULT_LOOKBACK_HOURS, DEFAULT_TIME_BUDGET_SECS, SyncOptions,
    WindowPolicy,
};
use pms_sync::trigger::DEFAULT_MANUAL_SENTINEL;

const APP_NAME: &str = "pms-sync";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub source: SourceConfig,
    pub auth: AuthConfig,
    pub sync: SyncConfig,
    pub trigger: TriggerConfig,
}

/// Database configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL.
    /// Supports sqlite:// and postgres:// schemes.
    pub url: Option<String>,
}

/// The remote platform's REST API.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub api_base: Option<String>,
    pub page_size: u32,
    pub max_pages: u32,
    /// Page requests per second; 0 leaves them unpaced.
    pub requests_per_second: u32,
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            requests_per_second: 0,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

/// OAuth refresh settings for the remote platform.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub token_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub safety_margin_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_url: None,
            client_id: None,
            client_secret: None,
            safety_margin_secs: DEFAULT_SAFETY_MARGIN_SECS,
        }
    }
}

/// Run tunables.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub time_budget_secs: u64,
    pub batch_size: usize,
    pub incremental_threshold: u64,
    pub incremental_lookback_hours: i64,
    pub persist_retries: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            time_budget_secs: DEFAULT_TIME_BUDGET_SECS,
            batch_size: DEFAULT_BATCH_SIZE,
            incremental_threshold: DEFAULT_INCREMENTAL_THRESHOLD,
            incremental_lookback_hours: DEFAULT_LOOKBACK_HOURS,
            persist_retries: DEFAULT_PERSIST_RETRIES,
        }
    }
}

/// The HTTP trigger server.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub bind: String,
    /// Shared scheduler secret. Unset leaves the trigger open.
    pub secret: Option<String>,
    pub manual_sentinel: String,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            secret: None,
            manual_sentinel: DEFAULT_MANUAL_SENTINEL.to_string(),
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/pms-sync/config.toml)
    /// 3. Local config file (./pms-sync.toml)
    /// 4. Environment variables with the PMS_SYNC_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(config_path) = Self::default_config_path()
            && config_path.exists()
        {
            tracing::debug!("Loading config from {:?}", config_path);
            builder = builder.add_source(
                File::from(config_path)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let local_config = PathBuf::from("pms-sync.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./pms-sync.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // e.g., PMS_SYNC_AUTH__CLIENT_ID -> auth.client_id
        builder = builder.add_source(env_source());

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Get the database URL, falling back to a SQLite file in the state directory.
    ///
    /// The `mode=rwc` parameter creates the file if it doesn't exist.
    pub fn database_url(&self) -> Option<String> {
        self.database.url.clone().or_else(|| {
            Self::default_state_dir().map(|state_dir| {
                let db_path = state_dir.join("mirror.db");
                format!("sqlite://{}?mode=rwc", db_path.display())
            })
        })
    }

    pub fn api_base(&self) -> Result<&str, String> {
        self.source
            .api_base
            .as_deref()
            .ok_or_else(|| missing("source.api_base", "PMS_SYNC_SOURCE__API_BASE"))
    }

    pub fn credential_config(&self) -> Result<CredentialConfig, String> {
        let token_url = self
            .auth
            .token_url
            .as_deref()
            .ok_or_else(|| missing("auth.token_url", "PMS_SYNC_AUTH__TOKEN_URL"))?;
        let client_id = self
            .auth
            .client_id
            .as_deref()
            .ok_or_else(|| missing("auth.client_id", "PMS_SYNC_AUTH__CLIENT_ID"))?;

        let mut config =
            CredentialConfig::new(token_url, client_id).with_safety_margin(self.safety_margin()?);
        if let Some(secret) = self.auth.client_secret.as_deref().filter(|s| !s.is_empty()) {
            config = config.with_client_secret(secret);
        }
        Ok(config)
    }

    /// Refresh margin ahead of token expiry.
    pub fn safety_margin(&self) -> Result<TimeDelta, String> {
        TimeDelta::try_seconds(self.auth.safety_margin_secs).ok_or_else(|| {
            format!(
                "auth.safety_margin_secs out of range: {}",
                self.auth.safety_margin_secs
            )
        })
    }

    pub fn sync_options(&self) -> Result<SyncOptions, String> {
        let lookback = TimeDelta::try_hours(self.sync.incremental_lookback_hours).ok_or_else(|| {
            format!(
                "sync.incremental_lookback_hours out of range: {}",
                self.sync.incremental_lookback_hours
            )
        })?;

        Ok(SyncOptions {
            time_budget: Duration::from_secs(self.sync.time_budget_secs),
            max_pages: self.source.max_pages,
            window: WindowPolicy {
                threshold: self.sync.incremental_threshold,
                lookback,
            },
            persist: PersistOptions {
                batch_size: self.sync.batch_size.max(1),
                max_retries: self.sync.persist_retries,
                ..PersistOptions::default()
            },
        })
    }

    /// Get the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the default state directory path.
    ///
    /// On Linux, this is `$XDG_STATE_HOME/pms-sync` or `~/.local/state/pms-sync`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|dirs| {
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("PMS_SYNC")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn missing(key: &str, env: &str) -> String {
    format!("{key} is not configured (set it in pms-sync.toml or {env})")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(content: &str) -> Config {
        ConfigBuilder::builder()
            .add_source(config::File::from_str(content, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.database.url.is_none());
        assert!(config.source.api_base.is_none());
        assert_eq!(config.source.page_size, 100);
        assert_eq!(config.source.max_pages, 50);
        assert_eq!(config.source.requests_per_second, 0);
        assert_eq!(config.source.timeout_secs, 30);
        assert_eq!(config.auth.safety_margin_secs, 60);
        assert_eq!(config.sync.time_budget_secs, 270);
        assert_eq!(config.sync.batch_size, 50);
        assert_eq!(config.sync.incremental_threshold, 100);
        assert_eq!(config.sync.incremental_lookback_hours, 25);
        assert_eq!(config.trigger.bind, "0.0.0.0:8080");
        assert!(config.trigger.secret.is_none());
        assert_eq!(config.trigger.manual_sentinel, "manual-console");
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config = from_toml(
            r#"
            [sync]
            batch_size = 25

            [trigger]
            secret = "s3cret"
        "#,
        );

        assert_eq!(config.sync.batch_size, 25);
        assert_eq!(config.sync.time_budget_secs, 270);
        assert_eq!(config.trigger.secret.as_deref(), Some("s3cret"));
        assert_eq!(config.trigger.bind, "0.0.0.0:8080");
    }

    #[test]
    fn test_sync_options_follow_config() {
        let config = from_toml(
            r#"
            [source]
            max_pages = 5

            [sync]
            time_budget_secs = 60
            batch_size = 0
            incremental_threshold = 10
            incremental_lookback_hours = 2
            persist_retries = 0
        "#,
        );

        let options = config.sync_options().unwrap();
        assert_eq!(options.time_budget, Duration::from_secs(60));
        assert_eq!(options.max_pages, 5);
        assert_eq!(options.window.threshold, 10);
        assert_eq!(options.window.lookback, TimeDelta::hours(2));
        assert_eq!(options.persist.batch_size, 1);
        assert_eq!(options.persist.max_retries, 0);
    }

    #[test]
    fn test_out_of_range_durations_are_config_errors() {
        let config = from_toml(
            r#"
            [auth]
            token_url = "https://pms.test/oauth/token"
            client_id = "mirror"
            safety_margin_secs = 9223372036854775807

            [sync]
            incremental_lookback_hours = 9223372036854775807
        "#,
        );

        let err = config.credential_config().unwrap_err();
        assert!(err.contains("auth.safety_margin_secs"));
        assert!(config.safety_margin().is_err());

        let err = config.sync_options().unwrap_err();
        assert!(err.contains("sync.incremental_lookback_hours"));
    }

    #[test]
    fn test_credential_config_requires_token_url_and_client_id() {
        let err = Config::default().credential_config().unwrap_err();
        assert!(err.contains("auth.token_url"));

        let config = from_toml(
            r#"
            [auth]
            token_url = "https://pms.test/oauth/token"
        "#,
        );
        assert!(config.credential_config().unwrap_err().contains("auth.client_id"));

        let config = from_toml(
            r#"
            [auth]
            token_url = "https://pms.test/oauth/token"
            client_id = "mirror"
            client_secret = "shh"
            safety_margin_secs = 120
        "#,
        );
        let credentials = config.credential_config().unwrap();
        assert_eq!(credentials.client_id, "mirror");
        assert_eq!(credentials.client_secret.as_deref(), Some("shh"));
        assert_eq!(credentials.safety_margin, TimeDelta::seconds(120));
    }

    #[test]
    fn test_api_base_is_required() {
        assert!(Config::default().api_base().is_err());
        let config = from_toml(
            r#"
            [source]
            api_base = "https://api.pms.test/"
        "#,
        );
        assert_eq!(config.api_base().unwrap(), "https://api.pms.test/");
    }

    #[test]
    fn test_database_url_defaults_to_state_dir() {
        let url = Config::default().database_url().unwrap();
        assert!(url.starts_with("sqlite://"));
        assert!(url.contains("mirror.db"));
        assert!(url.ends_with("?mode=rwc"));
    }

    #[test]
    fn test_database_url_respects_configured_value() {
        let config = from_toml(
            r#"
            [database]
            url = "postgres://localhost/pms_mirror"
        "#,
        );
        assert_eq!(
            config.database_url(),
            Some("postgres://localhost/pms_mirror".to_string())
        );
    }

    #[test]
    fn test_config_unknown_fields_ignored() {
        let config = from_toml(
            r#"
            [sync]
            batch_size = 10
            unknown_field = "should be ignored"
        "#,
        );
        assert_eq!(config.sync.batch_size, 10);
    }

    #[test]
    fn test_config_invalid_toml() {
        let result = ConfigBuilder::builder()
            .add_source(config::File::from_str("[sync\nbatch_size = 1", FileFormat::Toml))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_environment_source_builds() {
        let _builder = ConfigBuilder::builder().add_source(env_source());
    }
}
