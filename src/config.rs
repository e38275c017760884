//! Service configuration.
//!
//! Layered with figment: compiled-in defaults, then an optional `config.toml`,
//! then `RECON_`-prefixed environment variables (`__` separates sections, e.g.
//! `RECON_BASIC__API_KEY`). Loaded once at boot and handed down as an
//! immutable value.

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::FeedError;

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";
pub const ENV_PREFIX: &str = "RECON_";

/// Number of directories inspected when searching upwards for `wp-config.php`.
pub const DEFAULT_WP_CONFIG_DEPTH: usize = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub basic: BasicConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicConfig {
    pub listen_addr: String,
    /// Shared secret expected in `X-Api-Key` or `?api_key=`. Empty rejects everything.
    pub api_key: String,
    pub loglevel: String,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            api_key: String::new(),
            loglevel: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `KEY=VALUE` file holding DB_HOST / DB_NAME / DB_USER / DB_PASS.
    pub env_file: PathBuf,
    /// Directory the `wp-config.php` search starts from; defaults to the working directory.
    pub wp_config_root: Option<PathBuf>,
    pub wp_config_max_depth: usize,
    pub table_prefix: String,
    /// Last-resort credentials used when no file provides complete ones.
    pub fallback: FallbackCredentials,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            env_file: PathBuf::from(".env"),
            wp_config_root: None,
            wp_config_max_depth: DEFAULT_WP_CONFIG_DEPTH,
            table_prefix: "pw_".to_string(),
            fallback: FallbackCredentials::default(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackCredentials {
    pub host: String,
    pub name: String,
    pub user: String,
    pub pass: String,
}

impl Default for FallbackCredentials {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            name: String::new(),
            user: String::new(),
            pass: String::new(),
        }
    }
}

impl std::fmt::Debug for FallbackCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackCredentials")
            .field("host", &self.host)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .finish()
    }
}

impl Config {
    /// Load from `config.toml` in the working directory plus the environment.
    pub fn load() -> Result<Self, FeedError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, FeedError> {
        let cfg = Self::figment(path.as_ref()).extract()?;
        Ok(cfg)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Starting directory for the `wp-config.php` search.
    pub fn wp_config_root(&self) -> PathBuf {
        self.database
            .wp_config_root
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
