//! Configuration for the vouchly sync service.
//!
//! Layered with figment: built-in defaults, then a TOML file, then
//! `VOUCHLY_`-prefixed environment variables (`__` separates nesting,
//! e.g. `VOUCHLY_SYNC__INTERVAL_SECS=60`). Translates into
//! `vouchly_core::SyncConfig`. Controller credentials are not config:
//! they live in the store.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use vouchly_core::{SyncConfig, TlsMode, TransportConfig};

/// Largest page the controller serves.
const MAX_PAGE_SIZE: u32 = 1000;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Deployment environment. Anything but production tolerates the
/// self-signed certificate Omada controllers ship with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Development,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub environment: Environment,

    /// SQLite database path. Defaults to the platform data dir.
    pub database: Option<PathBuf>,

    #[serde(default)]
    pub sync: SyncSection,

    #[serde(default)]
    pub http: HttpSection,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SyncSection {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_group_page_size")]
    pub group_page_size: u32,

    #[serde(default = "default_voucher_page_size")]
    pub voucher_page_size: u32,

    #[serde(default = "default_currency")]
    pub default_currency: String,

    #[serde(default = "default_overrun_warn_ratio")]
    pub overrun_warn_ratio: f64,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            group_page_size: default_group_page_size(),
            voucher_page_size: default_voucher_page_size(),
            default_currency: default_currency(),
            overrun_warn_ratio: default_overrun_warn_ratio(),
        }
    }
}

fn default_interval_secs() -> u64 {
    vouchly_core::config::DEFAULT_SYNC_INTERVAL.as_secs()
}
fn default_group_page_size() -> u32 {
    vouchly_core::config::SyncConfig::default().group_page_size
}
fn default_voucher_page_size() -> u32 {
    vouchly_core::config::SyncConfig::default().voucher_page_size
}
fn default_currency() -> String {
    vouchly_core::config::DEFAULT_CURRENCY.into()
}
fn default_overrun_warn_ratio() -> f64 {
    vouchly_core::config::DEFAULT_OVERRUN_WARN_RATIO
}

#[derive(Debug, Deserialize, Serialize)]
pub struct HttpSection {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Explicit TLS verification override. Unset follows `environment`.
    pub insecure: Option<bool>,

    /// Path to a custom CA certificate (PEM).
    pub ca_cert: Option<PathBuf>,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            insecure: None,
            ca_cert: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "vouchly", "vouchly")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || PathBuf::from(".vouchly").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default SQLite database location.
pub fn default_database_path() -> PathBuf {
    project_dirs().map_or_else(
        || PathBuf::from(".vouchly").join("vouchly.db"),
        |dirs| dirs.data_dir().join("vouchly.db"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// The layered figment: defaults, TOML file, environment.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("VOUCHLY_").split("__"))
}

/// Load and validate the config. `path` overrides the platform location;
/// a missing file is not an error.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    let config: Config = figment(&path).extract()?;
    config.validate()?;
    Ok(config)
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.interval_secs == 0 {
            return Err(invalid("sync.interval_secs", "must be at least 1"));
        }
        for (field, size) in [
            ("sync.group_page_size", self.sync.group_page_size),
            ("sync.voucher_page_size", self.sync.voucher_page_size),
        ] {
            if size == 0 || size > MAX_PAGE_SIZE {
                return Err(invalid(
                    field,
                    format!("must be between 1 and {MAX_PAGE_SIZE}, got {size}"),
                ));
            }
        }
        if self.sync.default_currency.trim().is_empty() {
            return Err(invalid("sync.default_currency", "must not be empty"));
        }
        let ratio = self.sync.overrun_warn_ratio;
        if ratio.is_nan() || ratio <= 0.0 || ratio > 1.0 {
            return Err(invalid(
                "sync.overrun_warn_ratio",
                format!("must be in (0, 1], got {ratio}"),
            ));
        }
        if self.http.timeout_secs == 0 {
            return Err(invalid("http.timeout_secs", "must be at least 1"));
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.database.clone().unwrap_or_else(default_database_path)
    }

    /// TLS mode: an explicit `insecure` or `ca_cert` wins, otherwise the
    /// environment decides.
    pub fn tls_mode(&self) -> TlsMode {
        match (self.http.insecure, &self.http.ca_cert) {
            (Some(true), _) => TlsMode::DangerAcceptInvalid,
            (_, Some(ca)) => TlsMode::CustomCa(ca.clone()),
            (Some(false), None) => TlsMode::System,
            (None, None) => TlsMode::for_environment(self.environment.is_production()),
        }
    }

    /// Build the runtime `SyncConfig`.
    pub fn to_sync_config(&self) -> Result<SyncConfig, ConfigError> {
        self.validate()?;
        Ok(SyncConfig {
            interval: Duration::from_secs(self.sync.interval_secs),
            group_page_size: self.sync.group_page_size,
            voucher_page_size: self.sync.voucher_page_size,
            default_currency: self.sync.default_currency.trim().to_uppercase(),
            overrun_warn_ratio: self.sync.overrun_warn_ratio,
            transport: TransportConfig {
                tls: self.tls_mode(),
                timeout: Duration::from_secs(self.http.timeout_secs),
            },
        })
    }

    /// The effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
