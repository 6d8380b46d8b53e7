//! Configuration resolution.
//!
//! Produces one immutable [`Settings`] value, constructed at startup and
//! passed into each component — there is no process-wide mutable
//! configuration. Precedence per field:
//!
//! 1. explicit CLI override
//! 2. `PIPFIX_*` environment variable
//! 3. config file (`~/.config/pipfix/config.toml`, overlaid by
//!    `./pipfix.toml`)
//! 4. built-in default
//!
//! Unreadable or invalid config files warn and fall through; an invalid
//! timeout or retry value warns and falls back to the default.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::advisory::{AdvisoryConfig, RetryPolicy};

pub const DEFAULT_SERVER_URL: &str = "https://api.pipfix.dev";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Fixed backoff between advisory retry attempts.
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub auto_confirm: bool,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Explicit language setting, when one was given anywhere.
    pub lang: Option<String>,
}

impl Settings {
    /// Resolve settings from the three external sources plus defaults.
    pub fn resolve(overrides: &SettingOverrides, env: &EnvSettings, file: &ConfigFile) -> Self {
        let server_url = overrides
            .server_url
            .clone()
            .or_else(|| env.server_url.clone())
            .or_else(|| file.server_url.clone())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());

        let auto_confirm = overrides
            .auto_confirm
            .or_else(|| env.auto_confirm.as_deref().map(parse_bool))
            .or(file.auto_confirm)
            .unwrap_or(false);

        // Validation happens after precedence: an invalid value in the
        // winning source falls back to the default, not to a lower
        // source.
        let timeout_raw = overrides
            .timeout_secs
            .map(|t| t.to_string())
            .or_else(|| env.timeout.clone())
            .or_else(|| file.timeout.map(|t| t.to_string()));
        let timeout_secs = match timeout_raw {
            None => DEFAULT_TIMEOUT_SECS,
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(secs) if secs > 0 => secs as u64,
                _ => {
                    tracing::warn!(
                        specified = %raw,
                        default = DEFAULT_TIMEOUT_SECS,
                        "invalid timeout value, using default"
                    );
                    DEFAULT_TIMEOUT_SECS
                }
            },
        };

        let retries_raw = overrides
            .max_retries
            .map(|r| r.to_string())
            .or_else(|| env.max_retries.clone())
            .or_else(|| file.max_retries.map(|r| r.to_string()));
        let max_retries = match retries_raw {
            None => DEFAULT_MAX_RETRIES,
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(retries) => retries,
                Err(_) => {
                    tracing::warn!(
                        specified = %raw,
                        default = DEFAULT_MAX_RETRIES,
                        "invalid max-retries value, using default"
                    );
                    DEFAULT_MAX_RETRIES
                }
            },
        };

        let lang = overrides
            .lang
            .clone()
            .or_else(|| env.lang.clone())
            .or_else(|| file.lang.clone())
            .filter(|l| !l.is_empty());

        Self {
            server_url,
            auto_confirm,
            timeout_secs,
            max_retries,
            lang,
        }
    }

    /// Advisory-client configuration derived from these settings.
    pub fn advisory_config(&self) -> AdvisoryConfig {
        AdvisoryConfig {
            server_url: self.server_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            retry: RetryPolicy {
                max_retries: self.max_retries,
                backoff: RETRY_BACKOFF,
            },
        }
    }
}

fn parse_bool(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("true") || raw.trim() == "1"
}

/// Explicit CLI overrides; highest precedence. `None` means the flag was
/// not given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingOverrides {
    pub server_url: Option<String>,
    pub auto_confirm: Option<bool>,
    pub timeout_secs: Option<i64>,
    pub max_retries: Option<u32>,
    pub lang: Option<String>,
}

/// Snapshot of the `PIPFIX_*` environment variables, captured once so
/// resolution is testable without touching the process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSettings {
    pub server_url: Option<String>,
    pub auto_confirm: Option<String>,
    pub timeout: Option<String>,
    pub max_retries: Option<String>,
    pub lang: Option<String>,
}

impl EnvSettings {
    pub fn from_process() -> Self {
        Self {
            server_url: std::env::var("PIPFIX_SERVER_URL").ok(),
            auto_confirm: std::env::var("PIPFIX_AUTO_CONFIRM").ok(),
            timeout: std::env::var("PIPFIX_TIMEOUT").ok(),
            max_retries: std::env::var("PIPFIX_MAX_RETRIES").ok(),
            lang: std::env::var("PIPFIX_LANG").ok(),
        }
    }
}

/// Optional fields read from a TOML config file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ConfigFile {
    pub server_url: Option<String>,
    pub auto_confirm: Option<bool>,
    pub timeout: Option<i64>,
    pub max_retries: Option<u32>,
    pub lang: Option<String>,
}

impl ConfigFile {
    /// Read one config file. Missing files are silently skipped;
    /// unreadable or unparsable files warn and are skipped.
    pub fn load(path: &Path) -> Option<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to read config file");
                return None;
            }
        };
        match toml::from_str(&raw) {
            Ok(cfg) => {
                tracing::debug!(path = %path.display(), "config loaded");
                Some(cfg)
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to parse config file");
                None
            }
        }
    }

    /// Field-wise overlay: values in `other` win.
    pub fn overlay(self, other: Self) -> Self {
        Self {
            server_url: other.server_url.or(self.server_url),
            auto_confirm: other.auto_confirm.or(self.auto_confirm),
            timeout: other.timeout.or(self.timeout),
            max_retries: other.max_retries.or(self.max_retries),
            lang: other.lang.or(self.lang),
        }
    }

    /// Load the standard chain: the per-user config overlaid by a
    /// `pipfix.toml` in the current directory.
    pub fn load_default_chain() -> Self {
        let mut cfg = ConfigFile::default();
        if let Some(dir) = dirs::config_dir() {
            if let Some(user) = Self::load(&dir.join("pipfix").join("config.toml")) {
                cfg = cfg.overlay(user);
            }
        }
        if let Some(local) = Self::load(Path::new("pipfix.toml")) {
            cfg = cfg.overlay(local);
        }
        cfg
    }
}
