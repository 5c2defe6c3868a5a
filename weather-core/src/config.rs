use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf, time::Duration};

use crate::{gateway::DEFAULT_HISTORY_LIMIT, orchestrator::OverlapPolicy};

/// Port the front-end preview server listens on during local development.
pub const DEV_PREVIEW_PORT: u16 = 4173;

/// Backend address used when the client is served from the preview port.
pub const DEV_BACKEND_URL: &str = "http://localhost:8000/api/v1";

/// Base path used when nothing else is configured.
pub const DEFAULT_BASE_PATH: &str = "/api/v1";

pub const BASE_URL_ENV: &str = "WEATHER_API_BASE_URL";
pub const ORIGIN_ENV: &str = "WEATHER_ORIGIN";

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// origin = "https://weather.example.com"
/// base_url = "/api/v1"
/// history_limit = 10
/// overlap_policy = "reject-while-busy"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend base URL, absolute or relative to `origin`.
    pub base_url: Option<String>,

    /// Address the client is considered to be served from.
    pub origin: Option<String>,

    pub history_limit: usize,

    /// Per-request timeout; absent means wait for the backend indefinitely.
    pub request_timeout_secs: Option<u64>,

    pub overlap_policy: OverlapPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: None,
            origin: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
            request_timeout_secs: None,
            overlap_policy: OverlapPolicy::default(),
        }
    }
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-task", "weather-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Whether a config file has been saved yet.
    pub fn file_exists() -> Result<bool> {
        Ok(Self::config_file_path()?.exists())
    }

    /// Apply `WEATHER_API_BASE_URL` / `WEATHER_ORIGIN` on top of the file values.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(env::var(BASE_URL_ENV).ok(), env::var(ORIGIN_ENV).ok())
    }

    /// Replace base URL and origin with any non-blank override.
    pub fn with_overrides(mut self, base_url: Option<String>, origin: Option<String>) -> Self {
        if let Some(base_url) = non_blank(base_url) {
            self.base_url = Some(base_url);
        }
        if let Some(origin) = non_blank(origin) {
            self.origin = Some(origin);
        }
        self
    }

    /// Requested history size; zero falls back to the default.
    pub fn history_limit(&self) -> usize {
        if self.history_limit == 0 {
            DEFAULT_HISTORY_LIMIT
        } else {
            self.history_limit
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// The backend base URL this configuration points at.
    pub fn resolve_base_url(&self) -> Result<Url> {
        resolve_base_url(self.origin.as_deref(), self.base_url.as_deref())
    }
}

/// Pick the backend base URL.
///
/// An origin on the preview port always talks to the local development
/// backend. Otherwise the configured value (or `/api/v1`) is used, joined
/// onto the origin when it is relative.
pub fn resolve_base_url(origin: Option<&str>, configured: Option<&str>) -> Result<Url> {
    let origin = origin
        .map(|o| Url::parse(o).with_context(|| format!("Invalid origin URL: {o}")))
        .transpose()?;

    if origin.as_ref().and_then(Url::port) == Some(DEV_PREVIEW_PORT) {
        return Url::parse(DEV_BACKEND_URL).context("Invalid development backend URL");
    }

    let configured = configured.unwrap_or(DEFAULT_BASE_PATH);

    if let Ok(absolute) = Url::parse(configured) {
        return Ok(absolute);
    }

    let origin = origin.ok_or_else(|| {
        anyhow!(
            "Base URL '{configured}' is relative but no origin is configured.\n\
             Hint: set `origin` via `weather configure`, pass --origin, or export {ORIGIN_ENV}."
        )
    })?;

    origin
        .join(configured)
        .with_context(|| format!("Failed to join base URL '{configured}' onto origin {origin}"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
