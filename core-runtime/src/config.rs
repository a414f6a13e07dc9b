//! # Configuration Module
//!
//! Persistent configuration for the curation core.
//!
//! ## Overview
//!
//! `AppConfig` is a plain serde record stored as JSON under the platform
//! config directory (`<config_dir>/shelfcraft/config.json`). Every field
//! carries a serde default so configs written by older builds keep loading,
//! and a missing file simply yields `AppConfig::default()`.
//!
//! Saves go through a temp file followed by a rename so a crash mid-write
//! never leaves a truncated config behind.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::AppConfig;
//!
//! let mut config = AppConfig::load()?;
//! config.max_workers = 8;
//! config.save()?;
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};

/// Default bound on concurrent scan/reconcile/write workers.
const DEFAULT_MAX_WORKERS: usize = 4;

/// Default staleness window for cached provider lookups: 30 days.
const DEFAULT_CACHE_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Per-provider enablement and credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProviderConfig {
    /// Query the Audible catalog.
    pub audible_enabled: bool,
    /// Audible marketplace region code (e.g. "us", "uk").
    pub audible_region: String,
    /// Query Google Books volumes.
    pub googlebooks_enabled: bool,
    /// Optional Google Books API key; anonymous queries work but are
    /// rate-limited harder.
    pub googlebooks_api_key: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            audible_enabled: true,
            audible_region: "us".to_string(),
            googlebooks_enabled: true,
            googlebooks_api_key: None,
        }
    }
}

/// Remote library server (Audiobookshelf) connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL, e.g. `http://localhost:13378`. Empty means sync disabled.
    pub base_url: String,
    /// Bearer token for the API.
    pub api_token: String,
    /// Library to match items against.
    pub library_id: String,
}

impl ServerConfig {
    /// True when every field required to reach the server is present.
    pub fn is_configured(&self) -> bool {
        !self.base_url.trim().is_empty()
            && !self.api_token.trim().is_empty()
            && !self.library_id.trim().is_empty()
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Bound on concurrent per-file/per-group work.
    pub max_workers: usize,
    /// Copy the original file before mutating its tags.
    pub backup_tags: bool,
    /// Leave files whose change map is empty untouched in listings.
    pub skip_unchanged: bool,
    /// Fold genres onto the approved vocabulary during reconciliation.
    pub genre_enforcement: bool,
    /// Cap on the merged genre union; `None` means uncapped.
    pub genre_cap: Option<usize>,
    /// Staleness window for cached provider responses, in seconds.
    pub cache_ttl_secs: u64,
    /// Provider enablement and credentials.
    pub providers: ProviderConfig,
    /// Remote library server settings.
    pub server: ServerConfig,
    /// Root directory for reorganized files (`<root>/<Author>/<Series>/`).
    pub library_root: Option<PathBuf>,
    /// Filename template over `{author}`, `{title}`, `{series}`,
    /// `{sequence}`, `{year}`.
    pub rename_template: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            backup_tags: true,
            skip_unchanged: true,
            genre_enforcement: true,
            genre_cap: Some(3),
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            providers: ProviderConfig::default(),
            server: ServerConfig::default(),
            library_root: None,
            rename_template: "{author} - {title}".to_string(),
        }
    }
}

impl AppConfig {
    /// Path of the persisted config file.
    ///
    /// # Errors
    ///
    /// Fails when the platform config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| Error::Config("No config directory on this platform".to_string()))?;
        Ok(base.join("shelfcraft").join("config.json"))
    }

    /// Load the config from the default location, falling back to defaults
    /// when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    /// Load the config from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("Malformed config {}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Persist the config to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path()?)
    }

    /// Persist the config to an explicit path, atomically.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), "Saved config");
        Ok(())
    }
}
