//! src/config.rs
//! ============================================================================
//! # Config: Application Configuration Loader and Saver
//!
//! Loads and saves settings as TOML from the platform config path using the
//! [`directories`](https://docs.rs/directories) crate, or from an explicit
//! path given on the command line.
//!
//! ## Behaviour
//! - Missing file: defaults are written out and returned
//! - Malformed file: logged, replaced by defaults
//! - File from an older `version`: discarded and rewritten with defaults
//!
//! ## Example
//! ```rust,ignore
//! let config = Config::load().await?;
//! config.save().await?;
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tokio::fs as TokioFs;

use crate::fs::sort::SortMode;

/// Bumped whenever a field changes meaning; older files are reset.
pub const CONFIG_VERSION: u32 = 4;

/// Which storage backend the session talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Host,

    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendKind,

    /// Volume name (without ':') -> host directory acting as that volume.
    pub volumes: BTreeMap<String, PathBuf>,

    /// Size in bytes of each in-memory volume.
    pub memory_capacity: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let root: PathBuf = ProjectDirs::from("org", "msfm", "msfm")
            .map_or_else(|| PathBuf::from("."), |d: ProjectDirs| d.data_dir().to_path_buf());

        let mut volumes: BTreeMap<String, PathBuf> = BTreeMap::new();
        volumes.insert("ms0".to_string(), root.join("ms0"));

        Self {
            backend: BackendKind::Host,
            volumes,
            memory_capacity: 32 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    pub level: String,

    pub log_dir: PathBuf,

    pub file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: PathBuf::from("logs"),
            file_prefix: "msfm".to_string(),
        }
    }
}

/// Main configuration struct for the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: u32,

    pub sort: SortMode,

    /// Initial working directory, e.g. `ms0:/`.
    pub start_path: String,

    pub storage: StorageConfig,

    pub logging: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            sort: SortMode::NameAscending,
            start_path: "ms0:/".to_string(),
            storage: StorageConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("Failed to parse config")
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// Loads config from the platform config dir, or returns defaults.
    pub async fn load() -> anyhow::Result<Self> {
        let path: PathBuf = Self::config_path()?;

        Self::load_from(&path).await
    }

    /// Loads config from `path`, writing defaults there when the file is
    /// missing, malformed, or from an older version.
    pub async fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !TokioFs::try_exists(path).await.unwrap_or(false) {
            info!(
                "No config file found at {}, using default configuration. Creating it now.",
                path.display()
            );

            return Self::reset(path).await;
        }

        info!("Loading config from {}", path.display());

        let text: String = TokioFs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let cfg: Self = match Self::from_toml_str(&text) {
            Ok(cfg) => cfg,

            Err(e) => {
                warn!(error = %e, "Malformed config file, resetting");

                return Self::reset(path).await;
            }
        };

        if cfg.version < CONFIG_VERSION {
            info!(
                found = cfg.version,
                expected = CONFIG_VERSION,
                "Outdated config file, resetting"
            );

            return Self::reset(path).await;
        }

        Ok(cfg)
    }

    async fn reset(path: &Path) -> anyhow::Result<Self> {
        let default_config: Self = Self::default();
        default_config.save_to(path).await?;

        Ok(default_config)
    }

    /// Saves config to the platform config dir.
    pub async fn save(&self) -> anyhow::Result<()> {
        let path: PathBuf = Self::config_path()?;

        self.save_to(&path).await
    }

    pub async fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        info!("Saving config to {}", path.display());

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            TokioFs::create_dir_all(parent).await?;
        }

        let toml_str: String = self.to_toml_string()?;
        TokioFs::write(path, toml_str)
            .await
            .with_context(|| format!("Failed to write config file {}", path.display()))?;

        Ok(())
    }

    /// Returns the canonical config file path using `directories::ProjectDirs`.
    pub fn config_path() -> anyhow::Result<PathBuf> {
        let proj_dirs: ProjectDirs = ProjectDirs::from("org", "msfm", "msfm")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory."))?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn toml_round_trip() {
        let mut cfg = Config::default();
        cfg.sort = SortMode::SizeAscending;
        cfg.storage.backend = BackendKind::Memory;

        let text = cfg.to_toml_string().unwrap();
        assert!(text.contains("sort = 3"));
        assert!(text.contains("backend = \"memory\""));

        let back = Config::from_toml_str(&text).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn rejects_unknown_sort_mode() {
        assert!(Config::from_toml_str("version = 4\nsort = 9\n").is_err());
    }

    #[tokio::test]
    async fn missing_file_writes_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.toml");

        let cfg = Config::load_from(&path).await.unwrap();

        assert_eq!(cfg, Config::default());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn outdated_version_resets() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "version = 2\nsort = 1\n").unwrap();

        let cfg = Config::load_from(&path).await.unwrap();

        assert_eq!(cfg.sort, SortMode::NameAscending);
        assert_eq!(cfg.version, CONFIG_VERSION);
    }

    #[tokio::test]
    async fn malformed_file_resets_and_current_file_loads() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");

        std::fs::write(&path, "this is = = not toml").unwrap();
        let cfg = Config::load_from(&path).await.unwrap();
        assert_eq!(cfg, Config::default());

        std::fs::write(&path, "version = 4\nsort = 2\nstart_path = \"ef0:/\"\n").unwrap();
        let cfg = Config::load_from(&path).await.unwrap();
        assert_eq!(cfg.sort, SortMode::SizeDescending);
        assert_eq!(cfg.start_path, "ef0:/");
    }
}
