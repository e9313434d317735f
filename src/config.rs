use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

/// Conventional per-project store location, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = ".megamemory/knowledge.db";

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct KnowledgeConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_top_k: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.into(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_home_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { default_top_k: 10 }
    }
}

/// Returns `~/.megamemory/` — shared across projects (model cache lives here).
pub fn default_home_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".megamemory")
}

/// Project-local config file: `.megamemory/config.toml`.
pub fn default_config_path() -> PathBuf {
    PathBuf::from(".megamemory/config.toml")
}

impl KnowledgeConfig {
    /// Load config from the project-local TOML file (if present) then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            KnowledgeConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides. `MEGAMEMORY_DB_PATH` relocates
    /// the store for every entry point.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MEGAMEMORY_DB_PATH") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("MEGAMEMORY_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }

    /// Resolve the store path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

/// Resolve the store path for a CLI invocation: explicit `--db` flag first,
/// then `MEGAMEMORY_DB_PATH`, then the conventional project-local default.
pub fn resolve_db_path(flag: Option<&str>) -> PathBuf {
    if let Some(path) = flag {
        return expand_tilde(path);
    }
    if let Ok(path) = std::env::var("MEGAMEMORY_DB_PATH") {
        return expand_tilde(&path);
    }
    PathBuf::from(DEFAULT_DB_PATH)
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
