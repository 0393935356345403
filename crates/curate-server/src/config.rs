//! Server configuration and command line

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use curate_core::SortPolicy;
use curate_logging::LogConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where records are kept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Lost on restart
    #[default]
    Memory,
    /// Single redb file at `db_path`
    Redb,
}

/// Which suggestion service backs `?suggest=true`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionBackend {
    /// Answer from the built-in schemas
    #[default]
    Static,
    /// Claude, using `ANTHROPIC_API_KEY`
    Claude,
}

/// Top-level `curate.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub bind: String,
    pub storage: StorageBackend,
    /// redb file, used by the `redb` backend
    pub db_path: PathBuf,
    /// Root of the filesystem blob store
    pub blob_dir: PathBuf,
    /// Prefix of blob URLs stored in records
    pub public_base_url: String,
    pub max_blob_size: u64,
    pub sort: SortPolicy,
    pub page_size: usize,
    pub suggestions: SuggestionBackend,
    /// Model override for the Claude service
    pub suggestion_model: Option<String>,
    pub logging: LogConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            storage: StorageBackend::default(),
            db_path: PathBuf::from("./data/curate.redb"),
            blob_dir: PathBuf::from("./data/blobs"),
            public_base_url: "http://127.0.0.1:8080/blobs".to_string(),
            max_blob_size: 20 * 1024 * 1024,
            sort: SortPolicy::default(),
            page_size: curate_sync::view::DEFAULT_PAGE_SIZE,
            suggestions: SuggestionBackend::default(),
            suggestion_model: None,
            logging: LogConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read a TOML file; missing keys take their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = bind.into();
        self
    }

    pub fn with_storage(mut self, storage: StorageBackend) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_blob_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.blob_dir = dir.into();
        self
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    pub fn with_logging(mut self, logging: LogConfig) -> Self {
        self.logging = logging;
        self
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(String),
}

#[derive(Parser)]
#[command(name = "curate", about = "Content curation dashboard backend", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API
    Serve {
        /// Path to curate.toml
        #[arg(long, short)]
        config: Option<PathBuf>,
        /// Override the listen address
        #[arg(long)]
        bind: Option<String>,
    },
    /// Delete blobs no record references
    GcBlobs {
        /// Path to curate.toml
        #[arg(long, short)]
        config: Option<PathBuf>,
        /// Only report what would be deleted
        #[arg(long)]
        dry_run: bool,
    },
    /// Print every content type and its fields
    Types,
}
