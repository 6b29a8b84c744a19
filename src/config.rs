//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - pgview.toml (default configuration)
//! - pgview.local.toml (git-ignored local overrides)
//! - Environment variables (PGVIEW_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # pgview.toml
//! [storage]
//! data_dir = "/var/lib/pgview"
//! default_workspace = "default"
//!
//! [engine]
//! max_fixpoint_iterations = 10000
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! PGVIEW_STORAGE__DATA_DIR=/custom/path
//! PGVIEW_ENGINE__USE_SSR_INDEX=false
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where workspaces and their catalogs live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory; each workspace gets `{data_dir}/{workspace}/catalog.json`
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Workspace opened when none is named
    #[serde(default = "default_workspace")]
    pub default_workspace: String,

    /// Write the catalog after every DDL statement
    #[serde(default = "default_true")]
    pub persist_catalog: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            data_dir: default_data_dir(),
            default_workspace: default_workspace(),
            persist_catalog: true,
        }
    }
}

/// Evaluation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Cap on semi-naive rounds per recursive stratum
    #[serde(default = "default_max_fixpoint_iterations")]
    pub max_fixpoint_iterations: usize,

    /// First id handed out for Skolem-generated nodes and edges
    #[serde(default = "default_skolem_id_base")]
    pub skolem_id_base: i64,

    /// Try SSR index rewriting before unfolding
    #[serde(default = "default_true")]
    pub use_ssr_index: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_fixpoint_iterations: default_max_fixpoint_iterations(),
            skolem_id_base: default_skolem_id_base(),
            use_ssr_index: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_workspace() -> String {
    "default".to_string()
}
fn default_true() -> bool {
    true
}
fn default_max_fixpoint_iterations() -> usize {
    10_000
}
fn default_skolem_id_base() -> i64 {
    1_000_000_000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("pgview.toml"))
            .merge(Toml::file("pgview.local.toml"))
            .merge(Env::prefixed("PGVIEW_").split("__"))
            .extract()
    }

    /// Load configuration from specific file path
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("PGVIEW_").split("__"))
            .extract()
    }
}
