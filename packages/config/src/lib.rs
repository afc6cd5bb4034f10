#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Configuration loading for the batch pipeline.
//!
//! The config file is TOML. Every string value may reference environment
//! variables as `$NAME` or `${NAME}`; references are expanded once at load
//! time. References to unset variables are left verbatim, so an unresolved
//! source URL stays a `${...}` placeholder and the ingestor rejects it.

mod env;

use std::path::{Path, PathBuf};

use serde::Deserialize;

pub use env::{env_or, env_var, expand_env_with, load_dotenv, require_env};

/// Default location of the pipeline config file, relative to the working
/// directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Read {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config document is malformed or missing required keys.
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A required environment variable is unset or empty.
    #[error("Missing required environment variable {name}")]
    MissingEnv {
        /// Variable name.
        name: String,
    },
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Per-dataset source definitions.
    pub sources: SourcesConfig,
    /// Output destinations.
    pub publish: PublishConfig,
}

/// Source definitions for each dataset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourcesConfig {
    /// Crime incidents or offense summaries.
    pub crime: SourceConfig,
    /// Monthly tourism indicators.
    pub tourism: SourceConfig,
}

/// Where one dataset comes from and how its columns are named.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceConfig {
    /// Remote CSV location. May be an unresolved `${VAR}` placeholder.
    #[serde(default)]
    pub url: Option<String>,
    /// Local CSV fallback.
    #[serde(default)]
    pub local_path: Option<PathBuf>,
    /// Name of the date column (matched case-insensitively).
    pub date_column: String,
    /// Name of the free-text offense/type column, if the dataset has one.
    #[serde(default)]
    pub type_column: Option<String>,
}

/// Output destinations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PublishConfig {
    /// Flat-file output.
    pub files: FilesConfig,
    /// Optional spreadsheet publishing.
    #[serde(default)]
    pub google_sheets: GoogleSheetsConfig,
}

/// Flat-file output settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FilesConfig {
    /// Directory the cleaned CSVs are written to.
    pub out_dir: PathBuf,
}

/// Spreadsheet publish settings.
///
/// The `*_env` fields name environment variables rather than holding the
/// values themselves, so the same config file works across deployments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GoogleSheetsConfig {
    /// Force publishing on even without the auto-enable conditions.
    #[serde(default)]
    pub enabled: bool,
    /// Env var holding the spreadsheet name.
    #[serde(default)]
    pub spreadsheet_name_env: Option<String>,
    /// Env var holding the crime worksheet tab name.
    #[serde(default)]
    pub crime_sheet_env: Option<String>,
    /// Env var holding the tourism worksheet tab name.
    #[serde(default)]
    pub tourism_sheet_env: Option<String>,
}

/// Reads and parses the config file at `path`, expanding environment
/// variable references in every string value.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read or does not describe a
/// valid [`Config`].
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config_str(&text, |name| std::env::var(name).ok())?;
    log::info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Parses a config document, resolving variable references through
/// `lookup`.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if the document is malformed or missing
/// required keys.
pub fn parse_config_str(
    text: &str,
    lookup: impl Fn(&str) -> Option<String> + Copy,
) -> Result<Config, ConfigError> {
    let table: toml::Table = toml::from_str(text)?;
    let expanded = expand_value(toml::Value::Table(table), lookup);
    Ok(expanded.try_into()?)
}

/// Recursively expands variable references in every string of a TOML value.
fn expand_value(value: toml::Value, lookup: impl Fn(&str) -> Option<String> + Copy) -> toml::Value {
    match value {
        toml::Value::String(s) => toml::Value::String(expand_env_with(&s, lookup)),
        toml::Value::Array(items) => toml::Value::Array(
            items
                .into_iter()
                .map(|item| expand_value(item, lookup))
                .collect(),
        ),
        toml::Value::Table(table) => toml::Value::Table(
            table
                .into_iter()
                .map(|(key, item)| (key, expand_value(item, lookup)))
                .collect(),
        ),
        other => other,
    }
}
