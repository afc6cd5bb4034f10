#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Output for cleaned tables.
//!
//! Every run writes one CSV file per dataset via [`write_table`]. Publishing
//! to a spreadsheet is optional and best-effort; see [`sheets`].

pub mod sheets;

use std::path::{Path, PathBuf};

use data_coyote_table_models::Table;

pub use sheets::maybe_publish;

/// Errors that can occur while writing or publishing a table.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Filesystem failure while writing output.
    #[error("Failed to write {path}: {source}")]
    Io {
        /// File or directory being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// CSV serialization failed.
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    /// HTTP request to the spreadsheet service failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The spreadsheet service returned an unexpected document.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Credentials are missing or unusable.
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// The spreadsheet service responded without a field we need.
    #[error("Unexpected spreadsheet response: {0}")]
    UnexpectedResponse(String),
}

/// Writes `table` to `dir/{name}.csv`, creating `dir` if needed and
/// overwriting any existing file.
///
/// # Errors
///
/// Returns [`PublishError::Io`] if the directory or file cannot be written,
/// or [`PublishError::Csv`] if serialization fails.
pub fn write_table(table: &Table, name: &str, dir: &Path) -> Result<PathBuf, PublishError> {
    std::fs::create_dir_all(dir).map_err(|source| PublishError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(format!("{name}.csv"));
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(row)?;
    }
    writer.flush().map_err(|source| PublishError::Io {
        path: path.clone(),
        source,
    })?;

    log::info!("Wrote {} rows to {}", table.len(), path.display());
    Ok(path)
}
