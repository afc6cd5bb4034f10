#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Dataset ingestion for the batch pipeline.
//!
//! Each dataset is read from the first source that an ordered chain of
//! [`SourceResolver`]s can produce: a configured URL, a URL derived from the
//! FBI agency directory (crime only), or a local CSV file. Resolvers that
//! cannot produce a source explain why, and the chain moves on.

pub mod agency;
pub mod csv_table;
pub mod resolver;

#[cfg(test)]
mod test_server;

use std::path::PathBuf;
use std::time::Duration;

use data_coyote_config::Config;
use data_coyote_table_models::{Dataset, Table};

use crate::agency::AgencyLookup;
use crate::resolver::{ConfiguredUrl, LocalFile, ResolvedSource, SourceResolver, resolve_first};

/// Per-request timeout for every ingestion HTTP call.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(45);

/// Errors that can occur during ingestion.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed or returned an error status.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// CSV parsing failed.
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    /// A local file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Every resolver in the chain was skipped.
    #[error("No usable source for {dataset}: {}", .reasons.join("; "))]
    NoSource {
        /// Dataset being ingested.
        dataset: Dataset,
        /// One `resolver: reason` entry per skipped resolver.
        reasons: Vec<String>,
    },
}

/// Builds the HTTP client used for ingestion.
///
/// # Errors
///
/// Returns [`SourceError::Http`] if the TLS backend cannot be initialized.
pub fn http_client() -> Result<reqwest::Client, SourceError> {
    Ok(reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?)
}

/// Ingests the crime dataset.
///
/// Resolution order: configured URL, FBI agency lookup, local file.
///
/// # Errors
///
/// Returns [`SourceError`] if no source can be resolved or the chosen
/// source cannot be fetched or parsed.
pub async fn ingest_crime(config: &Config) -> Result<Table, SourceError> {
    let source = &config.sources.crime;
    let client = http_client()?;
    let resolvers: Vec<Box<dyn SourceResolver>> = vec![
        Box::new(ConfiguredUrl::new(source.url.as_deref())),
        Box::new(AgencyLookup::from_env(client.clone())),
        Box::new(LocalFile::new(source.local_path.as_deref())),
    ];
    ingest(Dataset::Crime, &client, &resolvers).await
}

/// Ingests the tourism dataset.
///
/// Resolution order: configured URL, local file.
///
/// # Errors
///
/// Returns [`SourceError`] if no source can be resolved or the chosen
/// source cannot be fetched or parsed.
pub async fn ingest_tourism(config: &Config) -> Result<Table, SourceError> {
    let source = &config.sources.tourism;
    let client = http_client()?;
    let resolvers: Vec<Box<dyn SourceResolver>> = vec![
        Box::new(ConfiguredUrl::new(source.url.as_deref())),
        Box::new(LocalFile::new(source.local_path.as_deref())),
    ];
    ingest(Dataset::Tourism, &client, &resolvers).await
}

/// Resolves a source through `resolvers` and loads it as a [`Table`].
///
/// # Errors
///
/// Returns [`SourceError`] if no source can be resolved or loading fails.
pub async fn ingest(
    dataset: Dataset,
    client: &reqwest::Client,
    resolvers: &[Box<dyn SourceResolver>],
) -> Result<Table, SourceError> {
    let table = match resolve_first(dataset, resolvers).await? {
        ResolvedSource::Url(url) => {
            log::info!(
                "Fetching {dataset} data from URL: {}",
                csv_table::redact_api_key(&url)
            );
            csv_table::fetch_csv(client, &url).await?
        }
        ResolvedSource::File(path) => {
            log::info!("Reading local {dataset} data: {}", path.display());
            csv_table::read_csv_file(&path)?
        }
    };

    log::info!("Ingested {dataset} rows: {}", table.len());
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ingests_local_file_when_url_is_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tourism.csv");
        std::fs::write(&path, "Month,Visitors\n2024-01,100\n2024-02,120\n").unwrap();

        let client = http_client().unwrap();
        let resolvers: Vec<Box<dyn SourceResolver>> = vec![
            Box::new(ConfiguredUrl::new(Some("${TOURISM_URL}"))),
            Box::new(LocalFile::new(Some(&path))),
        ];

        let table = ingest(Dataset::Tourism, &client, &resolvers).await.unwrap();
        assert_eq!(table.columns(), ["Month", "Visitors"]);
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn reports_every_skip_reason_when_nothing_resolves() {
        let client = http_client().unwrap();
        let resolvers: Vec<Box<dyn SourceResolver>> = vec![
            Box::new(ConfiguredUrl::new(None)),
            Box::new(LocalFile::new(None)),
        ];

        let err = ingest(Dataset::Crime, &client, &resolvers).await.unwrap_err();
        let SourceError::NoSource { dataset, reasons } = err else {
            panic!("expected NoSource");
        };
        assert_eq!(dataset, Dataset::Crime);
        assert_eq!(reasons.len(), 2);
        assert!(reasons[0].starts_with("configured_url:"));
        assert!(reasons[1].starts_with("local_file:"));
    }

    #[tokio::test]
    async fn url_failure_does_not_fall_back_to_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crime.csv");
        std::fs::write(&path, "Date,Offense\n2024-01-15,ASSAULT\n").unwrap();

        let url = test_server::serve(503, "unavailable").await;
        let client = http_client().unwrap();
        let resolvers: Vec<Box<dyn SourceResolver>> = vec![
            Box::new(ConfiguredUrl::new(Some(&url))),
            Box::new(LocalFile::new(Some(&path))),
        ];

        let err = ingest(Dataset::Crime, &client, &resolvers).await.unwrap_err();
        assert!(matches!(err, SourceError::Http(_)), "{err}");
    }

    #[tokio::test]
    async fn missing_local_file_is_an_io_error() {
        let client = http_client().unwrap();
        let resolvers: Vec<Box<dyn SourceResolver>> = vec![Box::new(LocalFile::new(Some(
            std::path::Path::new("/no/such/crime.csv"),
        )))];

        let err = ingest(Dataset::Crime, &client, &resolvers).await.unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }
}
