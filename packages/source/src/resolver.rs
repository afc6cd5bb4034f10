//! Ordered source resolution.
//!
//! A dataset's source is chosen by evaluating a list of named resolvers in
//! order. Each resolver either produces a [`ResolvedSource`] or explains why
//! it was skipped; the first one that produces a source wins.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use data_coyote_table_models::Dataset;

use crate::SourceError;

/// A concrete location to load a dataset from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedSource {
    /// Remote CSV download.
    Url(String),
    /// Local CSV file.
    File(PathBuf),
}

/// Outcome of a single resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The resolver produced a usable source.
    Resolved(ResolvedSource),
    /// The resolver could not produce a source, with the reason.
    Skipped(String),
}

/// One step in a source resolution chain.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    /// Short name used in log messages and skip reasons.
    fn name(&self) -> &'static str;

    /// Attempts to produce a source. Never fails: problems become
    /// [`Resolution::Skipped`].
    async fn resolve(&self) -> Resolution;
}

/// Evaluates `resolvers` in order and returns the first resolved source.
///
/// # Errors
///
/// Returns [`SourceError::NoSource`] with every skip reason if no resolver
/// produces a source.
pub async fn resolve_first(
    dataset: Dataset,
    resolvers: &[Box<dyn SourceResolver>],
) -> Result<ResolvedSource, SourceError> {
    let mut reasons = Vec::with_capacity(resolvers.len());

    for resolver in resolvers {
        match resolver.resolve().await {
            Resolution::Resolved(source) => {
                log::debug!("[{dataset}] source resolved by {}", resolver.name());
                return Ok(source);
            }
            Resolution::Skipped(reason) => {
                log::debug!("[{dataset}] {} skipped: {reason}", resolver.name());
                reasons.push(format!("{}: {reason}", resolver.name()));
            }
        }
    }

    Err(SourceError::NoSource { dataset, reasons })
}

/// Returns `true` if `url` is an absolute HTTP(S) URL and not an unresolved
/// `${VAR}` placeholder.
#[must_use]
pub fn is_usable_url(url: &str) -> bool {
    let trimmed = url.trim();
    trimmed.starts_with("http") && !trimmed.starts_with("${")
}

/// Uses the URL from the config file when it is usable.
pub struct ConfiguredUrl {
    url: Option<String>,
}

impl ConfiguredUrl {
    /// Creates a resolver for the configured URL, if any.
    #[must_use]
    pub fn new(url: Option<&str>) -> Self {
        Self {
            url: url.map(str::to_string),
        }
    }
}

#[async_trait]
impl SourceResolver for ConfiguredUrl {
    fn name(&self) -> &'static str {
        "configured_url"
    }

    async fn resolve(&self) -> Resolution {
        match self.url.as_deref() {
            None => Resolution::Skipped("no url configured".to_string()),
            Some(url) if is_usable_url(url) => {
                Resolution::Resolved(ResolvedSource::Url(url.trim().to_string()))
            }
            Some(url) => Resolution::Skipped(format!("url {url:?} is not usable")),
        }
    }
}

/// Falls back to the configured local CSV path.
pub struct LocalFile {
    path: Option<PathBuf>,
}

impl LocalFile {
    /// Creates a resolver for the configured local path, if any.
    #[must_use]
    pub fn new(path: Option<&Path>) -> Self {
        Self {
            path: path.map(Path::to_path_buf),
        }
    }
}

#[async_trait]
impl SourceResolver for LocalFile {
    fn name(&self) -> &'static str {
        "local_file"
    }

    async fn resolve(&self) -> Resolution {
        self.path.as_ref().map_or_else(
            || Resolution::Skipped("no local_path configured".to_string()),
            |path| Resolution::Resolved(ResolvedSource::File(path.clone())),
        )
    }
}
