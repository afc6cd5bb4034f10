//! Read-through proxy to the upstream open-data crime dataset.
//!
//! A request is validated, turned into one Socrata-style query
//! (`$select`/`$where`/`$order`/`$limit`), and the returned records are
//! reshaped into [`ApiIncident`]s. The upstream sits behind
//! [`IncidentUpstream`] so handlers can be exercised without a network.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use data_coyote_config::{ConfigError, env_or, env_var, require_env};
use data_coyote_server_models::ApiIncident;
use serde_json::Value;

/// Per-request timeout for upstream calls.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Upstream error bodies are truncated to this many characters.
pub const MAX_ERROR_BODY_CHARS: usize = 500;

/// Layout of the `$where` cutoff timestamp.
pub const CUTOFF_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Default and allowed range for the `days` parameter.
pub const DAYS_DEFAULT: u32 = 7;
/// Allowed range for the `days` parameter.
pub const DAYS_RANGE: (u32, u32) = (1, 60);

/// Default and allowed range for the `limit` parameter.
pub const LIMIT_DEFAULT: u32 = 200;
/// Allowed range for the `limit` parameter.
pub const LIMIT_RANGE: (u32, u32) = (1, 5000);

/// Errors raised while serving `GET /crime`.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// A query parameter was malformed or out of range.
    #[error("{0}")]
    InvalidParam(String),

    /// The upstream could not be reached.
    #[error("Upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The upstream answered with a non-success status.
    #[error("Upstream returned HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated to [`MAX_ERROR_BODY_CHARS`].
        body: String,
    },

    /// The upstream answered with something other than a JSON array.
    #[error("Upstream returned an unexpected payload: {0}")]
    Decode(String),
}

/// Upstream field names used to build and read queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNames {
    /// Timestamp field, used for filtering and ordering.
    pub time: String,
    /// Offense description field.
    pub offense: String,
    /// Location object field.
    pub location: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            time: "date".to_string(),
            offense: "offense".to_string(),
            location: "location".to_string(),
        }
    }
}

/// Proxy settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Upstream host, e.g. `data.example.gov`.
    pub domain: String,
    /// Dataset identifier.
    pub dataset: String,
    /// Field names.
    pub fields: FieldNames,
    /// Optional `X-App-Token` value.
    pub app_token: Option<String>,
}

impl ProxyConfig {
    /// Reads `CRIME_API_*` and `SOCRATA_APP_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnv`] if `CRIME_API_DOMAIN` or
    /// `CRIME_API_DATASET` is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            domain: require_env("CRIME_API_DOMAIN")?,
            dataset: require_env("CRIME_API_DATASET")?,
            fields: FieldNames {
                time: env_or("CRIME_API_TIME_FIELD", "date"),
                offense: env_or("CRIME_API_OFFENSE_FIELD", "offense"),
                location: env_or("CRIME_API_LOCATION_FIELD", "location"),
            },
            app_token: env_var("SOCRATA_APP_TOKEN"),
        })
    }

    /// Resource URL for the dataset.
    #[must_use]
    pub fn resource_url(&self) -> String {
        format!("https://{}/resource/{}.json", self.domain, self.dataset)
    }
}

/// A validated `GET /crime` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CrimeQuery {
    /// Lookback window in days.
    pub days: u32,
    /// Maximum number of incidents.
    pub limit: u32,
}

impl CrimeQuery {
    /// Validates raw parameter values, applying defaults when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::InvalidParam`] if a value is not an integer or
    /// falls outside its allowed range.
    pub fn parse(days: Option<&str>, limit: Option<&str>) -> Result<Self, ProxyError> {
        Ok(Self {
            days: parse_bounded("days", days, DAYS_DEFAULT, DAYS_RANGE)?,
            limit: parse_bounded("limit", limit, LIMIT_DEFAULT, LIMIT_RANGE)?,
        })
    }

    /// Cutoff timestamp `days` before `now`.
    #[must_use]
    pub fn cutoff(&self, now: NaiveDateTime) -> String {
        (now - chrono::Duration::days(i64::from(self.days)))
            .format(CUTOFF_FORMAT)
            .to_string()
    }
}

fn parse_bounded(
    name: &str,
    raw: Option<&str>,
    default: u32,
    (min, max): (u32, u32),
) -> Result<u32, ProxyError> {
    let Some(raw) = raw.map(str::trim) else {
        return Ok(default);
    };
    let value: i64 = raw
        .parse()
        .map_err(|_| ProxyError::InvalidParam(format!("{name} must be an integer")))?;
    u32::try_from(value)
        .ok()
        .filter(|v| (min..=max).contains(v))
        .ok_or_else(|| ProxyError::InvalidParam(format!("{name} must be between {min} and {max}")))
}

/// Source of raw upstream records.
#[async_trait]
pub trait IncidentUpstream: Send + Sync {
    /// Fetches at most `limit` records at or after `cutoff`, newest first.
    async fn fetch(&self, cutoff: &str, limit: u32) -> Result<Vec<Value>, ProxyError>;
}

/// [`IncidentUpstream`] backed by a Socrata-style HTTP API.
pub struct SocrataUpstream {
    client: reqwest::Client,
    config: ProxyConfig,
}

impl SocrataUpstream {
    /// Creates an upstream client with [`UPSTREAM_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the HTTP client cannot be built.
    pub fn new(config: ProxyConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .build()?;
        Ok(Self { client, config })
    }

    /// Query string pairs for one request.
    #[must_use]
    pub fn query_params(fields: &FieldNames, cutoff: &str, limit: u32) -> Vec<(&'static str, String)> {
        vec![
            (
                "$select",
                format!("{},{},{}", fields.time, fields.offense, fields.location),
            ),
            ("$where", format!("{} >= '{cutoff}'", fields.time)),
            ("$order", format!("{} DESC", fields.time)),
            ("$limit", limit.to_string()),
        ]
    }
}

#[async_trait]
impl IncidentUpstream for SocrataUpstream {
    async fn fetch(&self, cutoff: &str, limit: u32) -> Result<Vec<Value>, ProxyError> {
        let mut request = self
            .client
            .get(self.config.resource_url())
            .query(&Self::query_params(&self.config.fields, cutoff, limit));
        if let Some(token) = &self.config.app_token {
            request = request.header("X-App-Token", token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProxyError::Status {
                status: status.as_u16(),
                body: truncate_chars(&body, MAX_ERROR_BODY_CHARS),
            });
        }

        match response.json::<Value>().await? {
            Value::Array(records) => Ok(records),
            other => Err(ProxyError::Decode(truncate_chars(
                &other.to_string(),
                MAX_ERROR_BODY_CHARS,
            ))),
        }
    }
}

/// Fetches and reshapes incidents for `query`, using the current time.
///
/// # Errors
///
/// Returns [`ProxyError`] if the upstream call fails.
pub async fn fetch_incidents(
    upstream: &dyn IncidentUpstream,
    fields: &FieldNames,
    query: CrimeQuery,
) -> Result<Vec<ApiIncident>, ProxyError> {
    let cutoff = query.cutoff(Utc::now().naive_utc());
    log::debug!("Querying upstream since {cutoff} (limit {})", query.limit);
    let records = upstream.fetch(&cutoff, query.limit).await?;
    Ok(records
        .iter()
        .map(|record| reshape_record(record, fields))
        .collect())
}

/// Maps one upstream record to an [`ApiIncident`].
#[must_use]
pub fn reshape_record(record: &Value, fields: &FieldNames) -> ApiIncident {
    let datetime = record
        .get(&fields.time)
        .and_then(Value::as_str)
        .map(ToString::to_string);

    let offense = match record.get(&fields.offense) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    let (latitude, longitude) = record
        .get(&fields.location)
        .map_or((None, None), extract_coordinates);

    ApiIncident {
        datetime,
        offense,
        latitude,
        longitude,
    }
}

/// Reads `(latitude, longitude)` from a location object. Returns both or
/// neither.
fn extract_coordinates(location: &Value) -> (Option<f64>, Option<f64>) {
    let (lat, lon) = match (location.get("latitude"), location.get("longitude")) {
        (Some(lat), Some(lon)) => (coerce_f64(lat), coerce_f64(lon)),
        _ => match location.get("coordinates").and_then(Value::as_array) {
            Some(pair) if pair.len() >= 2 => (coerce_f64(&pair[1]), coerce_f64(&pair[0])),
            _ => (None, None),
        },
    };

    match (lat, lon) {
        (Some(lat), Some(lon)) => (Some(lat), Some(lon)),
        _ => (None, None),
    }
}

fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

/// Truncates to at most `max` characters on a char boundary.
#[must_use]
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
