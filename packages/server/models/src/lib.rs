#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the Data Coyote server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the upstream record shape so the API contract can stay stable when
//! the upstream dataset changes field names.

use serde::{Deserialize, Serialize};

/// A crime incident as returned by `GET /crime`.
///
/// Every field is nullable. `latitude` and `longitude` are either both
/// present or both null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiIncident {
    /// When the incident occurred, as reported upstream.
    pub datetime: Option<String>,
    /// Offense description.
    pub offense: Option<String>,
    /// Latitude in decimal degrees.
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees.
    pub longitude: Option<f64>,
}

/// Raw query parameters for `GET /crime`.
///
/// Kept as strings so malformed values can be rejected with a JSON error
/// body rather than the framework's default plain-text response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrimeQueryParams {
    /// Lookback window in days.
    pub days: Option<String>,
    /// Maximum number of incidents.
    pub limit: Option<String>,
}

/// Response body for `GET /`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiRoot {
    /// Service name.
    pub name: String,
    /// Always `"ok"`.
    pub status: String,
}

/// Response body for `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Always `true`.
    pub ok: bool,
    /// Always `"pong"`.
    pub message: String,
}

/// Error body for 4xx and 5xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable error message.
    pub error: String,
    /// Upstream HTTP status, when the upstream answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Upstream response body (truncated) or transport error text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl ApiError {
    /// An error with only a message.
    #[must_use]
    pub fn message(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            status: None,
            body: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incident_serializes_nulls() {
        let incident = ApiIncident {
            datetime: Some("2024-01-15T14:30:00.000".to_string()),
            offense: None,
            latitude: None,
            longitude: None,
        };
        assert_eq!(
            serde_json::to_value(&incident).unwrap(),
            serde_json::json!({
                "datetime": "2024-01-15T14:30:00.000",
                "offense": null,
                "latitude": null,
                "longitude": null,
            })
        );
    }

    #[test]
    fn validation_error_has_only_message() {
        assert_eq!(
            serde_json::to_value(ApiError::message("days must be between 1 and 60")).unwrap(),
            serde_json::json!({ "error": "days must be between 1 and 60" })
        );
    }
}
