//! Best-effort spreadsheet publishing.
//!
//! Publishing is driven by environment variables so the same config file can
//! run with or without spreadsheet access. The Google Sheets integration sits
//! behind [`SpreadsheetClient`]; [`GoogleSheetsClient`] talks to the Sheets v4
//! and Drive v3 REST APIs with a bearer token.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use data_coyote_config::GoogleSheetsConfig;
use data_coyote_table_models::{Dataset, Table};
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;

use crate::PublishError;

/// Env var naming the credentials file.
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Worksheet tab used for crime data when none is configured.
pub const DEFAULT_CRIME_TAB: &str = "crime_data";

/// Worksheet tab used for tourism data when none is configured.
pub const DEFAULT_TOURISM_TAB: &str = "tourism_data";

/// Size of a newly created worksheet.
pub const NEW_SHEET_ROWS: u32 = 100;
/// Size of a newly created worksheet.
pub const NEW_SHEET_COLS: u32 = 26;

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DRIVE_FILES_API: &str = "https://www.googleapis.com/drive/v3/files";
const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Identifier of an opened spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpreadsheetId(pub String);

/// Operations needed to publish tables to a spreadsheet service.
#[async_trait]
pub trait SpreadsheetClient: Send + Sync {
    /// Opens the spreadsheet called `name`, creating it if absent.
    async fn open_or_create(&self, name: &str) -> Result<SpreadsheetId, PublishError>;

    /// Clears the worksheet `tab`, or creates it with
    /// [`NEW_SHEET_ROWS`] x [`NEW_SHEET_COLS`] cells if it does not exist.
    async fn reset_worksheet(
        &self,
        spreadsheet: &SpreadsheetId,
        tab: &str,
    ) -> Result<(), PublishError>;

    /// Writes `rows` into `tab` starting at the top-left cell.
    async fn write_values(
        &self,
        spreadsheet: &SpreadsheetId,
        tab: &str,
        rows: &[Vec<String>],
    ) -> Result<(), PublishError>;
}

/// Resolved publish destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetsTarget {
    /// Credentials file, if one is configured.
    pub credentials: Option<PathBuf>,
    /// Spreadsheet name.
    pub spreadsheet: String,
    /// Tab receiving crime data.
    pub crime_tab: String,
    /// Tab receiving tourism data.
    pub tourism_tab: String,
}

impl SheetsTarget {
    /// Tab name for `dataset`.
    #[must_use]
    pub fn tab_for(&self, dataset: Dataset) -> &str {
        match dataset {
            Dataset::Crime => &self.crime_tab,
            Dataset::Tourism => &self.tourism_tab,
        }
    }
}

/// What [`maybe_publish`] should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishPlan {
    /// Neither forced on nor auto-enabled.
    Disabled,
    /// Enabled but no spreadsheet name is available.
    MissingSpreadsheetName,
    /// Publish to this target.
    Publish(SheetsTarget),
}

/// Decides whether and where to publish.
///
/// Publishing is enabled when `config.enabled` is set, or when both the
/// credentials reference and the spreadsheet name resolve through `lookup`.
#[must_use]
pub fn plan_publish(
    config: &GoogleSheetsConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> PublishPlan {
    let from_env = |name: Option<&str>| {
        name.and_then(&lookup)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    let credentials = from_env(Some(CREDENTIALS_ENV));
    let spreadsheet = from_env(config.spreadsheet_name_env.as_deref());

    if !config.enabled && (credentials.is_none() || spreadsheet.is_none()) {
        return PublishPlan::Disabled;
    }
    let Some(spreadsheet) = spreadsheet else {
        return PublishPlan::MissingSpreadsheetName;
    };

    PublishPlan::Publish(SheetsTarget {
        credentials: credentials.map(PathBuf::from),
        spreadsheet,
        crime_tab: from_env(config.crime_sheet_env.as_deref())
            .unwrap_or_else(|| DEFAULT_CRIME_TAB.to_string()),
        tourism_tab: from_env(config.tourism_sheet_env.as_deref())
            .unwrap_or_else(|| DEFAULT_TOURISM_TAB.to_string()),
    })
}

/// Replaces the contents of `tab` with the header row followed by every
/// data row.
///
/// # Errors
///
/// Returns [`PublishError`] if any client call fails.
pub async fn publish_table(
    client: &dyn SpreadsheetClient,
    spreadsheet: &SpreadsheetId,
    tab: &str,
    table: &Table,
) -> Result<(), PublishError> {
    client.reset_worksheet(spreadsheet, tab).await?;

    let mut values = Vec::with_capacity(table.len() + 1);
    values.push(table.columns().to_vec());
    values.extend(table.rows().iter().cloned());
    client.write_values(spreadsheet, tab, &values).await?;

    log::info!("Published {} rows to sheet tab {tab}", table.len());
    Ok(())
}

/// Publishes both datasets to `target`.
///
/// # Errors
///
/// Returns the first [`PublishError`] encountered.
pub async fn publish_all(
    client: &dyn SpreadsheetClient,
    target: &SheetsTarget,
    crime: &Table,
    tourism: &Table,
) -> Result<(), PublishError> {
    let spreadsheet = client.open_or_create(&target.spreadsheet).await?;
    publish_table(client, &spreadsheet, target.tab_for(Dataset::Crime), crime).await?;
    publish_table(client, &spreadsheet, target.tab_for(Dataset::Tourism), tourism).await?;
    Ok(())
}

/// Publishes both tables if the environment enables it.
///
/// Never fails: every problem is logged as a warning. Returns `true` if the
/// tables were published.
pub async fn maybe_publish(config: &GoogleSheetsConfig, crime: &Table, tourism: &Table) -> bool {
    let target = match plan_publish(config, data_coyote_config::env_var) {
        PublishPlan::Disabled => {
            log::info!("Spreadsheet publish disabled; skipping");
            return false;
        }
        PublishPlan::MissingSpreadsheetName => {
            log::warn!("Spreadsheet publish enabled but no spreadsheet name is set; skipping");
            return false;
        }
        PublishPlan::Publish(target) => target,
    };

    let result = match GoogleSheetsClient::from_credentials(target.credentials.as_deref()) {
        Ok(client) => publish_all(&client, &target, crime, tourism).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            log::info!("Published to spreadsheet {:?}", target.spreadsheet);
            true
        }
        Err(e) => {
            log::warn!("Spreadsheet publish failed: {e}");
            false
        }
    }
}

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    access_token: Option<String>,
    token: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Reads a bearer token from a JSON credentials file.
///
/// The file must already hold a minted OAuth access token in an
/// `access_token` or `token` field, as written by
/// `gcloud auth print-access-token` wrappers or an authorized-user cache.
/// Service-account key files are rejected: exchanging a key for a token
/// is not done here, so mint one out of band and point
/// `GOOGLE_APPLICATION_CREDENTIALS` at the result.
///
/// # Errors
///
/// Returns [`PublishError::Credentials`] if the file cannot be read, is a
/// service-account key, or carries neither an `access_token` nor a `token`
/// field.
pub fn read_token(path: &Path) -> Result<String, PublishError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        PublishError::Credentials(format!("cannot read {}: {e}", path.display()))
    })?;
    parse_token(&text)
        .map_err(|reason| PublishError::Credentials(format!("{reason} in {}", path.display())))
}

fn parse_token(text: &str) -> Result<String, String> {
    let file: CredentialsFile =
        serde_json::from_str(text).map_err(|e| format!("invalid credentials JSON ({e})"))?;
    if let Some(token) = file
        .access_token
        .or(file.token)
        .filter(|token| !token.trim().is_empty())
    {
        return Ok(token);
    }
    if file.kind.as_deref() == Some("service_account") {
        return Err("service-account key without an access token".to_string());
    }
    Err("no token".to_string())
}

/// [`SpreadsheetClient`] backed by the Google Sheets and Drive REST APIs.
pub struct GoogleSheetsClient {
    client: reqwest::Client,
    token: String,
}

impl GoogleSheetsClient {
    /// Creates a client that authenticates with `token`.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Http`] if the HTTP client cannot be built.
    pub fn new(token: String) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client, token })
    }

    /// Creates a client from the credentials file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Credentials`] if no path is given or the file
    /// holds no token.
    pub fn from_credentials(path: Option<&Path>) -> Result<Self, PublishError> {
        let path = path.ok_or_else(|| {
            PublishError::Credentials(format!("{CREDENTIALS_ENV} is not set"))
        })?;
        Self::new(read_token(path)?)
    }

    fn sheets_url(spreadsheet: &SpreadsheetId, segments: &[&str]) -> Result<Url, PublishError> {
        let mut url = Url::parse(SHEETS_API)
            .map_err(|e| PublishError::UnexpectedResponse(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| PublishError::UnexpectedResponse("invalid base URL".to_string()))?
            .push(&spreadsheet.0)
            .extend(segments);
        Ok(url)
    }

    async fn send_json(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<serde_json::Value, PublishError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn worksheet_titles(
        &self,
        spreadsheet: &SpreadsheetId,
    ) -> Result<Vec<String>, PublishError> {
        let url = Self::sheets_url(spreadsheet, &[])?;
        let body = self
            .send_json(
                self.client
                    .get(url)
                    .query(&[("fields", "sheets.properties.title")]),
            )
            .await?;
        Ok(sheet_titles(&body))
    }
}

#[async_trait]
impl SpreadsheetClient for GoogleSheetsClient {
    async fn open_or_create(&self, name: &str) -> Result<SpreadsheetId, PublishError> {
        let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
        let query = format!(
            "name = '{escaped}' and mimeType = '{SPREADSHEET_MIME}' and trashed = false"
        );
        let found = self
            .send_json(
                self.client
                    .get(DRIVE_FILES_API)
                    .query(&[("q", query.as_str()), ("fields", "files(id)")]),
            )
            .await?;
        if let Some(id) = first_file_id(&found) {
            log::debug!("Opened spreadsheet {name:?} ({id})");
            return Ok(SpreadsheetId(id));
        }

        let created = self
            .send_json(
                self.client
                    .post(SHEETS_API)
                    .json(&json!({ "properties": { "title": name } })),
            )
            .await?;
        let id = created
            .get("spreadsheetId")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                PublishError::UnexpectedResponse("create returned no spreadsheetId".to_string())
            })?;
        log::info!("Created spreadsheet {name:?} ({id})");
        Ok(SpreadsheetId(id.to_string()))
    }

    async fn reset_worksheet(
        &self,
        spreadsheet: &SpreadsheetId,
        tab: &str,
    ) -> Result<(), PublishError> {
        let titles = self.worksheet_titles(spreadsheet).await?;

        if titles.iter().any(|title| title == tab) {
            let range = format!("{}:clear", a1_range(tab));
            let url = Self::sheets_url(spreadsheet, &["values", &range])?;
            self.send_json(self.client.post(url).json(&json!({}))).await?;
            log::debug!("Cleared sheet tab {tab}");
        } else {
            let mut url = Self::sheets_url(spreadsheet, &[])?;
            url.set_path(&format!("{}:batchUpdate", url.path()));
            self.send_json(self.client.post(url).json(&add_sheet_request(tab)))
                .await?;
            log::debug!("Created sheet tab {tab}");
        }
        Ok(())
    }

    async fn write_values(
        &self,
        spreadsheet: &SpreadsheetId,
        tab: &str,
        rows: &[Vec<String>],
    ) -> Result<(), PublishError> {
        let range = format!("{}!A1", a1_range(tab));
        let url = Self::sheets_url(spreadsheet, &["values", &range])?;
        self.send_json(
            self.client
                .put(url)
                .query(&[("valueInputOption", "RAW")])
                .json(&json!({
                    "range": range,
                    "majorDimension": "ROWS",
                    "values": rows,
                })),
        )
        .await?;
        Ok(())
    }
}

/// Quotes a tab name for A1 notation.
fn a1_range(tab: &str) -> String {
    format!("'{}'", tab.replace('\'', "''"))
}

fn add_sheet_request(tab: &str) -> serde_json::Value {
    json!({
        "requests": [{
            "addSheet": {
                "properties": {
                    "title": tab,
                    "gridProperties": {
                        "rowCount": NEW_SHEET_ROWS,
                        "columnCount": NEW_SHEET_COLS,
                    },
                },
            },
        }],
    })
}

fn first_file_id(body: &serde_json::Value) -> Option<String> {
    body.get("files")?
        .as_array()?
        .first()?
        .get("id")?
        .as_str()
        .map(ToString::to_string)
}

fn sheet_titles(body: &serde_json::Value) -> Vec<String> {
    body.get("sheets")
        .and_then(serde_json::Value::as_array)
        .map(|sheets| {
            sheets
                .iter()
                .filter_map(|sheet| sheet.pointer("/properties/title")?.as_str())
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}
