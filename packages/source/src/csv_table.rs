//! CSV loading into [`Table`]s.
//!
//! Remote and local sources are parsed the same way: the first record is the
//! header row, records may be ragged (short rows are padded), and every cell
//! is trimmed.

use std::path::Path;

use data_coyote_table_models::Table;

use crate::SourceError;

/// Downloads `url` with a single attempt and parses the body as CSV.
///
/// # Errors
///
/// Returns [`SourceError::Http`] on transport failure or a non-success
/// status, or [`SourceError::Csv`] if the body is not valid CSV. The URL is
/// stripped from HTTP errors since it may carry an API key.
pub async fn fetch_csv(client: &reqwest::Client, url: &str) -> Result<Table, SourceError> {
    let response = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(reqwest::Error::without_url)?;
    let bytes = response.bytes().await.map_err(reqwest::Error::without_url)?;
    log::debug!("Downloaded {} bytes", bytes.len());
    parse_csv(&bytes)
}

/// Reads and parses a local CSV file.
///
/// # Errors
///
/// Returns [`SourceError::Io`] if the file cannot be read or
/// [`SourceError::Csv`] if it is not valid CSV.
pub fn read_csv_file(path: &Path) -> Result<Table, SourceError> {
    let bytes = std::fs::read(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_csv(&bytes)
}

/// Parses CSV bytes into a [`Table`].
///
/// # Errors
///
/// Returns [`SourceError::Csv`] if a record cannot be decoded.
pub fn parse_csv(bytes: &[u8]) -> Result<Table, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_owned())
        .collect();

    let mut table = Table::new(headers);
    for result in reader.records() {
        let record = result?;
        table.push_row(record.iter().map(|v| v.trim().to_owned()).collect());
    }

    Ok(table)
}

/// Replaces the value of any `api_key` query parameter with `***` so URLs
/// can be logged.
#[must_use]
pub fn redact_api_key(url: &str) -> String {
    const PARAM: &str = "api_key=";

    let mut out = String::with_capacity(url.len());
    let mut rest = url;
    while let Some(pos) = rest.find(PARAM) {
        let value_start = pos + PARAM.len();
        out.push_str(&rest[..value_start]);
        out.push_str("***");
        rest = &rest[value_start..];
        rest = rest.find('&').map_or("", |end| &rest[end..]);
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server;

    #[test]
    fn parses_header_and_trims_cells() {
        let table = parse_csv(b" Date , Offense \n2024-01-15 14:30, Assault \n").unwrap();
        assert_eq!(table.columns(), ["Date", "Offense"]);
        assert_eq!(table.rows()[0], ["2024-01-15 14:30", "Assault"]);
    }

    #[test]
    fn pads_ragged_rows() {
        let table = parse_csv(b"a,b,c\n1,2\n1,2,3\n").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0], ["1", "2", ""]);
    }

    #[test]
    fn quoted_fields_keep_commas() {
        let table = parse_csv(b"name,desc\nx,\"THEFT, FROM VEHICLE\"\n").unwrap();
        assert_eq!(table.rows()[0][1], "THEFT, FROM VEHICLE");
    }

    #[test]
    fn header_only_file_is_empty_table() {
        let table = parse_csv(b"a,b\n").unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns().len(), 2);
    }

    #[test]
    fn reads_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.csv");
        std::fs::write(&path, "a\n1\n2\n").unwrap();
        assert_eq!(read_csv_file(&path).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn fetches_remote_csv() {
        let url = test_server::serve(200, "a,b\n1,2\n3,4\n").await;
        let table = fetch_csv(&reqwest::Client::new(), &url).await.unwrap();
        assert_eq!(table.columns(), ["a", "b"]);
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn error_status_is_http_error() {
        let url = test_server::serve(404, "not found").await;
        let err = fetch_csv(&reqwest::Client::new(), &url).await.unwrap_err();
        assert!(matches!(err, SourceError::Http(_)), "{err}");
    }

    #[tokio::test]
    async fn http_errors_omit_the_url() {
        let base = test_server::serve(403, "forbidden").await;
        let url = format!("{base}/data.csv?api_key=SECRET");
        let err = fetch_csv(&reqwest::Client::new(), &url).await.unwrap_err();
        assert!(!err.to_string().contains("SECRET"), "{err}");
    }

    #[tokio::test]
    async fn connection_failure_is_http_error() {
        let url = test_server::refused_url().await;
        let err = fetch_csv(&reqwest::Client::new(), &url).await.unwrap_err();
        assert!(matches!(err, SourceError::Http(_)), "{err}");
    }

    #[test]
    fn redacts_api_key_values() {
        assert_eq!(
            redact_api_key("https://x/y?from=2019&api_key=SECRET&format=csv"),
            "https://x/y?from=2019&api_key=***&format=csv"
        );
        assert_eq!(redact_api_key("https://x/y?api_key=SECRET"), "https://x/y?api_key=***");
        assert_eq!(redact_api_key("https://x/y.csv"), "https://x/y.csv");
    }
}
