//! FBI Crime Data Explorer agency lookup.
//!
//! When no crime URL is configured, the agency directory for a state is
//! searched for the configured city and the matching agency's ORI is used to
//! build a monthly offense summary download URL.

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

use crate::resolver::{Resolution, ResolvedSource, SourceResolver};

/// Base URL of the FBI Crime Data Explorer API.
pub const FBI_API_BASE: &str = "https://api.usa.gov/crime/fbi/sapi/api";

/// Agency-name keyword that marks the preferred entry within a pool.
pub const PREFERRED_AGENCY_KEYWORD: &str = "POLICE";

/// Parameters for the agency lookup, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgencyLookupSettings {
    /// API base URL.
    pub base_url: String,
    /// Data.gov API key.
    pub api_key: String,
    /// Two-letter state abbreviation, upper-cased.
    pub state: String,
    /// City name to match, upper-cased.
    pub city: String,
    /// First year of the summary range.
    pub from_year: String,
    /// Last year of the summary range.
    pub to_year: String,
}

impl AgencyLookupSettings {
    /// Reads `FBI_API_KEY`, `FBI_STATE_ABBR`, `FBI_CITY_NAME`,
    /// `FBI_FROM_YEAR`, and `FBI_TO_YEAR`. Returns `None` without an API key.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = data_coyote_config::env_var("FBI_API_KEY")?;
        Some(Self {
            base_url: FBI_API_BASE.to_string(),
            api_key,
            state: data_coyote_config::env_or("FBI_STATE_ABBR", "NM").to_uppercase(),
            city: data_coyote_config::env_or("FBI_CITY_NAME", "SANTA FE").to_uppercase(),
            from_year: data_coyote_config::env_or("FBI_FROM_YEAR", "2019"),
            to_year: data_coyote_config::env_or("FBI_TO_YEAR", "2025"),
        })
    }

    /// URL of the agency directory for the configured state.
    ///
    /// Returns `None` if `base_url` is not a valid base URL.
    #[must_use]
    pub fn agencies_url(&self) -> Option<Url> {
        let mut url = self.endpoint(&["agencies"])?;
        url.query_pairs_mut()
            .append_pair("state_abbr", &self.state)
            .append_pair("api_key", &self.api_key);
        Some(url)
    }

    /// URL of the monthly reported-offense summary CSV for `ori`.
    ///
    /// Returns `None` if `base_url` is not a valid base URL.
    #[must_use]
    pub fn summary_url(&self, ori: &str) -> Option<Url> {
        let mut url = self.endpoint(&[
            "summarized",
            "agencies",
            ori,
            "offense",
            "reported",
            "month",
        ])?;
        url.query_pairs_mut()
            .append_pair("from", &self.from_year)
            .append_pair("to", &self.to_year)
            .append_pair("format", "csv")
            .append_pair("api_key", &self.api_key);
        Some(url)
    }

    fn endpoint(&self, segments: &[&str]) -> Option<Url> {
        let mut url = Url::parse(&self.base_url).ok()?;
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .extend(segments);
        Some(url)
    }
}

/// One entry in the agency directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Agency {
    /// Originating Agency Identifier.
    #[serde(default)]
    pub ori: Option<String>,
    /// Agency display name (e.g., `"Santa Fe Police Department"`).
    #[serde(default)]
    pub agency_name: Option<String>,
    /// City the agency serves.
    #[serde(default)]
    pub city_name: Option<String>,
}

impl Agency {
    fn ori(&self) -> Option<&str> {
        self.ori.as_deref().map(str::trim).filter(|o| !o.is_empty())
    }

    fn city_upper(&self) -> String {
        self.city_name.as_deref().unwrap_or_default().to_uppercase()
    }

    fn name_contains(&self, keyword: &str) -> bool {
        self.agency_name
            .as_deref()
            .unwrap_or_default()
            .to_uppercase()
            .contains(keyword)
    }
}

/// Picks the agency ORI for `city`.
///
/// Candidate pools are tried in order: exact city-name matches, city names
/// containing `city`, then every entry. The first pool holding any entry
/// with a non-empty ORI decides: its first entry whose name contains
/// `keyword` wins, otherwise its first entry with an ORI.
///
/// `city` and `keyword` are compared case-insensitively.
#[must_use]
pub fn select_agency_ori<'a>(agencies: &'a [Agency], city: &str, keyword: &str) -> Option<&'a str> {
    let city = city.to_uppercase();
    let keyword = keyword.to_uppercase();

    let exact: Vec<&Agency> = agencies.iter().filter(|a| a.city_upper() == city).collect();
    let contains: Vec<&Agency> = agencies
        .iter()
        .filter(|a| a.city_upper().contains(&city))
        .collect();
    let all: Vec<&Agency> = agencies.iter().collect();

    for pool in [exact, contains, all] {
        let with_ori: Vec<&Agency> = pool.into_iter().filter(|a| a.ori().is_some()).collect();
        let Some(&first) = with_ori.first() else {
            continue;
        };
        let chosen: &'a Agency = with_ori
            .iter()
            .copied()
            .find(|a| a.name_contains(&keyword))
            .unwrap_or(first);
        return chosen.ori();
    }

    None
}

/// Resolver that derives the crime download URL from the agency directory.
pub struct AgencyLookup {
    client: reqwest::Client,
    settings: Option<AgencyLookupSettings>,
}

impl AgencyLookup {
    /// Creates a lookup resolver with explicit settings (`None` disables it).
    #[must_use]
    pub const fn new(client: reqwest::Client, settings: Option<AgencyLookupSettings>) -> Self {
        Self { client, settings }
    }

    /// Creates a lookup resolver configured from the environment.
    #[must_use]
    pub fn from_env(client: reqwest::Client) -> Self {
        Self::new(client, AgencyLookupSettings::from_env())
    }

    async fn fetch_agencies(&self, url: Url) -> Result<Vec<Agency>, reqwest::Error> {
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

#[async_trait]
impl SourceResolver for AgencyLookup {
    fn name(&self) -> &'static str {
        "agency_lookup"
    }

    async fn resolve(&self) -> Resolution {
        let Some(settings) = &self.settings else {
            return Resolution::Skipped("FBI_API_KEY not set".to_string());
        };

        let Some(url) = settings.agencies_url() else {
            return Resolution::Skipped(format!("invalid API base URL: {}", settings.base_url));
        };

        let agencies = match self.fetch_agencies(url).await {
            Ok(agencies) => agencies,
            Err(e) => {
                let e = e.without_url();
                log::warn!("ORI lookup failed: {e}");
                return Resolution::Skipped(format!("agency lookup failed: {e}"));
            }
        };

        match select_agency_ori(&agencies, &settings.city, PREFERRED_AGENCY_KEYWORD) {
            Some(ori) => {
                log::info!("Resolved ORI {ori} for {}, {}", settings.city, settings.state);
                settings.summary_url(ori).map_or_else(
                    || Resolution::Skipped(format!("invalid API base URL: {}", settings.base_url)),
                    |url| Resolution::Resolved(ResolvedSource::Url(url.into())),
                )
            }
            None => {
                log::warn!("ORI not found for {}, {}", settings.city, settings.state);
                Resolution::Skipped(format!("no agency found for {}", settings.city))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server;

    fn agency(ori: &str, name: &str, city: &str) -> Agency {
        Agency {
            ori: Some(ori.to_string()),
            agency_name: Some(name.to_string()),
            city_name: Some(city.to_string()),
        }
    }

    fn settings() -> AgencyLookupSettings {
        AgencyLookupSettings {
            base_url: FBI_API_BASE.to_string(),
            api_key: "KEY".to_string(),
            state: "NM".to_string(),
            city: "SANTA FE".to_string(),
            from_year: "2019".to_string(),
            to_year: "2025".to_string(),
        }
    }

    #[test]
    fn prefers_exact_city_match_over_substring() {
        let agencies = vec![
            agency("NM0000002", "Santa Fe County Police", "Santa Fe County"),
            agency("NM0000001", "Santa Fe Sheriff", "Santa Fe"),
        ];
        assert_eq!(
            select_agency_ori(&agencies, "santa fe", "police"),
            Some("NM0000001")
        );
    }

    #[test]
    fn prefers_first_keyword_match_within_pool() {
        let agencies = vec![
            agency("NM001", "Santa Fe Sheriff", "Santa Fe"),
            agency("NM002", "Santa Fe Police Department", "Santa Fe"),
            agency("NM003", "Santa Fe Campus Police", "Santa Fe"),
        ];
        assert_eq!(
            select_agency_ori(&agencies, "SANTA FE", "POLICE"),
            Some("NM002")
        );
    }

    #[test]
    fn falls_back_to_first_entry_with_ori() {
        let agencies = vec![
            Agency {
                ori: Some("  ".to_string()),
                agency_name: Some("Santa Fe Police".to_string()),
                city_name: Some("Santa Fe".to_string()),
            },
            agency("NM010", "Santa Fe Sheriff", "Santa Fe"),
            agency("NM011", "Santa Fe Marshal", "Santa Fe"),
        ];
        assert_eq!(
            select_agency_ori(&agencies, "SANTA FE", "POLICE"),
            Some("NM010")
        );
    }

    #[test]
    fn skips_pools_without_ori() {
        let agencies = vec![
            Agency {
                ori: None,
                agency_name: Some("Santa Fe Police".to_string()),
                city_name: Some("Santa Fe".to_string()),
            },
            agency("NM020", "Albuquerque Police", "Albuquerque"),
        ];
        assert_eq!(
            select_agency_ori(&agencies, "SANTA FE", "POLICE"),
            Some("NM020")
        );
    }

    #[test]
    fn empty_directory_has_no_match() {
        assert_eq!(select_agency_ori(&[], "SANTA FE", "POLICE"), None);
    }

    #[test]
    fn decodes_directory_entries_with_nulls() {
        let json = r#"[{"ori":"NM001","agency_name":null,"city_name":"Santa Fe","extra":1}]"#;
        let agencies: Vec<Agency> = serde_json::from_str(json).unwrap();
        assert_eq!(agencies[0].ori.as_deref(), Some("NM001"));
        assert_eq!(agencies[0].agency_name, None);
    }

    #[test]
    fn builds_summary_url() {
        assert_eq!(
            settings().summary_url("NM001").unwrap().as_str(),
            "https://api.usa.gov/crime/fbi/sapi/api/summarized/agencies/NM001/offense/reported/month?from=2019&to=2025&format=csv&api_key=KEY"
        );
    }

    #[test]
    fn encodes_query_values() {
        let settings = AgencyLookupSettings {
            state: "N M".to_string(),
            api_key: "a&b=c".to_string(),
            ..settings()
        };
        assert_eq!(
            settings.agencies_url().unwrap().as_str(),
            "https://api.usa.gov/crime/fbi/sapi/api/agencies?state_abbr=N+M&api_key=a%26b%3Dc"
        );
        assert!(
            settings
                .summary_url("NM/01")
                .unwrap()
                .as_str()
                .contains("/agencies/NM%2F01/offense/")
        );
    }

    #[test]
    fn invalid_base_url_builds_nothing() {
        let settings = AgencyLookupSettings {
            base_url: "not a url".to_string(),
            ..settings()
        };
        assert_eq!(settings.agencies_url(), None);
        assert_eq!(settings.summary_url("NM001"), None);
    }

    fn lookup_at(base_url: String) -> AgencyLookup {
        AgencyLookup::new(
            reqwest::Client::new(),
            Some(AgencyLookupSettings {
                base_url,
                ..settings()
            }),
        )
    }

    #[tokio::test]
    async fn resolves_summary_url_from_directory() {
        let base = test_server::serve(
            200,
            r#"[{"ori":"NM001","agency_name":"Santa Fe Police Department","city_name":"Santa Fe"}]"#,
        )
        .await;
        let Resolution::Resolved(ResolvedSource::Url(url)) = lookup_at(base.clone()).resolve().await
        else {
            panic!("expected a resolved URL");
        };
        assert!(url.starts_with(&format!("{base}/summarized/agencies/NM001/")));
    }

    #[tokio::test]
    async fn directory_error_status_is_skipped() {
        let base = test_server::serve(500, "boom").await;
        let Resolution::Skipped(reason) = lookup_at(base).resolve().await else {
            panic!("expected skip");
        };
        assert!(reason.starts_with("agency lookup failed"), "{reason}");
    }

    #[tokio::test]
    async fn undecodable_directory_is_skipped() {
        let base = test_server::serve(200, "<html>maintenance</html>").await;
        let Resolution::Skipped(reason) = lookup_at(base).resolve().await else {
            panic!("expected skip");
        };
        assert!(reason.starts_with("agency lookup failed"), "{reason}");
    }

    #[tokio::test]
    async fn unreachable_directory_is_skipped() {
        let base = test_server::refused_url().await;
        let Resolution::Skipped(reason) = lookup_at(base).resolve().await else {
            panic!("expected skip");
        };
        assert!(reason.starts_with("agency lookup failed"), "{reason}");
    }

    #[tokio::test]
    async fn lookup_without_key_is_skipped() {
        let lookup = AgencyLookup::new(reqwest::Client::new(), None);
        assert_eq!(
            lookup.resolve().await,
            Resolution::Skipped("FBI_API_KEY not set".to_string())
        );
    }
}
