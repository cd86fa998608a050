//! Sonarr v3 API client.
//!
//! The inventory detector needs three read-only views: the series list,
//! the episodes of one series and the episode files of one series.
//! Connectivity and auth failures here abort the whole run; there is no
//! per-item recovery at this layer.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::client::{build_http_client, decode_json, HttpConfig};
use crate::config::SonarrConfig;
use crate::error::{FinaleError, Result};

const SERVICE: &str = "Sonarr";

/// A series record from the inventory source
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub monitored: bool,
    #[serde(default)]
    pub tmdb_id: u64,
    #[serde(default)]
    pub imdb_id: Option<String>,
}

/// An episode record of one series
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeRecord {
    #[serde(default)]
    pub season_number: u32,
    #[serde(default)]
    pub episode_number: u32,
    #[serde(default)]
    pub title: Option<String>,
    /// ISO-8601 timestamp with trailing `Z`, absent for unscheduled episodes
    #[serde(default)]
    pub air_date_utc: Option<String>,
}

/// A recorded file of one series
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeFile {
    #[serde(default)]
    pub relative_path: Option<String>,
    #[serde(default)]
    pub size: u64,
}

/// HTTP client for the Sonarr v3 API
pub struct SonarrClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SonarrClient {
    /// Create a client from validated configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &SonarrConfig) -> Result<Self> {
        let client = build_http_client(&HttpConfig::default())?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// List all series known to Sonarr.
    pub async fn list_series(&self) -> Result<Vec<Series>> {
        self.get_json("/series", &[]).await
    }

    /// List all episodes of one series.
    pub async fn list_episodes(&self, series_id: u64) -> Result<Vec<EpisodeRecord>> {
        self.get_json("/episode", &[("seriesId", series_id.to_string())])
            .await
    }

    /// List all recorded files of one series.
    ///
    /// Sonarr answers 400 when a series has no file records at all; that
    /// is a normal empty result, not an error.
    pub async fn list_episode_files(&self, series_id: u64) -> Result<Vec<EpisodeFile>> {
        let url = self.url("/episodefile", &[("seriesId", series_id.to_string())]);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FinaleError::from_transport(SERVICE, &self.base_url, e))?;

        if response.status() == reqwest::StatusCode::BAD_REQUEST {
            return Ok(Vec::new());
        }
        decode_json(SERVICE, self.check_status(response)?).await
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> String {
        let mut url = format!("{}{}?apikey={}", self.base_url, path, self.api_key);
        for (key, value) in params {
            url.push_str(&format!("&{key}={value}"));
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = self.url(path, params);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FinaleError::from_transport(SERVICE, &self.base_url, e))?;
        decode_json(SERVICE, self.check_status(response)?).await
    }

    /// Map error statuses to the diagnostics the top level reports.
    fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        match response.status() {
            status if status.is_success() => Ok(response),
            reqwest::StatusCode::UNAUTHORIZED => Err(FinaleError::Unauthorized { service: SERVICE }),
            reqwest::StatusCode::NOT_FOUND => Err(FinaleError::EndpointNotFound {
                service: SERVICE,
                url: self.base_url.clone(),
            }),
            status => Err(FinaleError::UnexpectedStatus {
                service: SERVICE,
                status: status.as_u16(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> SonarrClient {
        SonarrClient::new(&SonarrConfig {
            url: server.uri(),
            api_key: "k".to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_series() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/series"))
            .and(query_param("apikey", "k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 1, "title": "Severance", "monitored": true, "tmdbId": 95396, "imdbId": "tt11280740"},
                {"id": 2, "title": "Unscored", "monitored": false}
            ])))
            .mount(&server)
            .await;

        let series = test_client(&server).list_series().await.unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].title, "Severance");
        assert_eq!(series[0].tmdb_id, 95396);
        assert_eq!(series[1].imdb_id, None);
        assert_eq!(series[1].tmdb_id, 0);
    }

    #[tokio::test]
    async fn test_list_episodes_passes_series_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/episode"))
            .and(query_param("seriesId", "7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"seasonNumber": 2, "episodeNumber": 10, "title": "Cold Harbor",
                 "airDateUtc": "2025-03-21T02:00:00Z"}
            ])))
            .mount(&server)
            .await;

        let episodes = test_client(&server).list_episodes(7).await.unwrap();
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].season_number, 2);
        assert_eq!(
            episodes[0].air_date_utc.as_deref(),
            Some("2025-03-21T02:00:00Z")
        );
    }

    #[tokio::test]
    async fn test_unauthorized_is_fatal_diagnostic() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/series"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = test_client(&server).list_series().await.unwrap_err();
        assert!(matches!(err, FinaleError::Unauthorized { service: "Sonarr" }));
    }

    #[tokio::test]
    async fn test_not_found_reports_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/series"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = test_client(&server).list_series().await.unwrap_err();
        assert!(matches!(err, FinaleError::EndpointNotFound { .. }));
    }

    #[tokio::test]
    async fn test_episode_files_400_means_no_files() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/episodefile"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let files = test_client(&server).list_episode_files(3).await.unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_body_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/series"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&server)
            .await;

        let err = test_client(&server).list_series().await.unwrap_err();
        assert!(matches!(
            err,
            FinaleError::InvalidResponse { service: "Sonarr", .. }
        ));
    }
}
