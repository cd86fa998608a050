//! Trakt API client.
//!
//! The metadata detector uses two endpoints: a best-effort show search
//! (first result only) and the episode detail lookup that carries the
//! `episode_type` classification. Lookups are paced by a rate limiter
//! and transient errors are retried with exponential backoff; a 404 is
//! a normal miss, not an error.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;

use crate::client::{
    backoff_delay, build_http_client, decode_json, HttpConfig, RateLimiter, MAX_RETRIES,
};
use crate::config::TraktConfig;
use crate::error::{FinaleError, Result};
use crate::types::ShowIds;

const SERVICE: &str = "Trakt";
const TRAKT_BASE_URL: &str = "https://api.trakt.tv";
const TRAKT_API_VERSION: &str = "2";

/// Reference to a show resolved through search
#[derive(Debug, Clone, PartialEq)]
pub struct TraktShowRef {
    pub trakt_id: Option<u64>,
    pub slug: Option<String>,
    /// External ids used to join back into the media server catalog
    pub ids: ShowIds,
}

impl TraktShowRef {
    /// The identifier used in episode detail URLs, slug preferred.
    pub fn lookup_key(&self) -> Option<String> {
        self.slug
            .clone()
            .or_else(|| self.trakt_id.map(|id| id.to_string()))
    }
}

/// Episode classification and air timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeDetail {
    /// Classification string such as `season_finale` or `standard`
    pub episode_type: Option<String>,
    pub first_aired: Option<DateTime<Utc>>,
}

/// HTTP client for the Trakt API
pub struct TraktClient {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
    limiter: RateLimiter,
}

impl TraktClient {
    /// Create a client from validated configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &TraktConfig) -> Result<Self> {
        Self::with_base_url(config, TRAKT_BASE_URL)
    }

    pub(crate) fn with_base_url(config: &TraktConfig, base_url: &str) -> Result<Self> {
        let client = build_http_client(&HttpConfig::default())?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            limiter: RateLimiter::new(Duration::from_millis(config.request_delay_ms)),
        })
    }

    /// Search for a show by title, returning the best match.
    ///
    /// Selection is intentionally naive: the first result is taken or
    /// the miss is reported as `None` so callers must handle it.
    pub async fn search_show(&self, title: &str) -> Result<Option<TraktShowRef>> {
        let url = format!(
            "{}/search/show?query={}&limit=1&extended=full",
            self.base_url,
            urlencoding::encode(title)
        );
        let Some(response) = self.get_with_retry(&url).await? else {
            return Ok(None);
        };
        let entries: Vec<SearchEntry> = decode_json(SERVICE, response).await?;
        let Some(raw) = entries.into_iter().next().and_then(|entry| entry.show) else {
            return Ok(None);
        };
        Ok(Some(TraktShowRef {
            trakt_id: raw.ids.trakt,
            slug: raw.ids.slug,
            ids: ShowIds::new(raw.ids.imdb, raw.ids.tmdb),
        }))
    }

    /// Fetch detail for one episode of a resolved show.
    pub async fn episode(
        &self,
        show: &TraktShowRef,
        season: u32,
        episode: u32,
    ) -> Result<Option<EpisodeDetail>> {
        let Some(key) = show.lookup_key() else {
            return Ok(None);
        };
        let url = format!(
            "{}/shows/{}/seasons/{}/episodes/{}?extended=full",
            self.base_url, key, season, episode
        );
        let Some(response) = self.get_with_retry(&url).await? else {
            return Ok(None);
        };
        let raw: RawEpisode = decode_json(SERVICE, response).await?;
        Ok(Some(EpisodeDetail {
            episode_type: raw.episode_type,
            first_aired: raw.first_aired.as_deref().and_then(parse_first_aired),
        }))
    }

    /// GET with pacing and bounded retry; `None` means HTTP 404.
    async fn get_with_retry(&self, url: &str) -> Result<Option<reqwest::Response>> {
        let mut attempt = 0;
        loop {
            self.limiter.acquire().await;

            let response = self
                .client
                .get(url)
                .header("trakt-api-version", TRAKT_API_VERSION)
                .header("trakt-api-key", &self.client_id)
                .send()
                .await
                .map_err(|e| FinaleError::from_transport(SERVICE, url, e))?;
            let status = response.status();

            if status.is_success() {
                return Ok(Some(response));
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return Ok(None);
            }

            let transient =
                status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if transient && attempt < MAX_RETRIES {
                sleep(backoff_delay(attempt)).await;
                attempt += 1;
                continue;
            }
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(FinaleError::RateLimited { service: SERVICE });
            }
            return Err(FinaleError::UnexpectedStatus {
                service: SERVICE,
                status: status.as_u16(),
            });
        }
    }
}

/// Parse a Trakt air timestamp.
///
/// Two formats occur in the wild, UTC with and without fractional
/// seconds: `2025-03-21T02:00:00.000Z` and `2025-03-21T02:00:00Z`.
pub fn parse_first_aired(raw: &str) -> Option<DateTime<Utc>> {
    for format in ["%Y-%m-%dT%H:%M:%S%.fZ", "%Y-%m-%dT%H:%M:%SZ"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    show: Option<RawShow>,
}

#[derive(Debug, Deserialize)]
struct RawShow {
    ids: RawIds,
}

#[derive(Debug, Deserialize)]
struct RawIds {
    trakt: Option<u64>,
    slug: Option<String>,
    imdb: Option<String>,
    tmdb: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawEpisode {
    episode_type: Option<String>,
    first_aired: Option<String>,
}
