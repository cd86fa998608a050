//! Configuration model.
//!
//! The whole run is driven by one immutable [`Config`] loaded from a TOML
//! file at startup and passed by reference into the detectors, the filter
//! pipeline and the reconciler. Core logic never reads ambient state.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FinaleError, Result};

/// Top-level configuration tree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub sonarr: SonarrConfig,
    pub trakt: TraktConfig,
    pub plex: PlexConfig,
    pub paths: PathsConfig,
}

/// Detection and labeling behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Timeframe in days within which a finale must have aired.
    /// Downloaded finales with future air dates are always included.
    pub recent_days: i64,
    /// Ignore series that are unmonitored in the inventory source
    pub skip_unmonitored: bool,
    /// Ignore shows carrying one of `genres_to_skip`
    pub skip_genres: bool,
    pub genres_to_skip: Vec<String>,
    /// Ignore shows carrying one of `labels_to_skip`
    pub skip_labels: bool,
    pub labels_to_skip: Vec<String>,
    /// Add `plex_label` to qualifying shows
    pub label_series_in_plex: bool,
    /// Add `plex_label` as a writer tag on qualifying episodes
    pub label_episode_in_plex: bool,
    /// The label text written to the media server
    pub plex_label: String,
    /// Strip the label from shows/episodes that no longer qualify
    pub remove_labels_if_no_longer_matched: bool,
    /// Only label finales that are the sole unwatched episode of their season
    pub only_finale_unwatched: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            recent_days: 14,
            skip_unmonitored: true,
            skip_genres: true,
            genres_to_skip: vec![
                "Talk Show".to_string(),
                "News".to_string(),
                "Stand-Up".to_string(),
                "Awards Show".to_string(),
            ],
            skip_labels: true,
            labels_to_skip: vec!["Skip".to_string(), "Exclude".to_string()],
            label_series_in_plex: true,
            label_episode_in_plex: false,
            plex_label: "Finale".to_string(),
            remove_labels_if_no_longer_matched: true,
            only_finale_unwatched: false,
        }
    }
}

/// Sonarr connection settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SonarrConfig {
    /// Base URL, with or without the `/api/v3` suffix
    pub url: String,
    pub api_key: String,
}

/// Trakt connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraktConfig {
    pub client_id: String,
    /// Episode type strings accepted as finales (case-insensitive)
    pub desired_episode_types: Vec<String>,
    /// Pacing delay between per-show lookups, in milliseconds
    pub request_delay_ms: u64,
}

impl Default for TraktConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            desired_episode_types: vec![
                "season_finale".to_string(),
                "mid_season_finale".to_string(),
                "series_finale".to_string(),
            ],
            request_delay_ms: 500,
        }
    }
}

/// Plex connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlexConfig {
    pub url: String,
    pub token: String,
    /// Title of the TV library section
    pub library_title: String,
}

impl Default for PlexConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:32400".to_string(),
            token: String::new(),
            library_title: "TV Shows".to_string(),
        }
    }
}

/// Filesystem view remapping between the inventory host and this host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Ordered prefix rewrites, first match wins
    pub path_mappings: Vec<PathMapping>,
}

/// One prefix rewrite rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathMapping {
    pub from: String,
    pub to: String,
}

impl Config {
    /// Load and validate a configuration file.
    ///
    /// # Errors
    /// - [`FinaleError::ConfigIo`] if the file cannot be read
    /// - [`FinaleError::ConfigParse`] if the TOML is malformed
    /// - [`FinaleError::InvalidConfig`] if a required value is missing
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| FinaleError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: Config =
            toml::from_str(&content).map_err(|source| FinaleError::ConfigParse {
                path: path.display().to_string(),
                source,
            })?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Normalize derived values in place.
    fn normalize(&mut self) {
        self.sonarr.url = normalize_sonarr_url(&self.sonarr.url);
        self.plex.url = self.plex.url.trim_end_matches('/').to_string();
    }

    /// Check the invariants a run depends on.
    ///
    /// Validation covers every backend; a method that does not use a
    /// backend still fails fast on a blank label rather than mid-run.
    pub fn validate(&self) -> Result<()> {
        if self.general.recent_days <= 0 {
            return Err(FinaleError::InvalidConfig(
                "general.recent_days must be positive".to_string(),
            ));
        }
        if self.general.plex_label.trim().is_empty() {
            return Err(FinaleError::InvalidConfig(
                "general.plex_label must not be empty".to_string(),
            ));
        }
        if self.plex.token.trim().is_empty() {
            return Err(FinaleError::InvalidConfig(
                "plex.token must not be empty".to_string(),
            ));
        }
        if self.plex.library_title.trim().is_empty() {
            return Err(FinaleError::InvalidConfig(
                "plex.library_title must not be empty".to_string(),
            ));
        }
        for mapping in &self.paths.path_mappings {
            if mapping.from.is_empty() || mapping.to.is_empty() {
                return Err(FinaleError::InvalidConfig(format!(
                    "invalid path mapping: '{}' -> '{}'",
                    mapping.from, mapping.to
                )));
            }
        }
        Ok(())
    }

    /// Validate the Sonarr section, required only for the inventory method.
    pub fn validate_sonarr(&self) -> Result<()> {
        if self.sonarr.url.trim().is_empty() {
            return Err(FinaleError::InvalidConfig(
                "sonarr.url must not be empty".to_string(),
            ));
        }
        if self.sonarr.api_key.trim().is_empty() {
            return Err(FinaleError::InvalidConfig(
                "sonarr.api_key must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate the Trakt section, required only for the metadata method.
    pub fn validate_trakt(&self) -> Result<()> {
        if self.trakt.client_id.trim().is_empty() {
            return Err(FinaleError::InvalidConfig(
                "trakt.client_id must not be empty".to_string(),
            ));
        }
        if self.trakt.desired_episode_types.is_empty() {
            return Err(FinaleError::InvalidConfig(
                "trakt.desired_episode_types must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Append the `/api/v3` suffix to a Sonarr base URL when missing.
///
/// Accepts `http://host:8989`, `http://host/sonarr` and already-complete
/// `.../api/v3` forms.
fn normalize_sonarr_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    if trimmed.is_empty() || trimmed.ends_with("/api/v3") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/api/v3")
    }
}
