//! Plex Media Server client.
//!
//! One run works against a single snapshot of the TV library: every show
//! with its guids, genres, labels and episodes (watched state and writer
//! tags included). The identity join, the filter pipeline and the
//! reconciliation planner all read that snapshot; only the apply step
//! talks back to the server.
//!
//! Episode-level labels reuse the writer tag field, which downstream
//! overlay tooling can select on just like show labels.

use log::{info, warn};
use serde::Deserialize;

use crate::client::{build_http_client, decode_json, HttpConfig};
use crate::config::PlexConfig;
use crate::error::{FinaleError, Result};
use crate::reconcile::{EpisodeStep, ReconcileReport, ShowStep, StepKind};

const SERVICE: &str = "Plex";

/// Media type discriminators in the Plex API
const TYPE_SHOW: &str = "2";
const TYPE_EPISODE: &str = "4";

/// A resolved library section
#[derive(Debug, Clone)]
pub struct SectionRef {
    pub key: String,
    pub title: String,
}

/// One episode in the snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct PlexEpisode {
    pub rating_key: String,
    pub title: String,
    pub season: u32,
    pub episode: u32,
    pub watched: bool,
    /// Writer tags, repurposed as episode-level labels
    pub writers: Vec<String>,
}

/// One show in the snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct PlexShow {
    pub rating_key: String,
    pub title: String,
    /// Raw external guid strings, e.g. `imdb://tt11280740`
    pub guids: Vec<String>,
    pub genres: Vec<String>,
    pub labels: Vec<String>,
    pub episodes: Vec<PlexEpisode>,
}

impl PlexShow {
    /// Case-insensitive label membership test.
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l.eq_ignore_ascii_case(label))
    }

    /// All episodes of one season.
    pub fn season_episodes(&self, season: u32) -> impl Iterator<Item = &PlexEpisode> {
        self.episodes.iter().filter(move |e| e.season == season)
    }

    /// Look up one episode by season and episode number.
    pub fn episode(&self, season: u32, episode: u32) -> Option<&PlexEpisode> {
        self.episodes
            .iter()
            .find(|e| e.season == season && e.episode == episode)
    }
}

impl PlexEpisode {
    /// Case-insensitive writer tag membership test.
    pub fn has_writer(&self, tag: &str) -> bool {
        self.writers.iter().any(|w| w.eq_ignore_ascii_case(tag))
    }
}

/// Full-library snapshot taken once per run
#[derive(Debug, Clone, Default)]
pub struct LibrarySnapshot {
    pub shows: Vec<PlexShow>,
}

impl LibrarySnapshot {
    /// Find a show by its rating key.
    pub fn show(&self, rating_key: &str) -> Option<&PlexShow> {
        self.shows.iter().find(|s| s.rating_key == rating_key)
    }
}

/// HTTP client for the Plex Media Server API
pub struct PlexClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl PlexClient {
    /// Create a client from validated configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &PlexConfig) -> Result<Self> {
        let client = build_http_client(&HttpConfig::default())?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// Resolve the TV library section by title.
    ///
    /// # Errors
    /// [`FinaleError::LibraryNotFound`] when no show-typed section with
    /// the configured title exists; connectivity and auth failures are
    /// fatal as for every client.
    pub async fn find_section(&self, title: &str) -> Result<SectionRef> {
        let container: MediaContainer<DirectoryContainer> =
            self.get_json("/library/sections", &[]).await?;
        container
            .inner
            .directories
            .into_iter()
            .find(|d| d.kind == "show" && d.title == title)
            .map(|d| SectionRef {
                key: d.key,
                title: d.title,
            })
            .ok_or_else(|| FinaleError::LibraryNotFound(title.to_string()))
    }

    /// Take a full snapshot of a library section.
    ///
    /// Each show is reloaded for its complete guid/genre/label state and
    /// its episode leaves. A show that fails to reload is logged and
    /// skipped; the run continues with the rest of the library.
    pub async fn snapshot(&self, section: &SectionRef) -> Result<LibrarySnapshot> {
        let listing: MediaContainer<MetadataContainer> = self
            .get_json(
                &format!("/library/sections/{}/all", section.key),
                &[("type", TYPE_SHOW)],
            )
            .await?;

        let mut shows = Vec::new();
        for entry in listing.inner.metadata {
            match self.load_show(&entry.rating_key).await {
                Ok(show) => shows.push(show),
                Err(err) => {
                    warn!("failed to reload show '{}': {err}", entry.title);
                }
            }
        }
        Ok(LibrarySnapshot { shows })
    }

    /// Reload one show with full metadata and its episodes.
    async fn load_show(&self, rating_key: &str) -> Result<PlexShow> {
        let detail: MediaContainer<MetadataContainer> = self
            .get_json(
                &format!("/library/metadata/{rating_key}"),
                &[("includeGuids", "1")],
            )
            .await?;
        let raw = detail.inner.metadata.into_iter().next().ok_or_else(|| {
            FinaleError::InvalidResponse {
                service: SERVICE,
                detail: format!("empty metadata for rating key {rating_key}"),
            }
        })?;

        let leaves: MediaContainer<MetadataContainer> = self
            .get_json(&format!("/library/metadata/{rating_key}/allLeaves"), &[])
            .await?;
        let episodes = leaves
            .inner
            .metadata
            .into_iter()
            .filter_map(|leaf| {
                Some(PlexEpisode {
                    rating_key: leaf.rating_key,
                    title: leaf.title,
                    season: leaf.parent_index?,
                    episode: leaf.index?,
                    watched: leaf.view_count > 0,
                    writers: leaf.writers.into_iter().map(|t| t.tag).collect(),
                })
            })
            .collect();

        Ok(PlexShow {
            rating_key: raw.rating_key,
            title: raw.title,
            guids: raw.guids.into_iter().map(|g| g.id).collect(),
            genres: raw.genres.into_iter().map(|t| t.tag).collect(),
            labels: raw.labels.into_iter().map(|t| t.tag).collect(),
            episodes,
        })
    }

    /// Add a label to a show, keeping its existing labels intact.
    pub async fn add_label(&self, section: &SectionRef, show: &PlexShow, label: &str) -> Result<()> {
        let mut params: Vec<(String, String)> = vec![
            ("type".to_string(), TYPE_SHOW.to_string()),
            ("id".to_string(), show.rating_key.clone()),
            ("label.locked".to_string(), "1".to_string()),
        ];
        for (i, existing) in show.labels.iter().enumerate() {
            params.push((format!("label[{i}].tag.tag"), existing.clone()));
        }
        params.push((
            format!("label[{}].tag.tag", show.labels.len()),
            label.to_string(),
        ));
        self.edit(section, &params).await
    }

    /// Remove a label from a show.
    pub async fn remove_label(
        &self,
        section: &SectionRef,
        show: &PlexShow,
        label: &str,
    ) -> Result<()> {
        let params = vec![
            ("type".to_string(), TYPE_SHOW.to_string()),
            ("id".to_string(), show.rating_key.clone()),
            ("label.locked".to_string(), "1".to_string()),
            ("label[].tag.tag-".to_string(), label.to_string()),
        ];
        self.edit(section, &params).await
    }

    /// Add a writer tag to an episode, keeping its existing tags intact.
    pub async fn add_writer(
        &self,
        section: &SectionRef,
        episode: &PlexEpisode,
        tag: &str,
    ) -> Result<()> {
        let mut params: Vec<(String, String)> = vec![
            ("type".to_string(), TYPE_EPISODE.to_string()),
            ("id".to_string(), episode.rating_key.clone()),
            ("writer.locked".to_string(), "1".to_string()),
        ];
        for (i, existing) in episode.writers.iter().enumerate() {
            params.push((format!("writer[{i}].tag.tag"), existing.clone()));
        }
        params.push((
            format!("writer[{}].tag.tag", episode.writers.len()),
            tag.to_string(),
        ));
        self.edit(section, &params).await
    }

    /// Remove a writer tag from an episode.
    pub async fn remove_writer(
        &self,
        section: &SectionRef,
        episode: &PlexEpisode,
        tag: &str,
    ) -> Result<()> {
        let params = vec![
            ("type".to_string(), TYPE_EPISODE.to_string()),
            ("id".to_string(), episode.rating_key.clone()),
            ("writer.locked".to_string(), "1".to_string()),
            ("writer[].tag.tag-".to_string(), tag.to_string()),
        ];
        self.edit(section, &params).await
    }

    /// Execute a planned set of show-level label steps.
    ///
    /// Every step is logged; a failed mutation is counted and the rest
    /// of the plan still runs, so one broken show never blocks the
    /// remaining reconciliation.
    pub async fn apply_show_steps(
        &self,
        section: &SectionRef,
        snapshot: &LibrarySnapshot,
        label: &str,
        steps: &[ShowStep],
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        for step in steps {
            match step.kind {
                StepKind::AlreadyPresent => {
                    info!(
                        "= label '{label}' already exists for show '{}', skipping",
                        step.title
                    );
                    report.already_present += 1;
                }
                StepKind::Add => {
                    let Some(show) = snapshot.show(&step.rating_key) else {
                        warn!("show '{}' vanished from the snapshot", step.title);
                        report.failed += 1;
                        continue;
                    };
                    info!("+ adding label '{label}' to show '{}'", step.title);
                    match self.add_label(section, show, label).await {
                        Ok(()) => report.added += 1,
                        Err(err) => {
                            warn!("failed to add label to '{}': {err}", step.title);
                            report.failed += 1;
                        }
                    }
                }
                StepKind::Remove => {
                    let Some(show) = snapshot.show(&step.rating_key) else {
                        warn!("show '{}' vanished from the snapshot", step.title);
                        report.failed += 1;
                        continue;
                    };
                    info!("- removing label '{label}' from show '{}'", step.title);
                    match self.remove_label(section, show, label).await {
                        Ok(()) => report.removed += 1,
                        Err(err) => {
                            warn!("failed to remove label from '{}': {err}", step.title);
                            report.failed += 1;
                        }
                    }
                }
            }
        }
        report
    }

    /// Execute a planned set of episode-level writer tag steps.
    pub async fn apply_episode_steps(
        &self,
        section: &SectionRef,
        snapshot: &LibrarySnapshot,
        label: &str,
        steps: &[EpisodeStep],
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        for step in steps {
            let code = format!("S{:02}E{:02}", step.season, step.episode);
            match step.kind {
                StepKind::AlreadyPresent => {
                    info!(
                        "= writer '{label}' already exists for {code} of '{}'",
                        step.show_title
                    );
                    report.already_present += 1;
                }
                StepKind::Add | StepKind::Remove => {
                    let episode = snapshot
                        .show(&step.show_rating_key)
                        .and_then(|s| s.episode(step.season, step.episode));
                    let Some(episode) = episode else {
                        warn!("{code} of '{}' vanished from the snapshot", step.show_title);
                        report.failed += 1;
                        continue;
                    };
                    let result = if step.kind == StepKind::Add {
                        info!("+ adding writer '{label}' to {code} of '{}'", step.show_title);
                        self.add_writer(section, episode, label).await
                    } else {
                        info!(
                            "- removing writer '{label}' from {code} of '{}'",
                            step.show_title
                        );
                        self.remove_writer(section, episode, label).await
                    };
                    match result {
                        Ok(()) if step.kind == StepKind::Add => report.added += 1,
                        Ok(()) => report.removed += 1,
                        Err(err) => {
                            warn!("failed to edit {code} of '{}': {err}", step.show_title);
                            report.failed += 1;
                        }
                    }
                }
            }
        }
        report
    }

    /// PUT a tag edit against the section-wide edit endpoint.
    async fn edit(&self, section: &SectionRef, params: &[(String, String)]) -> Result<()> {
        let url = format!("{}/library/sections/{}/all", self.base_url, section.key);
        let response = self
            .client
            .put(&url)
            .query(params)
            .header("X-Plex-Token", &self.token)
            .send()
            .await
            .map_err(|e| FinaleError::from_transport(SERVICE, &self.base_url, e))?;
        self.check_status(response).map(|_| ())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(params)
            .header("X-Plex-Token", &self.token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| FinaleError::from_transport(SERVICE, &self.base_url, e))?;
        decode_json(SERVICE, self.check_status(response)?).await
    }

    fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        match response.status() {
            status if status.is_success() => Ok(response),
            reqwest::StatusCode::UNAUTHORIZED => Err(FinaleError::Unauthorized { service: SERVICE }),
            status => Err(FinaleError::UnexpectedStatus {
                service: SERVICE,
                status: status.as_u16(),
            }),
        }
    }
}

// Wire shapes for the JSON flavor of the Plex API. Everything arrives
// wrapped in a MediaContainer envelope.

#[derive(Debug, Deserialize)]
struct MediaContainer<T> {
    #[serde(rename = "MediaContainer")]
    inner: T,
}

#[derive(Debug, Deserialize)]
struct DirectoryContainer {
    #[serde(rename = "Directory", default)]
    directories: Vec<RawDirectory>,
}

#[derive(Debug, Deserialize)]
struct RawDirectory {
    key: String,
    #[serde(rename = "type")]
    kind: String,
    title: String,
}

#[derive(Debug, Deserialize)]
struct MetadataContainer {
    #[serde(rename = "Metadata", default)]
    metadata: Vec<RawMetadata>,
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    #[serde(rename = "ratingKey")]
    rating_key: String,
    #[serde(default)]
    title: String,
    #[serde(rename = "Guid", default)]
    guids: Vec<RawGuid>,
    #[serde(rename = "Genre", default)]
    genres: Vec<RawTag>,
    #[serde(rename = "Label", default)]
    labels: Vec<RawTag>,
    #[serde(rename = "Writer", default)]
    writers: Vec<RawTag>,
    /// Season number on episode leaves
    #[serde(rename = "parentIndex")]
    parent_index: Option<u32>,
    /// Episode number on episode leaves
    index: Option<u32>,
    #[serde(rename = "viewCount", default)]
    view_count: u64,
}

#[derive(Debug, Deserialize)]
struct RawGuid {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RawTag {
    tag: String,
}
