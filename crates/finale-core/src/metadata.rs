//! Metadata-service finale detection.
//!
//! Walks the media server's own catalog instead of the download
//! manager's: for each show, the currently last known episode is looked
//! up on Trakt and kept only when its `episode_type` classification is
//! on the configured allow-list. This is the detector that can tell a
//! real (or mid-season) finale from an episode that merely happens to be
//! the latest, at the cost of one paced lookup per show.

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};

use crate::config::GeneralConfig;
use crate::error::Result;
use crate::filter::intersects_ignore_case;
use crate::plex::{LibrarySnapshot, PlexEpisode, PlexShow};
use crate::trakt::TraktClient;
use crate::types::FinaleCandidate;

/// Detect finale candidates by episode classification.
///
/// Genre and label exclusions run before any network lookup so excluded
/// shows cost nothing. Per-show lookup failures are logged and skip the
/// show; only systemic transport failures propagate.
pub async fn detect(
    snapshot: &LibrarySnapshot,
    trakt: &TraktClient,
    general: &GeneralConfig,
    episode_types: &[String],
    now: DateTime<Utc>,
) -> Result<Vec<FinaleCandidate>> {
    let cutoff = now - Duration::days(general.recent_days);
    let mut candidates = Vec::new();

    for show in &snapshot.shows {
        if general.skip_genres && intersects_ignore_case(&show.genres, &general.genres_to_skip) {
            continue;
        }
        if general.skip_labels && intersects_ignore_case(&show.labels, &general.labels_to_skip) {
            continue;
        }

        let Some(last) = last_episode(show) else {
            continue;
        };

        let resolved = match trakt.search_show(&show.title).await {
            Ok(resolved) => resolved,
            Err(err) => {
                warn!("Trakt search failed for '{}': {err}", show.title);
                continue;
            }
        };
        let Some(resolved) = resolved else {
            debug!("no Trakt match for '{}'", show.title);
            continue;
        };

        let detail = match trakt.episode(&resolved, last.season, last.episode).await {
            Ok(detail) => detail,
            Err(err) => {
                warn!(
                    "Trakt episode lookup failed for '{}' S{:02}E{:02}: {err}",
                    show.title, last.season, last.episode
                );
                continue;
            }
        };
        let Some(detail) = detail else {
            continue;
        };

        let Some(first_aired) = detail.first_aired else {
            continue;
        };
        let is_future = first_aired > now;
        if !is_future && first_aired < cutoff {
            continue;
        }

        let Some(episode_type) = detail.episode_type else {
            continue;
        };
        if !is_desired_type(&episode_type, episode_types) {
            continue;
        }

        candidates.push(FinaleCandidate {
            show_title: show.title.clone(),
            season: last.season,
            episode: last.episode,
            episode_title: last.title.clone(),
            air_date: first_aired.date_naive(),
            ids: resolved.ids,
            monitored: true,
            is_future,
            episode_type: Some(episode_type),
        });
    }

    Ok(candidates)
}

/// The show's currently last known episode: highest episode number of
/// the highest season, specials excluded.
///
/// This is only a candidate position; whether it is an actual finale is
/// decided by the metadata lookup.
fn last_episode(show: &PlexShow) -> Option<&PlexEpisode> {
    let last_season = show
        .episodes
        .iter()
        .map(|e| e.season)
        .filter(|&s| s > 0)
        .max()?;
    show.season_episodes(last_season)
        .max_by_key(|e| e.episode)
}

/// Case-insensitive membership test against the episode type allow-list.
fn is_desired_type(episode_type: &str, allowed: &[String]) -> bool {
    allowed
        .iter()
        .any(|t| t.eq_ignore_ascii_case(episode_type))
}
