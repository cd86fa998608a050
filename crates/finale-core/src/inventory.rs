//! Inventory-based finale detection.
//!
//! Works entirely from the download manager's view of the world: the
//! finale of a series is the highest-numbered episode of its
//! highest-numbered season (specials excluded), and "downloaded" means a
//! recorded file whose path carries the matching `sXXeYY` token. The
//! detector cannot tell a real season finale from a merely latest
//! episode; that distinction belongs to the metadata detector.

use chrono::{DateTime, Duration, Utc};
use log::warn;

use crate::config::GeneralConfig;
use crate::error::Result;
use crate::paths::PathMapper;
use crate::sonarr::{EpisodeFile, EpisodeRecord, SonarrClient};
use crate::types::{FinaleCandidate, ShowIds};

/// Result of one inventory detection run
#[derive(Debug, Default)]
pub struct InventoryDetection {
    pub downloaded: Vec<FinaleCandidate>,
    pub not_downloaded: Vec<FinaleCandidate>,
}

/// Position of an air date relative to the recency window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AirWindow {
    /// Aired within the window, lower bound inclusive
    Recent,
    /// Not yet aired
    Future,
    /// Aired before the window opened
    Stale,
}

/// Detect season finale candidates from the inventory source.
///
/// `now` is injected so the window arithmetic is reproducible; callers
/// pass `Utc::now()`.
///
/// # Errors
/// Connectivity and auth failures from the inventory API abort the run.
/// Missing or unparseable air dates only skip the affected series.
pub async fn detect(
    sonarr: &SonarrClient,
    mapper: &PathMapper,
    general: &GeneralConfig,
    now: DateTime<Utc>,
) -> Result<InventoryDetection> {
    let mut detection = InventoryDetection::default();

    for series in sonarr.list_series().await? {
        if general.skip_unmonitored && !series.monitored {
            continue;
        }

        let episodes = sonarr.list_episodes(series.id).await?;
        if episodes.is_empty() {
            continue;
        }

        let Some(last_season) = last_season(&episodes) else {
            continue;
        };
        let Some(finale) = season_finale(&episodes, last_season) else {
            continue;
        };

        let Some(raw_air) = finale.air_date_utc.as_deref() else {
            continue;
        };
        let Some(air) = parse_air_date(raw_air) else {
            warn!(
                "invalid air date '{}' for episode '{}' of '{}', skipping season",
                raw_air,
                finale.title.as_deref().unwrap_or("N/A"),
                series.title
            );
            continue;
        };

        let window = classify_air_date(air, now, general.recent_days);
        if window == AirWindow::Stale {
            continue;
        }

        let needle = episode_needle(last_season, finale.episode_number);
        let files = sonarr.list_episode_files(series.id).await?;
        let downloaded = is_downloaded(&files, mapper, &needle);

        let candidate = FinaleCandidate {
            show_title: series.title.clone(),
            season: last_season,
            episode: finale.episode_number,
            episode_title: finale.title.clone().unwrap_or_default(),
            air_date: air.date_naive(),
            ids: ShowIds::new(series.imdb_id.clone(), Some(series.tmdb_id)),
            monitored: series.monitored,
            is_future: window == AirWindow::Future,
            episode_type: None,
        };

        match window {
            AirWindow::Recent if downloaded => detection.downloaded.push(candidate),
            AirWindow::Recent => detection.not_downloaded.push(candidate),
            // A future finale only counts once it is already on disk
            AirWindow::Future if downloaded => detection.downloaded.push(candidate),
            AirWindow::Future | AirWindow::Stale => {}
        }
    }

    Ok(detection)
}

/// The highest season number across all episodes, specials excluded.
fn last_season(episodes: &[EpisodeRecord]) -> Option<u32> {
    episodes
        .iter()
        .map(|e| e.season_number)
        .filter(|&s| s > 0)
        .max()
}

/// The finale of one season: the episode with the highest episode
/// number. When two episodes share that number the first one in input
/// order wins, keeping the choice deterministic for duplicate numbering
/// from the inventory source.
fn season_finale(episodes: &[EpisodeRecord], season: u32) -> Option<&EpisodeRecord> {
    let mut finale: Option<&EpisodeRecord> = None;
    for episode in episodes.iter().filter(|e| e.season_number == season) {
        match finale {
            Some(current) if episode.episode_number <= current.episode_number => {}
            _ => finale = Some(episode),
        }
    }
    finale
}

/// The zero-padded `sXXeYY` token matched against recorded file paths.
fn episode_needle(season: u32, episode: u32) -> String {
    format!("s{season:02}e{episode:02}")
}

/// Whether any recorded file covers the episode token.
///
/// Paths go through translation before matching so tokens recorded on
/// the download manager's host match here; zero-byte records are
/// leftovers of failed imports and do not count.
fn is_downloaded(files: &[EpisodeFile], mapper: &PathMapper, needle: &str) -> bool {
    files.iter().any(|file| {
        file.size > 0
            && file
                .relative_path
                .as_deref()
                .map(|p| mapper.map(p).to_lowercase().contains(needle))
                .unwrap_or(false)
    })
}

fn parse_air_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn classify_air_date(air: DateTime<Utc>, now: DateTime<Utc>, recent_days: i64) -> AirWindow {
    if air > now {
        AirWindow::Future
    } else if air >= now - Duration::days(recent_days) {
        AirWindow::Recent
    } else {
        AirWindow::Stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SonarrConfig;
    use chrono::TimeZone;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn episode(season: u32, number: u32, air: Option<&str>) -> EpisodeRecord {
        EpisodeRecord {
            season_number: season,
            episode_number: number,
            title: Some(format!("S{season}E{number}")),
            air_date_utc: air.map(|s| s.to_string()),
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_last_season_ignores_specials() {
        let episodes = vec![
            episode(0, 1, None),
            episode(1, 1, None),
            episode(2, 1, None),
        ];
        assert_eq!(last_season(&episodes), Some(2));
    }

    #[test]
    fn test_last_season_none_for_specials_only() {
        let episodes = vec![episode(0, 1, None), episode(0, 2, None)];
        assert_eq!(last_season(&episodes), None);
    }

    #[test]
    fn test_season_finale_takes_max_episode() {
        let episodes = vec![
            episode(3, 2, None),
            episode(3, 6, None),
            episode(3, 4, None),
            episode(2, 9, None),
        ];
        let finale = season_finale(&episodes, 3).unwrap();
        assert_eq!(finale.episode_number, 6);
    }

    #[test]
    fn test_season_finale_duplicate_number_first_wins() {
        let mut first = episode(3, 6, None);
        first.title = Some("first".to_string());
        let mut second = episode(3, 6, None);
        second.title = Some("second".to_string());

        let episodes = vec![first, second];
        let finale = season_finale(&episodes, 3).unwrap();
        assert_eq!(finale.title.as_deref(), Some("first"));
    }

    #[test]
    fn test_episode_needle_zero_padded() {
        assert_eq!(episode_needle(3, 6), "s03e06");
        assert_eq!(episode_needle(12, 24), "s12e24");
    }

    #[test]
    fn test_is_downloaded_requires_token_and_size() {
        let mapper = PathMapper::default();
        let files = vec![
            EpisodeFile {
                relative_path: Some("Show/Season 03/Show.S03E06.1080p.mkv".to_string()),
                size: 0,
            },
            EpisodeFile {
                relative_path: Some("Show/Season 03/Show.S03E05.1080p.mkv".to_string()),
                size: 1024,
            },
        ];
        assert!(!is_downloaded(&files, &mapper, "s03e06"));
        assert!(is_downloaded(&files, &mapper, "s03e05"));
    }

    #[test]
    fn test_is_downloaded_matches_after_path_translation() {
        let mapper = PathMapper::new(&[crate::config::PathMapping {
            from: "/data".to_string(),
            to: "/mnt/media".to_string(),
        }]);
        let files = vec![EpisodeFile {
            relative_path: Some("/data/tv/Show.S01E08.mkv".to_string()),
            size: 512,
        }];
        assert!(is_downloaded(&files, &mapper, "s01e08"));
    }

    #[test]
    fn test_recency_window_lower_bound_inclusive() {
        let now = fixed_now();
        let on_boundary = now - Duration::days(14);
        let past_boundary = now - Duration::days(15);

        assert_eq!(classify_air_date(on_boundary, now, 14), AirWindow::Recent);
        assert_eq!(classify_air_date(past_boundary, now, 14), AirWindow::Stale);
    }

    #[test]
    fn test_future_air_date_classified_future() {
        let now = fixed_now();
        assert_eq!(
            classify_air_date(now + Duration::days(10), now, 14),
            AirWindow::Future
        );
    }

    async fn mock_sonarr(server: &MockServer) -> SonarrClient {
        SonarrClient::new(&SonarrConfig {
            url: server.uri(),
            api_key: "k".to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_detect_emits_only_last_season_finale() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/series"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 1, "title": "Show", "monitored": true, "tmdbId": 10, "imdbId": "tt1"}
            ])))
            .mount(&server)
            .await;
        // Seasons 1 and 2 each have their own "latest" episode but only
        // season 3 may produce a candidate.
        Mock::given(method("GET"))
            .and(path("/episode"))
            .and(query_param("seriesId", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"seasonNumber": 1, "episodeNumber": 10, "title": "Old", "airDateUtc": "2023-01-01T00:00:00Z"},
                {"seasonNumber": 2, "episodeNumber": 8, "title": "Older", "airDateUtc": "2024-01-01T00:00:00Z"},
                {"seasonNumber": 3, "episodeNumber": 5, "title": "Mid", "airDateUtc": "2025-06-01T00:00:00Z"},
                {"seasonNumber": 3, "episodeNumber": 6, "title": "Finale", "airDateUtc": "2025-06-10T00:00:00Z"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/episodefile"))
            .and(query_param("seriesId", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"relativePath": "Show/Season 03/Show.S03E06.mkv", "size": 1024}
            ])))
            .mount(&server)
            .await;

        let client = mock_sonarr(&server).await;
        let detection = detect(
            &client,
            &PathMapper::default(),
            &GeneralConfig::default(),
            fixed_now(),
        )
        .await
        .unwrap();

        assert_eq!(detection.downloaded.len(), 1);
        assert!(detection.not_downloaded.is_empty());
        let candidate = &detection.downloaded[0];
        assert_eq!((candidate.season, candidate.episode), (3, 6));
        assert!(!candidate.is_future);
        assert_eq!(candidate.ids.imdb.as_deref(), Some("tt1"));
    }

    #[tokio::test]
    async fn test_detect_future_finale_needs_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/series"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 1, "title": "Leaked", "monitored": true, "tmdbId": 10},
                {"id": 2, "title": "Pending", "monitored": true, "tmdbId": 20}
            ])))
            .mount(&server)
            .await;
        for series_id in ["1", "2"] {
            Mock::given(method("GET"))
                .and(path("/episode"))
                .and(query_param("seriesId", series_id))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                    {"seasonNumber": 1, "episodeNumber": 8, "title": "Finale",
                     "airDateUtc": "2025-06-25T00:00:00Z"}
                ])))
                .mount(&server)
                .await;
        }
        // Only series 1 has the file on disk ahead of air.
        Mock::given(method("GET"))
            .and(path("/episodefile"))
            .and(query_param("seriesId", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"relativePath": "Leaked/Leaked.S01E08.mkv", "size": 2048}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/episodefile"))
            .and(query_param("seriesId", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = mock_sonarr(&server).await;
        let detection = detect(
            &client,
            &PathMapper::default(),
            &GeneralConfig::default(),
            fixed_now(),
        )
        .await
        .unwrap();

        assert_eq!(detection.downloaded.len(), 1);
        assert_eq!(detection.downloaded[0].show_title, "Leaked");
        assert!(detection.downloaded[0].is_future);
        // The undownloaded future finale appears nowhere
        assert!(detection.not_downloaded.is_empty());
    }

    #[tokio::test]
    async fn test_detect_skips_unmonitored_series() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/series"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 1, "title": "Dropped", "monitored": false, "tmdbId": 10}
            ])))
            .mount(&server)
            .await;

        let client = mock_sonarr(&server).await;
        let detection = detect(
            &client,
            &PathMapper::default(),
            &GeneralConfig::default(),
            fixed_now(),
        )
        .await
        .unwrap();

        assert!(detection.downloaded.is_empty());
        assert!(detection.not_downloaded.is_empty());
    }

    #[tokio::test]
    async fn test_detect_invalid_air_date_skips_series() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/series"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 1, "title": "Broken", "monitored": true, "tmdbId": 10}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/episode"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"seasonNumber": 1, "episodeNumber": 3, "title": "Finale",
                 "airDateUtc": "not-a-date"}
            ])))
            .mount(&server)
            .await;

        let client = mock_sonarr(&server).await;
        let detection = detect(
            &client,
            &PathMapper::default(),
            &GeneralConfig::default(),
            fixed_now(),
        )
        .await
        .unwrap();

        assert!(detection.downloaded.is_empty());
        assert!(detection.not_downloaded.is_empty());
    }
}
