//! Core data types shared by the detectors, the filter pipeline and the
//! label reconciler.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// External identifier pair for a show.
///
/// Either side may be absent; inventory sources report missing IMDb ids
/// as an empty string or the literal `"N/A"`, and missing TMDB ids as
/// zero, so the constructor normalizes those to `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowIds {
    /// IMDb identifier, lowercase (e.g. `tt0903747`)
    pub imdb: Option<String>,
    /// TMDB numeric identifier
    pub tmdb: Option<u64>,
}

impl ShowIds {
    /// Build an identifier pair, normalizing placeholder values away.
    pub fn new(imdb: Option<String>, tmdb: Option<u64>) -> Self {
        let imdb = imdb.and_then(|raw| {
            let trimmed = raw.trim().to_lowercase();
            if trimmed.is_empty() || trimmed == "n/a" {
                None
            } else {
                Some(trimmed)
            }
        });
        let tmdb = tmdb.filter(|&id| id != 0);
        Self { imdb, tmdb }
    }

    /// True when neither identifier is present.
    ///
    /// A candidate with empty ids can never be matched against the media
    /// server catalog.
    pub fn is_empty(&self) -> bool {
        self.imdb.is_none() && self.tmdb.is_none()
    }
}

/// An episode provisionally identified as a season finale.
///
/// Produced by either detector before filters are applied. The
/// identifying key is `(ids, season, episode)`; the title fields are
/// display-only and never used for matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinaleCandidate {
    /// Show display title, non-authoritative
    pub show_title: String,
    /// Season number of the candidate finale (1-based, specials excluded)
    pub season: u32,
    /// Episode number within the season (1-based)
    pub episode: u32,
    /// Episode display title, non-authoritative
    pub episode_title: String,
    /// Calendar air date; may lie in the future
    pub air_date: NaiveDate,
    /// External identifier pair used to join into the media server catalog
    pub ids: ShowIds,
    /// Monitored flag from the inventory source; always true for the
    /// metadata detector, which has no such concept
    pub monitored: bool,
    /// True when the air date is after "now" at detection time
    pub is_future: bool,
    /// Episode classification from the metadata service (e.g. `season_finale`);
    /// `None` for inventory-based candidates
    pub episode_type: Option<String>,
}
