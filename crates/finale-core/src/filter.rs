//! Filter pipeline over finale candidates.
//!
//! A pure function over the candidate list and the library snapshot.
//! Filters run in a fixed order (genre exclusion, label exclusion,
//! sole-unwatched) but each is an independent set intersection, so the
//! order only affects how early a candidate drops out, never the result.
//! Both detector outputs go through the same pipeline.

use crate::config::GeneralConfig;
use crate::identity::IdentityJoin;
use crate::plex::PlexShow;
use crate::types::FinaleCandidate;

/// Apply all enabled filters to a candidate list.
///
/// A candidate whose show cannot be joined into the library passes the
/// genre and label filters (there is nothing to check against) but is
/// dropped by the sole-unwatched filter, which cannot be evaluated
/// without watched state.
pub fn apply(
    candidates: Vec<FinaleCandidate>,
    join: &IdentityJoin<'_>,
    general: &GeneralConfig,
) -> Vec<FinaleCandidate> {
    candidates
        .into_iter()
        .filter(|candidate| {
            let show = join.lookup(&candidate.ids);

            if let Some(show) = show {
                if general.skip_genres
                    && intersects_ignore_case(&show.genres, &general.genres_to_skip)
                {
                    return false;
                }
                if general.skip_labels
                    && intersects_ignore_case(&show.labels, &general.labels_to_skip)
                {
                    return false;
                }
            }

            if general.only_finale_unwatched {
                return match show {
                    Some(show) => is_sole_unwatched(show, candidate.season, candidate.episode),
                    None => false,
                };
            }

            true
        })
        .collect()
}

/// Case-insensitive non-empty intersection test between two tag sets.
pub(crate) fn intersects_ignore_case(values: &[String], exclusions: &[String]) -> bool {
    exclusions
        .iter()
        .any(|ex| values.iter().any(|v| v.eq_ignore_ascii_case(ex)))
}

/// True when the finale episode itself is unwatched and every other
/// episode of its season is watched.
///
/// Encodes "the finale is the user's next episode in that season"; an
/// episode missing from the season listing fails the check.
fn is_sole_unwatched(show: &PlexShow, season: u32, episode: u32) -> bool {
    let Some(finale) = show.episode(season, episode) else {
        return false;
    };
    if finale.watched {
        return false;
    }
    show.season_episodes(season)
        .filter(|e| e.episode != episode)
        .all(|e| e.watched)
}
