//! Identity join from external show ids to media server entries.
//!
//! Plex exposes external references as guid strings (`imdb://tt...`,
//! `tmdb://123`). The join normalizes those to bare lowercase ids and
//! indexes every show under each of its recognized providers. It is
//! rebuilt from the snapshot once per run; a show without recognized
//! guids is simply unreachable through it.

use std::collections::HashMap;

use crate::plex::{LibrarySnapshot, PlexShow};
use crate::types::ShowIds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Provider {
    Imdb,
    Tmdb,
}

/// Lookup table from external ids to snapshot shows
pub struct IdentityJoin<'a> {
    shows: &'a [PlexShow],
    index: HashMap<(Provider, String), usize>,
}

impl<'a> IdentityJoin<'a> {
    /// Build the join over all shows of a snapshot.
    ///
    /// When two shows claim the same external id, the first occurrence
    /// in library order wins.
    pub fn build(snapshot: &'a LibrarySnapshot) -> Self {
        let mut index = HashMap::new();
        for (position, show) in snapshot.shows.iter().enumerate() {
            for guid in &show.guids {
                if let Some(key) = normalize_guid(guid) {
                    index.entry(key).or_insert(position);
                }
            }
        }
        Self {
            shows: &snapshot.shows,
            index,
        }
    }

    /// Resolve a candidate's id pair to a show, IMDb first, then TMDB.
    pub fn lookup(&self, ids: &ShowIds) -> Option<&'a PlexShow> {
        if let Some(imdb) = &ids.imdb {
            if let Some(&pos) = self.index.get(&(Provider::Imdb, imdb.clone())) {
                return Some(&self.shows[pos]);
            }
        }
        if let Some(tmdb) = ids.tmdb {
            if let Some(&pos) = self.index.get(&(Provider::Tmdb, tmdb.to_string())) {
                return Some(&self.shows[pos]);
            }
        }
        None
    }

    /// Number of indexed id entries, across both providers.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True when no show contributed a recognized guid.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Normalize a raw guid string to a provider and bare lowercase id.
///
/// Guids may carry a query suffix (`imdb://tt123?lang=en`); everything
/// from the `?` on is dropped. Unrecognized schemes yield `None`.
fn normalize_guid(raw: &str) -> Option<(Provider, String)> {
    let lower = raw.to_lowercase();
    let (provider, rest) = if let Some(rest) = lower.strip_prefix("imdb://") {
        (Provider::Imdb, rest)
    } else if let Some(rest) = lower.strip_prefix("tmdb://") {
        (Provider::Tmdb, rest)
    } else {
        return None;
    };
    let id = rest.split('?').next().unwrap_or_default();
    if id.is_empty() {
        None
    } else {
        Some((provider, id.to_string()))
    }
}
