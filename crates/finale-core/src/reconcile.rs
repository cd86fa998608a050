//! Label reconciliation planning.
//!
//! Converges the media server's label state to exactly match the
//! qualifying set. Planning is pure: it reads the snapshot and produces
//! explicit steps, including the no-op `AlreadyPresent` entries, so a
//! second run over unchanged state plans zero mutations. The apply side
//! lives with the Plex client.
//!
//! Two independent switches drive each pass:
//!
//! | label | remove_stale | behavior                                        |
//! |-------|--------------|-------------------------------------------------|
//! | true  | true         | add to qualifying, remove from everything else  |
//! | true  | false        | add to qualifying, never remove                 |
//! | false | true         | remove from every carrier, qualifying included  |
//! | false | false        | no mutation                                     |
//!
//! The episode pass follows the same table independently, on writer tags
//! at (show, season, episode) granularity.

use std::collections::HashSet;

use crate::identity::IdentityJoin;
use crate::plex::LibrarySnapshot;
use crate::types::FinaleCandidate;

/// Switches for one reconciliation run
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// The label (and writer tag) text to converge on
    pub label: String,
    /// Add the label to qualifying shows
    pub label_shows: bool,
    /// Add the writer tag to qualifying episodes
    pub label_episodes: bool,
    /// Strip the label/tag from entries that no longer qualify
    pub remove_stale: bool,
}

/// What a single step does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Add,
    /// No-op, reported so idempotence is visible in the run report
    AlreadyPresent,
    Remove,
}

/// One planned show-level operation
#[derive(Debug, Clone, PartialEq)]
pub struct ShowStep {
    pub rating_key: String,
    pub title: String,
    pub kind: StepKind,
}

/// One planned episode-level operation
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeStep {
    pub show_rating_key: String,
    pub show_title: String,
    pub season: u32,
    pub episode: u32,
    pub kind: StepKind,
}

/// Mutation counts from one apply pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: usize,
    pub already_present: usize,
    pub removed: usize,
    pub failed: usize,
}

impl ReconcileReport {
    /// Total number of actual mutations performed.
    pub fn mutations(&self) -> usize {
        self.added + self.removed
    }
}

/// Plan the show-level label pass.
pub fn plan_show_labels(
    qualifying: &[FinaleCandidate],
    join: &IdentityJoin<'_>,
    snapshot: &LibrarySnapshot,
    opts: &ReconcileOptions,
) -> Vec<ShowStep> {
    let mut steps = Vec::new();
    let mut matched_keys: HashSet<&str> = HashSet::new();

    if opts.label_shows {
        for candidate in qualifying {
            let Some(show) = join.lookup(&candidate.ids) else {
                continue;
            };
            if !matched_keys.insert(show.rating_key.as_str()) {
                // Same show qualified through more than one candidate
                continue;
            }
            steps.push(ShowStep {
                rating_key: show.rating_key.clone(),
                title: show.title.clone(),
                kind: if show.has_label(&opts.label) {
                    StepKind::AlreadyPresent
                } else {
                    StepKind::Add
                },
            });
        }
    }

    if opts.remove_stale {
        for show in &snapshot.shows {
            if show.has_label(&opts.label) && !matched_keys.contains(show.rating_key.as_str()) {
                steps.push(ShowStep {
                    rating_key: show.rating_key.clone(),
                    title: show.title.clone(),
                    kind: StepKind::Remove,
                });
            }
        }
    }

    steps
}

/// Plan the episode-level writer tag pass.
pub fn plan_episode_labels(
    qualifying: &[FinaleCandidate],
    join: &IdentityJoin<'_>,
    snapshot: &LibrarySnapshot,
    opts: &ReconcileOptions,
) -> Vec<EpisodeStep> {
    let mut steps = Vec::new();
    let mut matched_keys: HashSet<(String, u32, u32)> = HashSet::new();

    if opts.label_episodes {
        for candidate in qualifying {
            let Some(show) = join.lookup(&candidate.ids) else {
                continue;
            };
            let Some(episode) = show.episode(candidate.season, candidate.episode) else {
                continue;
            };
            let key = (
                show.rating_key.clone(),
                candidate.season,
                candidate.episode,
            );
            if !matched_keys.insert(key) {
                continue;
            }
            steps.push(EpisodeStep {
                show_rating_key: show.rating_key.clone(),
                show_title: show.title.clone(),
                season: candidate.season,
                episode: candidate.episode,
                kind: if episode.has_writer(&opts.label) {
                    StepKind::AlreadyPresent
                } else {
                    StepKind::Add
                },
            });
        }
    }

    if opts.remove_stale {
        for show in &snapshot.shows {
            for episode in &show.episodes {
                let key = (show.rating_key.clone(), episode.season, episode.episode);
                if episode.has_writer(&opts.label) && !matched_keys.contains(&key) {
                    steps.push(EpisodeStep {
                        show_rating_key: show.rating_key.clone(),
                        show_title: show.title.clone(),
                        season: episode.season,
                        episode: episode.episode,
                        kind: StepKind::Remove,
                    });
                }
            }
        }
    }

    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plex::{PlexEpisode, PlexShow};
    use crate::types::ShowIds;
    use chrono::NaiveDate;

    fn candidate(imdb: &str, season: u32, episode: u32) -> FinaleCandidate {
        FinaleCandidate {
            show_title: imdb.to_string(),
            season,
            episode,
            episode_title: String::new(),
            air_date: NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
            ids: ShowIds::new(Some(imdb.to_string()), None),
            monitored: true,
            is_future: false,
            episode_type: None,
        }
    }

    fn show(rating_key: &str, imdb: &str, labels: &[&str]) -> PlexShow {
        PlexShow {
            rating_key: rating_key.to_string(),
            title: format!("Show {rating_key}"),
            guids: vec![format!("imdb://{imdb}")],
            genres: vec![],
            labels: labels.iter().map(|l| l.to_string()).collect(),
            episodes: vec![],
        }
    }

    fn opts(label_shows: bool, remove_stale: bool) -> ReconcileOptions {
        ReconcileOptions {
            label: "Finale".to_string(),
            label_shows,
            label_episodes: false,
            remove_stale,
        }
    }

    /// Library of four shows covering every (labeled, qualifying) pair:
    /// A labeled+qualifying, B unlabeled+qualifying, C labeled only,
    /// D unlabeled only.
    fn four_show_snapshot() -> LibrarySnapshot {
        LibrarySnapshot {
            shows: vec![
                show("a", "tt1", &["Finale"]),
                show("b", "tt2", &[]),
                show("c", "tt3", &["Finale"]),
                show("d", "tt4", &[]),
            ],
        }
    }

    fn qualifying() -> Vec<FinaleCandidate> {
        vec![candidate("tt1", 1, 1), candidate("tt2", 1, 1)]
    }

    fn kinds_by_key(steps: &[ShowStep]) -> Vec<(String, StepKind)> {
        steps
            .iter()
            .map(|s| (s.rating_key.clone(), s.kind))
            .collect()
    }

    #[test]
    fn test_truth_table_add_and_remove() {
        let snapshot = four_show_snapshot();
        let join = IdentityJoin::build(&snapshot);
        let steps = plan_show_labels(&qualifying(), &join, &snapshot, &opts(true, true));

        assert_eq!(
            kinds_by_key(&steps),
            vec![
                ("a".to_string(), StepKind::AlreadyPresent),
                ("b".to_string(), StepKind::Add),
                ("c".to_string(), StepKind::Remove),
            ]
        );
    }

    #[test]
    fn test_truth_table_add_only() {
        let snapshot = four_show_snapshot();
        let join = IdentityJoin::build(&snapshot);
        let steps = plan_show_labels(&qualifying(), &join, &snapshot, &opts(true, false));

        assert_eq!(
            kinds_by_key(&steps),
            vec![
                ("a".to_string(), StepKind::AlreadyPresent),
                ("b".to_string(), StepKind::Add),
            ]
        );
    }

    #[test]
    fn test_truth_table_remove_all_carriers() {
        let snapshot = four_show_snapshot();
        let join = IdentityJoin::build(&snapshot);
        let steps = plan_show_labels(&qualifying(), &join, &snapshot, &opts(false, true));

        // Removal hits every carrier, including the qualifying show "a"
        assert_eq!(
            kinds_by_key(&steps),
            vec![
                ("a".to_string(), StepKind::Remove),
                ("c".to_string(), StepKind::Remove),
            ]
        );
    }

    #[test]
    fn test_truth_table_no_mutation() {
        let snapshot = four_show_snapshot();
        let join = IdentityJoin::build(&snapshot);
        let steps = plan_show_labels(&qualifying(), &join, &snapshot, &opts(false, false));
        assert!(steps.is_empty());
    }

    #[test]
    fn test_unmatched_candidate_plans_nothing() {
        let snapshot = four_show_snapshot();
        let join = IdentityJoin::build(&snapshot);
        let steps = plan_show_labels(
            &[candidate("tt999", 1, 1)],
            &join,
            &snapshot,
            &opts(true, false),
        );
        assert!(steps.is_empty());
    }

    #[test]
    fn test_duplicate_candidates_plan_one_step() {
        let snapshot = four_show_snapshot();
        let join = IdentityJoin::build(&snapshot);
        let steps = plan_show_labels(
            &[candidate("tt2", 1, 1), candidate("tt2", 2, 1)],
            &join,
            &snapshot,
            &opts(true, false),
        );
        assert_eq!(steps.len(), 1);
    }

    #[test]
    fn test_label_comparison_is_case_insensitive() {
        let snapshot = LibrarySnapshot {
            shows: vec![show("a", "tt1", &["finale"])],
        };
        let join = IdentityJoin::build(&snapshot);
        let steps = plan_show_labels(
            &[candidate("tt1", 1, 1)],
            &join,
            &snapshot,
            &opts(true, false),
        );
        assert_eq!(steps[0].kind, StepKind::AlreadyPresent);
    }

    /// Mutate an in-memory snapshot the way the apply stage would.
    fn apply_to_snapshot(snapshot: &mut LibrarySnapshot, steps: &[ShowStep], label: &str) {
        for step in steps {
            let show = snapshot
                .shows
                .iter_mut()
                .find(|s| s.rating_key == step.rating_key)
                .unwrap();
            match step.kind {
                StepKind::Add => show.labels.push(label.to_string()),
                StepKind::Remove => show.labels.retain(|l| !l.eq_ignore_ascii_case(label)),
                StepKind::AlreadyPresent => {}
            }
        }
    }

    #[test]
    fn test_planning_is_idempotent_after_apply() {
        let mut snapshot = four_show_snapshot();
        let qualifying = qualifying();
        let options = opts(true, true);

        let first = {
            let join = IdentityJoin::build(&snapshot);
            plan_show_labels(&qualifying, &join, &snapshot, &options)
        };
        assert!(first.iter().any(|s| s.kind != StepKind::AlreadyPresent));
        apply_to_snapshot(&mut snapshot, &first, &options.label);

        let join = IdentityJoin::build(&snapshot);
        let second = plan_show_labels(&qualifying, &join, &snapshot, &options);
        assert!(
            second.iter().all(|s| s.kind == StepKind::AlreadyPresent),
            "second run must plan zero mutations, got {second:?}"
        );
    }

    fn episode(season: u32, episode: u32, writers: &[&str]) -> PlexEpisode {
        PlexEpisode {
            rating_key: format!("{season}-{episode}"),
            title: String::new(),
            season,
            episode,
            watched: false,
            writers: writers.iter().map(|w| w.to_string()).collect(),
        }
    }

    fn episode_opts(label_episodes: bool, remove_stale: bool) -> ReconcileOptions {
        ReconcileOptions {
            label: "Finale".to_string(),
            label_shows: false,
            label_episodes,
            remove_stale,
        }
    }

    fn episode_snapshot() -> LibrarySnapshot {
        let mut tagged = show("a", "tt1", &[]);
        tagged.episodes = vec![episode(1, 1, &[]), episode(1, 2, &["Finale"])];
        let mut stale = show("b", "tt2", &[]);
        stale.episodes = vec![episode(3, 4, &["Finale"])];
        LibrarySnapshot {
            shows: vec![tagged, stale],
        }
    }

    #[test]
    fn test_episode_plan_adds_and_sweeps_stale() {
        let snapshot = episode_snapshot();
        let join = IdentityJoin::build(&snapshot);
        // Candidate points at the untagged episode of show "a"
        let steps = plan_episode_labels(
            &[candidate("tt1", 1, 1)],
            &join,
            &snapshot,
            &episode_opts(true, true),
        );

        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].kind, StepKind::Add);
        assert_eq!((steps[0].season, steps[0].episode), (1, 1));
        // The previously tagged episode of "a" and the stale one on "b"
        // are both swept
        assert!(steps[1..].iter().all(|s| s.kind == StepKind::Remove));
    }

    #[test]
    fn test_episode_plan_disabled_still_sweeps_when_removing() {
        let snapshot = episode_snapshot();
        let join = IdentityJoin::build(&snapshot);
        let steps = plan_episode_labels(
            &[candidate("tt1", 1, 2)],
            &join,
            &snapshot,
            &episode_opts(false, true),
        );

        // Labeling disabled: every tagged episode is swept, including
        // the one a candidate points at
        assert_eq!(steps.len(), 2);
        assert!(steps.iter().all(|s| s.kind == StepKind::Remove));
    }

    #[test]
    fn test_episode_plan_already_present_is_noop() {
        let snapshot = episode_snapshot();
        let join = IdentityJoin::build(&snapshot);
        let steps = plan_episode_labels(
            &[candidate("tt1", 1, 2)],
            &join,
            &snapshot,
            &episode_opts(true, false),
        );

        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].kind, StepKind::AlreadyPresent);
    }

    #[test]
    fn test_episode_plan_nothing_when_both_off() {
        let snapshot = episode_snapshot();
        let join = IdentityJoin::build(&snapshot);
        let steps = plan_episode_labels(
            &[candidate("tt1", 1, 1)],
            &join,
            &snapshot,
            &episode_opts(false, false),
        );
        assert!(steps.is_empty());
    }

    #[test]
    fn test_report_mutations() {
        let report = ReconcileReport {
            added: 2,
            already_present: 5,
            removed: 1,
            failed: 0,
        };
        assert_eq!(report.mutations(), 3);
    }
}
