//! Colored terminal rendering of the run report.

use std::time::Duration;

use colored::Colorize;
use finale_core::config::{Config, GeneralConfig};
use finale_core::reconcile::{EpisodeStep, ReconcileReport, ShowStep, StepKind};
use finale_core::types::FinaleCandidate;

/// Print the configuration summary banner shown before every run.
pub fn print_config_summary(config: &Config) {
    let general = &config.general;
    println!("\n=== Configuration ===");
    println!("Recent Days: {}", general.recent_days);
    println!("Skip Unmonitored: {}", plain_bool(general.skip_unmonitored));
    println!(
        "Skip Genres: {}",
        list_bool(general.skip_genres, &general.genres_to_skip)
    );
    println!(
        "Skip Labels: {}",
        list_bool(general.skip_labels, &general.labels_to_skip)
    );
    println!(
        "Label Show in Plex: {}",
        label_bool(general.label_series_in_plex, &general.plex_label)
    );
    println!(
        "Label Episode in Plex: {}",
        label_bool(general.label_episode_in_plex, &general.plex_label)
    );
    println!(
        "Remove Labels if No Longer Matched: {}",
        plain_bool(general.remove_labels_if_no_longer_matched)
    );
    println!(
        "Only Finale Unwatched: {}",
        plain_bool(general.only_finale_unwatched)
    );
    println!("====================\n");
}

/// Print both inventory detection lists after filtering.
pub fn print_detection(
    downloaded: &[FinaleCandidate],
    not_downloaded: &[FinaleCandidate],
    general: &GeneralConfig,
) {
    if downloaded.is_empty() && not_downloaded.is_empty() {
        println!(
            "{}",
            format!(
                "No finales aired in the last {} days (or all were skipped by genre, label, and unwatched condition).",
                general.recent_days
            )
            .blue()
        );
        return;
    }

    if !downloaded.is_empty() {
        println!(
            "{}",
            format!(
                "=== Downloaded Finales in the Last {} Days ({}) ===",
                general.recent_days,
                downloaded.len()
            )
            .green()
        );
        for candidate in downloaded {
            println!("{}", candidate_line(candidate, general));
        }
    }

    if !not_downloaded.is_empty() {
        println!(
            "{}",
            format!(
                "\n=== Not Downloaded Finales in the Last {} Days ({}) ===",
                general.recent_days,
                not_downloaded.len()
            )
            .yellow()
        );
        for candidate in not_downloaded {
            println!("{}", candidate_line(candidate, general));
        }
    }
}

/// Print the qualifying set found by the metadata method.
pub fn print_qualifying(candidates: &[FinaleCandidate], _general: &GeneralConfig) {
    if candidates.is_empty() {
        println!("{}", "No TV shows found matching criteria.".blue());
        return;
    }
    println!(
        "{}",
        "=== Qualifying TV Shows with Finale Episodes ===".green()
    );
    for candidate in candidates {
        let air = if candidate.is_future {
            format!("{} {}", "will air on".blue(), candidate.air_date)
        } else {
            format!("aired on {}", candidate.air_date)
        };
        println!(
            "- {}: Season {} Episode {} '{}' ({}) {}",
            candidate.show_title,
            candidate.season,
            candidate.episode,
            candidate.episode_title,
            candidate.episode_type.as_deref().unwrap_or("finale"),
            air
        );
    }
}

/// Print every planned show-level step with its `+` / `=` / `-` marker.
pub fn print_show_steps(steps: &[ShowStep], label: &str) {
    println!("\nProcessing show-level labels...");
    for step in steps {
        match step.kind {
            StepKind::Add => println!(
                "{} Adding label '{label}' to show '{}'",
                "+".yellow(),
                step.title
            ),
            StepKind::AlreadyPresent => println!(
                "{} Label '{label}' already exists for show '{}', skipping",
                "=".green(),
                step.title
            ),
            StepKind::Remove => println!(
                "{} Removing label '{label}' from show '{}'",
                "-".red(),
                step.title
            ),
        }
    }
}

/// Print every planned episode-level step.
pub fn print_episode_steps(steps: &[EpisodeStep], label: &str) {
    println!("\nProcessing episode-level labels...");
    for step in steps {
        let code = format!("S{:02}E{:02}", step.season, step.episode);
        match step.kind {
            StepKind::Add => println!(
                "{} Adding writer '{label}' to {code} for show '{}'",
                "+".yellow(),
                step.show_title
            ),
            StepKind::AlreadyPresent => println!(
                "{} Writer '{label}' already exists for {code} for show '{}'",
                "=".green(),
                step.show_title
            ),
            StepKind::Remove => println!(
                "{} Removing writer '{label}' from {code} for show '{}'",
                "-".red(),
                step.show_title
            ),
        }
    }
}

/// Print mutation totals after the apply stage.
pub fn print_reports(show_report: &ReconcileReport, episode_report: &ReconcileReport) {
    println!(
        "\nShows: {} added, {} already present, {} removed, {} failed",
        show_report.added,
        show_report.already_present,
        show_report.removed,
        show_report.failed
    );
    println!(
        "Episodes: {} added, {} already present, {} removed, {} failed",
        episode_report.added,
        episode_report.already_present,
        episode_report.removed,
        episode_report.failed
    );
}

/// Render a runtime as `H:MM:SS` with whole-second precision.
pub fn format_runtime(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours}:{minutes:02}:{seconds:02}")
}

fn candidate_line(candidate: &FinaleCandidate, general: &GeneralConfig) -> String {
    let air = if candidate.is_future {
        format!("{} {}", "will air on".blue(), candidate.air_date)
    } else {
        format!("aired on {}", candidate.air_date)
    };
    let mut line = format!(
        "- {}: Season {} Episode {} '{}' {} | TMDb ID: {} | IMDb ID: {}",
        candidate.show_title,
        candidate.season,
        candidate.episode,
        candidate.episode_title,
        air,
        candidate
            .ids
            .tmdb
            .map(|id| id.to_string())
            .unwrap_or_else(|| "N/A".to_string()),
        candidate.ids.imdb.as_deref().unwrap_or("N/A")
    );
    if !candidate.monitored && !general.skip_unmonitored {
        line.push_str(&format!(" {}", "(UNMONITORED)".blue()));
    }
    line
}

fn plain_bool(value: bool) -> String {
    if value {
        "True".green().to_string()
    } else {
        "False".yellow().to_string()
    }
}

fn label_bool(value: bool, label: &str) -> String {
    if value {
        format!("{} ({label})", "True".green())
    } else {
        "False".yellow().to_string()
    }
}

fn list_bool(value: bool, items: &[String]) -> String {
    if value {
        format!("{} ({})", "True".green(), items.join(", "))
    } else {
        "False".yellow().to_string()
    }
}
