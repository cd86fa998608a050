//! Command line frontend.
//!
//! Wires configuration, the API clients and the core pipeline together:
//! detect -> filter -> reconcile, once per selected method.

mod report;
mod update;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use log::info;

use finale_core::config::Config;
use finale_core::identity::IdentityJoin;
use finale_core::paths::PathMapper;
use finale_core::plex::{LibrarySnapshot, PlexClient, SectionRef};
use finale_core::reconcile::{self, ReconcileOptions};
use finale_core::sonarr::SonarrClient;
use finale_core::trakt::TraktClient;
use finale_core::types::FinaleCandidate;
use finale_core::{filter, inventory, metadata};

/// Label season finales in Plex
#[derive(Parser, Debug)]
#[command(name = "finale-label", version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Plan label changes without applying them
    #[arg(long)]
    dry_run: bool,

    /// Skip the GitHub release check
    #[arg(long)]
    no_update_check: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Method 1: detect finales from the Sonarr inventory
    Sonarr,
    /// Method 2: detect finales through Trakt episode classifications
    Trakt,
    /// Run both methods consecutively
    Both,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .format_timestamp_secs()
        .init();

    let args = Args::parse();
    let started = Instant::now();

    if !args.no_update_check {
        update::check_for_updates().await;
    }

    let config = Config::load(&args.config).context("Failed to load configuration")?;
    report::print_config_summary(&config);

    match args.command {
        Commands::Sonarr => run_sonarr(&config, args.dry_run).await?,
        Commands::Trakt => run_trakt(&config, args.dry_run).await?,
        Commands::Both => {
            run_sonarr(&config, args.dry_run).await?;
            println!();
            run_trakt(&config, args.dry_run).await?;
        }
    }

    println!("\nRun completed");
    println!(
        "Total runtime: {}",
        report::format_runtime(started.elapsed())
    );
    Ok(())
}

/// Method 1: inventory detection against Sonarr.
async fn run_sonarr(config: &Config, dry_run: bool) -> Result<()> {
    println!("{}", "Running Method 1: Sonarr".blue().bold());
    config.validate_sonarr()?;

    let sonarr = SonarrClient::new(&config.sonarr)?;
    let mapper = PathMapper::new(&config.paths.path_mappings);

    println!("Searching for finales...");
    let detection = inventory::detect(&sonarr, &mapper, &config.general, Utc::now()).await?;

    let (plex, section, snapshot) = connect_plex(config).await?;
    let join = IdentityJoin::build(&snapshot);

    let downloaded = filter::apply(detection.downloaded, &join, &config.general);
    let not_downloaded = filter::apply(detection.not_downloaded, &join, &config.general);
    report::print_detection(&downloaded, &not_downloaded, &config.general);

    // Only downloaded finales are eligible for labeling
    reconcile_and_apply(&plex, &section, &snapshot, &join, &downloaded, config, dry_run).await
}

/// Method 2: metadata detection against Trakt.
async fn run_trakt(config: &Config, dry_run: bool) -> Result<()> {
    println!("{}", "Running Method 2: Trakt".blue().bold());
    config.validate_trakt()?;

    let trakt = TraktClient::new(&config.trakt)?;
    let (plex, section, snapshot) = connect_plex(config).await?;
    println!(
        "Found {} TV shows in the library '{}'.\n",
        snapshot.shows.len(),
        section.title
    );

    let candidates = metadata::detect(
        &snapshot,
        &trakt,
        &config.general,
        &config.trakt.desired_episode_types,
        Utc::now(),
    )
    .await?;

    let join = IdentityJoin::build(&snapshot);
    let qualifying = filter::apply(candidates, &join, &config.general);
    report::print_qualifying(&qualifying, &config.general);

    reconcile_and_apply(&plex, &section, &snapshot, &join, &qualifying, config, dry_run).await
}

/// Connect to Plex, resolve the library and take the run's snapshot.
async fn connect_plex(config: &Config) -> Result<(PlexClient, SectionRef, LibrarySnapshot)> {
    let plex = PlexClient::new(&config.plex)?;
    let section = plex
        .find_section(&config.plex.library_title)
        .await
        .context("Failed to connect to Plex")?;
    let snapshot = plex.snapshot(&section).await?;
    info!(
        "snapshot taken: {} shows in '{}'",
        snapshot.shows.len(),
        section.title
    );
    Ok((plex, section, snapshot))
}

/// Plan both reconciliation passes, print them, and apply unless this is
/// a dry run.
async fn reconcile_and_apply(
    plex: &PlexClient,
    section: &SectionRef,
    snapshot: &LibrarySnapshot,
    join: &IdentityJoin<'_>,
    qualifying: &[FinaleCandidate],
    config: &Config,
    dry_run: bool,
) -> Result<()> {
    let opts = ReconcileOptions {
        label: config.general.plex_label.clone(),
        label_shows: config.general.label_series_in_plex,
        label_episodes: config.general.label_episode_in_plex,
        remove_stale: config.general.remove_labels_if_no_longer_matched,
    };

    println!("\n=== Label Operations ===");
    let show_steps = reconcile::plan_show_labels(qualifying, join, snapshot, &opts);
    let episode_steps = reconcile::plan_episode_labels(qualifying, join, snapshot, &opts);
    report::print_show_steps(&show_steps, &opts.label);
    report::print_episode_steps(&episode_steps, &opts.label);

    if dry_run {
        println!("\n{}", "Dry run, no labels were changed.".blue());
        return Ok(());
    }

    let show_report = plex
        .apply_show_steps(section, snapshot, &opts.label, &show_steps)
        .await;
    let episode_report = plex
        .apply_episode_steps(section, snapshot, &opts.label, &episode_steps)
        .await;
    report::print_reports(&show_report, &episode_report);
    Ok(())
}
