//! Best-effort check for a newer release on GitHub.
//!
//! Purely informational: any failure is logged at debug level and never
//! affects the run.

use colored::Colorize;
use log::debug;
use serde::Deserialize;

const RELEASES_URL: &str = "https://api.github.com/repos/example/finale-label/releases/latest";

#[derive(Debug, Deserialize)]
struct LatestRelease {
    tag_name: Option<String>,
}

/// Compare two dotted version strings numerically, component by
/// component; a missing component counts as zero. Unparseable versions
/// never report an update.
fn is_newer_version(remote: &str, current: &str) -> bool {
    match (parse_version(remote), parse_version(current)) {
        (Some(remote), Some(current)) => remote > current,
        _ => false,
    }
}

fn parse_version(version: &str) -> Option<Vec<u64>> {
    version
        .trim()
        .trim_start_matches('v')
        .split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect()
}

/// Print a notice when a newer release exists.
pub async fn check_for_updates() {
    let current = env!("CARGO_PKG_VERSION");
    match fetch_latest_tag().await {
        Ok(Some(remote)) => {
            if is_newer_version(&remote, current) {
                println!(
                    "{}",
                    format!("A newer version (v{}) is available.", remote.trim_start_matches('v'))
                        .yellow()
                );
            }
        }
        Ok(None) => debug!("could not determine the latest release tag"),
        Err(err) => debug!("update check failed: {err}"),
    }
}

async fn fetch_latest_tag() -> Result<Option<String>, reqwest::Error> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .user_agent(concat!("finale-label/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let release: LatestRelease = client
        .get(RELEASES_URL)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(release.tag_name)
}
