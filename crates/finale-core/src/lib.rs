//! Finale Label Core Library
//!
//! Identifies season finale episodes of TV series and reconciles
//! descriptive labels onto the matching entries of a Plex library, so
//! overlay tooling can render finale badges.
//!
//! Two interchangeable detectors feed one filter pipeline which feeds
//! one label reconciler:
//! - Inventory detection walks the Sonarr library and treats the last
//!   episode of the last season as the finale
//! - Metadata detection confirms finales through Trakt episode type
//!   classifications, including mid-season finales
//!
//! Every run recomputes from scratch against a single library snapshot;
//! nothing is cached or persisted between runs.

pub mod client;
pub mod config;
pub mod error;
pub mod filter;
pub mod identity;
pub mod inventory;
pub mod metadata;
pub mod paths;
pub mod plex;
pub mod reconcile;
pub mod sonarr;
pub mod trakt;
pub mod types;

// Re-export main types for convenience
pub use config::Config;
pub use error::{FinaleError, Result};
pub use identity::IdentityJoin;
pub use paths::PathMapper;
pub use plex::{LibrarySnapshot, PlexClient, SectionRef};
pub use reconcile::{ReconcileOptions, ReconcileReport, StepKind};
pub use sonarr::SonarrClient;
pub use trakt::TraktClient;
pub use types::{FinaleCandidate, ShowIds};
