//! Path translation between the inventory host's filesystem view and the
//! local one.
//!
//! The download manager records file paths as seen from its own host
//! (a NAS share, a Docker volume). Before those paths are matched against
//! episode tokens they are rewritten through an ordered prefix mapping
//! table; the first matching prefix wins and is replaced exactly once.

use crate::config::PathMapping;

/// Pure prefix-rewrite mapper built from the configured mapping table.
#[derive(Debug, Clone, Default)]
pub struct PathMapper {
    mappings: Vec<PathMapping>,
}

impl PathMapper {
    /// Build a mapper from configured rules, preserving their order.
    pub fn new(mappings: &[PathMapping]) -> Self {
        Self {
            mappings: mappings.to_vec(),
        }
    }

    /// Rewrite a path through the mapping table.
    ///
    /// Backslashes are normalized to forward slashes first so rules
    /// written with either separator match paths recorded by a Windows
    /// host. Paths matching no rule pass through unchanged.
    pub fn map(&self, path: &str) -> String {
        if path.is_empty() {
            return String::new();
        }

        let normalized = normalize_separators(path);
        for mapping in &self.mappings {
            let from = normalize_separators(&mapping.from);
            if normalized.starts_with(&from) {
                let to = normalize_separators(&mapping.to);
                return format!("{}{}", to, &normalized[from.len()..]);
            }
        }
        normalized
    }
}

fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}
