//! Rewriting catalog paths after the source tree has moved.

use crate::catalog::{Catalog, CatalogEntry};
use crate::paths::{self, PathPolicy};
use serde::Serialize;
use tracing::{debug, info};

/// Result of one normalization pass.
#[derive(Clone, Debug)]
pub struct FixOutcome {
    pub catalog: Catalog,
    pub stats: FixStats,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FixStats {
    /// Entries with at least one field rewritten.
    pub entries_rewritten: usize,
    /// Entries left alone because neither field was rooted at the old root.
    pub entries_untouched: usize,
}

/// Rebase every `Path` (and absolute `LicenseFile`) rooted under `prev_root`
/// onto `new_root`.
///
/// Entries rooted elsewhere are copied unchanged, so partially fixed catalogs
/// are fine to feed in again. When both roots name the same directory the
/// catalog is returned as is.
pub fn fix_catalog_paths(
    catalog: &Catalog,
    prev_root: &str,
    new_root: &str,
    policy: PathPolicy,
) -> FixOutcome {
    if policy.normalize(prev_root) == policy.normalize(new_root) {
        debug!(root = prev_root, "fix roots are identical; catalog left unchanged");
        return FixOutcome {
            catalog: catalog.clone(),
            stats: FixStats {
                entries_rewritten: 0,
                entries_untouched: catalog.len(),
            },
        };
    }

    let mut stats = FixStats::default();
    let fixed = catalog.map_entries(|entry| {
        let rebased = rebase_entry(entry, prev_root, new_root, policy);
        if rebased.path == entry.path && rebased.license_file == entry.license_file {
            stats.entries_untouched += 1;
        } else {
            stats.entries_rewritten += 1;
        }
        rebased
    });

    if stats.entries_rewritten == 0 {
        info!(
            prev_root,
            "no catalog entry is rooted under the previous source directory; nothing to fix"
        );
    } else {
        info!(
            rewritten = stats.entries_rewritten,
            untouched = stats.entries_untouched,
            "rebased catalog paths from {prev_root} to {new_root}"
        );
    }

    FixOutcome {
        catalog: fixed,
        stats,
    }
}

fn rebase_entry(
    entry: &CatalogEntry,
    prev_root: &str,
    new_root: &str,
    policy: PathPolicy,
) -> CatalogEntry {
    let mut rebased = entry.clone();
    if let Some(path) = policy.rebase(&entry.path, prev_root, new_root) {
        rebased.path = path;
    }
    // Relative license files follow `Path` implicitly.
    if paths::is_absolute(&entry.license_file) {
        if let Some(license) = policy.rebase(&entry.license_file, prev_root, new_root) {
            rebased.license_file = license;
        }
    }
    rebased
}
