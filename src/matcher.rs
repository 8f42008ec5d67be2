//! Deciding which catalog entries a build actually used.
//!
//! An entry is matched through its signatures: the `Path` directory itself,
//! or `Path/<file>` for each name in its `Files` attribute. Several entries
//! may share one directory and differ only in their files.

use crate::catalog::{Catalog, CatalogEntry};
use crate::paths::{NormalizedPath, PathPolicy, file_name};
use crate::scan::ArtifactSet;
use std::collections::HashSet;
use tracing::debug;

/// Entry whose listed stylesheet is compiled as a premade `.binaryjson`.
const WEBGRADIENTS_ID: &str = "webgradients";

/// Every directory (and file) that contains at least one artifact.
///
/// An entry is used iff one of its normalized signatures is one of these
/// ancestors, which is the same as some artifact being equal to or beneath it.
#[derive(Debug)]
pub struct ArtifactIndex {
    policy: PathPolicy,
    ancestors: HashSet<NormalizedPath>,
}

impl ArtifactIndex {
    pub fn build(artifacts: &ArtifactSet, policy: PathPolicy) -> Self {
        let mut ancestors = HashSet::new();
        for artifact in artifacts.iter() {
            let normalized = policy.normalize(artifact.as_str());
            for ancestor in normalized.ancestors() {
                ancestors.insert(ancestor);
            }
        }
        Self { policy, ancestors }
    }

    pub fn contains_under(&self, dir: &str) -> bool {
        let dir = self.policy.normalize(dir);
        // An empty or bare-root path would claim every artifact.
        if dir.components().is_empty() {
            return false;
        }
        self.ancestors.contains(&dir)
    }

    pub fn is_used(&self, entry: &CatalogEntry) -> bool {
        signatures(entry)
            .iter()
            .any(|signature| self.contains_under(signature))
    }
}

/// Paths whose presence in the build marks `entry` as used.
pub fn signatures(entry: &CatalogEntry) -> Vec<String> {
    if entry.path.trim().is_empty() {
        return Vec::new();
    }
    let files = entry.files();
    if files.is_empty() {
        return vec![entry.path.clone()];
    }

    let base = entry.path.trim_end_matches(['/', '\\']);
    files
        .into_iter()
        .map(|name| {
            let signature = format!("{base}/{name}");
            if entry.id == WEBGRADIENTS_ID {
                binaryjson_alias(&signature)
            } else {
                signature
            }
        })
        .collect()
}

fn binaryjson_alias(signature: &str) -> String {
    let has_extension = file_name(signature)
        .and_then(|name| name.rfind('.'))
        .is_some_and(|dot| dot > 0);
    match signature.rsplit_once('.') {
        Some((stem, _)) if has_extension => format!("{stem}.binaryjson"),
        _ => signature.to_string(),
    }
}

/// Catalog entries with at least one artifact at or below their `Path`,
/// in catalog order.
pub fn used_entries<'a>(
    catalog: &'a Catalog,
    artifacts: &ArtifactSet,
    policy: PathPolicy,
) -> Vec<&'a CatalogEntry> {
    let index = ArtifactIndex::build(artifacts, policy);
    catalog
        .entries()
        .filter(|entry| {
            let used = index.is_used(entry);
            debug!(id = %entry.id, used, "matched {}", entry.path);
            used
        })
        .collect()
}
