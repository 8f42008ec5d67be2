//! Per-item problems that are reported but never abort a run.
//!
//! Fatal input errors travel as `anyhow::Error`; everything recorded here
//! belongs to a single catalog entry, descriptor file or license copy and the
//! pipeline keeps going after recording it.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Issue {
    #[error("catalog record #{index} skipped: {reason}")]
    MalformedCatalogEntry { index: usize, reason: String },

    #[error("build descriptor {}: {reason}", .path.display())]
    DescriptorParseError { path: PathBuf, reason: String },

    #[error("license file for '{id}' not found: {}", .path.display())]
    LicenseFileMissing { id: String, path: PathBuf },

    #[error("copying license of '{id}' from {} to {} failed: {reason}", .license.display(), .destination.display())]
    CopyFailure {
        id: String,
        license: PathBuf,
        destination: PathBuf,
        reason: String,
    },
}

/// Ordered collection of issues raised during one run.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    issues: Vec<Issue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an issue and log it immediately.
    pub fn record(&mut self, issue: Issue) {
        warn!("{issue}");
        self.issues.push(issue);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.issues.extend(other.issues);
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }
}
