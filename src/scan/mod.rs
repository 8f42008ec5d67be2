//! Build-tree scanning: which source files did the build actually touch?
//!
//! The scanner walks a build output tree, picks out the build descriptors
//! (makefiles) generated for it and collects every absolute source path they
//! reference. It decides nothing about libraries; containment against catalog
//! entries happens in [`crate::matcher`].
//!
//! In an in-source build the tree may also hold makefiles that ship with the
//! sources (or were left over from unrelated earlier builds). Those are
//! recognised by comparing against a clean checkout of the same tree: a
//! descriptor whose relative path also exists as a descriptor in the clean
//! tree is residue and is skipped.

pub mod makefile;

pub use makefile::Makefile;

use crate::diagnostics::{Diagnostics, Issue};
use crate::paths::PathPolicy;
use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Naming convention of the build descriptors to analyse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DescriptorFlavor {
    /// `Makefile` (gcc/clang on Unix).
    Gnu,
    /// `Makefile*Release`, e.g. `Makefile.Release` (MSVC).
    MsvcRelease,
}

impl DescriptorFlavor {
    pub fn host() -> Self {
        if cfg!(windows) {
            DescriptorFlavor::MsvcRelease
        } else {
            DescriptorFlavor::Gnu
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DescriptorFlavor::Gnu => "gnu",
            DescriptorFlavor::MsvcRelease => "msvc-release",
        }
    }

    pub fn matches(&self, file_name: &str) -> bool {
        match self {
            DescriptorFlavor::Gnu => file_name == "Makefile",
            DescriptorFlavor::MsvcRelease => {
                file_name.len() >= "MakefileRelease".len()
                    && file_name.starts_with("Makefile")
                    && file_name.ends_with("Release")
            }
        }
    }
}

impl TryFrom<&str> for DescriptorFlavor {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self> {
        match value {
            "gnu" => Ok(DescriptorFlavor::Gnu),
            "msvc-release" => Ok(DescriptorFlavor::MsvcRelease),
            other => bail!("Unknown descriptor flavor: {other}"),
        }
    }
}

/// Absolute path of a source file referenced by a build descriptor.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ArtifactPath(pub String);

impl ArtifactPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Deduplicated artifact paths of one scan.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArtifactSet {
    paths: BTreeSet<ArtifactPath>,
}

impl ArtifactSet {
    pub fn insert(&mut self, path: impl Into<String>) -> bool {
        self.paths.insert(ArtifactPath(path.into()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArtifactPath> {
        self.paths.iter()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ArtifactSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = ArtifactSet::default();
        for path in iter {
            set.insert(path);
        }
        set
    }
}

#[derive(Debug)]
pub struct ScanOutcome {
    pub artifacts: ArtifactSet,
    pub descriptors_scanned: usize,
    pub descriptors_excluded: usize,
    pub diagnostics: Diagnostics,
}

#[derive(Clone, Debug)]
pub struct ArtifactScanner {
    flavor: DescriptorFlavor,
    policy: PathPolicy,
    clean_reference: Option<PathBuf>,
}

impl ArtifactScanner {
    pub fn new(flavor: DescriptorFlavor, policy: PathPolicy) -> Self {
        Self {
            flavor,
            policy,
            clean_reference: None,
        }
    }

    /// Exclude descriptors that also exist in this clean source tree.
    pub fn with_clean_reference(mut self, clean_root: impl Into<PathBuf>) -> Self {
        self.clean_reference = Some(clean_root.into());
        self
    }

    /// Scan `build_root` and return every referenced source path.
    ///
    /// Fails only when the build root (or clean reference root) itself cannot
    /// be read; unreadable descriptors and subdirectories are recorded as
    /// issues and skipped.
    pub fn scan(&self, build_root: &Path) -> Result<ScanOutcome> {
        let build_root = absolute_dir(build_root, "build directory")?;
        let mut diagnostics = Diagnostics::new();

        let residue = match &self.clean_reference {
            Some(clean_root) => {
                let clean_root = absolute_dir(clean_root, "clean source directory")?;
                let premade = find_descriptors(&clean_root, self.flavor, &mut diagnostics)?;
                debug!(
                    count = premade.len(),
                    "collected premade descriptors from {}",
                    clean_root.display()
                );
                premade
                    .iter()
                    .filter_map(|path| self.relative_key(path, &clean_root))
                    .collect()
            }
            None => BTreeSet::new(),
        };

        let mut artifacts = ArtifactSet::default();
        let mut descriptors_scanned = 0;
        let mut descriptors_excluded = 0;
        for descriptor in find_descriptors(&build_root, self.flavor, &mut diagnostics)? {
            if self
                .relative_key(&descriptor, &build_root)
                .is_some_and(|key| residue.contains(&key))
            {
                debug!("skipping premade descriptor {}", descriptor.display());
                descriptors_excluded += 1;
                continue;
            }

            match Makefile::load(&descriptor) {
                Ok(makefile) => {
                    if makefile.is_lossy() {
                        diagnostics.record(Issue::DescriptorParseError {
                            path: descriptor.clone(),
                            reason: "not valid UTF-8, undecodable bytes replaced".to_string(),
                        });
                    }
                    descriptors_scanned += 1;
                    for reference in makefile.source_references() {
                        artifacts.insert(reference);
                    }
                }
                Err(err) => diagnostics.record(Issue::DescriptorParseError {
                    path: descriptor.clone(),
                    reason: format!("unreadable, skipped: {err:#}"),
                }),
            }
        }

        info!(
            scanned = descriptors_scanned,
            excluded = descriptors_excluded,
            artifacts = artifacts.len(),
            "scanned build descriptors under {}",
            build_root.display()
        );

        Ok(ScanOutcome {
            artifacts,
            descriptors_scanned,
            descriptors_excluded,
            diagnostics,
        })
    }

    fn relative_key(&self, path: &Path, root: &Path) -> Option<Vec<String>> {
        let relative = path.strip_prefix(root).ok()?;
        Some(
            self.policy
                .normalize(&relative.to_string_lossy())
                .components()
                .to_vec(),
        )
    }
}

/// Every descriptor file under `root`, sorted.
///
/// Symlinked directories are not followed. A root that cannot be listed is
/// fatal; any deeper walk error is recorded and that subtree skipped.
pub fn find_descriptors(
    root: &Path,
    flavor: DescriptorFlavor,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 || err.path() == Some(root) => {
                return Err(err).with_context(|| format!("reading {}", root.display()));
            }
            Err(err) => {
                let path = err.path().unwrap_or(root).to_path_buf();
                diagnostics.record(Issue::DescriptorParseError {
                    path,
                    reason: format!("directory unreadable, skipped: {err}"),
                });
                continue;
            }
        };

        let file_type = entry.file_type();
        let is_file = file_type.is_file() || (file_type.is_symlink() && entry.path().is_file());
        if is_file && flavor.matches(&entry.file_name().to_string_lossy()) {
            found.push(entry.into_path());
        }
    }

    found.sort();
    Ok(found)
}

fn absolute_dir(path: &Path, what: &str) -> Result<PathBuf> {
    if !path.is_dir() {
        bail!("{what} not found: {}", path.display());
    }
    std::path::absolute(path).with_context(|| format!("resolving {what} {}", path.display()))
}
