//! Copying license texts of the selected entries into one flat directory.
//!
//! Destination names are planned for the whole batch before anything is
//! copied, so the result does not depend on copy order: a basename claimed by
//! two different license sources is qualified with the entry id for every
//! claimant instead of letting the later copy overwrite the earlier one.

use crate::catalog::CatalogEntry;
use crate::diagnostics::{Diagnostics, Issue};
use crate::paths::{self, PathPolicy, file_name};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name used for entries without a license file.
pub const PUBLIC_DOMAIN_NAME: &str = "Public Domain";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExportedLicense {
    pub id: String,
    /// Copied file, or `None` for a generated public-domain notice.
    pub source: Option<PathBuf>,
    pub destination: PathBuf,
}

#[derive(Debug, Default)]
pub struct ExportReport {
    pub exported: Vec<ExportedLicense>,
    pub diagnostics: Diagnostics,
}

/// Where an entry's license text comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LicenseSource {
    File(PathBuf),
    PublicDomain { copyright: String },
}

impl LicenseSource {
    fn basename(&self) -> String {
        match self {
            LicenseSource::File(path) => file_name(&path.to_string_lossy())
                .unwrap_or(PUBLIC_DOMAIN_NAME)
                .to_string(),
            LicenseSource::PublicDomain { .. } => PUBLIC_DOMAIN_NAME.to_string(),
        }
    }
}

/// Absolute `LicenseFile` values are used as is; relative ones are resolved
/// against the entry's `Path`. Returns `None` when the entry names no file.
pub fn resolve_license_path(entry: &CatalogEntry) -> Option<PathBuf> {
    if !entry.has_license_file() {
        return None;
    }
    if paths::is_absolute(&entry.license_file) {
        Some(PathBuf::from(&entry.license_file))
    } else {
        Some(Path::new(&entry.path).join(&entry.license_file))
    }
}

struct Planned<'a> {
    entry: &'a CatalogEntry,
    source: LicenseSource,
    destination: PathBuf,
}

pub struct LicenseExporter {
    output_dir: PathBuf,
    policy: PathPolicy,
}

impl LicenseExporter {
    pub fn new(output_dir: impl Into<PathBuf>, policy: PathPolicy) -> Self {
        Self {
            output_dir: output_dir.into(),
            policy,
        }
    }

    /// Create the output directory; the only fatal step of an export.
    pub fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("creating output directory {}", self.output_dir.display())
        })
    }

    /// Export the license of every entry.
    ///
    /// Only a failure to create the output directory is fatal; a missing or
    /// uncopyable license is recorded and the remaining entries still export.
    pub fn export(&self, entries: &[&CatalogEntry]) -> Result<ExportReport> {
        self.prepare()?;

        let mut report = ExportReport::default();
        let mut sourced = Vec::with_capacity(entries.len());
        for entry in entries {
            match license_source(entry) {
                Ok(source) => sourced.push((*entry, source)),
                Err(issue) => report.diagnostics.record(issue),
            }
        }

        let mut written: HashSet<PathBuf> = HashSet::new();
        for planned in self.plan(sourced) {
            let id = planned.entry.id.clone();
            let outcome = match &planned.source {
                LicenseSource::File(path) => {
                    if written.contains(&planned.destination) {
                        Ok(())
                    } else {
                        fs::copy(path, &planned.destination).map(|_| ())
                    }
                }
                LicenseSource::PublicDomain { copyright } => {
                    fs::write(&planned.destination, copyright)
                }
            };

            match outcome {
                Ok(()) => {
                    debug!(id = %id, "exported {}", planned.destination.display());
                    written.insert(planned.destination.clone());
                    report.exported.push(ExportedLicense {
                        id,
                        source: match planned.source {
                            LicenseSource::File(path) => Some(path),
                            LicenseSource::PublicDomain { .. } => None,
                        },
                        destination: planned.destination,
                    });
                }
                Err(err) => report.diagnostics.record(Issue::CopyFailure {
                    id,
                    license: match &planned.source {
                        LicenseSource::File(path) => path.clone(),
                        LicenseSource::PublicDomain { .. } => PathBuf::from(PUBLIC_DOMAIN_NAME),
                    },
                    destination: planned.destination,
                    reason: err.to_string(),
                }),
            }
        }

        info!(
            exported = report.exported.len(),
            failed = report.diagnostics.len(),
            "exported licenses into {}",
            self.output_dir.display()
        );
        Ok(report)
    }

    /// Assign a destination to every entry.
    ///
    /// A basename shared by distinct sources is qualified as `<id>_<name>` for
    /// each of them; entries pointing at the very same file share one copy.
    fn plan<'a>(&self, sourced: Vec<(&'a CatalogEntry, LicenseSource)>) -> Vec<Planned<'a>> {
        let mut claimants: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (entry, source) in &sourced {
            claimants
                .entry(self.policy.fold(&source.basename()))
                .or_default()
                .insert(self.source_key(entry, source));
        }

        let mut taken: HashMap<String, String> = HashMap::new();
        let mut planned = Vec::with_capacity(sourced.len());
        for (entry, source) in sourced {
            let basename = source.basename();
            let key = self.source_key(entry, &source);
            let contested = claimants
                .get(&self.policy.fold(&basename))
                .is_some_and(|sources| sources.len() > 1);

            let base_name = if contested {
                format!("{}_{}", sanitise_file_component(&entry.id), basename)
            } else {
                basename
            };

            let mut name = base_name.clone();
            let mut counter = 1;
            loop {
                match taken.get(&self.policy.fold(&name)) {
                    Some(owner) if *owner != key => {
                        counter += 1;
                        name = format!("{base_name}_{counter}");
                    }
                    _ => break,
                }
            }
            taken.insert(self.policy.fold(&name), key);

            planned.push(Planned {
                entry,
                destination: self.output_dir.join(&name),
                source,
            });
        }
        planned
    }

    fn source_key(&self, entry: &CatalogEntry, source: &LicenseSource) -> String {
        match source {
            LicenseSource::File(path) => {
                let normalized = self.policy.normalize(&path.to_string_lossy());
                format!("file:{}", normalized.components().join("/"))
            }
            LicenseSource::PublicDomain { .. } => format!("public-domain:{}", entry.id),
        }
    }
}

fn license_source(entry: &CatalogEntry) -> std::result::Result<LicenseSource, Issue> {
    match resolve_license_path(entry) {
        // A relative result would be read from the working directory.
        Some(path) if !paths::is_absolute(&path.to_string_lossy()) => {
            Err(Issue::LicenseFileMissing {
                id: entry.id.clone(),
                path,
            })
        }
        Some(path) if path.is_file() => Ok(LicenseSource::File(path)),
        Some(path) => Err(Issue::LicenseFileMissing {
            id: entry.id.clone(),
            path,
        }),
        None => match entry.copyright() {
            Some(copyright) => Ok(LicenseSource::PublicDomain {
                copyright: copyright.to_string(),
            }),
            None => Err(Issue::LicenseFileMissing {
                id: entry.id.clone(),
                path: PathBuf::from(&entry.path),
            }),
        },
    }
}

fn sanitise_file_component(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
