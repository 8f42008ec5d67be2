//! Typed view of the third-party attribution catalog.
//!
//! The catalog on disk is a JSON array of objects with `Id`, `Name`, `Path`
//! and `LicenseFile` plus whatever metadata the generator added (`License`,
//! `Copyright`, `Files`, ...). Required fields are typed; everything else is
//! kept in an ordered bag so a rewritten catalog loses nothing.

use crate::diagnostics::Issue;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// One third-party library record.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct CatalogEntry {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "LicenseFile")]
    pub license_file: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CatalogEntry {
    /// `Copyright` metadata, used for entries that ship no license text.
    pub fn copyright(&self) -> Option<&str> {
        self.extra
            .get("Copyright")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    pub fn has_license_file(&self) -> bool {
        !self.license_file.trim().is_empty()
    }

    /// File names from the `Files` attribute, relative to `Path`.
    ///
    /// The scanner writes them as one space-separated string, sometimes with
    /// trailing commas; an array of strings is accepted too.
    pub fn files(&self) -> Vec<&str> {
        let names: Vec<&str> = match self.extra.get("Files") {
            Some(Value::String(list)) => list.split_whitespace().collect(),
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        names
            .into_iter()
            .map(|name| name.trim().trim_end_matches(','))
            .filter(|name| !name.is_empty())
            .collect()
    }
}

/// A catalog record as read from disk: either a usable entry or the raw JSON
/// of a record that failed validation, kept so persistence never drops it.
#[derive(Clone, Debug, PartialEq)]
pub enum CatalogRecord {
    Entry(CatalogEntry),
    Rejected { raw: Value, reason: String },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Catalog {
    records: Vec<CatalogRecord>,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self {
            records: entries.into_iter().map(CatalogRecord::Entry).collect(),
        }
    }

    /// Build a catalog from an already-parsed JSON document.
    ///
    /// The document must be an array. Individual records that are not objects,
    /// lack a required string field, have an empty `Id` or `Path`, or repeat an
    /// earlier `Id` are rejected without failing the whole catalog.
    pub fn from_value(document: Value) -> Result<Self> {
        let Value::Array(items) = document else {
            bail!("catalog must be a JSON array of library records");
        };

        let mut seen_ids: BTreeSet<String> = BTreeSet::new();
        let mut records = Vec::with_capacity(items.len());
        for raw in items {
            let record = match serde_json::from_value::<CatalogEntry>(raw.clone()) {
                Ok(entry) if entry.id.trim().is_empty() => CatalogRecord::Rejected {
                    raw,
                    reason: "empty Id".to_string(),
                },
                Ok(entry) if entry.path.trim().is_empty() => CatalogRecord::Rejected {
                    reason: format!("empty Path for '{}'", entry.id),
                    raw,
                },
                Ok(entry) if !seen_ids.insert(entry.id.clone()) => CatalogRecord::Rejected {
                    reason: format!("duplicate Id '{}'", entry.id),
                    raw,
                },
                Ok(entry) => CatalogRecord::Entry(entry),
                Err(err) => CatalogRecord::Rejected {
                    raw,
                    reason: err.to_string(),
                },
            };
            records.push(record);
        }
        Ok(Self { records })
    }

    pub fn to_value(&self) -> Result<Value> {
        self.records
            .iter()
            .map(|record| match record {
                CatalogRecord::Entry(entry) => {
                    serde_json::to_value(entry).context("serializing catalog entry")
                }
                CatalogRecord::Rejected { raw, .. } => Ok(raw.clone()),
            })
            .collect::<Result<Vec<_>>>()
            .map(Value::Array)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.records.iter().filter_map(|record| match record {
            CatalogRecord::Entry(entry) => Some(entry),
            CatalogRecord::Rejected { .. } => None,
        })
    }

    pub fn records(&self) -> &[CatalogRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Issues for every rejected record, indexed by position in the file.
    pub fn rejections(&self) -> Vec<Issue> {
        self.records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| match record {
                CatalogRecord::Rejected { reason, .. } => Some(Issue::MalformedCatalogEntry {
                    index,
                    reason: reason.clone(),
                }),
                CatalogRecord::Entry(_) => None,
            })
            .collect()
    }

    /// New catalog with `f` applied to every usable entry; rejected records
    /// pass through untouched.
    pub fn map_entries<F>(&self, mut f: F) -> Catalog
    where
        F: FnMut(&CatalogEntry) -> CatalogEntry,
    {
        let records = self
            .records
            .iter()
            .map(|record| match record {
                CatalogRecord::Entry(entry) => CatalogRecord::Entry(f(entry)),
                rejected => rejected.clone(),
            })
            .collect();
        Catalog { records }
    }
}

/// Read and parse a catalog file.
pub fn load_catalog_from_path(path: &Path) -> Result<Catalog> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading attributes file {}", path.display()))?;
    let document: Value = serde_json::from_str(&data)
        .with_context(|| format!("parsing attributes file {}", path.display()))?;
    Catalog::from_value(document).with_context(|| format!("loading {}", path.display()))
}

/// Persist a catalog as pretty-printed JSON, replacing `path` atomically.
pub fn write_catalog_to_path(catalog: &Catalog, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let document = catalog.to_value()?;
    let mut staged = NamedTempFile::new_in(dir)
        .with_context(|| format!("staging catalog next to {}", path.display()))?;
    serde_json::to_writer_pretty(&mut staged, &document)
        .with_context(|| format!("serializing catalog for {}", path.display()))?;
    staged.write_all(b"\n")?;
    staged
        .persist(path)
        .with_context(|| format!("writing attributes file {}", path.display()))?;
    Ok(())
}
