//! The single configuration record a run is driven by.
//!
//! Built once (normally by the CLI) and handed to [`crate::pipeline::run`];
//! no component reads process-wide state on its own.

use crate::paths::PathPolicy;
use crate::scan::DescriptorFlavor;
use anyhow::{Result, bail};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// How the analysed build relates to its source tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Topology {
    /// Build output lives in its own directory ("shadow build"); every
    /// descriptor in it belongs to the build.
    Shadow,
    /// Build output is interleaved with the sources ("non-shadow build");
    /// descriptors that also exist in `clean_source` are residue.
    InSource { clean_source: PathBuf },
}

impl Topology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topology::Shadow => "shadow",
            Topology::InSource { .. } => "in-source",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildInput {
    pub build_dir: PathBuf,
    pub topology: Topology,
}

/// Rebase catalog paths from `prev_root` to `new_root` before matching.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixRequest {
    pub prev_root: String,
    pub new_root: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportMode {
    /// No build directory: every catalog entry is exported.
    All,
    /// Only entries referenced by the build's descriptors are exported.
    Used,
}

#[derive(Clone, Debug)]
pub struct RunConfig {
    pub output_dir: PathBuf,
    pub attributes: PathBuf,
    pub build: Option<BuildInput>,
    pub fix: Option<FixRequest>,
    /// Where to persist the fixed catalog, if anywhere.
    pub write_attributes: Option<PathBuf>,
    pub descriptor_flavor: DescriptorFlavor,
    pub path_policy: PathPolicy,
}

impl RunConfig {
    pub fn new(output_dir: impl Into<PathBuf>, attributes: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            attributes: attributes.into(),
            build: None,
            fix: None,
            write_attributes: None,
            descriptor_flavor: DescriptorFlavor::host(),
            path_policy: PathPolicy::host(),
        }
    }

    pub fn with_build(mut self, build_dir: impl Into<PathBuf>, topology: Topology) -> Self {
        self.build = Some(BuildInput {
            build_dir: build_dir.into(),
            topology,
        });
        self
    }

    pub fn with_fix(mut self, prev_root: impl Into<String>, new_root: impl Into<String>) -> Self {
        self.fix = Some(FixRequest {
            prev_root: prev_root.into(),
            new_root: new_root.into(),
        });
        self
    }

    pub fn mode(&self) -> ExportMode {
        if self.build.is_some() {
            ExportMode::Used
        } else {
            ExportMode::All
        }
    }

    /// Check every required input before anything is written.
    pub fn validate(&self) -> Result<()> {
        require_file(&self.attributes, "attributes file")?;
        if self.output_dir.exists() && !self.output_dir.is_dir() {
            bail!(
                "output path {} exists and is not a directory",
                self.output_dir.display()
            );
        }

        if let Some(build) = &self.build {
            require_dir(&build.build_dir, "build directory")?;
            if let Topology::InSource { clean_source } = &build.topology {
                require_dir(clean_source, "clean source directory")?;
            }
        }

        if let Some(fix) = &self.fix {
            if fix.prev_root.trim().is_empty() || fix.new_root.trim().is_empty() {
                bail!("--fix needs both a previous and a new source directory");
            }
        }

        if self.write_attributes.is_some() && self.fix.is_none() {
            bail!("--write-attributes only makes sense together with --fix");
        }
        Ok(())
    }
}

fn require_file(path: &Path, what: &str) -> Result<()> {
    if !path.is_file() {
        bail!("{what} not found: {}", path.display());
    }
    Ok(())
}

fn require_dir(path: &Path, what: &str) -> Result<()> {
    if !path.is_dir() {
        bail!("{what} not found: {}", path.display());
    }
    Ok(())
}
