//! Orchestration: normalize → scan → match → export.

use crate::catalog::{FixStats, fix_catalog_paths, load_catalog_from_path, write_catalog_to_path};
use crate::config::{ExportMode, RunConfig, Topology};
use crate::diagnostics::Diagnostics;
use crate::export::{ExportedLicense, LicenseExporter};
use crate::matcher::used_entries;
use crate::scan::ArtifactScanner;
use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub descriptors_scanned: usize,
    pub descriptors_excluded: usize,
    pub artifacts: usize,
}

/// Everything a run did, suitable for printing as JSON.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub mode: ExportMode,
    pub catalog_entries: usize,
    pub used: Vec<String>,
    pub exported: Vec<ExportedLicense>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<FixStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan: Option<ScanSummary>,
    pub issues: Diagnostics,
}

pub fn run(config: &RunConfig) -> Result<RunReport> {
    config.validate()?;
    let policy = config.path_policy;
    let mut issues = Diagnostics::new();

    let mut catalog = load_catalog_from_path(&config.attributes)?;
    for issue in catalog.rejections() {
        issues.record(issue);
    }
    info!(
        entries = catalog.len(),
        "loaded catalog {}",
        config.attributes.display()
    );

    let mut fix = None;
    if let Some(request) = &config.fix {
        if let Some(build) = &config.build {
            if matches!(build.topology, Topology::InSource { .. })
                && policy.normalize(&request.new_root)
                    != policy.normalize(&build.build_dir.to_string_lossy())
            {
                warn!(
                    "in-source build: the fix target {} is not the build directory {}",
                    request.new_root,
                    build.build_dir.display()
                );
            }
        }

        let outcome = fix_catalog_paths(&catalog, &request.prev_root, &request.new_root, policy);
        catalog = outcome.catalog;
        fix = Some(outcome.stats);
    }

    let mut scan = None;
    let selected = match &config.build {
        None => {
            info!("no build directory given; exporting the licenses of all libraries");
            catalog.entries().collect::<Vec<_>>()
        }
        Some(build) => {
            let mut scanner = ArtifactScanner::new(config.descriptor_flavor, policy);
            if let Topology::InSource { clean_source } = &build.topology {
                scanner = scanner.with_clean_reference(clean_source);
            }
            let outcome = scanner.scan(&build.build_dir)?;
            issues.extend(outcome.diagnostics);
            scan = Some(ScanSummary {
                descriptors_scanned: outcome.descriptors_scanned,
                descriptors_excluded: outcome.descriptors_excluded,
                artifacts: outcome.artifacts.len(),
            });

            let used = used_entries(&catalog, &outcome.artifacts, policy);
            info!(
                used = used.len(),
                total = catalog.len(),
                topology = build.topology.as_str(),
                "matched catalog against build artifacts"
            );
            used
        }
    };

    // The fixed catalog is persisted only once no fatal step remains.
    let exporter = LicenseExporter::new(&config.output_dir, policy);
    exporter.prepare()?;
    if let (Some(_), Some(path)) = (&fix, &config.write_attributes) {
        write_catalog_to_path(&catalog, path)?;
        info!("wrote fixed catalog to {}", path.display());
    }

    let export = exporter.export(&selected)?;
    issues.extend(export.diagnostics);

    Ok(RunReport {
        mode: config.mode(),
        catalog_entries: catalog.len(),
        used: selected.iter().map(|entry| entry.id.clone()).collect(),
        exported: export.exported,
        fix,
        scan,
        issues,
    })
}
