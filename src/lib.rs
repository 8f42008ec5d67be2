//! Export the license files of the third-party libraries a build really uses.
//!
//! The attribution catalog lists every bundled third-party library together
//! with its source directory and license file. Build descriptors (makefiles)
//! left in the build tree reveal which source files were compiled; a library
//! counts as used when one of those files lives in its directory. Without a
//! build tree every library's license is exported.

pub mod catalog;
pub mod config;
pub mod diagnostics;
pub mod export;
pub mod matcher;
pub mod paths;
pub mod pipeline;
pub mod scan;

pub use catalog::{
    Catalog, CatalogEntry, CatalogRecord, FixOutcome, FixStats, fix_catalog_paths,
    load_catalog_from_path, write_catalog_to_path,
};
pub use config::{BuildInput, ExportMode, FixRequest, RunConfig, Topology};
pub use diagnostics::{Diagnostics, Issue};
pub use export::{ExportReport, ExportedLicense, LicenseExporter, resolve_license_path};
pub use matcher::{ArtifactIndex, signatures, used_entries};
pub use paths::{NormalizedPath, PathPolicy};
pub use pipeline::{RunReport, ScanSummary, run};
pub use scan::{ArtifactPath, ArtifactScanner, ArtifactSet, DescriptorFlavor, ScanOutcome};
