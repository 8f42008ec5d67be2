//! Attribution catalog wiring.
//!
//! The catalog is the JSON file produced by an attribution scanner over the
//! source tree (for Qt, `qtattributionsscanner --output-format json`). This
//! module loads it into typed entries, reports records it cannot use, rebases
//! stale source-tree paths and writes the result back when asked.

pub mod fix;
pub mod model;

pub use fix::{FixOutcome, FixStats, fix_catalog_paths};
pub use model::{Catalog, CatalogEntry, CatalogRecord};

pub use model::{load_catalog_from_path, write_catalog_to_path};
