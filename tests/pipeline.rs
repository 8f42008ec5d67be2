// End-to-end runs of the normalize → scan → match → export pipeline.
#[path = "support/common.rs"]
mod common;

use anyhow::Result;
use serde_json::Value;
use std::fs;
use thirdparty_licenses::{
    DescriptorFlavor, ExportMode, Issue, PathPolicy, RunConfig, Topology, load_catalog_from_path,
    run,
};

use common::{Fixture, catalog_entry, exported_names, names};

fn config(fx: &Fixture, attributes: &std::path::Path) -> RunConfig {
    let mut config = RunConfig::new(fx.out(), attributes);
    config.descriptor_flavor = DescriptorFlavor::Gnu;
    config.path_policy = PathPolicy::POSIX;
    config
}

#[test]
fn shadow_build_exports_only_used_libraries() -> Result<()> {
    let fx = Fixture::new()?;
    let lib_a = fx.add_library("libA", "libA terms")?;
    let lib_b = fx.add_library("libB", "libB terms")?;
    let attributes = fx.write_catalog(&[
        catalog_entry("libA", &lib_a, "LICENSE"),
        catalog_entry("libB", &lib_b, "LICENSE"),
    ])?;
    let source = lib_a.join("libA.c");
    fx.write_makefile(&fx.build(), "qtbase/src/corelib", &[source.to_str().unwrap()])?;

    let report = run(&config(&fx, &attributes).with_build(fx.build(), Topology::Shadow))?;

    assert_eq!(report.mode, ExportMode::Used);
    assert_eq!(report.used, vec!["libA".to_string()]);
    assert_eq!(exported_names(&fx.out())?, names(&["LICENSE"]));
    assert_eq!(fs::read_to_string(fx.out().join("LICENSE"))?, "libA terms");
    assert!(report.issues.is_empty());
    Ok(())
}

#[test]
fn no_build_dir_exports_whole_catalog() -> Result<()> {
    let fx = Fixture::new()?;
    let lib_a = fx.add_library("libA", "A")?;
    let lib_b = fx.add_library("libB", "B")?;
    let attributes = fx.write_catalog(&[
        catalog_entry("libA", &lib_a, "LICENSE"),
        catalog_entry("libB", &lib_b, "LICENSE"),
    ])?;

    let report = run(&config(&fx, &attributes))?;

    assert_eq!(report.mode, ExportMode::All);
    assert_eq!(report.used, vec!["libA".to_string(), "libB".to_string()]);
    assert_eq!(report.catalog_entries, 2);
    assert_eq!(
        exported_names(&fx.out())?,
        names(&["libA_LICENSE", "libB_LICENSE"])
    );
    assert!(report.scan.is_none());
    Ok(())
}

#[test]
fn in_source_build_ignores_premade_makefiles() -> Result<()> {
    let fx = Fixture::new()?;
    // In-source build: the build tree is the source tree.
    let lib_a = fx.add_library("libA", "A")?;
    let lib_b = fx.add_library("libB", "B")?;
    let attributes = fx.write_catalog(&[
        catalog_entry("libA", &lib_a, "LICENSE"),
        catalog_entry("libB", &lib_b, "LICENSE"),
    ])?;

    // libB ships a makefile with its sources; the clean checkout has it too.
    let lib_b_source = lib_b.join("libB.c");
    fx.write_makefile(&fx.src(), "3rdparty/libB", &[lib_b_source.to_str().unwrap()])?;
    fx.write_makefile(&fx.clean(), "3rdparty/libB", &[])?;
    let lib_a_source = lib_a.join("libA.c");
    fx.write_makefile(&fx.src(), "qtbase/src/gui", &[lib_a_source.to_str().unwrap()])?;

    let in_source = config(&fx, &attributes).with_build(
        fx.src(),
        Topology::InSource {
            clean_source: fx.clean(),
        },
    );
    let report = run(&in_source)?;
    assert_eq!(report.used, vec!["libA".to_string()]);
    let scan = report.scan.expect("scan summary");
    assert_eq!(scan.descriptors_excluded, 1);
    assert_eq!(scan.descriptors_scanned, 1);

    // Treated as a shadow build, the premade makefile counts as build output.
    let shadow = config(&fx, &attributes).with_build(fx.src(), Topology::Shadow);
    let report = run(&shadow)?;
    assert_eq!(report.used, vec!["libA".to_string(), "libB".to_string()]);
    Ok(())
}

#[test]
fn fix_rebases_stale_catalog_before_matching() -> Result<()> {
    let fx = Fixture::new()?;
    let lib_a = fx.add_library("libA", "libA terms")?;
    let stale_root = "/home/jack/prev_qt_source";
    let attributes = fx.write_catalog(&[
        serde_json::json!({
            "Id": "libA",
            "Name": "libA",
            "Path": format!("{stale_root}/3rdparty/libA"),
            "LicenseFile": format!("{stale_root}/3rdparty/libA/LICENSE"),
            "Homepage": "https://example.org/libA"
        }),
        serde_json::json!({
            "Id": "vendored",
            "Name": "Vendored elsewhere",
            "Path": "/opt/vendor/lib",
            "LicenseFile": "LICENSE"
        }),
    ])?;
    let source = lib_a.join("libA.c");
    fx.write_makefile(&fx.build(), "qtbase", &[source.to_str().unwrap()])?;

    let fixed_path = fx.root().join("fixed.json");
    let mut run_config = config(&fx, &attributes)
        .with_build(fx.build(), Topology::Shadow)
        .with_fix(stale_root, fx.src().to_string_lossy());
    run_config.write_attributes = Some(fixed_path.clone());
    let report = run(&run_config)?;

    assert_eq!(report.used, vec!["libA".to_string()]);
    assert_eq!(report.fix.map(|s| s.entries_rewritten), Some(1));
    assert_eq!(fs::read_to_string(fx.out().join("LICENSE"))?, "libA terms");

    let fixed = load_catalog_from_path(&fixed_path)?;
    let entries: Vec<_> = fixed.entries().collect();
    assert_eq!(entries[0].path, lib_a.to_string_lossy());
    assert_eq!(
        entries[0].extra.get("Homepage"),
        Some(&Value::from("https://example.org/libA"))
    );
    assert_eq!(entries[1].path, "/opt/vendor/lib");

    // The input catalog itself is never rewritten.
    let original = load_catalog_from_path(&attributes)?;
    assert!(original.entries().next().unwrap().path.starts_with(stale_root));
    Ok(())
}

#[test]
fn fatal_failure_after_fix_leaves_no_rewritten_catalog() -> Result<()> {
    let fx = Fixture::new()?;
    let lib_a = fx.add_library("libA", "A")?;
    let attributes = fx.write_catalog(&[serde_json::json!({
        "Id": "libA",
        "Name": "libA",
        "Path": "/prev/qt/src/3rdparty/libA",
        "LicenseFile": "LICENSE"
    })])?;
    fx.write_makefile(&fx.build(), "qtbase", &[lib_a.join("libA.c").to_str().unwrap()])?;

    // The output directory cannot be created beneath a regular file.
    let blocker = fx.root().join("blocker");
    fs::write(&blocker, "not a directory")?;
    let fixed_path = fx.root().join("fixed.json");
    let mut run_config = RunConfig::new(blocker.join("out"), &attributes)
        .with_build(fx.build(), Topology::Shadow)
        .with_fix("/prev/qt/src", fx.src().to_string_lossy());
    run_config.descriptor_flavor = DescriptorFlavor::Gnu;
    run_config.path_policy = PathPolicy::POSIX;
    run_config.write_attributes = Some(fixed_path.clone());

    let err = run(&run_config).unwrap_err();
    assert!(format!("{err:#}").contains("creating output directory"));
    assert!(!fixed_path.exists());
    Ok(())
}

#[test]
fn per_entry_failures_do_not_abort_the_run() -> Result<()> {
    let fx = Fixture::new()?;
    let lib_a = fx.add_library("libA", "A")?;
    let attributes = fx.write_catalog(&[
        catalog_entry("libA", &lib_a, "LICENSE"),
        catalog_entry("ghost", &fx.src().join("3rdparty/ghost"), "COPYING"),
        serde_json::json!({"Id": "broken", "Name": "missing Path and LicenseFile"}),
    ])?;

    let report = run(&config(&fx, &attributes))?;

    assert_eq!(report.exported.len(), 1);
    assert_eq!(report.exported[0].id, "libA");
    assert_eq!(report.issues.len(), 2);
    assert!(
        report
            .issues
            .issues()
            .iter()
            .any(|issue| matches!(issue, Issue::MalformedCatalogEntry { index: 2, .. }))
    );
    assert!(
        report
            .issues
            .issues()
            .iter()
            .any(|issue| matches!(issue, Issue::LicenseFileMissing { id, .. } if id == "ghost"))
    );
    Ok(())
}

#[test]
fn entry_without_path_exports_nothing_from_working_directory() -> Result<()> {
    let fx = Fixture::new()?;
    let attributes = fx.write_catalog(&[serde_json::json!({
        "Id": "x",
        "Name": "x",
        "Path": "",
        "LicenseFile": "Cargo.toml"
    })])?;

    let report = run(&config(&fx, &attributes))?;

    assert!(report.exported.is_empty());
    assert_eq!(report.catalog_entries, 0);
    assert!(matches!(
        report.issues.issues(),
        [Issue::MalformedCatalogEntry { index: 0, .. }]
    ));
    assert!(exported_names(&fx.out())?.is_empty());
    Ok(())
}

#[test]
fn missing_inputs_fail_before_any_output() -> Result<()> {
    let fx = Fixture::new()?;
    let out = fx.root().join("never-created");
    let missing_catalog = RunConfig::new(&out, fx.root().join("absent.json"));
    assert!(run(&missing_catalog).is_err());

    let lib_a = fx.add_library("libA", "A")?;
    let attributes = fx.write_catalog(&[catalog_entry("libA", &lib_a, "LICENSE")])?;
    let missing_build =
        RunConfig::new(&out, &attributes).with_build(fx.root().join("no-build"), Topology::Shadow);
    let err = run(&missing_build).unwrap_err();
    assert!(format!("{err:#}").contains("build directory not found"));
    assert!(!out.exists());
    Ok(())
}

#[test]
fn malformed_catalog_file_is_fatal() -> Result<()> {
    let fx = Fixture::new()?;
    let attributes = fx.root().join("3rdpartylibs.json");
    fs::write(&attributes, "{ not json")?;
    let err = run(&config(&fx, &attributes)).unwrap_err();
    assert!(format!("{err:#}").contains("parsing attributes file"));
    Ok(())
}
