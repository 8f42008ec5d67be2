//! Command-line front end for the license export pipeline.
//!
//! Usage:
//!   thirdparty-licenses -o /licenses -a 3rdpartylibs.json
//!   thirdparty-licenses -o /licenses -a 3rdpartylibs.json -b /qt/build
//!   thirdparty-licenses -o /licenses -a 3rdpartylibs.json -b /qt/build -f /prev/qt/src /qt/src
//!   thirdparty-licenses -o /licenses -a 3rdpartylibs.json -b /qt/src -s /qt/clean-src
//!
//! Logging goes to stderr (filter with `RUST_LOG`); stdout only carries the
//! JSON report when `--json` is given.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::PathBuf;
use thirdparty_licenses::{DescriptorFlavor, PathPolicy, RunConfig, Topology, run as run_pipeline};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const LONG_ABOUT: &str = "\
Find the third-party libraries that were compiled into a build and export \
their license files into a directory of your choice.

The libraries are taken from an attribution catalog (JSON), for Qt generated \
with:

    qtattributionsscanner --output-format json -o 3rdpartylibs.json /path/to/qt/sources

Build descriptors ('Makefile' for gcc/clang, 'Makefile*Release' for MSVC) in \
the build directory tell which sources were compiled. Without a build \
directory the license of every library in the catalog is exported.

Catalog paths that point at an old location of the source tree can be fixed \
with -f PREV_SRC_DIR SRC_DIR. For a shadow build SRC_DIR is the source \
directory; for an in-source (non-shadow) build it is the build directory, and \
a clean copy of the sources (-s) is needed so that makefiles shipped with the \
sources are not mistaken for build output.";

#[derive(Parser, Debug)]
#[command(name = "thirdparty-licenses", version)]
#[command(about = "Export the licenses of the third-party libraries used by a build")]
#[command(long_about = LONG_ABOUT)]
struct Cli {
    /// Directory to export the license files into.
    #[arg(short, long, value_name = "OUTPUT_DIR")]
    output: PathBuf,
    /// Catalog with the library attributes.
    #[arg(short, long, value_name = "3RDPARTYLIBS_JSON")]
    attributes: PathBuf,
    /// Build directory; without it every library's license is exported.
    #[arg(short, long, value_name = "BUILD_DIR")]
    build: Option<PathBuf>,
    /// Clean source directory (required for an in-source build).
    #[arg(short, long, value_name = "SRC_DIR")]
    source: Option<PathBuf>,
    /// Build topology; defaults to in-source when --source is given.
    #[arg(long, value_parser = ["shadow", "in-source"])]
    topology: Option<String>,
    /// Rebase catalog paths from the previous source directory to a new one.
    #[arg(short, long, num_args = 2, value_names = ["PREV_SRC_DIR", "SRC_DIR"])]
    fix: Option<Vec<String>>,
    /// Write the fixed catalog to this file.
    #[arg(long, value_name = "JSON")]
    write_attributes: Option<PathBuf>,
    /// Build descriptor naming convention.
    #[arg(long, value_parser = ["gnu", "msvc-release"])]
    descriptor: Option<String>,
    /// Path case sensitivity; defaults to the host filesystem's.
    #[arg(long, value_parser = ["sensitive", "insensitive"])]
    case: Option<String>,
    /// Print the run report as JSON on stdout.
    #[arg(long)]
    json: bool,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("thirdparty_licenses=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let print_json = cli.json;
    let config = build_config(cli)?;

    let report = run_pipeline(&config)?;
    info!(
        mode = ?report.mode,
        used = report.used.len(),
        exported = report.exported.len(),
        issues = report.issues.len(),
        "done"
    );

    if print_json {
        let rendered = serde_json::to_string_pretty(&report).context("serializing run report")?;
        println!("{rendered}");
    }
    Ok(())
}

fn build_config(args: Cli) -> Result<RunConfig> {
    let mut config = RunConfig::new(args.output, args.attributes);

    if let Some(flavor) = args.descriptor.as_deref() {
        config.descriptor_flavor = DescriptorFlavor::try_from(flavor)?;
    }
    if let Some(case) = args.case.as_deref() {
        config.path_policy = PathPolicy::host().with_case_insensitive(case == "insensitive");
    }

    match args.build {
        Some(build_dir) => {
            let topology = resolve_topology(args.topology.as_deref(), args.source)?;
            config = config.with_build(build_dir, topology);
        }
        None => {
            if args.source.is_some() || args.topology.is_some() {
                warn!("--source/--topology have no effect without --build");
            }
        }
    }

    if let Some(fix) = args.fix {
        let [prev_root, new_root]: [String; 2] = fix
            .try_into()
            .map_err(|_| anyhow::anyhow!("--fix takes exactly two directories"))?;
        config = config.with_fix(prev_root, new_root);
    }
    config.write_attributes = args.write_attributes;

    Ok(config)
}

fn resolve_topology(requested: Option<&str>, source: Option<PathBuf>) -> Result<Topology> {
    match (requested, source) {
        (Some("shadow"), source) => {
            if source.is_some() {
                warn!("--source is ignored for a shadow build");
            }
            Ok(Topology::Shadow)
        }
        (Some("in-source") | None, Some(clean_source)) => Ok(Topology::InSource { clean_source }),
        (Some("in-source"), None) => {
            bail!("an in-source build needs a clean source directory (--source)")
        }
        (None, None) => Ok(Topology::Shadow),
        (Some(other), _) => bail!("Unknown topology: {other}"),
    }
}
