#![allow(dead_code)]

use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const COMPILE_HEADER: &str = "####### Compile\n\n";
pub const INSTALL_HEADER: &str = "\n####### Install\n\n";

// Scratch layout with a source tree, a build tree, a clean checkout and an
// output directory side by side.
pub struct Fixture {
    temp: TempDir,
}

impl Fixture {
    pub fn new() -> Result<Self> {
        let temp = TempDir::new().context("failed to allocate fixture dir")?;
        for dir in ["src", "build", "clean", "out"] {
            fs::create_dir_all(temp.path().join(dir))?;
        }
        Ok(Self { temp })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn src(&self) -> PathBuf {
        self.root().join("src")
    }

    pub fn build(&self) -> PathBuf {
        self.root().join("build")
    }

    pub fn clean(&self) -> PathBuf {
        self.root().join("clean")
    }

    pub fn out(&self) -> PathBuf {
        self.root().join("out")
    }

    /// Create `src/3rdparty/<name>` with a LICENSE file and one source file.
    pub fn add_library(&self, name: &str, license_text: &str) -> Result<PathBuf> {
        let dir = self.src().join("3rdparty").join(name);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("LICENSE"), license_text)?;
        fs::write(dir.join(format!("{name}.c")), "int x;\n")?;
        Ok(dir)
    }

    /// Write a qmake-style makefile at `<base>/<relative>/Makefile` whose
    /// compile section references `sources`.
    pub fn write_makefile(&self, base: &Path, relative: &str, sources: &[&str]) -> Result<PathBuf> {
        let dir = base.join(relative);
        fs::create_dir_all(&dir)?;
        let path = dir.join("Makefile");
        fs::write(&path, makefile_text(sources))?;
        Ok(path)
    }

    pub fn write_catalog(&self, entries: &[Value]) -> Result<PathBuf> {
        let path = self.root().join("3rdpartylibs.json");
        fs::write(&path, serde_json::to_string_pretty(&Value::Array(entries.to_vec()))?)?;
        Ok(path)
    }
}

pub fn makefile_text(sources: &[&str]) -> String {
    let mut text = String::from("first: all\n\n");
    text.push_str(COMPILE_HEADER);
    for (idx, source) in sources.iter().enumerate() {
        text.push_str(&format!(
            ".obj/unit{idx}.o: {source}\n\t$(CC) -c $(CFLAGS) $(INCPATH) -o .obj/unit{idx}.o {source}\n\n"
        ));
    }
    text.push_str(INSTALL_HEADER);
    text
}

pub fn catalog_entry(id: &str, path: &Path, license_file: &str) -> Value {
    json!({
        "Id": id,
        "Name": format!("{id} library"),
        "QDocModule": "qtcore",
        "Path": path.to_string_lossy(),
        "LicenseFile": license_file,
        "License": "MIT License",
        "LicenseId": "MIT",
        "Copyright": format!("Copyright (C) The {id} authors")
    })
}

pub fn exported_names(out: &Path) -> Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    for entry in fs::read_dir(out).with_context(|| format!("listing {}", out.display()))? {
        names.insert(entry?.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

pub fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}
