//! Source-file references inside a qmake-generated makefile.
//!
//! qmake writes explicit rules only (no implicit rules or wildcards), so the
//! compile section lists every object prerequisite and compiler argument as a
//! literal path. Example excerpt:
//!
//! ```text
//! ####### Compile
//!
//! .obj/png.o: ../../3rdparty/libpng/png.c \
//!         ../../3rdparty/libpng/png.h
//!     $(CC) -c $(CFLAGS) $(INCPATH) -o .obj/png.o ../../3rdparty/libpng/png.c
//!
//! ####### Install
//! ```

use crate::paths::{file_name, resolve_lexically};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const COMPILE_MARKER: &str = "####### Compile";
pub const INSTALL_MARKER: &str = "####### Install";

const STRIPPED_PREFIXES: &[&str] = &["-I", "$(INSTALL_ROOT)"];

/// Compiler outputs; they live in the build tree and name no source.
const OBJECT_EXTENSIONS: &[&str] = &["o", "obj"];

#[derive(Debug, Clone)]
pub struct Makefile {
    path: PathBuf,
    data: String,
    lossy: bool,
}

impl Makefile {
    /// Read a descriptor from disk. Only I/O failures are errors; bytes that
    /// are not UTF-8 are replaced and flagged through [`Makefile::is_lossy`].
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let (data, lossy) = match String::from_utf8(bytes) {
            Ok(data) => (data, false),
            Err(err) => (String::from_utf8_lossy(err.as_bytes()).into_owned(), true),
        };
        Ok(Self {
            path: path.to_path_buf(),
            data,
            lossy,
        })
    }

    pub fn from_contents(path: &Path, data: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            data: data.into(),
            lossy: false,
        }
    }

    /// True when undecodable bytes were replaced while loading; references
    /// containing them cannot match a catalog path.
    pub fn is_lossy(&self) -> bool {
        self.lossy
    }

    /// Text between the compile and install markers, if the file has a
    /// compile section at all.
    pub fn compile_section(&self) -> Option<&str> {
        let start = self.data.find(COMPILE_MARKER)?;
        let body = &self.data[start + COMPILE_MARKER.len()..];
        let end = body.find(INSTALL_MARKER).unwrap_or(body.len());
        Some(&body[..end])
    }

    /// Absolute paths of every source file referenced in the compile section.
    ///
    /// Relative references are resolved against the makefile's directory.
    pub fn source_references(&self) -> Vec<String> {
        let Some(section) = self.compile_section() else {
            return Vec::new();
        };
        let base = self.path.parent().unwrap_or_else(|| Path::new(""));
        let mut after_output_flag = false;
        section
            .split_whitespace()
            .filter(|token| {
                let output = std::mem::replace(&mut after_output_flag, *token == "-o");
                !output
            })
            .filter_map(sanitise)
            .map(|token| resolve_lexically(base, token))
            .filter(|resolved| resolved.starts_with('/') || resolved.contains(":/"))
            .collect()
    }
}

/// Reduce a raw token to a file path, or `None` if it names no source file.
fn sanitise(token: &str) -> Option<&str> {
    let token = token.trim_matches('"');
    if token.ends_with(':') {
        return None;
    }

    let mut token = token;
    for prefix in STRIPPED_PREFIXES {
        if let Some(rest) = token.strip_prefix(prefix) {
            token = rest;
        }
    }
    let token = token.trim_matches('"').trim_end_matches([';', ',']);

    if token.is_empty()
        || token.starts_with(['-', '@'])
        || token.contains("$(")
        || token == "\\"
    {
        return None;
    }

    let name = file_name(token)?;
    let extension = name
        .rfind('.')
        .filter(|dot| *dot > 0 && dot + 1 < name.len())
        .map(|dot| &name[dot + 1..])?;
    if OBJECT_EXTENSIONS
        .iter()
        .any(|object| extension.eq_ignore_ascii_case(object))
    {
        return None;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
MAKEFILE      = Makefile
INCPATH       = -I. -I../../3rdparty/zlib/src -I../../include

first: all

####### Compile

.obj/png.o: ../../3rdparty/libpng/png.c \
		"../../3rdparty/libpng/png.h"
	$(CC) -c $(CFLAGS) $(INCPATH) -o .obj/png.o ../../3rdparty/libpng/png.c

.obj/qimage.o: /qt/src/qtbase/src/gui/image/qimage.cpp
	$(CXX) -c $(CXXFLAGS) -I/qt/src/qtbase/src/3rdparty/harfbuzz-ng/include -o .obj/qimage.o /qt/src/qtbase/src/gui/image/qimage.cpp

####### Install

install_target: first FORCE
	$(QINSTALL) /qt/src/qtbase/src/3rdparty/should-not-appear.c $(INSTALL_ROOT)/usr/lib
"#;

    #[test]
    fn extracts_compile_section_references() {
        let makefile = Makefile::from_contents(Path::new("/build/qtbase/src/gui/Makefile"), SAMPLE);
        let refs = makefile.source_references();

        assert!(refs.contains(&"/build/qtbase/3rdparty/libpng/png.c".to_string()));
        assert!(refs.contains(&"/build/qtbase/3rdparty/libpng/png.h".to_string()));
        assert!(refs.contains(&"/qt/src/qtbase/src/gui/image/qimage.cpp".to_string()));
    }

    #[test]
    fn object_outputs_are_not_sources() {
        let makefile = Makefile::from_contents(Path::new("/build/qtbase/src/gui/Makefile"), SAMPLE);
        let refs = makefile.source_references();

        assert!(refs.iter().all(|r| !r.ends_with(".o")), "{refs:?}");

        let in_source = Makefile::from_contents(
            Path::new("/qt/src/3rdparty/libpng/Makefile"),
            "####### Compile\n\n\t$(CC) -c -o build/libpng.so /qt/src/3rdparty/libpng/png.c\n\t$(LINK) out\\png.obj\n",
        );
        assert_eq!(in_source.source_references(), vec!["/qt/src/3rdparty/libpng/png.c"]);
    }

    #[test]
    fn non_utf8_bytes_keep_the_remaining_references() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("Makefile");
        let mut bytes = b"####### Compile\n\n.obj/a.o: /src/caf\xe9/a.c /src/3rdparty/zlib/inflate.c\n".to_vec();
        bytes.extend_from_slice(b"####### Install\n");
        fs::write(&path, bytes).unwrap();

        let makefile = Makefile::load(&path).unwrap();
        assert!(makefile.is_lossy());
        assert!(
            makefile
                .source_references()
                .contains(&"/src/3rdparty/zlib/inflate.c".to_string())
        );
    }

    #[test]
    fn ignores_targets_flags_and_other_sections() {
        let makefile = Makefile::from_contents(Path::new("/build/qtbase/src/gui/Makefile"), SAMPLE);
        let refs = makefile.source_references();

        assert!(refs.iter().all(|r| !r.contains("zlib")), "INCPATH lies outside the compile section");
        assert!(refs.iter().all(|r| !r.contains("should-not-appear")));
        assert!(refs.iter().all(|r| !r.ends_with(':')));
        assert!(
            refs.iter().all(|r| !r.ends_with("harfbuzz-ng/include")),
            "include directories are not source files"
        );
    }

    #[test]
    fn missing_compile_marker_yields_nothing() {
        let makefile = Makefile::from_contents(Path::new("/build/Makefile"), "all:\n\tcc -c /src/a.c\n");
        assert!(makefile.compile_section().is_none());
        assert!(makefile.source_references().is_empty());
    }

    #[test]
    fn sanitise_strips_known_prefixes() {
        assert_eq!(sanitise("-I/src/zlib/zlib.h"), Some("/src/zlib/zlib.h"));
        assert_eq!(sanitise("$(INSTALL_ROOT)/usr/share/x.ttf"), Some("/usr/share/x.ttf"));
        assert_eq!(sanitise(".obj/png.o:"), None);
        assert_eq!(sanitise("-DQT_NO_DEBUG"), None);
        assert_eq!(sanitise("$(CXX)"), None);
        assert_eq!(sanitise("\\"), None);
        assert_eq!(sanitise("../../3rdparty/libpng"), None);
        assert_eq!(sanitise(".obj/png.o"), None);
        assert_eq!(sanitise("release\\qimage.OBJ"), None);
    }
}
