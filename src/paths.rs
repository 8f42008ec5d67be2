//! Path comparison and rebasing shared by the scanner, matcher and normalizer.
//!
//! Catalog paths and descriptor tokens are plain strings that may come from a
//! different platform than the one running the tool, so every containment
//! check goes through [`PathPolicy`] instead of `std::path::Path`. Both `/`
//! and `\` are treated as separators; case folding follows the policy.

use serde::Serialize;
use std::path::Path;

/// Case sensitivity and output separator used for every path comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PathPolicy {
    pub case_insensitive: bool,
    pub separator: char,
}

impl PathPolicy {
    pub const POSIX: PathPolicy = PathPolicy {
        case_insensitive: false,
        separator: '/',
    };

    pub const WINDOWS: PathPolicy = PathPolicy {
        case_insensitive: true,
        separator: '\\',
    };

    /// Policy for the filesystem the tool is running on.
    ///
    /// Windows and macOS default to case-insensitive filesystems.
    pub fn host() -> Self {
        if cfg!(windows) {
            Self::WINDOWS
        } else if cfg!(target_os = "macos") {
            PathPolicy {
                case_insensitive: true,
                separator: '/',
            }
        } else {
            Self::POSIX
        }
    }

    pub fn with_case_insensitive(self, case_insensitive: bool) -> Self {
        PathPolicy {
            case_insensitive,
            ..self
        }
    }

    pub fn normalize(&self, raw: &str) -> NormalizedPath {
        NormalizedPath::parse(raw, *self)
    }

    pub fn fold(&self, component: &str) -> String {
        if self.case_insensitive {
            component.to_lowercase()
        } else {
            component.to_string()
        }
    }

    /// True if `path` equals `root` or lies beneath it.
    pub fn is_within(&self, path: &str, root: &str) -> bool {
        self.normalize(path).starts_with(&self.normalize(root))
    }

    /// Replace the `prev_root` prefix of `path` with `new_root`.
    ///
    /// The remainder after the matched prefix is kept verbatim apart from its
    /// separators, which are converted to the policy separator. Returns `None`
    /// when `path` is not rooted under `prev_root`.
    pub fn rebase(&self, path: &str, prev_root: &str, new_root: &str) -> Option<String> {
        let remainder = self.strip_root(path, prev_root)?;
        let mut rebased = self.render_root(new_root);
        rebased.extend(remainder.chars().map(|c| {
            if is_separator(c) {
                self.separator
            } else {
                c
            }
        }));
        if rebased.is_empty() {
            rebased.push(self.separator);
        }
        Some(rebased)
    }

    /// Text of `path` following the components that match `root`.
    ///
    /// The returned slice is empty or starts with a separator. A `..` in the
    /// matched part of `path` makes the match fail rather than guess.
    pub fn strip_root<'a>(&self, path: &'a str, root: &str) -> Option<&'a str> {
        let root = self.normalize(root);
        if root.components.is_empty() && !root.rooted {
            return None;
        }
        if path.starts_with(is_separator) != root.rooted {
            return None;
        }

        let mut wanted = root.components.iter();
        let mut next = wanted.next();
        let mut end = 0;
        for (start, component) in raw_components(path) {
            let Some(expected) = next else {
                break;
            };
            match component {
                "." => {}
                ".." => return None,
                other if self.fold(other) == *expected => {
                    end = start + other.len();
                    next = wanted.next();
                }
                _ => return None,
            }
        }

        if next.is_some() {
            return None;
        }
        // A bare `/` root matches without consuming any component.
        if root.components.is_empty() {
            return Some(path);
        }
        Some(&path[end..])
    }

    fn render_root(&self, root: &str) -> String {
        let converted: String = root
            .chars()
            .map(|c| if is_separator(c) { self.separator } else { c })
            .collect();
        converted.trim_end_matches(self.separator).to_string()
    }
}

impl Default for PathPolicy {
    fn default() -> Self {
        Self::host()
    }
}

/// Lexically normalized path: separators unified, `.` dropped, `..` folded
/// and components case-folded according to the policy it was parsed with.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NormalizedPath {
    rooted: bool,
    components: Vec<String>,
}

impl NormalizedPath {
    pub fn parse(raw: &str, policy: PathPolicy) -> Self {
        let rooted = raw.starts_with(is_separator);
        let mut components: Vec<String> = Vec::new();
        for (_, component) in raw_components(raw) {
            match component {
                "." => {}
                ".." => {
                    if components.last().is_some_and(|last| last != "..") {
                        components.pop();
                    } else if !rooted {
                        components.push("..".to_string());
                    }
                }
                other => components.push(policy.fold(other)),
            }
        }
        Self { rooted, components }
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Component-wise prefix test; `/src/lib` is not a prefix of `/src/library`.
    pub fn starts_with(&self, root: &NormalizedPath) -> bool {
        self.rooted == root.rooted && self.components.starts_with(&root.components)
    }

    /// Every ancestor of this path, itself included, shortest first.
    pub fn ancestors(&self) -> impl Iterator<Item = NormalizedPath> + '_ {
        (0..=self.components.len()).map(|len| NormalizedPath {
            rooted: self.rooted,
            components: self.components[..len].to_vec(),
        })
    }
}

/// Lexically join `relative` onto `base` and render it with `/` separators.
///
/// Absolute `relative` values are returned unchanged apart from separator
/// normalization. Used for descriptor tokens, which must not depend on the
/// current directory or on what exists on disk.
pub fn resolve_lexically(base: &Path, relative: &str) -> String {
    let candidate = if relative.starts_with(is_separator) || starts_with_drive(relative) {
        relative.to_string()
    } else {
        format!("{}/{}", base.to_string_lossy(), relative)
    };

    let rooted = candidate.starts_with(is_separator);
    let mut stack: Vec<&str> = Vec::new();
    for (_, component) in raw_components(&candidate) {
        match component {
            "." => {}
            ".." => {
                if stack.last().is_some_and(|last| *last != "..") {
                    stack.pop();
                } else if !rooted {
                    stack.push("..");
                }
            }
            other => stack.push(other),
        }
    }

    let joined = stack.join("/");
    if rooted { format!("/{joined}") } else { joined }
}

/// True for rooted paths and drive-letter paths, on any host.
pub fn is_absolute(raw: &str) -> bool {
    raw.starts_with(is_separator) || starts_with_drive(raw)
}

/// Final component of a path string, whichever separator it uses.
pub fn file_name(raw: &str) -> Option<&str> {
    raw_components(raw).last().map(|(_, name)| name)
}

pub fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

fn raw_components(raw: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    raw.split(is_separator).filter_map(move |piece| {
        let start = offset;
        offset += piece.len() + 1;
        if piece.is_empty() {
            None
        } else {
            Some((start, piece))
        }
    })
}

fn is_drive(component: &str) -> bool {
    let bytes = component.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn starts_with_drive(raw: &str) -> bool {
    raw.split(is_separator).next().is_some_and(is_drive)
}
