//! File selection.
//!
//! Decides which files the transform applies to from include and exclude
//! glob lists, and discovers those files under a directory.

use std::path::{Component, Path, PathBuf};

use regex::Regex;
use walkdir::WalkDir;

use crate::errors::{unspanned, ErrorKind, ErrorReporting, IfdefError, ReportContext};

/// One compiled glob.
#[derive(Debug, Clone)]
struct Glob {
    pattern: String,
    regex: Regex,
}

impl Glob {
    fn new(pattern: &str) -> Result<Self, IfdefError> {
        let regex = Regex::new(&glob_to_regex(pattern)).map_err(|e| {
            ReportContext::unsourced("filter").report(
                ErrorKind::InvalidGlob {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                },
                unspanned(),
            )
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

/// Include/exclude filter over file paths.
#[derive(Debug, Clone)]
pub struct FileFilter {
    root: PathBuf,
    include: Vec<Glob>,
    exclude: Vec<Glob>,
}

impl FileFilter {
    /// Compiles the glob lists. Relative paths are resolved against `root`.
    pub fn new(root: impl Into<PathBuf>, include: &[String], exclude: &[String]) -> Result<Self, IfdefError> {
        Ok(Self {
            root: root.into(),
            include: include.iter().map(|p| Glob::new(p)).collect::<Result<_, _>>()?,
            exclude: exclude.iter().map(|p| Glob::new(p)).collect::<Result<_, _>>()?,
        })
    }

    /// Whether `path` should be transformed.
    ///
    /// Virtual ids (containing `\0`) are never selected. A path is tested
    /// both relative to the root and as given, with `/` separators.
    pub fn matches(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let full = normalize(path);
        if full.contains('\0') {
            return false;
        }

        let relative = path
            .strip_prefix(&self.root)
            .ok()
            .map(normalize)
            .unwrap_or_else(|| full.clone());
        let candidates = [relative.as_str(), full.as_str()];

        let hit = |globs: &[Glob]| globs.iter().any(|g| candidates.iter().any(|c| g.is_match(c)));
        !hit(&self.exclude) && hit(&self.include)
    }

    /// Recursively scans `dir` for files that pass the filter.
    ///
    /// The returned list is sorted to ensure deterministic processing order.
    pub fn discover(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, IfdefError> {
        self.walk(dir.as_ref(), None)
    }

    /// Like [`FileFilter::discover`], but never descends into `skip`.
    ///
    /// Both paths are compared as given, so pass them in the same form
    /// (e.g. both canonical).
    pub fn discover_excluding(&self, dir: impl AsRef<Path>, skip: impl AsRef<Path>) -> Result<Vec<PathBuf>, IfdefError> {
        self.walk(dir.as_ref(), Some(skip.as_ref()))
    }

    fn walk(&self, dir: &Path, skip: Option<&Path>) -> Result<Vec<PathBuf>, IfdefError> {
        let mut files = Vec::new();
        let walker = WalkDir::new(dir)
            .into_iter()
            .filter_entry(|entry| skip.map_or(true, |skip| entry.path() != skip));

        for entry in walker {
            let entry = entry.map_err(|e| {
                ReportContext::unsourced("filter").report(
                    ErrorKind::InvalidPath {
                        path: format!("failed to walk directory: {}", e),
                    },
                    unspanned(),
                )
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if !self.matches(path) {
                continue;
            }

            files.push(path.to_path_buf());
        }
        files.sort();
        Ok(files)
    }
}

/// Joins path components with `/`, dropping `.` components.
fn normalize(path: &Path) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut absolute = false;
    for component in path.components() {
        match component {
            Component::RootDir => absolute = true,
            Component::CurDir => {}
            Component::Prefix(p) => parts.push(p.as_os_str().to_string_lossy().into_owned()),
            other => parts.push(other.as_os_str().to_string_lossy().into_owned()),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Translates a glob into an anchored regex.
///
/// `**/` matches any number of leading directories, `**` matches anything,
/// `*` and `?` stay within one path segment.
fn glob_to_regex(glob: &str) -> String {
    let glob = glob.strip_prefix("./").unwrap_or(glob);
    let mut re = String::from("^");
    let mut chars = glob.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    re.push_str("(?:.*/)?");
                } else {
                    re.push_str(".*");
                }
            }
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }

    re.push('$');
    re
}
