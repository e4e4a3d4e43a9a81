use crate::error::{HarnessError, MalformedFixture};
use crate::types::{RawCase, TestCase};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// What one step of discovery produced.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedCase {
    Case(TestCase),
    Malformed(MalformedFixture),
}

/// Sorted list of fixture files found under a root.
///
/// Iterating reads the files again each time, so two passes over the same
/// set see the current state of the disk in the same order.
#[derive(Debug, Clone, Default)]
pub struct FixtureSet {
    files: Vec<PathBuf>,
}

impl FixtureSet {
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> FixtureIter<'_> {
        FixtureIter {
            files: self.files.iter(),
            pending: Vec::new().into_iter(),
        }
    }
}

impl<'a> IntoIterator for &'a FixtureSet {
    type Item = LoadedCase;
    type IntoIter = FixtureIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazily parses one file at a time.
pub struct FixtureIter<'a> {
    files: std::slice::Iter<'a, PathBuf>,
    pending: std::vec::IntoIter<LoadedCase>,
}

impl Iterator for FixtureIter<'_> {
    type Item = LoadedCase;

    fn next(&mut self) -> Option<LoadedCase> {
        loop {
            if let Some(case) = self.pending.next() {
                return Some(case);
            }
            let path = self.files.next()?;
            self.pending = load_file(path).into_iter();
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Collects every `.json` file below `root`.
///
/// Only a missing or unreadable root is an error. Entries deeper down that
/// cannot be visited are kept, and fail later as malformed fixtures.
/// Symlink loops are skipped.
pub fn discover(root: &Path) -> Result<FixtureSet, HarnessError> {
    let fs_err = |source| HarnessError::Filesystem {
        path: root.to_path_buf(),
        source,
    };
    let meta = fs::metadata(root).map_err(fs_err)?;
    if meta.is_file() {
        return Ok(FixtureSet {
            files: vec![root.to_path_buf()],
        });
    }
    fs::read_dir(root).map_err(fs_err)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() && is_json(entry.path()) {
                    files.push(entry.into_path());
                }
            }
            Err(err) if err.loop_ancestor().is_some() => {
                warn!("skipping symlink loop: {}", err);
            }
            Err(err) => match err.path() {
                Some(p) if is_json(p) || p.is_dir() => {
                    warn!("cannot visit {}: {}", p.display(), err);
                    files.push(p.to_path_buf());
                }
                _ => warn!("skipping unreadable entry: {}", err),
            },
        }
    }
    files.sort();
    files.dedup();
    debug!("discovered {} fixture files under {}", files.len(), root.display());
    Ok(FixtureSet { files })
}

/// Reads one fixture file. Never fails: problems come back as a single
/// [`LoadedCase::Malformed`].
pub fn load_file(path: &Path) -> Vec<LoadedCase> {
    match read_file(path) {
        Ok(cases) => cases.into_iter().map(LoadedCase::Case).collect(),
        Err(bad) => {
            warn!("{}", bad);
            vec![LoadedCase::Malformed(bad)]
        }
    }
}

fn malformed(path: &Path, name: Option<String>, message: String) -> MalformedFixture {
    MalformedFixture {
        path: path.to_path_buf(),
        name: name.unwrap_or_else(|| path.display().to_string()),
        message,
    }
}

fn read_file(path: &Path) -> Result<Vec<TestCase>, MalformedFixture> {
    let content = fs::read_to_string(path)
        .map_err(|e| malformed(path, None, format!("failed to read file: {e}")))?;
    let value: Value = serde_json::from_str(&content)
        .map_err(|e| malformed(path, None, format!("invalid JSON: {e}")))?;
    parse_value(value, path)
}

/// Turns a parsed fixture document into cases. A file holds either one
/// case object or an array of them; any bad element spoils the file.
pub fn parse_value(value: Value, path: &Path) -> Result<Vec<TestCase>, MalformedFixture> {
    let items = match value {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        other => {
            return Err(malformed(
                path,
                None,
                format!(
                    "expected a test case object or an array of them, found {}",
                    json_kind(&other)
                ),
            ));
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            let name = item
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string);
            serde_json::from_value::<RawCase>(item)
                .map(|raw| raw.into_case(path.to_path_buf()))
                .map_err(|e| {
                    malformed(
                        path,
                        name,
                        format!("case #{} does not match the test case schema: {e}", idx + 1),
                    )
                })
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
