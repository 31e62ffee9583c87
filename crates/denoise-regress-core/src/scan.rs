//! Filesystem queries used to discover baseline and raw input files
//!
//! Matrix expansion only ever asks two questions of the disk: which files
//! under a directory end in a given suffix, and whether a given file exists.
//! [`BaselineFs`] captures exactly that so expansion can run against a
//! synthetic file list.

use crate::error::{RegressError, Result};
use glob::{glob, Pattern};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub trait BaselineFs {
    /// Files anywhere below `dir` whose name ends in `suffix`, sorted.
    fn find_with_suffix(&self, dir: &Path, suffix: &str) -> Result<Vec<PathBuf>>;

    fn is_file(&self, path: &Path) -> bool;
}

/// The real filesystem, scanned with recursive glob patterns.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskFs;

impl BaselineFs for DiskFs {
    fn find_with_suffix(&self, dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
        let pattern = format!(
            "{}/**/*{}",
            Pattern::escape(&dir.to_string_lossy()),
            Pattern::escape(suffix)
        );

        let mut found = Vec::new();
        for entry in glob(&pattern)? {
            let path = entry.map_err(|e| RegressError::Io(e.into()))?;
            if path.is_file() {
                found.push(path);
            }
        }
        sort_paths(&mut found);
        Ok(found)
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// An in-memory file list.
#[derive(Debug, Default, Clone)]
pub struct FileSetFs {
    files: BTreeSet<PathBuf>,
}

impl FileSetFs {
    pub fn new<I, P>(files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            files: files.into_iter().map(Into::into).collect(),
        }
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>) {
        self.files.insert(path.into());
    }

    pub fn remove(&mut self, path: &Path) -> bool {
        self.files.remove(path)
    }
}

impl BaselineFs for FileSetFs {
    fn find_with_suffix(&self, dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
        let mut found: Vec<PathBuf> = self
            .files
            .iter()
            .filter(|path| path.starts_with(dir) && path.to_string_lossy().ends_with(suffix))
            .cloned()
            .collect();
        sort_paths(&mut found);
        Ok(found)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.contains(path)
    }
}

/// Orders paths by their full text rather than component by component, so
/// `a.b/x` sorts before `a/x`.
fn sort_paths(paths: &mut [PathBuf]) {
    paths.sort_by_cached_key(|path| path.to_string_lossy().into_owned());
}

/// Name of `path` relative to `dir` with `suffix` removed, using `/` separators.
///
/// `<dir>/sub/img01.input.hdr.pfm` with suffix `.input.hdr.pfm` yields `sub/img01`.
pub fn strip_name(dir: &Path, path: &Path, suffix: &str) -> Option<String> {
    let relative = path.strip_prefix(dir).ok()?;
    let relative = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    relative
        .strip_suffix(suffix)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}
