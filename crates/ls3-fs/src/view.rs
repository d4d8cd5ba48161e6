// Copyright 2025 The LS3 Authors
// SPDX-License-Identifier: Apache-2.0

//! Sandboxed filesystem views.

use std::fs::{File, Metadata};
use std::io;
use std::path::{Path, PathBuf};

/// A read-only view over a directory tree.
///
/// Object keys are `/`-separated paths relative to the view root.
/// Handlers can neither escape the root nor observe anything about the
/// filesystem above it; keys that try to are rejected here even though
/// callers normalize them first.
#[derive(Debug, Clone)]
pub struct FsView {
    root: PathBuf,
}

/// A single directory entry as seen by the listing walk.
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// File or directory name within its parent.
    pub name: String,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

impl FsView {
    /// Creates a view rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsView { root: root.into() }
    }

    /// The directory this view is rooted at.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, key: &str) -> io::Result<PathBuf> {
        if key.starts_with('/')
            || key.split('/').any(|segment| segment == ".." || segment == ".")
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("key escapes the bucket root: {key}"),
            ));
        }

        Ok(self.root.join(key))
    }

    /// Opens the file for the given key.
    pub fn open(&self, key: &str) -> io::Result<File> {
        File::open(self.full_path(key)?)
    }

    /// Returns metadata for the given key. An empty key stats the view
    /// root itself.
    pub fn stat(&self, key: &str) -> io::Result<Metadata> {
        if key.is_empty() {
            return std::fs::metadata(&self.root);
        }
        std::fs::metadata(self.full_path(key)?)
    }

    /// Reads the entries of a directory, sorted by name.
    ///
    /// Entries with non-UTF-8 names cannot be addressed as object keys
    /// and are skipped.
    pub fn read_dir_sorted(&self, key: &str) -> io::Result<Vec<DirEntry>> {
        let path = if key.is_empty() { self.root.clone() } else { self.full_path(key)? };

        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };

            let is_dir = entry.file_type()?.is_dir();
            entries.push(DirEntry { name, is_dir });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}
