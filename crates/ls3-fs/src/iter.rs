// Copyright 2025 The LS3 Authors
// SPDX-License-Identifier: Apache-2.0

//! The bucket listing walk.
//!
//! Listings are computed on demand by walking the filesystem tree in
//! lexical order. A walk carries prefix and delimiter semantics, an
//! optional resume point, and stops as soon as a page is full.

use std::collections::BTreeSet;
use std::io::ErrorKind;

use chrono::{DateTime, Utc};
use ls3_core::encoding::encode_path;

use crate::object::compute_etag;
use crate::view::FsView;

/// A single object produced by a listing walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contents {
    /// Percent-encoded object key.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// Modification time of the backing file.
    pub last_modified: DateTime<Utc>,
    /// Entity tag, without surrounding quotes.
    pub etag: String,
}

#[derive(PartialEq)]
enum Flow {
    Continue,
    Stop,
}

/// Walks a bucket view with prefix, delimiter, and pagination
/// semantics.
///
/// Created per listing call and discarded after yielding its page.
pub struct BucketIterator<'a> {
    view: &'a FsView,
    /// True when the walk stopped early because the page reached
    /// `max_keys`.
    pub is_truncated: bool,
    /// Key of the last returned object when truncated; the next page
    /// resumes after it.
    pub continue_key: String,
    seek_after: Option<String>,
    prefixes: BTreeSet<String>,
}

struct Scan<'s> {
    scan_root: &'s str,
    prefix: &'s str,
    object_prefix: &'s str,
    delimiter: &'s str,
    max_keys: usize,
    contents: Vec<Contents>,
}

impl<'a> BucketIterator<'a> {
    /// Creates an iterator over the given bucket view.
    #[must_use]
    pub fn new(view: &'a FsView) -> Self {
        BucketIterator {
            view,
            is_truncated: false,
            continue_key: String::new(),
            seek_after: None,
            prefixes: BTreeSet::new(),
        }
    }

    /// Sets the object key to resume after. All entries are discarded
    /// until the walk encounters a key equal to `after`; the page
    /// starts at the entry following it.
    pub fn seek(&mut self, after: impl Into<String>) {
        let after = after.into();
        self.seek_after = if after.is_empty() { None } else { Some(after) };
    }

    /// Walks the tree, collecting up to `max_keys` objects under
    /// `prefix` and recording collapsed common prefixes when a
    /// `delimiter` is given.
    ///
    /// Unreadable directories are skipped with a warning; any other
    /// filesystem error ends the walk early with the entries gathered
    /// so far.
    pub fn prefix_scan(&mut self, prefix: &str, delimiter: &str, max_keys: usize) -> Vec<Contents> {
        // The directory component roots the walk; the leaf component
        // filters entries inside it.
        let (base_path, object_prefix) = match prefix.rfind('/') {
            Some(i) => (&prefix[..=i], &prefix[i + 1..]),
            None => ("", prefix),
        };

        let scan_root = base_path.trim_matches('/').to_string();

        let mut scan = Scan {
            scan_root: &scan_root,
            prefix,
            object_prefix,
            delimiter,
            max_keys,
            contents: Vec::new(),
        };

        let root_path = scan_root.clone();
        self.walk_dir(&mut scan, &root_path, "");

        std::mem::take(&mut scan.contents)
    }

    /// Common prefixes recorded by the last scan, sorted ascending.
    #[must_use]
    pub fn common_prefixes(&self) -> Vec<String> {
        self.prefixes.iter().cloned().collect()
    }

    fn walk_dir(&mut self, scan: &mut Scan<'_>, dir_path: &str, dir_rel: &str) -> Flow {
        let entries = match self.view.read_dir_sorted(dir_path) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                tracing::warn!(path = %dir_path, "listing walk skipping unreadable directory");
                return Flow::Continue;
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                // A prefix can point at a directory that does not exist
                return Flow::Continue;
            }
            Err(err) => {
                tracing::warn!(path = %dir_path, error = %err, "listing walk ended early");
                return Flow::Stop;
            }
        };

        for entry in entries {
            let rel = if dir_rel.is_empty() {
                entry.name.clone()
            } else {
                format!("{dir_rel}/{}", entry.name)
            };
            let object_path = if scan.scan_root.is_empty() {
                rel.clone()
            } else {
                format!("{}/{rel}", scan.scan_root)
            };

            // While resuming, discard entries until the resume key is
            // found, but keep descending so it can be found at all.
            if self.seek_after.is_some() {
                if self.seek_after.as_deref() == Some(object_path.as_str()) {
                    self.seek_after = None;
                }

                if entry.is_dir && self.walk_dir(scan, &object_path, &rel) == Flow::Stop {
                    return Flow::Stop;
                }
                continue;
            }

            if entry.is_dir {
                // Prune subtrees that cannot contain the object prefix
                if !scan.object_prefix.is_empty() && !rel.starts_with(scan.object_prefix) {
                    continue;
                }

                // A "/" delimiter collapses the whole directory into a
                // single common prefix
                if scan.delimiter == "/" {
                    self.prefixes.insert(encode_path(&format!("{object_path}/")));
                    continue;
                }

                if self.walk_dir(scan, &object_path, &rel) == Flow::Stop {
                    return Flow::Stop;
                }
                continue;
            }

            // A delimiter occurring inside the relative path collapses
            // the file into a common prefix instead of a key
            if !scan.delimiter.is_empty() {
                if let Some(ix) = rel.find(scan.delimiter) {
                    self.prefixes.insert(encode_path(&format!("{}{}", scan.prefix, &rel[..ix])));
                    continue;
                }
            }

            if !scan.object_prefix.is_empty() && !rel.starts_with(scan.object_prefix) {
                continue;
            }

            let meta = match self.view.stat(&object_path) {
                Ok(meta) => meta,
                Err(err) => {
                    tracing::warn!(path = %object_path, error = %err, "listing walk ended early");
                    return Flow::Stop;
                }
            };

            let last_modified: DateTime<Utc> =
                meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH).into();

            scan.contents.push(Contents {
                key: encode_path(&object_path),
                size: meta.len(),
                etag: compute_etag(meta.len(), &last_modified),
                last_modified,
            });

            // Record the entry first, then stop once the page is full:
            // the continue key is always a key that was actually
            // returned, so resuming makes progress even for tiny pages
            if scan.contents.len() >= scan.max_keys {
                self.is_truncated = true;
                self.continue_key = object_path;
                return Flow::Stop;
            }
        }

        Flow::Continue
    }
}
