// Copyright 2025 The LS3 Authors
// SPDX-License-Identifier: Apache-2.0

//! Bucket name to filesystem view resolution.

use std::path::PathBuf;

use ls3_core::{Error, Result, S3ErrorCode};

use crate::view::FsView;

/// Maps bucket names onto sandboxed filesystem views.
#[derive(Debug, Clone)]
pub enum BucketFs {
    /// Every bucket name resolves to the same root directory.
    Single(FsView),
    /// Each bucket is a subdirectory of the base directory.
    Subdir(PathBuf),
}

impl BucketFs {
    /// Lists the bucket names this server exposes.
    ///
    /// The single-bucket filesystem answers to any name, so it lists
    /// one synthetic bucket.
    pub fn list_buckets(&self) -> Result<Vec<String>> {
        match self {
            BucketFs::Single(_) => Ok(vec!["any".to_string()]),
            BucketFs::Subdir(base) => {
                let entries = std::fs::read_dir(base).map_err(|err| {
                    Error::new(
                        S3ErrorCode::InternalError,
                        format!("unable to read the bucket directory: {err}"),
                    )
                })?;

                let mut buckets = Vec::new();
                for entry in entries {
                    let entry = entry.map_err(|err| {
                        Error::new(
                            S3ErrorCode::InternalError,
                            format!("unable to read the bucket directory: {err}"),
                        )
                    })?;

                    let Ok(name) = entry.file_name().into_string() else {
                        continue;
                    };
                    if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                        buckets.push(name);
                    }
                }

                buckets.sort();
                Ok(buckets)
            }
        }
    }

    /// Opens the filesystem view for the given bucket name.
    pub fn open(&self, bucket: &str) -> Result<FsView> {
        match self {
            BucketFs::Single(view) => Ok(view.clone()),
            BucketFs::Subdir(base) => {
                let path = base.join(bucket);

                let meta = std::fs::metadata(&path).map_err(|_| {
                    Error::new(S3ErrorCode::NoSuchBucket, "The specified bucket does not exist.")
                        .with_resource(bucket)
                })?;

                if !meta.is_dir() {
                    return Err(Error::new(
                        S3ErrorCode::NoSuchBucket,
                        "The specified bucket does not exist.",
                    )
                    .with_resource(bucket));
                }

                Ok(FsView::new(path))
            }
        }
    }
}
