// Copyright 2025 The LS3 Authors
// SPDX-License-Identifier: Apache-2.0

//! Object access: open, content-type sniffing, ranges.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use chrono::{DateTime, SecondsFormat, Utc};
use ls3_core::{Error, PolicyContext, Result, S3ErrorCode};

use crate::view::FsView;

/// Number of bytes read from the head of a file to sniff its MIME
/// type.
const SNIFF_LEN: usize = 261;

/// The MIME type reported when sniffing recognizes nothing.
const DEFAULT_CONTENT_TYPE: &str = "binary/octet-stream";

/// A single resolved byte range of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// Offset of the first byte served.
    pub start: u64,
    /// Number of bytes served.
    pub length: u64,
}

impl ByteRange {
    /// Formats a `Content-Range` header value for an object of
    /// `total` bytes.
    #[must_use]
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.start + self.length - 1, total)
    }
}

/// An object opened for reading.
///
/// The file handle is positioned at the start of the requested range
/// (or at offset zero), so callers can stream from it directly.
#[derive(Debug)]
pub struct Object {
    /// Open file handle, positioned at the first byte to serve.
    pub file: File,
    /// Total object size in bytes.
    pub size: u64,
    /// The requested byte range, if any.
    pub range: Option<ByteRange>,
    /// Modification time of the backing file.
    pub last_modified: DateTime<Utc>,
    /// Sniffed MIME type; never empty.
    pub content_type: String,
    /// Deterministic entity tag derived from size and mtime, without
    /// surrounding quotes.
    pub etag: String,
}

impl Object {
    /// Number of bytes a full read of this object will produce.
    #[must_use]
    pub fn content_length(&self) -> u64 {
        self.range.map_or(self.size, |r| r.length)
    }
}

impl PolicyContext for Object {
    fn get(&self, key: &str) -> Option<String> {
        match key {
            "ls3:ObjectSize" => Some(self.size.to_string()),
            "ls3:ObjectContentType" => Some(self.content_type.clone()),
            "ls3:ObjectLastModified" => {
                Some(self.last_modified.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            _ => None,
        }
    }
}

/// Normalizes a URL path into an object key.
///
/// Collapses `.` and `..` segments and duplicate slashes the way URL
/// path cleaning does, then strips the leading slash. An empty result
/// is an `InvalidArgument` error.
pub fn clean_key(url_path: &str) -> Result<String> {
    let mut parts: Vec<&str> = Vec::new();

    for segment in url_path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    let key = parts.join("/");
    if key.is_empty() {
        return Err(Error::new(
            S3ErrorCode::InvalidArgument,
            "Object key must be at least 1 character",
        ));
    }

    Ok(key)
}

/// Derives the entity tag for an object from its size and mtime.
///
/// Files have no stored digest, so the tag is a stable function of
/// the attributes a change necessarily touches.
#[must_use]
pub fn compute_etag(size: u64, modified: &DateTime<Utc>) -> String {
    format!("{:x}-{:x}", size, modified.timestamp_millis())
}

/// Opens and stats the object at `key`, applying the `Range` header if
/// one was presented.
pub fn stat_object(view: &FsView, key: &str, range_header: Option<&str>) -> Result<Object> {
    let mut file = view.open(key).map_err(|err| Error::from_object_io(&err))?;

    let (content_type, must_rewind) = sniff_content_type(&mut file);
    if must_rewind {
        file.seek(SeekFrom::Start(0)).map_err(|err| Error::from_object_io(&err))?;
    }

    let meta = file.metadata().map_err(|err| Error::from_object_io(&err))?;
    if meta.is_dir() {
        return Err(Error::new(
            S3ErrorCode::NoSuchKey,
            "The specified object key does not exist.",
        ));
    }

    let size = meta.len();
    let last_modified: DateTime<Utc> = meta
        .modified()
        .map_err(|err| Error::from_object_io(&err))?
        .into();

    let mut object = Object {
        etag: compute_etag(size, &last_modified),
        file,
        size,
        range: None,
        last_modified,
        content_type,
    };

    if let Some(header) = range_header {
        let range = parse_range(header, size)?;
        object.file.seek(SeekFrom::Start(range.start)).map_err(|_| {
            Error::new(S3ErrorCode::InvalidRange, "Unable to access object at start range.")
        })?;
        object.range = Some(range);
    }

    Ok(object)
}

/// Reads the head of the file and guesses its MIME type from magic
/// bytes. Returns the type and whether any bytes were consumed.
fn sniff_content_type(file: &mut File) -> (String, bool) {
    let mut head = Vec::with_capacity(SNIFF_LEN);
    let n = file.take(SNIFF_LEN as u64).read_to_end(&mut head).unwrap_or(0);

    let content_type = infer::get(&head)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

    (content_type, n > 0)
}

/// Parses a `Range` header against an object of `size` bytes.
///
/// Exactly one range is supported; multi-range requests and anything
/// unparseable yield `InvalidRange`.
fn parse_range(header: &str, size: u64) -> Result<ByteRange> {
    let invalid = || {
        Error::new(
            S3ErrorCode::InvalidRange,
            "The requested range is not valid for the request. Try another range.",
        )
    };

    let spec = header.strip_prefix("bytes=").ok_or_else(invalid)?;
    if spec.contains(',') {
        return Err(invalid());
    }

    let (start, end) = spec.split_once('-').ok_or_else(invalid)?;

    if start.is_empty() {
        // Suffix form: the last N bytes
        let suffix: u64 = end.parse().map_err(|_| invalid())?;
        if suffix == 0 || size == 0 {
            return Err(invalid());
        }

        let length = suffix.min(size);
        return Ok(ByteRange { start: size - length, length });
    }

    let start: u64 = start.parse().map_err(|_| invalid())?;
    if start >= size {
        return Err(invalid());
    }

    let end: u64 = if end.is_empty() {
        size - 1
    } else {
        let end: u64 = end.parse().map_err(|_| invalid())?;
        if end < start {
            return Err(invalid());
        }
        end.min(size - 1)
    };

    Ok(ByteRange { start, length: end - start + 1 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn view_with(name: &str, contents: &[u8]) -> (tempfile::TempDir, FsView) {
        let dir = tempfile::tempdir().unwrap();
        let mut f = File::create(dir.path().join(name)).unwrap();
        f.write_all(contents).unwrap();
        let view = FsView::new(dir.path());
        (dir, view)
    }

    #[test]
    fn clean_key_normalizes() {
        assert_eq!(clean_key("/a/b.txt").unwrap(), "a/b.txt");
        assert_eq!(clean_key("//a//b.txt").unwrap(), "a/b.txt");
        assert_eq!(clean_key("/a/./b.txt").unwrap(), "a/b.txt");
        assert_eq!(clean_key("/a/sub/../b.txt").unwrap(), "a/b.txt");
        assert_eq!(clean_key("/../a.txt").unwrap(), "a.txt");
    }

    #[test]
    fn clean_key_rejects_empty() {
        for path in ["", "/", "//", "/./", "/a/.."] {
            let err = clean_key(path).unwrap_err();
            assert_eq!(err.code, S3ErrorCode::InvalidArgument, "path {path:?}");
        }
    }

    #[test]
    fn stat_missing_is_no_such_key() {
        let (_dir, view) = view_with("a.txt", b"data");
        let err = stat_object(&view, "missing.txt", None).unwrap_err();
        assert_eq!(err.code, S3ErrorCode::NoSuchKey);
    }

    #[test]
    fn sniffs_known_magic_bytes() {
        // Minimal PNG header, padded so there is a body to rewind over
        let mut png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        png.extend_from_slice(&[0u8; 64]);

        let (_dir, view) = view_with("image.png", &png);
        let mut obj = stat_object(&view, "image.png", None).unwrap();
        assert_eq!(obj.content_type, "image/png");

        // The handle was rewound after sniffing
        let mut body = Vec::new();
        obj.file.read_to_end(&mut body).unwrap();
        assert_eq!(body.len(), png.len());
    }

    #[test]
    fn unknown_content_falls_back() {
        let (_dir, view) = view_with("notes.txt", b"plain text notes");
        let obj = stat_object(&view, "notes.txt", None).unwrap();
        assert_eq!(obj.content_type, "binary/octet-stream");
    }

    #[test]
    fn etag_is_deterministic() {
        let (_dir, view) = view_with("a.txt", b"data");
        let one = stat_object(&view, "a.txt", None).unwrap();
        let two = stat_object(&view, "a.txt", None).unwrap();
        assert_eq!(one.etag, two.etag);
        assert!(!one.etag.is_empty());
    }

    #[test]
    fn range_mid_file() {
        let (_dir, view) = view_with("blob", &vec![7u8; 1000]);
        let mut obj = stat_object(&view, "blob", Some("bytes=100-199")).unwrap();

        let range = obj.range.unwrap();
        assert_eq!(range, ByteRange { start: 100, length: 100 });
        assert_eq!(range.content_range(obj.size), "bytes 100-199/1000");
        assert_eq!(obj.content_length(), 100);

        // The handle is positioned at the range start
        let mut body = Vec::new();
        obj.file.take(range.length).read_to_end(&mut body).unwrap();
        assert_eq!(body.len(), 100);
    }

    #[test]
    fn range_open_ended_and_suffix() {
        let (_dir, view) = view_with("blob", &vec![7u8; 100]);

        let obj = stat_object(&view, "blob", Some("bytes=90-")).unwrap();
        assert_eq!(obj.range.unwrap(), ByteRange { start: 90, length: 10 });

        let obj = stat_object(&view, "blob", Some("bytes=-25")).unwrap();
        assert_eq!(obj.range.unwrap(), ByteRange { start: 75, length: 25 });

        // End beyond the file is clamped
        let obj = stat_object(&view, "blob", Some("bytes=50-500")).unwrap();
        assert_eq!(obj.range.unwrap(), ByteRange { start: 50, length: 50 });
    }

    #[test]
    fn invalid_ranges() {
        let (_dir, view) = view_with("blob", &vec![7u8; 100]);

        for header in
            ["bytes=0-10,20-30", "items=0-10", "bytes=abc-def", "bytes=200-", "bytes=30-20", "bytes=-0"]
        {
            let err = stat_object(&view, "blob", Some(header)).unwrap_err();
            assert_eq!(err.code, S3ErrorCode::InvalidRange, "header {header:?}");
        }
    }

    #[test]
    fn object_policy_context() {
        let (_dir, view) = view_with("a.txt", b"data");
        let obj = stat_object(&view, "a.txt", None).unwrap();

        assert_eq!(obj.get("ls3:ObjectSize").as_deref(), Some("4"));
        assert_eq!(obj.get("ls3:ObjectContentType").as_deref(), Some("binary/octet-stream"));
        assert!(obj.get("ls3:ObjectLastModified").is_some());
        assert_eq!(obj.get("ls3:Other"), None);
    }
}
