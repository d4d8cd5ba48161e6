// Copyright 2025 The LS3 Authors
// SPDX-License-Identifier: Apache-2.0

//! Operation handlers for the read API.

pub mod bucket;
pub mod list;
pub mod object;

use chrono::{DateTime, Utc};
use http::request::Parts;

use crate::query::QueryMap;

/// The region every bucket pretends to live in.
pub const AMZ_REGION: &str = "us-east-1";

/// The request pieces handlers work from.
///
/// `path` is the URL path with the bucket component already removed by
/// addressing resolution, so object keys derive from it directly.
pub struct RequestEnv {
    /// Method, URI, and headers of the original request.
    pub parts: Parts,
    /// Decoded query parameters.
    pub query: QueryMap,
    /// Bucket-relative URL path, always beginning with `/`.
    pub path: String,
}

impl RequestEnv {
    /// Returns a header value as a string, or `""` when absent.
    #[must_use]
    pub fn header(&self, name: &str) -> &str {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or("")
    }
}

/// Formats a timestamp as an HTTP date (RFC 7231).
#[must_use]
pub fn http_date(at: &DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
