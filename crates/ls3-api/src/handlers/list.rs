// Copyright 2025 The LS3 Authors
// SPDX-License-Identifier: Apache-2.0

//! Object listing handlers: ListObjects (v1) and ListObjectsV2.

use axum::response::Response;
use base64::prelude::{Engine, BASE64_STANDARD};
use chrono::SecondsFormat;
use http::StatusCode;
use ls3_core::policy::{MapContext, S3Action};
use ls3_core::{Error, Result, S3ErrorCode};
use ls3_fs::{BucketIterator, Contents};
use serde::Serialize;

use crate::context::RequestContext;
use crate::handlers::RequestEnv;
use crate::query::QueryMap;
use crate::xml::xml_response;

const S3_XMLNS: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

#[derive(Serialize)]
struct ContentsXml {
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "LastModified")]
    last_modified: String,
    #[serde(rename = "ETag")]
    etag: String,
    #[serde(rename = "Size")]
    size: u64,
    #[serde(rename = "StorageClass")]
    storage_class: &'static str,
}

impl From<Contents> for ContentsXml {
    fn from(contents: Contents) -> Self {
        ContentsXml {
            key: contents.key,
            last_modified: contents.last_modified.to_rfc3339_opts(SecondsFormat::Secs, true),
            etag: format!("\"{}\"", contents.etag),
            size: contents.size,
            storage_class: "STANDARD",
        }
    }
}

#[derive(Serialize)]
struct CommonPrefixXml {
    #[serde(rename = "Prefix")]
    prefix: String,
}

#[derive(Serialize)]
#[serde(rename = "ListBucketResult")]
struct ListBucketResultV1 {
    #[serde(rename = "@xmlns")]
    xmlns: &'static str,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Prefix")]
    prefix: String,
    #[serde(rename = "Marker")]
    marker: String,
    #[serde(rename = "NextMarker", skip_serializing_if = "String::is_empty")]
    next_marker: String,
    #[serde(rename = "Delimiter")]
    delimiter: String,
    #[serde(rename = "MaxKeys")]
    max_keys: usize,
    #[serde(rename = "IsTruncated")]
    is_truncated: bool,
    #[serde(rename = "EncodingType")]
    encoding_type: &'static str,
    #[serde(rename = "Contents")]
    contents: Vec<ContentsXml>,
    #[serde(rename = "CommonPrefixes")]
    common_prefixes: Vec<CommonPrefixXml>,
}

#[derive(Serialize)]
#[serde(rename = "ListBucketResult")]
struct ListBucketResultV2 {
    #[serde(rename = "@xmlns")]
    xmlns: &'static str,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Prefix")]
    prefix: String,
    #[serde(rename = "Delimiter")]
    delimiter: String,
    #[serde(rename = "MaxKeys")]
    max_keys: usize,
    #[serde(rename = "IsTruncated")]
    is_truncated: bool,
    #[serde(rename = "EncodingType")]
    encoding_type: &'static str,
    #[serde(rename = "ContinuationToken", skip_serializing_if = "String::is_empty")]
    continuation_token: String,
    #[serde(rename = "NextContinuationToken", skip_serializing_if = "String::is_empty")]
    next_continuation_token: String,
    #[serde(rename = "StartAfter", skip_serializing_if = "String::is_empty")]
    start_after: String,
    #[serde(rename = "Contents")]
    contents: Vec<ContentsXml>,
    #[serde(rename = "CommonPrefixes")]
    common_prefixes: Vec<CommonPrefixXml>,
}

/// Parses and bounds-checks `max-keys`; defaults to 1000.
fn parse_max_keys(query: &QueryMap) -> Result<usize> {
    match query.get("max-keys") {
        None => Ok(1000),
        Some(raw) => raw
            .parse::<i64>()
            .ok()
            .filter(|n| *n >= 0)
            .map(|n| n as usize)
            .ok_or_else(|| Error::new(S3ErrorCode::InvalidArgument, "Invalid value for max-keys")),
    }
}

/// Only `url` encoding may be requested explicitly.
fn check_encoding_type(query: &QueryMap) -> Result<()> {
    match query.get("encoding-type") {
        None | Some("") | Some("url") => Ok(()),
        Some(_) => Err(Error::new(
            S3ErrorCode::InvalidArgument,
            "Only \"url\" is supported for encoding-type",
        )),
    }
}

fn decode_continuation_token(token: &str) -> Result<String> {
    let raw = BASE64_STANDARD.decode(token).map_err(|_| {
        Error::new(S3ErrorCode::InvalidArgument, "You provided an invalid continuation-token.")
    })?;

    String::from_utf8(raw).map_err(|_| {
        Error::new(S3ErrorCode::InvalidArgument, "You provided an invalid continuation-token.")
    })
}

/// The listing parameters made visible to policy conditions.
fn listing_policy_context(prefix: &str, delimiter: &str, max_keys: usize) -> MapContext {
    MapContext::new([
        ("s3:prefix", prefix.to_string()),
        ("s3:delimiter", delimiter.to_string()),
        ("s3:max-keys", max_keys.to_string()),
    ])
}

/// `GET /` with a bucket - ListObjects (v1, marker pagination).
pub async fn list_objects_v1(ctx: &RequestContext, env: &RequestEnv) -> Result<Response> {
    let max_keys = parse_max_keys(&env.query)?;
    check_encoding_type(&env.query)?;

    let prefix = env.query.get_or_empty("prefix").to_string();
    let delimiter = env.query.get_or_empty("delimiter").to_string();
    let marker = env.query.get_or_empty("marker").to_string();

    ctx.check_access(
        S3Action::ListBucket,
        &ctx.bucket,
        &listing_policy_context(&prefix, &delimiter, max_keys),
    )?;

    let mut it = BucketIterator::new(ctx.view()?);
    if !marker.is_empty() {
        it.seek(marker.clone());
    }

    let contents = it.prefix_scan(&prefix, &delimiter, max_keys);

    let result = ListBucketResultV1 {
        xmlns: S3_XMLNS,
        name: ctx.bucket.clone(),
        prefix,
        marker,
        next_marker: if it.is_truncated { it.continue_key.clone() } else { String::new() },
        delimiter,
        max_keys,
        is_truncated: it.is_truncated,
        encoding_type: "url",
        contents: contents.into_iter().map(ContentsXml::from).collect(),
        common_prefixes: it
            .common_prefixes()
            .into_iter()
            .map(|prefix| CommonPrefixXml { prefix })
            .collect(),
    };

    xml_response(StatusCode::OK, &result)
}

/// `GET /?list-type=2` with a bucket - ListObjectsV2.
pub async fn list_objects_v2(ctx: &RequestContext, env: &RequestEnv) -> Result<Response> {
    let max_keys = parse_max_keys(&env.query)?;
    check_encoding_type(&env.query)?;

    let prefix = env.query.get_or_empty("prefix").to_string();
    let delimiter = env.query.get_or_empty("delimiter").to_string();
    let continuation_token = env.query.get_or_empty("continuation-token").to_string();
    let start_after = env.query.get_or_empty("start-after").to_string();

    ctx.check_access(
        S3Action::ListBucket,
        &ctx.bucket,
        &listing_policy_context(&prefix, &delimiter, max_keys),
    )?;

    let mut it = BucketIterator::new(ctx.view()?);

    // Prefer the continuation token over start-after: the token is
    // produced by a previous page and supersedes the client's original
    // starting point
    if !start_after.is_empty() {
        it.seek(start_after.clone());
    }
    if !continuation_token.is_empty() {
        it.seek(decode_continuation_token(&continuation_token)?);
    }

    let contents = it.prefix_scan(&prefix, &delimiter, max_keys);

    let result = ListBucketResultV2 {
        xmlns: S3_XMLNS,
        name: ctx.bucket.clone(),
        prefix,
        delimiter,
        max_keys,
        is_truncated: it.is_truncated,
        encoding_type: "url",
        continuation_token,
        next_continuation_token: if it.is_truncated {
            BASE64_STANDARD.encode(&it.continue_key)
        } else {
            String::new()
        },
        start_after,
        contents: contents.into_iter().map(ContentsXml::from).collect(),
        common_prefixes: it
            .common_prefixes()
            .into_iter()
            .map(|prefix| CommonPrefixXml { prefix })
            .collect(),
    };

    xml_response(StatusCode::OK, &result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::to_xml;
    use chrono::{TimeZone, Utc};

    #[test]
    fn max_keys_parsing() {
        assert_eq!(parse_max_keys(&QueryMap::parse(None)).unwrap(), 1000);
        assert_eq!(parse_max_keys(&QueryMap::parse(Some("max-keys=25"))).unwrap(), 25);
        assert_eq!(parse_max_keys(&QueryMap::parse(Some("max-keys=0"))).unwrap(), 0);

        for bad in ["max-keys=-1", "max-keys=ten", "max-keys="] {
            let err = parse_max_keys(&QueryMap::parse(Some(bad))).unwrap_err();
            assert_eq!(err.code, S3ErrorCode::InvalidArgument, "query {bad:?}");
        }
    }

    #[test]
    fn encoding_type_validation() {
        assert!(check_encoding_type(&QueryMap::parse(Some("encoding-type=url"))).is_ok());
        assert!(check_encoding_type(&QueryMap::parse(None)).is_ok());

        let err = check_encoding_type(&QueryMap::parse(Some("encoding-type=base64"))).unwrap_err();
        assert_eq!(err.code, S3ErrorCode::InvalidArgument);
    }

    #[test]
    fn continuation_token_decoding() {
        let token = BASE64_STANDARD.encode("a/c.txt");
        assert_eq!(decode_continuation_token(&token).unwrap(), "a/c.txt");

        let err = decode_continuation_token("%%%").unwrap_err();
        assert_eq!(err.code, S3ErrorCode::InvalidArgument);
    }

    #[test]
    fn v2_xml_shape() {
        let result = ListBucketResultV2 {
            xmlns: S3_XMLNS,
            name: "bucket".to_string(),
            prefix: "a/".to_string(),
            delimiter: "/".to_string(),
            max_keys: 1000,
            is_truncated: false,
            encoding_type: "url",
            continuation_token: String::new(),
            next_continuation_token: String::new(),
            start_after: String::new(),
            contents: vec![ContentsXml::from(Contents {
                key: "a/b.txt".to_string(),
                size: 3,
                last_modified: Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap(),
                etag: "3-17e228af800".to_string(),
            })],
            common_prefixes: vec![CommonPrefixXml { prefix: "a/sub/".to_string() }],
        };

        let xml = to_xml(&result).unwrap();
        assert!(xml.contains("<ListBucketResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">"));
        assert!(xml.contains("<Key>a/b.txt</Key>"));
        assert!(xml.contains("<LastModified>2022-01-01T00:00:00Z</LastModified>"));
        assert!(xml.contains("<Prefix>a/sub/</Prefix>"));
        assert!(xml.contains("<IsTruncated>false</IsTruncated>"));
        // Empty pagination fields are omitted entirely
        assert!(!xml.contains("ContinuationToken"));
        assert!(!xml.contains("StartAfter"));
    }
}
