// Copyright 2025 The LS3 Authors
// SPDX-License-Identifier: Apache-2.0

//! Object handlers: GetObject and HeadObject, including range and
//! conditional request evaluation.

use axum::body::Body;
use axum::response::Response;
use chrono::{DateTime, Utc};
use http::{HeaderMap, StatusCode};
use ls3_core::policy::{NullContext, PolicyContext, S3Action};
use ls3_core::{Error, Result, S3ErrorCode};
use ls3_fs::{clean_key, stat_object, Object};
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;

use crate::context::RequestContext;
use crate::handlers::{http_date, RequestEnv};
use crate::metrics;

/// Query parameters that override response headers on GetObject.
const RESPONSE_HEADER_OVERRIDES: &[(&str, &str)] = &[
    ("response-content-language", "Content-Language"),
    ("response-expires", "Expires"),
    ("response-cache-control", "Cache-Control"),
    ("response-content-disposition", "Content-Disposition"),
    ("response-content-encoding", "Content-Encoding"),
];

/// Evaluates an ETag precondition header against the object's tag.
///
/// Header values may be a comma-separated list; `*` matches any tag,
/// and surrounding quotes are ignored.
fn etag_condition_matches(header_value: &str, etag: &str) -> bool {
    header_value
        .split(',')
        .map(|candidate| candidate.trim().trim_matches('"'))
        .any(|candidate| candidate == "*" || candidate == etag)
}

fn parse_condition_date(value: &str, header: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|_| {
            Error::new(S3ErrorCode::InvalidArgument, format!("Invalid value for {header}."))
        })
}

/// Evaluates the conditional request headers against the object.
///
/// Returns the status to reply with when a condition short-circuits
/// the request, or `None` when the request should proceed. Precedence
/// follows RFC 7232: `If-Match` overrides `If-Modified-Since` and
/// `If-None-Match` overrides `If-Unmodified-Since`. HTTP dates carry
/// second precision, so comparisons truncate to seconds.
pub fn check_conditional(
    headers: &HeaderMap,
    etag: &str,
    last_modified: DateTime<Utc>,
) -> Result<Option<StatusCode>> {
    let if_match = headers
        .get("if-match")
        .and_then(|v| v.to_str().ok())
        .map(|v| etag_condition_matches(v, etag));

    let if_none_match = headers
        .get("if-none-match")
        .and_then(|v| v.to_str().ok())
        .map(|v| !etag_condition_matches(v, etag));

    if let Some(value) = headers.get("if-modified-since").and_then(|v| v.to_str().ok()) {
        let since = parse_condition_date(value, "If-Modified-Since")?;
        let modified_since = last_modified.timestamp() > since.timestamp();

        if if_match == Some(true) {
            // If-Match passed and takes precedence
        } else if !modified_since {
            return Ok(Some(StatusCode::NOT_MODIFIED));
        }
    }

    if let Some(value) = headers.get("if-unmodified-since").and_then(|v| v.to_str().ok()) {
        let since = parse_condition_date(value, "If-Unmodified-Since")?;
        let unmodified = last_modified.timestamp() < since.timestamp();

        if if_none_match == Some(false) {
            // A matching If-None-Match takes precedence
            return Ok(Some(StatusCode::NOT_MODIFIED));
        }
        if !unmodified {
            return Ok(Some(StatusCode::PRECONDITION_FAILED));
        }
    }

    if if_match == Some(false) {
        return Ok(Some(StatusCode::PRECONDITION_FAILED));
    }

    if if_none_match == Some(false) {
        return Ok(Some(StatusCode::NOT_MODIFIED));
    }

    Ok(None)
}

/// Stats the object and runs the access check in the order that lets
/// object attributes participate in policy conditions.
///
/// The stat result is computed first so conditions like
/// `ls3:ObjectSize` can be evaluated; a policy denial is still
/// reported over any stat error. The real stat error is revealed only
/// to callers allowed to list the bucket.
fn stat_checked(ctx: &RequestContext, env: &RequestEnv, key: &str) -> Result<Object> {
    let range_header = {
        let value = env.header("range");
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    };

    let stat_result = stat_object(ctx.view()?, key, range_header);
    let resource = format!("{}/{key}", ctx.bucket);

    let null = NullContext;
    let object_vars: &dyn PolicyContext = match &stat_result {
        Ok(object) => object,
        Err(_) => &null,
    };

    ctx.check_access(S3Action::GetObject, &resource, object_vars)?;

    stat_result.map_err(|err| {
        // Only callers that could list the bucket learn what actually
        // went wrong with the object
        match ctx.check_access(S3Action::ListBucket, &ctx.bucket, &NullContext) {
            Ok(()) => err,
            Err(denied) => denied,
        }
    })
}

/// `GET /{key}` - stream an object.
pub async fn get_object(ctx: &RequestContext, env: &RequestEnv) -> Result<Response> {
    let key = clean_key(&env.path)?;
    let object = stat_checked(ctx, env, &key)?;

    let quoted_etag = format!("\"{}\"", object.etag);

    if let Some(status) = check_conditional(&env.parts.headers, &object.etag, object.last_modified)?
    {
        return Response::builder()
            .status(status)
            .header("Last-Modified", http_date(&object.last_modified))
            .header("ETag", &quoted_etag)
            .body(Body::empty())
            .map_err(|err| Error::new(S3ErrorCode::InternalError, err.to_string()));
    }

    let content_length = object.content_length();

    let mut response = Response::builder()
        .status(if object.range.is_some() { StatusCode::PARTIAL_CONTENT } else { StatusCode::OK })
        .header("Last-Modified", http_date(&object.last_modified))
        .header("ETag", &quoted_etag)
        .header("Content-Length", content_length.to_string())
        .header("Accept-Ranges", "bytes");

    if let Some(range) = object.range {
        response = response.header("Content-Range", range.content_range(object.size));
    }

    // Requested response header overrides
    let content_type = match env.query.get("response-content-type") {
        Some(requested) if !requested.is_empty() => requested,
        _ => &object.content_type,
    };
    response = response.header("Content-Type", content_type);

    for (query_key, header_name) in RESPONSE_HEADER_OVERRIDES {
        if let Some(value) = env.query.get(query_key) {
            if !value.is_empty() {
                response = response.header(*header_name, value);
            }
        }
    }

    metrics::record_bytes_out(&ctx.identity.name, content_length);

    // Stream the body from the already-positioned file handle. Closing
    // happens when the stream is dropped, whether the copy completes
    // or the client goes away.
    let file = tokio::fs::File::from_std(object.file);
    let body = Body::from_stream(ReaderStream::new(file.take(content_length)));

    response.body(body).map_err(|err| Error::new(S3ErrorCode::InternalError, err.to_string()))
}

/// `HEAD /{key}` - object metadata without a body.
///
/// Errors surface as bare status codes; the dispatcher strips bodies
/// from failing HEAD responses.
pub async fn head_object(ctx: &RequestContext, env: &RequestEnv) -> Result<Response> {
    let key = clean_key(&env.path)?;
    let object = stat_checked(ctx, env, &key)?;

    let quoted_etag = format!("\"{}\"", object.etag);

    if let Some(status) = check_conditional(&env.parts.headers, &object.etag, object.last_modified)?
    {
        return Response::builder()
            .status(status)
            .header("Last-Modified", http_date(&object.last_modified))
            .header("ETag", &quoted_etag)
            .body(Body::empty())
            .map_err(|err| Error::new(S3ErrorCode::InternalError, err.to_string()));
    }

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header("Last-Modified", http_date(&object.last_modified))
        .header("ETag", &quoted_etag)
        .header("Content-Length", object.content_length().to_string())
        .header("Content-Type", &object.content_type);

    if object.range.is_some() {
        response = response.header("Accept-Ranges", "bytes");
    }

    response
        .body(Body::empty())
        .map_err(|err| Error::new(S3ErrorCode::InternalError, err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                http::header::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                value.parse().unwrap(),
            );
        }
        map
    }

    fn mtime() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2013, 5, 24, 0, 0, 0).unwrap()
    }

    const ETAG: &str = "5-13eeb8b8a08";

    #[test]
    fn no_conditions_proceeds() {
        let status = check_conditional(&HeaderMap::new(), ETAG, mtime()).unwrap();
        assert_eq!(status, None);
    }

    #[test]
    fn if_match_mismatch_fails() {
        let h = headers(&[("if-match", "\"other\"")]);
        let status = check_conditional(&h, ETAG, mtime()).unwrap();
        assert_eq!(status, Some(StatusCode::PRECONDITION_FAILED));
    }

    #[test]
    fn if_match_accepts_exact_and_wildcard() {
        for value in [format!("\"{ETAG}\""), ETAG.to_string(), "*".to_string()] {
            let h = headers(&[("if-match", &value)]);
            assert_eq!(check_conditional(&h, ETAG, mtime()).unwrap(), None, "value {value:?}");
        }
    }

    #[test]
    fn if_none_match_match_is_not_modified() {
        let h = headers(&[("if-none-match", &format!("\"{ETAG}\""))]);
        let status = check_conditional(&h, ETAG, mtime()).unwrap();
        assert_eq!(status, Some(StatusCode::NOT_MODIFIED));
    }

    #[test]
    fn if_modified_since_in_the_past_proceeds() {
        let h = headers(&[("if-modified-since", "Thu, 23 May 2013 00:00:00 GMT")]);
        assert_eq!(check_conditional(&h, ETAG, mtime()).unwrap(), None);
    }

    #[test]
    fn if_modified_since_at_or_after_mtime_is_not_modified() {
        for value in ["Fri, 24 May 2013 00:00:00 GMT", "Sat, 25 May 2013 00:00:00 GMT"] {
            let h = headers(&[("if-modified-since", value)]);
            let status = check_conditional(&h, ETAG, mtime()).unwrap();
            assert_eq!(status, Some(StatusCode::NOT_MODIFIED), "value {value:?}");
        }
    }

    #[test]
    fn if_match_overrides_if_modified_since() {
        let h = headers(&[
            ("if-match", "*"),
            ("if-modified-since", "Sat, 25 May 2013 00:00:00 GMT"),
        ]);
        assert_eq!(check_conditional(&h, ETAG, mtime()).unwrap(), None);
    }

    #[test]
    fn if_unmodified_since_before_mtime_fails() {
        let h = headers(&[("if-unmodified-since", "Thu, 23 May 2013 00:00:00 GMT")]);
        let status = check_conditional(&h, ETAG, mtime()).unwrap();
        assert_eq!(status, Some(StatusCode::PRECONDITION_FAILED));
    }

    #[test]
    fn if_unmodified_since_after_mtime_proceeds() {
        let h = headers(&[("if-unmodified-since", "Sat, 25 May 2013 00:00:00 GMT")]);
        assert_eq!(check_conditional(&h, ETAG, mtime()).unwrap(), None);
    }

    #[test]
    fn if_none_match_overrides_if_unmodified_since() {
        let h = headers(&[
            ("if-none-match", ETAG),
            ("if-unmodified-since", "Thu, 23 May 2013 00:00:00 GMT"),
        ]);
        let status = check_conditional(&h, ETAG, mtime()).unwrap();
        assert_eq!(status, Some(StatusCode::NOT_MODIFIED));
    }

    #[test]
    fn invalid_condition_dates_are_rejected() {
        for header in ["if-modified-since", "if-unmodified-since"] {
            let h = headers(&[(header, "not a date")]);
            let err = check_conditional(&h, ETAG, mtime()).unwrap_err();
            assert_eq!(err.code, S3ErrorCode::InvalidArgument, "header {header:?}");
        }
    }
}
