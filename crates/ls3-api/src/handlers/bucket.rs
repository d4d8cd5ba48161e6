// Copyright 2025 The LS3 Authors
// SPDX-License-Identifier: Apache-2.0

//! Service and bucket level handlers: ListBuckets, HeadBucket,
//! GetBucketLocation.

use axum::body::Body;
use axum::response::Response;
use http::StatusCode;
use ls3_core::policy::{NullContext, S3Action};
use ls3_core::{Error, Result, S3ErrorCode};
use ls3_fs::BucketFs;
use serde::Serialize;

use crate::context::RequestContext;
use crate::handlers::AMZ_REGION;
use crate::xml::xml_response;

/// Constant creation date reported for every bucket. The filesystem
/// has no such notion, but some API consumers cannot handle a missing
/// date.
const BUCKET_CREATION_DATE: &str = "2022-01-01T00:00:00Z";

#[derive(Serialize)]
struct BucketXml {
    #[serde(rename = "CreationDate")]
    creation_date: &'static str,
    #[serde(rename = "Name")]
    name: String,
}

#[derive(Serialize)]
struct BucketsXml {
    #[serde(rename = "Bucket")]
    bucket: Vec<BucketXml>,
}

#[derive(Serialize)]
#[serde(rename = "ListAllMyBucketsResult")]
struct ListAllMyBucketsResult {
    #[serde(rename = "Buckets")]
    buckets: BucketsXml,
}

/// `GET /` - list the buckets this server exposes.
pub async fn list_buckets(buckets: &BucketFs, ctx: &RequestContext) -> Result<Response> {
    ctx.check_access(S3Action::ListAllMyBuckets, "", &NullContext)?;

    let names = buckets.list_buckets()?;

    let result = ListAllMyBucketsResult {
        buckets: BucketsXml {
            bucket: names
                .into_iter()
                .map(|name| BucketXml { creation_date: BUCKET_CREATION_DATE, name })
                .collect(),
        },
    };

    xml_response(StatusCode::OK, &result)
}

/// `HEAD /` with a bucket - probe that the bucket exists and is
/// accessible.
pub async fn head_bucket(ctx: &RequestContext) -> Result<Response> {
    ctx.check_access(S3Action::ListBucket, &ctx.bucket, &NullContext)?;

    Response::builder()
        .status(StatusCode::OK)
        .header("x-amz-bucket-region", AMZ_REGION)
        .body(Body::empty())
        .map_err(|err| Error::new(S3ErrorCode::InternalError, err.to_string()))
}

#[derive(Serialize)]
#[serde(rename = "LocationConstraint")]
struct LocationConstraint {
    #[serde(rename = "$text", skip_serializing_if = "Option::is_none")]
    value: Option<String>,
}

/// `GET /?location` - report the bucket region.
///
/// An empty constraint means `us-east-1`.
pub async fn get_bucket_location(ctx: &RequestContext) -> Result<Response> {
    ctx.check_access(S3Action::GetBucketLocation, &ctx.bucket, &NullContext)?;

    xml_response(StatusCode::OK, &LocationConstraint { value: None })
}
