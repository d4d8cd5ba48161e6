// Copyright 2025 The LS3 Authors
// SPDX-License-Identifier: Apache-2.0

//! Bucket resolution from the request host and path.

use ls3_core::{Error, Result, S3ErrorCode};

/// The bucket a request addresses and the URL path left over once the
/// bucket component is removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBucket {
    /// The addressed bucket, if any.
    pub bucket: Option<String>,
    /// The remaining URL path, always beginning with `/`.
    pub path: String,
}

fn from_path(path: &str) -> ResolvedBucket {
    let trimmed = path.trim_start_matches('/');
    let (first, rest) = trimmed.split_once('/').unwrap_or((trimmed, ""));

    let bucket = first.trim_matches('/');
    if bucket.is_empty() {
        return ResolvedBucket { bucket: None, path: path.to_string() };
    }

    ResolvedBucket {
        bucket: Some(bucket.to_string()),
        path: format!("/{}", rest.trim_start_matches('/')),
    }
}

/// Strips an optional `:port` suffix from a host.
fn host_without_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

/// Resolves the addressed bucket per the server's addressing mode.
///
/// With no base domain configured the bucket is the first path
/// segment. With a base domain, a host of exactly one extra leading
/// component is host-style addressing; a host equal to the domain
/// falls back to path-style; anything else is an unrecognized
/// hostname.
pub fn bucket_from_request(host: &str, path: &str, domain: &[String]) -> Result<ResolvedBucket> {
    if domain.is_empty() {
        return Ok(from_path(path));
    }

    let host = host_without_port(host);
    let host_components: Vec<&str> = host.split('.').collect();

    if host_components.len() < domain.len() {
        return Err(Error::new(S3ErrorCode::InvalidRequest, "Invalid request hostname."));
    }

    // The request host must end with the configured base domain
    let offset = host_components.len() - domain.len();
    if host_components[offset..] != domain.iter().map(String::as_str).collect::<Vec<_>>()[..] {
        return Err(Error::new(
            S3ErrorCode::InvalidRequest,
            "The requested hostname is not recognised.",
        ));
    }

    match offset {
        // The base domain itself: path-style addressing
        0 => Ok(from_path(path)),
        // One leading component: host-style addressing
        1 => Ok(ResolvedBucket {
            bucket: Some(host_components[0].to_string()),
            path: path.to_string(),
        }),
        _ => Err(Error::new(S3ErrorCode::InvalidRequest, "Invalid request hostname.")),
    }
}

/// Splits a configured base domain into its components. `None` or an
/// empty string mean path-style addressing only.
#[must_use]
pub fn domain_components(domain: Option<&str>) -> Vec<String> {
    domain
        .unwrap_or("")
        .split('.')
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn path_style() {
        let resolved = bucket_from_request("anything", "/bucket/", &[]).unwrap();
        assert_eq!(resolved.bucket.as_deref(), Some("bucket"));
        assert_eq!(resolved.path, "/");

        let resolved = bucket_from_request("anything", "/bucket/key/nested", &[]).unwrap();
        assert_eq!(resolved.bucket.as_deref(), Some("bucket"));
        assert_eq!(resolved.path, "/key/nested");

        let resolved = bucket_from_request("anything", "/", &[]).unwrap();
        assert_eq!(resolved.bucket, None);
        assert_eq!(resolved.path, "/");
    }

    #[test]
    fn host_style() {
        let resolved = bucket_from_request("bucket.domain:80", "/", &domain(&["domain"])).unwrap();
        assert_eq!(resolved.bucket.as_deref(), Some("bucket"));
        assert_eq!(resolved.path, "/");

        let resolved =
            bucket_from_request("bucket.domain.net:80", "/key", &domain(&["domain", "net"]))
                .unwrap();
        assert_eq!(resolved.bucket.as_deref(), Some("bucket"));
        assert_eq!(resolved.path, "/key");
    }

    #[test]
    fn base_domain_falls_back_to_path_style() {
        let resolved = bucket_from_request("domain:80", "/bucket/", &domain(&["domain"])).unwrap();
        assert_eq!(resolved.bucket.as_deref(), Some("bucket"));

        let resolved = bucket_from_request("domain:80", "/", &domain(&["domain"])).unwrap();
        assert_eq!(resolved.bucket, None);
    }

    #[test]
    fn unrecognized_hosts_are_rejected() {
        for (host, base) in [
            ("incorrect:80", domain(&["domain"])),
            ("domain:80", domain(&["domain", "net"])),
            ("base.domain:80", domain(&["domain", "net"])),
            ("a.b.domain", domain(&["domain"])),
        ] {
            let err = bucket_from_request(host, "/", &base).unwrap_err();
            assert_eq!(err.code, S3ErrorCode::InvalidRequest, "host {host:?}");
        }
    }

    #[test]
    fn domain_component_parsing() {
        assert_eq!(domain_components(None), Vec::<String>::new());
        assert_eq!(domain_components(Some("")), Vec::<String>::new());
        assert_eq!(domain_components(Some("s3.example.com")), domain(&["s3", "example", "com"]));
    }
}
