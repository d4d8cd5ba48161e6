//! RFC 3986 percent-encoding as used by S3.
//!
//! The same encoder backs both SigV4 canonical URIs and the object
//! keys emitted by list responses, so the two can never disagree on
//! how a key is spelled.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters that are NOT percent-encoded in object paths.
///
/// Unreserved characters per RFC 3986 §2.3 (`A-Z a-z 0-9 - _ . ~`)
/// plus the path separator `/`.
pub const PATH_ENCODE_SET: &AsciiSet =
    &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~').remove(b'/');

/// Characters that are NOT percent-encoded in query components.
///
/// Same as [`PATH_ENCODE_SET`] but `/` is encoded as well.
pub const QUERY_ENCODE_SET: &AsciiSet =
    &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Percent-encodes a URL path, leaving `/` and unreserved characters
/// intact. Multi-byte characters are encoded byte-by-byte with
/// uppercase hex digits.
#[must_use]
pub fn encode_path(path: &str) -> String {
    utf8_percent_encode(path, PATH_ENCODE_SET).to_string()
}

/// Percent-encodes a single query key or value.
#[must_use]
pub fn encode_query_component(component: &str) -> String {
    utf8_percent_encode(component, QUERY_ENCODE_SET).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreserved_passes_through() {
        assert_eq!(encode_path("bucket/Key-1_2.3~"), "bucket/Key-1_2.3~");
    }

    #[test]
    fn reserved_is_escaped_uppercase() {
        assert_eq!(encode_path("a b"), "a%20b");
        assert_eq!(encode_path("a+b"), "a%2Bb");
        assert_eq!(encode_path("key=value&x"), "key%3Dvalue%26x");
    }

    #[test]
    fn multi_byte_runes_escape_per_byte() {
        assert_eq!(encode_path("café"), "caf%C3%A9");
        assert_eq!(encode_path("日本"), "%E6%97%A5%E6%9C%AC");
    }

    #[test]
    fn query_component_escapes_slash() {
        assert_eq!(encode_query_component("a/b"), "a%2Fb");
        assert_eq!(encode_path("a/b"), "a/b");
    }
}
