// Copyright 2025 The LS3 Authors
// SPDX-License-Identifier: Apache-2.0

//! Query string parsing.
//!
//! The dispatcher routes on raw requests rather than extractor-typed
//! ones, so query parameters are decoded here once and shared between
//! signature canonicalization and the handlers.

use percent_encoding::percent_decode_str;

/// Decoded query parameters in presentation order.
#[derive(Debug, Clone, Default)]
pub struct QueryMap {
    pairs: Vec<(String, String)>,
}

impl QueryMap {
    /// Parses the raw query component of a URL.
    #[must_use]
    pub fn parse(query: Option<&str>) -> Self {
        let Some(query) = query else {
            return QueryMap::default();
        };

        let pairs = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (url_decode(key), url_decode(value))
            })
            .collect();

        QueryMap { pairs }
    }

    /// Returns the first value for the given key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Returns the first value for the given key, or `""`.
    #[must_use]
    pub fn get_or_empty(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    /// Returns true if the key is present, even with an empty value.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    /// All decoded pairs in presentation order.
    #[must_use]
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

/// Decodes a query component: `+` means space, `%XX` is a byte.
/// Undecodable input is returned as presented.
#[must_use]
pub fn url_decode(component: &str) -> String {
    let plus_decoded = component.replace('+', " ");
    match percent_decode_str(&plus_decoded).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => plus_decoded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pairs_in_order() {
        let q = QueryMap::parse(Some("b=2&a=1&a=3"));
        assert_eq!(q.get("a"), Some("1"));
        assert_eq!(q.get("b"), Some("2"));
        assert_eq!(q.pairs().len(), 3);
    }

    #[test]
    fn bare_keys_have_empty_values() {
        let q = QueryMap::parse(Some("location"));
        assert!(q.contains("location"));
        assert_eq!(q.get("location"), Some(""));
        assert!(!q.contains("list-type"));
    }

    #[test]
    fn decodes_percent_and_plus() {
        let q = QueryMap::parse(Some("prefix=a%2Fb+c&delimiter=%2F"));
        assert_eq!(q.get("prefix"), Some("a/b c"));
        assert_eq!(q.get("delimiter"), Some("/"));
    }

    #[test]
    fn none_is_empty() {
        let q = QueryMap::parse(None);
        assert!(q.pairs().is_empty());
    }
}
