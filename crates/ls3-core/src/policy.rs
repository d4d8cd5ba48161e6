//! IAM-style policy types and evaluation.
//!
//! Identities and the server itself carry lists of [`Statement`]s.
//! A request is allowed iff at least one non-deny statement matches it
//! and no deny statement matches it; the default is to deny.

use std::collections::HashMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::wildcard::wildcard_match;

/// S3 actions served by this implementation.
///
/// Policy statements match actions as wildcard strings, so this enum
/// exists for the benefit of handlers, not the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum S3Action {
    /// s3:GetObject
    GetObject,
    /// s3:ListAllMyBuckets
    ListAllMyBuckets,
    /// s3:ListBucket
    ListBucket,
    /// s3:GetBucketLocation
    GetBucketLocation,
}

impl S3Action {
    /// Returns the action string (e.g., "s3:GetObject").
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GetObject => "s3:GetObject",
            Self::ListAllMyBuckets => "s3:ListAllMyBuckets",
            Self::ListBucket => "s3:ListBucket",
            Self::GetBucketLocation => "s3:GetBucketLocation",
        }
    }
}

impl std::fmt::Display for S3Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Either a single string or an array of strings.
///
/// `Action`, `Resource`, and condition values may all be written as a
/// scalar or a list in policy JSON; both forms decode to this type and
/// round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrArray {
    /// A single string.
    Single(String),
    /// An array of strings.
    Array(Vec<String>),
}

impl Default for StringOrArray {
    fn default() -> Self {
        StringOrArray::Array(Vec::new())
    }
}

impl StringOrArray {
    /// Returns an iterator over the values.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        match self {
            StringOrArray::Single(s) => std::slice::from_ref(s).iter(),
            StringOrArray::Array(v) => v.iter(),
        }
        .map(String::as_str)
    }

    /// Returns true if there are no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            StringOrArray::Single(_) => false,
            StringOrArray::Array(v) => v.is_empty(),
        }
    }

    /// Returns true if any value, treated as a wildcard rule, matches
    /// the given subject.
    #[must_use]
    pub fn matches(&self, subject: &str) -> bool {
        self.iter().any(|rule| wildcard_match(rule, subject))
    }
}

impl From<&str> for StringOrArray {
    fn from(s: &str) -> Self {
        StringOrArray::Single(s.to_string())
    }
}

/// Condition block: operator name to condition key to expected values.
pub type Conditions = HashMap<String, HashMap<String, StringOrArray>>;

/// A single policy statement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Statement {
    /// Marks this statement as an explicit deny.
    pub deny: bool,
    /// One or more actions this statement applies to.
    pub action: StringOrArray,
    /// One or more resources this statement applies to.
    pub resource: StringOrArray,
    /// Conditions on when this statement applies.
    #[serde(skip_serializing_if = "Conditions::is_empty")]
    pub condition: Conditions,
}

impl Statement {
    /// A statement allowing every action on every resource.
    #[must_use]
    pub fn allow_all() -> Self {
        Statement { deny: false, action: "*".into(), resource: "*".into(), condition: Conditions::new() }
    }

    /// A statement denying every action on every resource.
    #[must_use]
    pub fn deny_all() -> Self {
        Statement { deny: true, ..Statement::allow_all() }
    }

    /// Returns true if the given concrete action and resource match
    /// this statement.
    ///
    /// `resource` may be empty, in which case the statement applies as
    /// long as the action matches and the conditions hold.
    #[must_use]
    pub fn applies_to(&self, action: &str, resource: &str, ctx: &dyn PolicyContext) -> bool {
        if !self.action.matches(action) {
            return false;
        }

        if !resource.is_empty() && !self.resource.matches(resource) {
            return false;
        }

        matches_conditions(&self.condition, ctx)
    }
}

/// A key-to-string lookup used as input to condition evaluation.
///
/// Contexts compose: [`JoinContext`] consults a child first and falls
/// back to a parent, producing a new value without mutating either.
pub trait PolicyContext {
    /// Returns the value for the given context key, or `None` if the
    /// key is absent. Unknown keys are absent, never empty strings.
    fn get(&self, key: &str) -> Option<String>;
}

/// A [`PolicyContext`] backed by a map.
#[derive(Debug, Clone, Default)]
pub struct MapContext(HashMap<String, String>);

impl MapContext {
    /// Builds a context from key/value pairs.
    #[must_use]
    pub fn new<K: Into<String>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        MapContext(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl PolicyContext for MapContext {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

/// A [`PolicyContext`] that never returns a value.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullContext;

impl PolicyContext for NullContext {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }
}

/// Joins two contexts, consulting `child` before `parent`.
pub struct JoinContext<'a> {
    parent: &'a dyn PolicyContext,
    child: &'a dyn PolicyContext,
}

impl<'a> JoinContext<'a> {
    /// Creates a joined context where `child` overrides `parent`.
    #[must_use]
    pub fn new(parent: &'a dyn PolicyContext, child: &'a dyn PolicyContext) -> Self {
        JoinContext { parent, child }
    }
}

impl PolicyContext for JoinContext<'_> {
    fn get(&self, key: &str) -> Option<String> {
        self.child.get(key).or_else(|| self.parent.get(key))
    }
}

/// Evaluates a list of statements for the given action and resource.
///
/// Returns `Ok(())` iff at least one non-deny statement matches and no
/// deny statement matches; otherwise an `AccessDenied` error. A
/// matching deny ends evaluation immediately.
pub fn evaluate_policy(
    action: &str,
    resource: &str,
    statements: &[Statement],
    ctx: &dyn PolicyContext,
) -> Result<(), Error> {
    let mut success = false;

    for statement in statements {
        // Once allowed, only an explicit deny can change the outcome
        if success && !statement.deny {
            continue;
        }

        if statement.applies_to(action, resource, ctx) {
            if statement.deny {
                success = false;
                break;
            }

            success = true;
        }
    }

    if success {
        Ok(())
    } else {
        Err(Error::access_denied())
    }
}

fn matches_conditions(conditions: &Conditions, ctx: &dyn PolicyContext) -> bool {
    // Unconditional statement
    if conditions.is_empty() {
        return true;
    }

    conditions.iter().all(|(operator, keys)| {
        keys.iter().all(|(key, values)| evaluate_operator_key(operator, key, values, ctx))
    })
}

fn evaluate_operator_key(
    operator: &str,
    key: &str,
    values: &StringOrArray,
    ctx: &dyn PolicyContext,
) -> bool {
    // A key absent from the context can never satisfy a condition
    let Some(expect) = ctx.get(key) else {
        return false;
    };

    match operator {
        "StringEquals" => values.iter().any(|v| v == expect),
        "StringNotEquals" => !values.iter().any(|v| v == expect),
        "StringEqualsIgnoreCase" => values.iter().any(|v| v.eq_ignore_ascii_case(&expect)),
        "StringNotEqualsIgnoreCase" => !values.iter().any(|v| v.eq_ignore_ascii_case(&expect)),
        "StringLike" => values.iter().any(|v| wildcard_match(v, &expect)),
        "StringNotLike" => !values.iter().any(|v| wildcard_match(v, &expect)),
        "IpAddress" => eval_ip_values(&expect, values, true),
        "NotIpAddress" => eval_ip_values(&expect, values, false),
        "Bool" => {
            let expect_bool = match expect.as_str() {
                "true" => true,
                "false" => false,
                // The context value is not a valid boolean
                _ => return false,
            };

            match values.iter().next() {
                Some("true") => expect_bool,
                Some("false") => !expect_bool,
                _ => false,
            }
        }
        // Unknown operator
        _ => false,
    }
}

/// Evaluates `IpAddress` (`want_contained = true`) or `NotIpAddress`
/// (`want_contained = false`).
///
/// Any unparseable condition value fails the whole operator, as does a
/// context IP that is invalid or unspecified.
fn eval_ip_values(expect: &str, values: &StringOrArray, want_contained: bool) -> bool {
    let Ok(ip) = expect.parse::<IpAddr>() else {
        return false;
    };
    if ip.is_unspecified() {
        return false;
    }

    for value in values.iter() {
        let Some((network, prefix)) = ip_or_cidr(value) else {
            return false;
        };

        if cidr_contains(network, prefix, ip) {
            return want_contained;
        }
    }

    !want_contained
}

/// Parses a value as an IP address or `IP/CIDR` range. A bare IP is
/// treated as `/32` (v4) or `/128` (v6). Returns `None` when the value
/// is neither.
fn ip_or_cidr(value: &str) -> Option<(IpAddr, u8)> {
    if let Some((network, len)) = value.split_once('/') {
        let network: IpAddr = network.parse().ok()?;
        let len: u8 = len.parse().ok()?;

        let max = match network {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if len > max {
            return None;
        }

        return Some((network, len));
    }

    let ip: IpAddr = value.parse().ok()?;
    let prefix = match ip {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    };

    Some((ip, prefix))
}

fn cidr_contains(network: IpAddr, prefix: u8, ip: IpAddr) -> bool {
    match (network, ip) {
        (IpAddr::V4(net), IpAddr::V4(ip)) => {
            let mask = if prefix == 0 { 0u32 } else { !0u32 << (32 - u32::from(prefix)) };
            (u32::from(ip) & mask) == (u32::from(net) & mask)
        }
        (IpAddr::V6(net), IpAddr::V6(ip)) => {
            let mask = if prefix == 0 { 0u128 } else { !0u128 << (128 - u32::from(prefix)) };
            (u128::from(ip) & mask) == (u128::from(net) & mask)
        }
        // Mismatched IP versions
        _ => false,
    }
}
