//! Core types for the ls3 object storage server.
//!
//! This crate holds everything that does not touch the network or the
//! filesystem: the S3 error taxonomy, the wildcard matcher, the path
//! encoder shared by signature canonicalization and listings, the
//! IAM-style policy engine, and the identity records loaded from the
//! credentials file.

pub mod encoding;
pub mod error;
pub mod identity;
pub mod policy;
pub mod wildcard;

pub use error::{Error, Result, S3ErrorCode};
pub use identity::Identity;
pub use policy::{
    evaluate_policy, JoinContext, MapContext, NullContext, PolicyContext, S3Action, Statement,
};
pub use wildcard::wildcard_match;
