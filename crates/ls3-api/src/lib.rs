// Copyright 2025 The LS3 Authors
// SPDX-License-Identifier: Apache-2.0

//! HTTP surface of the ls3 object storage server.
//!
//! Requests are authenticated with AWS Signature Version 4, authorized
//! against per-identity and global policies, and served out of a
//! sandboxed filesystem view. The dispatcher wires those stages
//! together and routes to one of the five read operations.

pub mod auth;
pub mod client_ip;
pub mod context;
pub mod dispatcher;
pub mod handlers;
pub mod host;
pub mod metrics;
pub mod query;
pub mod xml;

pub use auth::provider::{FileProvider, Keyring, MultiProvider, Provider};
pub use auth::sigv4::{SigV4, Signer};
pub use dispatcher::{create_router, ServerState};
