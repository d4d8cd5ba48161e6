// Copyright 2025 The LS3 Authors
// SPDX-License-Identifier: Apache-2.0

//! AWS authentication: SigV4 verification and identity providers.

pub mod authorization;
pub mod provider;
pub mod sigv4;

pub use authorization::{Authorization, Credential};
pub use provider::{FileProvider, Keyring, MultiProvider, Provider};
pub use sigv4::{SigV4, Signer};
