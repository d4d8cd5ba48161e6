// Copyright 2025 The LS3 Authors
// SPDX-License-Identifier: Apache-2.0

//! API metrics definitions.
//!
//! Counters are recorded through the `metrics` facade; the binary
//! installs a Prometheus exporter for them. Labels are kept to
//! bounded dimensions only — the operation set is closed, identity
//! names come from operator configuration, and error codes are a
//! closed enum. Unbounded values such as resource paths and client
//! addresses belong in the request logs, never on a counter.

use metrics::{counter, describe_counter};

/// Registers metric descriptions; call once at startup.
pub fn init_metrics() {
    describe_counter!("ls3_api_operations_total", "Total count of policy-permitted API calls");
    describe_counter!("ls3_api_policy_denials_total", "Total count of policy-denied API calls");
    describe_counter!("ls3_api_errors_total", "Total count of API errors by error code");
    describe_counter!(
        "ls3_bytes_transferred_out_total",
        "Number of bytes transferred out by GetObject"
    );
}

/// Records a policy-permitted API call.
pub fn record_operation(action: &str, identity: &str) {
    counter!("ls3_api_operations_total",
        "operation" => action.to_string(),
        "identity" => identity.to_string(),
    )
    .increment(1);
}

/// Records a policy-denied API call.
pub fn record_policy_denial(action: &str, identity: &str) {
    counter!("ls3_api_policy_denials_total",
        "operation" => action.to_string(),
        "identity" => identity.to_string(),
    )
    .increment(1);
}

/// Records an API error response.
pub fn record_api_error(identity: &str, error_code: &str) {
    counter!("ls3_api_errors_total",
        "identity" => identity.to_string(),
        "error_code" => error_code.to_string(),
    )
    .increment(1);
}

/// Records bytes sent by an object download.
pub fn record_bytes_out(identity: &str, bytes: u64) {
    counter!("ls3_bytes_transferred_out_total",
        "identity" => identity.to_string(),
    )
    .increment(bytes);
}
