//! Command line interface definition.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Lightweight read-only S3-compatible object storage server.
#[derive(Parser)]
#[command(name = "ls3")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// HTTP listen address.
    #[arg(long, env = "LISTEN_ADDRESS", default_value = "127.0.0.1:9000")]
    pub listen_addr: SocketAddr,

    /// Enable host-style bucket addressing on this domain.
    #[arg(long, env = "DOMAIN")]
    pub domain: Option<String>,

    /// Treat each requested bucket as a subdirectory of the root
    /// directory.
    #[arg(long, env = "MULTI_BUCKET")]
    pub multi_bucket: bool,

    /// Set the access key id. Generated if not provided.
    #[arg(long, env = "ACCESS_KEY_ID")]
    pub access_key_id: Option<String>,

    /// Set the secret access key. If provided, the access key id must
    /// also be provided.
    #[arg(long, env = "SECRET_ACCESS_KEY")]
    pub secret_access_key: Option<String>,

    /// Read additional identities from this JSON credentials file.
    #[arg(long, env = "CREDENTIALS_FILE")]
    pub credentials_file: Option<PathBuf>,

    /// How long the credentials file is cached, in seconds.
    #[arg(long, env = "CREDENTIALS_CACHE_SECS", default_value = "60")]
    pub credentials_cache_secs: u64,

    /// Read the global server access policy from this file.
    #[arg(long, env = "GLOBAL_POLICY")]
    pub global_policy: Option<PathBuf>,

    /// Trust X-Real-Ip and X-Forwarded-Proto from a fronting proxy.
    #[arg(long, env = "TRUST_PROXY_HEADERS")]
    pub trust_proxy_headers: bool,

    /// Serve Prometheus metrics on this address.
    #[arg(long, env = "METRICS_ADDRESS")]
    pub metrics_addr: Option<SocketAddr>,

    /// Emit logs as JSON.
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,

    /// The root directory to serve.
    pub path: PathBuf,
}
