// Copyright 2025 The LS3 Authors
// SPDX-License-Identifier: Apache-2.0

//! ls3: a lightweight read-only S3-compatible object storage server.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use ls3_api::client_ip::ClientAddrStrategy;
use ls3_api::{create_router, FileProvider, Keyring, MultiProvider, Provider, ServerState, SigV4};
use ls3_core::policy::Statement;
use ls3_core::Identity;
use ls3_fs::{BucketFs, FsView};
use metrics_exporter_prometheus::PrometheusBuilder;
use rand::Rng;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod cli;

use cli::Cli;

const ACCESS_KEY_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SECRET_KEY_CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.log_json);

    if let Some(addr) = cli.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install the Prometheus metrics exporter")?;
    }
    ls3_api::metrics::init_metrics();

    let global_policy = load_global_policy(cli.global_policy.as_deref())?;

    let (access_key_id, secret_access_key) = resolve_credentials(&cli)?;

    let root = cli.path.canonicalize().with_context(|| {
        format!("The root directory {} is not accessible", cli.path.display())
    })?;

    let buckets = if cli.multi_bucket {
        BucketFs::Subdir(root.clone())
    } else {
        BucketFs::Single(FsView::new(root.clone()))
    };

    // The command-line identity has full access to the system unless a
    // global policy explicitly denies it
    let mut keyring = Keyring::new([Identity {
        name: "Default".to_string(),
        access_key_id: access_key_id.clone(),
        secret_access_key: secret_access_key.clone(),
        policy: vec![Statement::allow_all()],
    }]);

    // Anonymous requests resolve to a deny-all identity unless the
    // credentials file defines one of its own
    keyring.insert_if_absent(Identity::unauthenticated_public());

    let provider: Arc<dyn Provider> = match &cli.credentials_file {
        Some(path) => {
            let file_provider =
                FileProvider::new(path, Duration::from_secs(cli.credentials_cache_secs))
                    .with_context(|| {
                        format!("Failed to load the credentials file {}", path.display())
                    })?;

            Arc::new(MultiProvider::new(vec![Arc::new(file_provider), Arc::new(keyring)]))
        }
        None => Arc::new(keyring),
    };

    let addr_strategy = if cli.trust_proxy_headers {
        ClientAddrStrategy::Forwarded
    } else {
        ClientAddrStrategy::Direct
    };

    print_banner(&cli, &root, &access_key_id, &secret_access_key);

    let state = ServerState {
        signer: Arc::new(SigV4::new()),
        provider,
        buckets: Arc::new(buckets),
        domain: ls3_api::host::domain_components(cli.domain.as_deref()),
        global_policy: Arc::new(global_policy),
        addr_strategy,
    };

    let app = create_router(state);

    let listener = TcpListener::bind(cli.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", cli.listen_addr))?;

    info!("Server listening on {}", cli.listen_addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer();

    if json {
        tracing_subscriber::registry().with(filter).with(fmt_layer.json()).init();
    } else {
        tracing_subscriber::registry().with(filter).with(fmt_layer).init();
    }
}

fn load_global_policy(path: Option<&Path>) -> Result<Vec<Statement>> {
    match path {
        Some(path) => {
            let data = std::fs::read_to_string(path).with_context(|| {
                format!("Failed to read the global policy file {}", path.display())
            })?;
            serde_json::from_str(&data).with_context(|| {
                format!("Failed to parse the global policy file {}", path.display())
            })
        }
        // With no global policy configured everything is allowed at
        // the global layer and identity policies decide alone
        None => Ok(vec![Statement::allow_all()]),
    }
}

fn resolve_credentials(cli: &Cli) -> Result<(String, String)> {
    match (&cli.access_key_id, &cli.secret_access_key) {
        (Some(key), Some(secret)) => Ok((key.clone(), secret.clone())),
        (None, None) => {
            warn!(
                "ACCESS_KEY_ID not provided. Credentials will be generated automatically \
                 but will change next time the server starts!"
            );
            Ok((rand_string(20, ACCESS_KEY_CHARSET), rand_string(40, SECRET_KEY_CHARSET)))
        }
        _ => bail!("both access key id and secret access key must be provided, or neither"),
    }
}

fn rand_string(len: usize, charset: &[u8]) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| charset[rng.gen_range(0..charset.len())] as char).collect()
}

fn print_banner(cli: &Cli, root: &Path, access_key_id: &str, secret_access_key: &str) {
    let endpoint = match &cli.domain {
        Some(domain) => format!("{domain}:{}", cli.listen_addr.port()),
        None => cli.listen_addr.to_string(),
    };

    println!(
        r"
[Lightweight Object Storage Server]
Version           {version}
Directory         {root}{suffix}
Endpoint          http://{endpoint}
Access Key ID     {access_key_id}
Secret Access Key {secret_access_key}

! The default credentials have full access to this system and its data
! unless a global policy explicitly denies access.
",
        version = env!("CARGO_PKG_VERSION"),
        root = root.display(),
        suffix = if cli.multi_bucket { "/[*]" } else { "" },
    );
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
