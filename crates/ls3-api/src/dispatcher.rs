// Copyright 2025 The LS3 Authors
// SPDX-License-Identifier: Apache-2.0

//! The request dispatcher.
//!
//! Every request flows through the same pipeline: tag it with a
//! request id, resolve the client address, verify its signature,
//! resolve the identity and the addressed bucket, then route to a
//! handler. Errors anywhere along the way become S3 XML error
//! responses, except on HEAD requests which reply with a bare status.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::response::Response;
use axum::routing::any;
use axum::Router;
use http::{HeaderValue, Method};
use ls3_core::identity::UNAUTHENTICATED_PUBLIC;
use ls3_core::policy::Statement;
use ls3_core::{Error, Identity, S3ErrorCode};
use ls3_fs::BucketFs;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::auth::provider::Provider;
use crate::auth::sigv4::{SignedRequest, Signer};
use crate::client_ip::ClientAddrStrategy;
use crate::context::RequestContext;
use crate::handlers::{bucket, list, object, RequestEnv};
use crate::host::bucket_from_request;
use crate::metrics::record_api_error;
use crate::query::QueryMap;
use crate::xml::{error_response, status_response};

/// Bodies only feed signature verification on this read-only server,
/// so anything larger than this is not a request we can serve.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Everything the dispatcher needs to serve requests.
pub struct ServerState {
    /// Signature verifier.
    pub signer: Arc<dyn Signer>,
    /// Identity resolution chain.
    pub provider: Arc<dyn Provider>,
    /// Bucket-to-filesystem mapping.
    pub buckets: Arc<BucketFs>,
    /// Base domain components for host-style addressing; empty means
    /// path-style only.
    pub domain: Vec<String>,
    /// Server-wide policy evaluated before any identity policy.
    pub global_policy: Arc<Vec<Statement>>,
    /// How client addresses and transport security are determined.
    pub addr_strategy: ClientAddrStrategy,
}

/// Builds the axum router serving the S3 API.
pub fn create_router(state: ServerState) -> Router {
    Router::new()
        .route("/", any(dispatch))
        .route("/{*path}", any(dispatch))
        .with_state(Arc::new(state))
        .layer(TraceLayer::new_for_http())
}

struct Failure {
    err: Error,
    resource: String,
    identity: String,
    remote_ip: IpAddr,
}

async fn dispatch(State(state): State<Arc<ServerState>>, req: Request) -> Response {
    let id = Uuid::new_v4();
    let method = req.method().clone();
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let mut response = match handle(&state, id, peer, req).await {
        Ok(response) => response,
        Err(failure) => {
            record_api_error(&failure.identity, failure.err.code.as_str());
            tracing::warn!(
                request_id = %id,
                code = failure.err.code.as_str(),
                message = %failure.err.message,
                resource = %failure.resource,
                identity = %failure.identity,
                remote_ip = %failure.remote_ip,
                "request failed"
            );

            if method == Method::HEAD {
                // A failing HEAD carries no body, only the status
                status_response(failure.err.code.status_code())
            } else {
                error_response(id, &failure.resource, &failure.err)
            }
        }
    };

    let headers = response.headers_mut();
    headers.insert("server", HeaderValue::from_static("ls3"));
    if let Ok(value) = id.to_string().parse() {
        headers.insert("x-amz-request-id", value);
    }

    response
}

async fn handle(
    state: &ServerState,
    id: Uuid,
    peer: Option<SocketAddr>,
    req: Request,
) -> Result<Response, Failure> {
    let (parts, body) = req.into_parts();

    let remote_ip = state.addr_strategy.client_ip(&parts.headers, peer);
    let secure = state.addr_strategy.secure_transport(&parts.headers);
    let raw_path = parts.uri.path().to_string();

    // Until verification completes the request acts as the
    // pre-authentication identity, which can do nothing
    let pre_auth = Identity::pre_authentication();

    let fail = |err: Error, resource: &str, identity: &str| Failure {
        err,
        resource: resource.to_string(),
        identity: identity.to_string(),
        remote_ip,
    };

    // The whole body is buffered: payload digest validation needs it,
    // and handlers never read it
    let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|err| {
            fail(
                Error::new(S3ErrorCode::InvalidRequest, format!("unable to read request body: {err}")),
                &raw_path,
                &pre_auth.name,
            )
        })?;

    let host = {
        let from_header = parts.headers.get("host").and_then(|v| v.to_str().ok()).unwrap_or("");
        if from_header.is_empty() {
            parts.uri.authority().map(|a| a.as_str()).unwrap_or("").to_string()
        } else {
            from_header.to_string()
        }
    };

    let signed = SignedRequest {
        method: &parts.method,
        uri: &parts.uri,
        headers: &parts.headers,
        body: &body,
    };

    let identity = match state
        .signer
        .verify(&signed, state.provider.as_ref())
        .map_err(|err| fail(err, &raw_path, &pre_auth.name))?
    {
        Some(identity) => identity,
        // No credentials at all: the request proceeds as the
        // unauthenticated identity and policy decides from there
        None => state
            .provider
            .get(UNAUTHENTICATED_PUBLIC)
            .map_err(|err| fail(err, &raw_path, &pre_auth.name))?,
    };

    tracing::info!(
        request_id = %id,
        method = %parts.method,
        path = %raw_path,
        identity = %identity.name,
        remote_ip = %remote_ip,
        secure,
        "request"
    );

    let resolved = bucket_from_request(&host, &raw_path, &state.domain)
        .map_err(|err| fail(err, &raw_path, &identity.name))?;

    let (bucket_name, view) = match &resolved.bucket {
        Some(name) => {
            let view =
                state.buckets.open(name).map_err(|err| fail(err, &resolved.path, &identity.name))?;
            (name.clone(), Some(view))
        }
        None => (String::new(), None),
    };

    let ctx = RequestContext {
        id,
        bucket: bucket_name,
        view,
        identity: identity.clone(),
        remote_ip,
        secure,
        global_policy: state.global_policy.clone(),
    };

    let query = QueryMap::parse(parts.uri.query());
    let env = RequestEnv { parts, query, path: resolved.path.clone() };

    let method_not_allowed = || {
        Error::new(
            S3ErrorCode::MethodNotAllowed,
            "The specified method is not allowed against this resource.",
        )
    };

    let result = match env.parts.method {
        Method::HEAD if ctx.view.is_some() => {
            if env.path == "/" {
                bucket::head_bucket(&ctx).await
            } else {
                object::head_object(&ctx, &env).await
            }
        }
        Method::GET if ctx.view.is_none() => bucket::list_buckets(&state.buckets, &ctx).await,
        Method::GET if env.query.contains("location") => bucket::get_bucket_location(&ctx).await,
        Method::GET if env.path == "/" => {
            if env.query.get("list-type") == Some("2") {
                list::list_objects_v2(&ctx, &env).await
            } else {
                list::list_objects_v1(&ctx, &env).await
            }
        }
        Method::GET => object::get_object(&ctx, &env).await,
        _ => Err(method_not_allowed()),
    };

    result.map_err(|err| fail(err, &env.path, &identity.name))
}
