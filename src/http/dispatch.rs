//! Per-route request dispatch.
//!
//! # Responsibilities
//! - Serve static files for `StaticDir` backends
//! - Forward to the upstream for `ProxyTarget` backends, then rewrite
//! - Answer 502 for `Invalid` backends without any I/O
//!
//! # Design Decisions
//! - The backend variant was chosen at table build time; this module only
//!   switches on it
//! - `strip_prefix` governs static and proxy dispatch identically
//! - Upstream failures map to 502/504 responses, never errors

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Method, Request, Response, StatusCode, Uri, Version};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::backend::{BackendResolution, ProxyTarget};
use crate::http::request::request_host;
use crate::http::response;
use crate::http::rewrite::rewrite_response;
use crate::net::tls::install_crypto_provider;
use crate::resilience::timeouts::{with_timeout, Timeouts, Upstream};
use crate::routing::Route;
use crate::security::headers::{add_forwarded, strip_hop_by_hop};

pub type UpstreamClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Shared dispatch state: the pooled upstream client and fixed limits.
#[derive(Clone)]
pub struct Dispatcher {
    client: UpstreamClient,
    upstream_timeout: Duration,
    forwarded_proto: &'static str,
}

impl Dispatcher {
    /// `forwarded_proto` is the scheme clients used to reach the gateway.
    pub fn new(timeouts: Timeouts, forwarded_proto: &'static str) -> Self {
        install_crypto_provider();
        let connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(timeouts.idle)
            .build(connector);

        Self {
            client,
            upstream_timeout: timeouts.upstream(),
            forwarded_proto,
        }
    }

    /// Handle a request already matched to `route`.
    pub async fn dispatch(&self, route: &Route, request: Request<Body>) -> Response<Body> {
        match route.backend() {
            BackendResolution::StaticDir(dir) => serve_static(dir, route, request).await,
            BackendResolution::ProxyTarget(target) => self.forward(target, route, request).await,
            BackendResolution::Invalid(raw) => {
                tracing::warn!(path = %route.path(), backend = %raw, "Request for invalid backend");
                response::invalid_backend(raw)
            }
        }
    }

    async fn forward(&self, target: &ProxyTarget, route: &Route, request: Request<Body>) -> Response<Body> {
        let client_ip = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let host = request_host(&request);
        let is_head = request.method() == Method::HEAD;

        let (mut parts, body) = request.into_parts();

        let path = effective_path(route, parts.uri.path());
        let uri = match upstream_uri(target, &path, parts.uri.query()) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::error!(backend = %target, path = %path, error = %e, "Could not build upstream URI");
                return response::upstream_unreachable(target.raw(), &e);
            }
        };

        tracing::debug!(method = %parts.method, upstream = %uri, "Forwarding request");

        parts.uri = uri;
        parts.version = Version::HTTP_11;
        strip_hop_by_hop(&mut parts.headers);
        add_forwarded(&mut parts.headers, client_ip, host.as_deref(), self.forwarded_proto);

        let outbound = Request::from_parts(parts, body);
        let upstream = match with_timeout(self.upstream_timeout, self.client.request(outbound)).await {
            Upstream::Completed(Ok(upstream)) => upstream,
            Upstream::Completed(Err(e)) => {
                tracing::error!(backend = %target, error = %e, "Upstream error");
                return response::upstream_unreachable(target.raw(), &e);
            }
            Upstream::TimedOut => {
                tracing::error!(backend = %target, timeout = ?self.upstream_timeout, "Upstream timed out");
                return response::upstream_timeout(target.raw());
            }
        };

        let mut relayed = upstream.map(Body::new);
        strip_hop_by_hop(relayed.headers_mut());

        let status = relayed.status();
        if is_head || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED {
            return relayed;
        }

        match rewrite_response(relayed, target.aliases(), route.path()).await {
            Ok(rewritten) => rewritten,
            Err(e) => {
                tracing::error!(backend = %target, error = %e, "Response rewrite failed");
                response::rewrite_failed(target.raw())
            }
        }
    }
}

/// Serve `request` from `dir`. Traversal outside `dir` is refused by `ServeDir`.
async fn serve_static(dir: &Path, route: &Route, request: Request<Body>) -> Response<Body> {
    let (mut parts, body) = request.into_parts();
    let path = effective_path(route, parts.uri.path());

    tracing::debug!(dir = %dir.display(), path = %path, "Serving static file");

    match origin_form(&path, parts.uri.query()) {
        Ok(uri) => parts.uri = uri,
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "Rejected static path");
            return response::route_not_found();
        }
    }

    let request = Request::from_parts(parts, body);
    match ServeDir::new(dir).oneshot(request).await {
        Ok(res) => res.map(Body::new),
        Err(never) => match never {},
    }
}

/// Request path after optional prefix stripping; never empty.
pub fn effective_path(route: &Route, request_path: &str) -> String {
    if !route.spec().strip_prefix {
        return request_path.to_string();
    }
    strip_route_prefix(route.path(), request_path)
}

/// Remove `prefix` from `path`, mapping an empty result to `/` and keeping a
/// leading `/`.
pub fn strip_route_prefix(prefix: &str, path: &str) -> String {
    let rest = path.strip_prefix(prefix).unwrap_or(path);
    if rest.starts_with('/') {
        rest.to_string()
    } else {
        format!("/{rest}")
    }
}

/// Target base path and request path joined with a single slash.
pub fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

/// Build the absolute upstream URI for a forwarded request.
pub fn upstream_uri(target: &ProxyTarget, path: &str, query: Option<&str>) -> Result<Uri, axum::http::Error> {
    let path = join_paths(target.base_path(), path);
    let query = match (target.base_query(), query) {
        (Some(base), Some(q)) if !base.is_empty() && !q.is_empty() => Some(format!("{base}&{q}")),
        (Some(base), _) if !base.is_empty() => Some(base.to_string()),
        (_, Some(q)) if !q.is_empty() => Some(q.to_string()),
        _ => None,
    };
    let path_and_query = match query {
        Some(q) => format!("{path}?{q}"),
        None => path,
    };

    Uri::builder()
        .scheme(target.scheme().clone())
        .authority(target.authority().clone())
        .path_and_query(path_and_query)
        .build()
}

fn origin_form(path: &str, query: Option<&str>) -> Result<Uri, axum::http::Error> {
    let path_and_query = match query {
        Some(q) => format!("{path}?{q}"),
        None => path.to_string(),
    };
    Uri::builder().path_and_query(path_and_query).build()
}
