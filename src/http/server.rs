//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum Router with the single gateway handler
//! - Wire up middleware (request ID, tracing, whole-request timeout)
//! - Match each request against the route table and dispatch it
//! - Record per-request metrics
//!
//! # Design Decisions
//! - One fallback handler does all matching; Axum's own route precedence
//!   plays no part
//! - The route table is immutable and shared through an `Arc`
//! - Unmatched requests never reach the dispatcher

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderName, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::backend::BackendResolution;
use crate::http::dispatch::Dispatcher;
use crate::http::request::{request_host, request_id, MakeRequestUuidV4, X_REQUEST_ID};
use crate::http::response;
use crate::observability::metrics::{record_request, Outcome, NO_ROUTE};
use crate::resilience::Timeouts;
use crate::routing::{RouteMatch, RouteTable};

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub table: Arc<RouteTable>,
    pub dispatcher: Arc<Dispatcher>,
}

/// Build the gateway router with all middleware layers.
///
/// `forwarded_proto` is the scheme clients use to reach the listener. A
/// request exceeding the write timeout is answered 504.
pub fn build_router(table: RouteTable, timeouts: Timeouts, forwarded_proto: &'static str) -> Router {
    tracing::info!(routes = table.len(), proto = forwarded_proto, "Route table loaded");

    let state = AppState {
        table: Arc::new(table),
        dispatcher: Arc::new(Dispatcher::new(timeouts, forwarded_proto)),
    };
    let x_request_id = HeaderName::from_static(X_REQUEST_ID);

    Router::new()
        .fallback(gateway_handler)
        .with_state(state)
        .layer(TimeoutLayer::with_status_code(StatusCode::GATEWAY_TIMEOUT, timeouts.write))
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id(request),
            )
        }))
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuidV4))
}

/// Match, dispatch, record.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let host = request_host(&request);
    let path = request.uri().path().to_string();

    match state.table.find(host.as_deref(), &path) {
        RouteMatch::NoRoutes => {
            record_request(NO_ROUTE, Outcome::Placeholder, 200, start);
            response::placeholder()
        }
        RouteMatch::NotFound => {
            tracing::debug!(host = ?host, path = %path, "No route matched");
            record_request(NO_ROUTE, Outcome::NotFound, 404, start);
            response::route_not_found()
        }
        RouteMatch::Matched(route) => {
            let outcome = match route.backend() {
                BackendResolution::StaticDir(_) => Outcome::Static,
                BackendResolution::ProxyTarget(_) => Outcome::Proxied,
                BackendResolution::Invalid(_) => Outcome::InvalidBackend,
            };
            tracing::debug!(route = %route.path(), backend = route.backend().kind(), "Route matched");

            let res = state.dispatcher.dispatch(route, request).await;
            record_request(route.path(), outcome, res.status().as_u16(), start);
            res
        }
    }
}
