//! Gateway-generated responses.
//!
//! # Responsibilities
//! - Placeholder page for an empty route table
//! - Map routing and upstream failures to status codes and diagnostic bodies
//!
//! # Design Decisions
//! - Every per-request failure becomes one of these responses; nothing
//!   propagates to the listener
//! - Bodies are short plain text naming the cause, never internal state

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

/// Served for every request when no routes are configured.
pub const PLACEHOLDER_PAGE: &str = "<html><body><h1>Hello, world!</h1></body></html>";

pub fn placeholder() -> Response {
    (StatusCode::OK, Html(PLACEHOLDER_PAGE)).into_response()
}

pub fn route_not_found() -> Response {
    (StatusCode::NOT_FOUND, "route not found").into_response()
}

pub fn invalid_backend(raw: &str) -> Response {
    (StatusCode::BAD_GATEWAY, format!("invalid backend: {raw}")).into_response()
}

pub fn upstream_unreachable(backend: &str, cause: &dyn std::fmt::Display) -> Response {
    (StatusCode::BAD_GATEWAY, format!("proxy error: {backend}: {cause}")).into_response()
}

pub fn upstream_timeout(backend: &str) -> Response {
    (StatusCode::GATEWAY_TIMEOUT, format!("proxy error: {backend}: upstream timed out")).into_response()
}

pub fn rewrite_failed(backend: &str) -> Response {
    (StatusCode::BAD_GATEWAY, format!("proxy error: {backend}: upstream response could not be read")).into_response()
}
