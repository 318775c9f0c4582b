//! Plaintext HTTP→HTTPS redirect responder.
//!
//! Every request on the redirect port gets a 301 pointing at the same host
//! and URI on the TLS listener.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, Request, Response, StatusCode, Uri};
use axum::Router;

use crate::http::request::request_host;
use crate::routing::matcher::strip_port;

#[derive(Clone)]
struct RedirectState {
    https_port: Arc<str>,
}

/// Router answering every request with a redirect to `https_port`.
pub fn redirect_router(https_port: &str) -> Router {
    Router::new().fallback(redirect_handler).with_state(RedirectState {
        https_port: Arc::from(https_port),
    })
}

/// Absolute HTTPS location for `uri` on `host`.
///
/// Any port on `host` is replaced; `https_port` is omitted when it is 443 or
/// empty.
pub fn redirect_target(host: &str, https_port: &str, uri: &Uri) -> String {
    let host = strip_port(host);
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let port = https_port.trim_start_matches(':');

    if port.is_empty() || port == "443" {
        format!("https://{host}{path_and_query}")
    } else {
        format!("https://{host}:{port}{path_and_query}")
    }
}

async fn redirect_handler(State(state): State<RedirectState>, request: Request<Body>) -> Response<Body> {
    let Some(host) = request_host(&request) else {
        return plain(StatusCode::BAD_REQUEST, "missing host");
    };

    let target = redirect_target(&host, &state.https_port, request.uri());
    match HeaderValue::from_str(&target) {
        Ok(location) => {
            tracing::debug!(location = %target, "Redirecting to HTTPS");
            let mut res = plain(StatusCode::MOVED_PERMANENTLY, "");
            res.headers_mut().insert(header::LOCATION, location);
            res
        }
        Err(_) => plain(StatusCode::BAD_REQUEST, "invalid host"),
    }
}

fn plain(status: StatusCode, body: &'static str) -> Response<Body> {
    let mut res = Response::new(Body::from(body));
    *res.status_mut() = status;
    res
}
