//! Upstream origin rewriting for proxied responses.
//!
//! # Responsibilities
//! - Decide whether a proxied response is textual (HTML, JSON, plain text)
//! - Replace every literal occurrence of the upstream origin with the
//!   route's public prefix
//! - Fix up `Content-Length` for the rewritten body
//!
//! # Design Decisions
//! - Buffers the whole body; streaming is lost for rewritten responses
//! - Aliases are literal byte patterns, never wildcards
//! - Longer aliases are applied first so `https://host` is not half-eaten by `//host`
//! - Encoded (gzip, br, ...) bodies pass through untouched

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, Response};
use memchr::memmem;

const REWRITABLE_TYPES: [&str; 3] = ["text/html", "application/json", "text/plain"];

/// Error type for response rewriting.
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error("failed to read upstream response body: {0}")]
    Body(#[from] axum::Error),
}

/// Literal forms of an upstream origin, longest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteAliases {
    aliases: Vec<String>,
}

impl RewriteAliases {
    /// Derive aliases from the configured backend string and its authority.
    pub fn for_target(raw: &str, authority: &str) -> Self {
        let candidates = [
            raw.trim_end_matches('/').to_string(),
            format!("https://{authority}"),
            format!("http://{authority}"),
            format!("//{authority}"),
        ];

        let mut aliases: Vec<String> = Vec::with_capacity(candidates.len());
        for alias in candidates {
            if !alias.is_empty() && !aliases.contains(&alias) {
                aliases.push(alias);
            }
        }
        aliases.sort_by(|a, b| b.len().cmp(&a.len()));

        Self { aliases }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.aliases
    }

    /// Replace every alias in `body` with `replacement`.
    ///
    /// Returns the input unchanged (same buffer) when nothing matched.
    pub fn apply(&self, body: Bytes, replacement: &str) -> Bytes {
        let mut current = body;
        for alias in &self.aliases {
            if let Some(rewritten) = replace_all(&current, alias.as_bytes(), replacement.as_bytes()) {
                current = Bytes::from(rewritten);
            }
        }
        current
    }
}

/// Text replacing the upstream origin for a route mounted at `route_path`.
///
/// The trailing `/` is dropped so the upstream's own leading `/` survives:
/// a route at `/` maps `http://backend/x` to `/x`, not `//x`.
pub fn public_prefix(route_path: &str) -> &str {
    route_path.trim_end_matches('/')
}

/// True when the response should be rewritten.
pub fn is_rewritable(headers: &HeaderMap) -> bool {
    let encoded = headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| !v.trim().eq_ignore_ascii_case("identity"));
    if encoded {
        return false;
    }

    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.to_ascii_lowercase())
        .is_some_and(|ct| REWRITABLE_TYPES.iter().any(|t| ct.contains(t)))
}

/// Rewrite a proxied response in place.
///
/// Non-textual responses are returned as-is without touching the body.
pub async fn rewrite_response(
    response: Response<Body>,
    aliases: &RewriteAliases,
    route_path: &str,
) -> Result<Response<Body>, RewriteError> {
    if !is_rewritable(response.headers()) {
        return Ok(response);
    }

    let (mut parts, body) = response.into_parts();
    let original = axum::body::to_bytes(body, usize::MAX).await?;
    let original_len = original.len();
    let rewritten = aliases.apply(original, public_prefix(route_path));

    tracing::trace!(
        before = original_len,
        after = rewritten.len(),
        "Rewrote upstream response body"
    );

    parts.headers.remove(header::TRANSFER_ENCODING);
    parts
        .headers
        .insert(header::CONTENT_LENGTH, HeaderValue::from(rewritten.len()));

    Ok(Response::from_parts(parts, Body::from(rewritten)))
}

/// Replace non-overlapping occurrences of `needle`; `None` when there are none.
fn replace_all(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Option<Vec<u8>> {
    if needle.is_empty() {
        return None;
    }

    let finder = memmem::Finder::new(needle);
    let mut matches = finder.find_iter(haystack).peekable();
    matches.peek()?;

    let mut out = Vec::with_capacity(haystack.len());
    let mut last = 0;
    for start in matches {
        out.extend_from_slice(&haystack[last..start]);
        out.extend_from_slice(replacement);
        last = start + needle.len();
    }
    out.extend_from_slice(&haystack[last..]);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(content_type: &str, body: &'static str) -> Response<Body> {
        Response::builder()
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_LENGTH, body.len())
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_of(response: Response<Body>) -> Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap()
    }

    #[test]
    fn aliases_are_deduplicated_and_longest_first() {
        let aliases = RewriteAliases::for_target("http://backend:9000/", "backend:9000");
        assert_eq!(
            aliases.as_slice(),
            &["https://backend:9000", "http://backend:9000", "//backend:9000"]
        );

        let aliases = RewriteAliases::for_target("http://backend:9000/app", "backend:9000");
        assert_eq!(aliases.as_slice()[0], "http://backend:9000/app");
        assert_eq!(aliases.as_slice().len(), 4);
    }

    #[test]
    fn content_type_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_rewritable(&headers));

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"));
        assert!(is_rewritable(&headers));

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("TEXT/HTML"));
        assert!(is_rewritable(&headers));

        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        assert!(!is_rewritable(&headers));

        headers.remove(header::CONTENT_ENCODING);
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
        assert!(!is_rewritable(&headers));

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
        assert!(!is_rewritable(&headers));
    }

    #[test]
    fn aliases_are_literal_not_patterns() {
        let aliases = RewriteAliases::for_target("http://a.b:1", "a.b:1");
        let body = Bytes::from_static(b"http://axb:1 http://a.b:1/x");
        assert_eq!(aliases.apply(body, "/p"), Bytes::from_static(b"http://axb:1 /p/x"));
    }

    #[test]
    fn every_form_is_replaced() {
        let aliases = RewriteAliases::for_target("http://backend:9000", "backend:9000");
        let body = Bytes::from_static(
            b"<a href=\"http://backend:9000/a\"></a><a href=\"https://backend:9000/b\"></a><img src=\"//backend:9000/c.png\">",
        );
        assert_eq!(
            aliases.apply(body, "/svc"),
            Bytes::from_static(b"<a href=\"/svc/a\"></a><a href=\"/svc/b\"></a><img src=\"/svc/c.png\">")
        );
    }

    #[test]
    fn root_route_keeps_single_slash() {
        assert_eq!(public_prefix("/"), "");
        assert_eq!(public_prefix("/svc/"), "/svc");
        assert_eq!(public_prefix("/svc"), "/svc");
    }

    #[tokio::test]
    async fn rewrites_json_and_fixes_length() {
        let aliases = RewriteAliases::for_target("http://backend:9000", "backend:9000");
        let upstream = response("application/json", r#"{"url":"http://backend:9000/x"}"#);

        let rewritten = rewrite_response(upstream, &aliases, "/svc").await.unwrap();
        assert_eq!(rewritten.headers()[header::CONTENT_LENGTH], "16");
        assert_eq!(body_of(rewritten).await, Bytes::from_static(br#"{"url":"/svc/x"}"#));
    }

    #[tokio::test]
    async fn body_without_aliases_is_byte_identical() {
        let aliases = RewriteAliases::for_target("http://backend:9000", "backend:9000");
        let text = "plain text mentioning backend but not its origin";
        let upstream = response("text/plain", text);

        let rewritten = rewrite_response(upstream, &aliases, "/svc").await.unwrap();
        assert_eq!(rewritten.headers()[header::CONTENT_LENGTH], text.len().to_string().as_str());
        assert_eq!(body_of(rewritten).await, Bytes::from_static(text.as_bytes()));
    }

    #[test]
    fn replacement_is_non_overlapping() {
        assert_eq!(replace_all(b"aaaa", b"aa", b"b"), Some(b"bb".to_vec()));
        assert_eq!(replace_all(b"xyz", b"q", b"b"), None);
        assert_eq!(replace_all(b"xyz", b"", b"b"), None);
    }

    #[tokio::test]
    async fn body_read_failure_is_an_error() {
        let aliases = RewriteAliases::for_target("http://backend:9000", "backend:9000");
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"{\"url\":\"http://backend")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer")),
        ];
        let upstream = Response::builder()
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from_stream(futures_util::stream::iter(chunks)))
            .unwrap();

        let err = rewrite_response(upstream, &aliases, "/svc").await.unwrap_err();
        assert!(matches!(err, RewriteError::Body(_)));
    }

    #[tokio::test]
    async fn binary_responses_pass_through() {
        let aliases = RewriteAliases::for_target("http://backend:9000", "backend:9000");
        let upstream = response("application/octet-stream", "http://backend:9000/x");

        let passed = rewrite_response(upstream, &aliases, "/svc").await.unwrap();
        assert_eq!(body_of(passed).await, Bytes::from_static(b"http://backend:9000/x"));
    }
}
