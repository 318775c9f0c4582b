//! Route matching predicates.
//!
//! # Responsibilities
//! - Match host header (exact, case-insensitive, port-tolerant)
//! - Match request path (exact or segment-respecting prefix)
//!
//! # Design Decisions
//! - Host matching is case-insensitive (RFC 9110 host names)
//! - Path matching is case-sensitive
//! - No regex: prefixes are compared literally on segment boundaries

use std::fmt;

/// How a route path is compared with the request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MatchType {
    /// Path must equal the route path.
    #[default]
    Exact,
    /// Route path must be a segment-respecting prefix of the request path.
    Prefix,
}

impl MatchType {
    /// Parse a configured value. Empty means the default (exact).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "" | "exact_match" => Some(MatchType::Exact),
            "prefix_match" => Some(MatchType::Prefix),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Exact => "exact_match",
            MatchType::Prefix => "prefix_match",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Matches the request host.
///
/// A configured bare host (`example.com`) accepts both `example.com` and
/// `example.com:<any port>`. A configured `host:port` only accepts that exact
/// pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostMatcher {
    expected_host: String,
}

impl HostMatcher {
    /// Create a new host matcher.
    /// The host is normalized to lowercase for case-insensitive matching.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            expected_host: host.into().to_ascii_lowercase(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.expected_host
    }

    pub fn matches(&self, request_host: &str) -> bool {
        let request_host = request_host.to_ascii_lowercase();
        request_host == self.expected_host || strip_port(&request_host) == self.expected_host
    }
}

/// Remove a trailing `:port` from `host[:port]`, leaving IPv6 literals intact.
pub fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        return match rest.find(']') {
            Some(end) => &host[..end + 2],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

/// Matches the request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatcher {
    path: String,
    match_type: MatchType,
}

impl PathMatcher {
    pub fn new(path: impl Into<String>, match_type: MatchType) -> Self {
        Self {
            path: path.into(),
            match_type,
        }
    }

    pub fn matches(&self, request_path: &str) -> bool {
        match self.match_type {
            MatchType::Exact => request_path == self.path,
            MatchType::Prefix => is_segment_prefix(&self.path, request_path),
        }
    }

    /// Length used to rank competing prefix routes.
    pub fn specificity(&self) -> usize {
        self.path.len()
    }
}

/// True when `prefix` covers `path` on a segment boundary.
///
/// `/api` covers `/api`, `/api/` and `/api/v1`, never `/apix`. A prefix
/// ending in `/` covers everything beneath it.
pub fn is_segment_prefix(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => prefix.ends_with('/') || rest.starts_with('/'),
        None => false,
    }
}
