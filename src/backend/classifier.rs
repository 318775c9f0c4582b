//! Backend descriptor classification.
//!
//! # Responsibilities
//! - Resolve a configured backend string exactly once, at table build time
//! - Pre-parse everything per-request dispatch needs (scheme, authority,
//!   rewrite aliases) so the hot path does no parsing
//!
//! # Resolution order
//! 1. Existing local directory → `StaticDir`
//! 2. Absolute `http`/`https` URL with a host → `ProxyTarget`
//! 3. Anything else → `Invalid`, keeping the raw string for diagnostics

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use axum::http::uri::{Authority, Scheme};
use url::Url;

use crate::http::rewrite::RewriteAliases;

/// Resolved backend for one route.
#[derive(Debug, Clone)]
pub enum BackendResolution {
    /// Serve files from this directory.
    StaticDir(PathBuf),
    /// Reverse-proxy to this upstream.
    ProxyTarget(ProxyTarget),
    /// Unusable descriptor; requests get 502.
    Invalid(String),
}

impl BackendResolution {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            BackendResolution::StaticDir(_) => "static",
            BackendResolution::ProxyTarget(_) => "proxy",
            BackendResolution::Invalid(_) => "invalid",
        }
    }
}

/// A parsed upstream.
#[derive(Debug, Clone)]
pub struct ProxyTarget {
    raw: String,
    scheme: Scheme,
    authority: Authority,
    base_path: String,
    base_query: Option<String>,
    aliases: RewriteAliases,
}

impl ProxyTarget {
    /// Backend string exactly as configured.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    /// `host` or `host:port` when a port was given.
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Path component of the target URL (at least `/`).
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn base_query(&self) -> Option<&str> {
        self.base_query.as_deref()
    }

    /// Literal origin forms replaced in rewritten responses.
    pub fn aliases(&self) -> &RewriteAliases {
        &self.aliases
    }

    fn from_url(raw: &str, url: &Url) -> Option<Self> {
        let scheme = match url.scheme() {
            "http" => Scheme::HTTP,
            "https" => Scheme::HTTPS,
            _ => return None,
        };
        let host = url.host_str().filter(|h| !h.is_empty())?;
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let authority = Authority::from_str(&authority).ok()?;
        let aliases = RewriteAliases::for_target(raw, authority.as_str());

        Some(Self {
            raw: raw.to_string(),
            scheme,
            authority,
            base_path: url.path().to_string(),
            base_query: url.query().map(str::to_string),
            aliases,
        })
    }
}

impl fmt::Display for ProxyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Classify a backend descriptor.
pub fn classify(descriptor: &str) -> BackendResolution {
    let path = Path::new(descriptor);
    if path.is_dir() {
        return BackendResolution::StaticDir(path.to_path_buf());
    }

    match Url::parse(descriptor) {
        Ok(url) => match ProxyTarget::from_url(descriptor, &url) {
            Some(target) => BackendResolution::ProxyTarget(target),
            None => BackendResolution::Invalid(descriptor.to_string()),
        },
        Err(e) => {
            tracing::debug!(backend = %descriptor, error = %e, "Backend is neither a directory nor a URL");
            BackendResolution::Invalid(descriptor.to_string())
        }
    }
}
