//! Route table construction and lookup.
//!
//! # Responsibilities
//! - Store compiled routes with their resolved backends
//! - Look up the single route for a request
//! - Distinguish "no match" from "no routes configured"
//!
//! # Design Decisions
//! - Immutable after construction (shared via Arc, no locks)
//! - Exact routes indexed by path, prefix routes pre-sorted by rank
//! - Ranking is explicit: exact beats prefix, longer prefix beats shorter,
//!   a host-specific route beats a host-less one, then configuration order

use std::collections::{HashMap, HashSet};

use crate::backend::{classify, BackendResolution};
use crate::config::RouteConfig;
use crate::routing::matcher::{HostMatcher, MatchType, PathMatcher};

/// A validated route definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    pub host: Option<String>,
    pub path: String,
    pub backend: String,
    pub strip_prefix: bool,
    pub match_type: MatchType,
}

impl RouteSpec {
    /// Build from a validated route entry.
    ///
    /// A host-only route (no path) covers the whole host: its path becomes
    /// `/` and, unless a match type was given, it matches by prefix.
    pub fn from_config(route: &RouteConfig) -> Self {
        let explicit = route
            .match_type
            .as_deref()
            .filter(|m| !m.is_empty())
            .and_then(MatchType::parse);

        let (path, match_type) = if route.path.is_empty() {
            ("/".to_string(), explicit.unwrap_or(MatchType::Prefix))
        } else {
            (route.path.clone(), explicit.unwrap_or_default())
        };

        Self {
            host: route.host.clone().filter(|h| !h.is_empty()),
            path,
            backend: route.backend.clone(),
            strip_prefix: route.strip_prefix,
            match_type,
        }
    }

    /// Prefix paths lose their trailing `/` so `/static/` also covers
    /// `/static`. Exact paths are kept as written.
    fn normalized(mut self) -> Self {
        if self.match_type == MatchType::Prefix && self.path.len() > 1 {
            let trimmed = self.path.trim_end_matches('/');
            self.path = if trimmed.is_empty() { "/".to_string() } else { trimmed.to_string() };
        }
        self
    }
}

/// A route with its matchers and resolved backend.
#[derive(Debug, Clone)]
pub struct Route {
    spec: RouteSpec,
    host: Option<HostMatcher>,
    path: PathMatcher,
    backend: BackendResolution,
}

impl Route {
    fn new(spec: RouteSpec, backend: BackendResolution) -> Self {
        let host = spec.host.as_deref().map(HostMatcher::new);
        let path = PathMatcher::new(spec.path.clone(), spec.match_type);
        Self {
            spec,
            host,
            path,
            backend,
        }
    }

    pub fn spec(&self) -> &RouteSpec {
        &self.spec
    }

    pub fn backend(&self) -> &BackendResolution {
        &self.backend
    }

    /// Route path, used as the public prefix.
    pub fn path(&self) -> &str {
        &self.spec.path
    }

    fn matches(&self, host: Option<&str>, path: &str) -> bool {
        let host_ok = match (&self.host, host) {
            (None, _) => true,
            (Some(expected), Some(actual)) => expected.matches(actual),
            (Some(_), None) => false,
        };
        host_ok && self.path.matches(path)
    }
}

/// Result of a route lookup.
#[derive(Debug, Clone, Copy)]
pub enum RouteMatch<'a> {
    /// This route handles the request.
    Matched(&'a Route),
    /// Routes exist but none fits.
    NotFound,
    /// The table is empty.
    NoRoutes,
}

/// Error type for route table construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteTableError {
    #[error("duplicate route: host={host:?} path={path:?} match_type={match_type}")]
    Duplicate {
        host: Option<String>,
        path: String,
        match_type: MatchType,
    },
}

/// Ordered, immutable set of routes.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    /// Exact routes by path, host-specific entries first, then config order.
    exact: HashMap<String, Vec<usize>>,
    /// Prefix routes in ranking order.
    prefixes: Vec<usize>,
}

impl RouteTable {
    /// Build from validated configuration, classifying every backend once.
    pub fn from_config(routes: &[RouteConfig]) -> Result<Self, RouteTableError> {
        Self::build(routes.iter().map(RouteSpec::from_config).collect())
    }

    /// Build from route specs.
    pub fn build(specs: Vec<RouteSpec>) -> Result<Self, RouteTableError> {
        let mut seen = HashSet::new();
        let mut routes = Vec::with_capacity(specs.len());

        for spec in specs.into_iter().map(RouteSpec::normalized) {
            let key = (
                spec.host.as_ref().map(|h| h.to_ascii_lowercase()),
                spec.path.clone(),
                spec.match_type,
            );
            if !seen.insert(key) {
                return Err(RouteTableError::Duplicate {
                    host: spec.host,
                    path: spec.path,
                    match_type: spec.match_type,
                });
            }

            let backend = classify(&spec.backend);
            match &backend {
                BackendResolution::StaticDir(dir) => tracing::info!(
                    path = %spec.path,
                    dir = %dir.display(),
                    strip_prefix = spec.strip_prefix,
                    "Serving static files"
                ),
                BackendResolution::ProxyTarget(target) => tracing::info!(
                    path = %spec.path,
                    backend = %target,
                    strip_prefix = spec.strip_prefix,
                    "Routing to backend"
                ),
                BackendResolution::Invalid(raw) => tracing::warn!(
                    path = %spec.path,
                    backend = %raw,
                    "Invalid backend, requests will receive 502"
                ),
            }
            routes.push(Route::new(spec, backend));
        }

        let mut exact: HashMap<String, Vec<usize>> = HashMap::new();
        let mut prefixes = Vec::new();
        for (index, route) in routes.iter().enumerate() {
            match route.spec.match_type {
                MatchType::Exact => exact.entry(route.spec.path.clone()).or_default().push(index),
                MatchType::Prefix => prefixes.push(index),
            }
        }

        // Stable sorts keep configuration order as the final tie-break.
        for indices in exact.values_mut() {
            indices.sort_by_key(|&i| routes[i].host.is_none());
        }
        prefixes.sort_by(|&a, &b| {
            let (ra, rb) = (&routes[a], &routes[b]);
            rb.path
                .specificity()
                .cmp(&ra.path.specificity())
                .then(ra.host.is_none().cmp(&rb.host.is_none()))
        });

        tracing::info!(routes = routes.len(), "Route table built");
        Ok(Self {
            routes,
            exact,
            prefixes,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Routes in configuration order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Find the route for a request host (if any) and path.
    pub fn find(&self, host: Option<&str>, path: &str) -> RouteMatch<'_> {
        if self.routes.is_empty() {
            return RouteMatch::NoRoutes;
        }

        let exact = self
            .exact
            .get(path)
            .into_iter()
            .flatten()
            .map(|&i| &self.routes[i])
            .find(|route| route.matches(host, path));
        if let Some(route) = exact {
            return RouteMatch::Matched(route);
        }

        self.prefixes
            .iter()
            .map(|&i| &self.routes[i])
            .find(|route| route.matches(host, path))
            .map_or(RouteMatch::NotFound, RouteMatch::Matched)
    }
}
