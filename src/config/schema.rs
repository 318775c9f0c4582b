//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.
//!
//! Enumerated settings (`match_type`, `tls_mode`, `client_auth_type`) stay as
//! raw strings here. `validation.rs` rejects unknown values and the domain
//! types (`MatchType`, `TlsPolicy`) are built from validated values only.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener and TLS settings.
    pub server: ServerConfig,

    /// Route definitions, in priority order for tie-breaks.
    pub routes: Vec<RouteConfig>,

    /// Log level and format.
    pub logging: LoggingConfig,

    /// Metrics settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080" or ":8080").
    pub address: String,

    /// Terminate TLS on the listener.
    pub use_tls: bool,

    /// One of "manual", "autocert", "mtls". Empty means manual.
    pub tls_mode: String,

    /// Domains allowed for automated certificate issuance.
    pub autocert_domains: Vec<String>,

    /// Directory where issued certificates and the ACME account persist.
    pub autocert_cache_dir: String,

    /// Contact e-mail registered with the ACME account.
    pub autocert_contact: Option<String>,

    /// Use the ACME staging directory instead of production.
    pub autocert_staging: bool,

    /// Path to certificate file (PEM).
    pub cert_file: String,

    /// Path to private key file (PEM).
    pub key_file: String,

    /// Run a plaintext listener that redirects to HTTPS.
    pub redirect_http: bool,

    /// Port (or ":port") for the redirect listener.
    pub http_redirect_port: String,

    /// Client certificate settings for `tls_mode = "mtls"`.
    pub mtls: MtlsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            use_tls: false,
            tls_mode: String::new(),
            autocert_domains: Vec::new(),
            autocert_cache_dir: "certs/autocert".to_string(),
            autocert_contact: None,
            autocert_staging: false,
            cert_file: String::new(),
            key_file: String::new(),
            redirect_http: false,
            http_redirect_port: String::new(),
            mtls: MtlsConfig::default(),
        }
    }
}

/// Mutual TLS configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MtlsConfig {
    /// CA bundle (PEM) used to verify client certificates.
    pub ca_cert_file: String,

    /// One of "require", "requireAndVerify", "optional". Empty means
    /// requireAndVerify.
    pub client_auth_type: String,
}

/// Route configuration mapping a path (and optional host) to a backend.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RouteConfig {
    /// Host header to match. Accepts `host` or `host:port`.
    pub host: Option<String>,

    /// Path to match.
    pub path: String,

    /// Local directory or absolute upstream URL.
    pub backend: String,

    /// Remove the route path from the request path before dispatch.
    pub strip_prefix: bool,

    /// "exact_match" or "prefix_match". Unset means exact.
    pub match_type: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (trace, debug, info, warn, error).
    pub level: String,

    /// "pretty" or "json".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
