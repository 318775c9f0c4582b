//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate enumerated values (match type, TLS mode, client auth)
//! - Check that each TLS mode has the material it needs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - File existence is not checked here; TLS material is loaded at listener start

use axum::http::uri::Authority;

use crate::config::schema::{GatewayConfig, RouteConfig, ServerConfig};
use crate::net::tls::{ClientAuthMode, TlsMode};
use crate::routing::MatchType;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("server.address is required")]
    MissingAddress,

    #[error("route #{index}: each route must have a backend and either a host or a path defined")]
    IncompleteRoute { index: usize },

    #[error("route #{index}: path {path:?} must start with '/'")]
    RelativePath { index: usize, path: String },

    #[error("route #{index}: match_type must be either 'exact_match' or 'prefix_match', got {value:?}")]
    UnknownMatchType { index: usize, value: String },

    #[error("route #{index}: invalid host specified: {host}")]
    InvalidHost { index: usize, host: String },

    #[error("server.tls_mode must be one of 'manual', 'autocert', 'mtls', got {0:?}")]
    UnknownTlsMode(String),

    #[error("server.mtls.client_auth_type must be one of 'require', 'requireAndVerify', 'optional', got {0:?}")]
    UnknownClientAuth(String),

    #[error("server.cert_file and server.key_file are required for tls_mode {0:?}")]
    MissingCertificate(String),

    #[error("server.mtls.ca_cert_file is required for tls_mode \"mtls\"")]
    MissingCaFile,

    #[error("server.autocert_domains must list at least one domain")]
    MissingAutocertDomains,

    #[error("server.http_redirect_port is required when redirect_http is enabled")]
    MissingRedirectPort,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.address.trim().is_empty() {
        errors.push(ValidationError::MissingAddress);
    }

    validate_tls(&config.server, &mut errors);

    for (index, route) in config.routes.iter().enumerate() {
        validate_route(index, route, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_route(index: usize, route: &RouteConfig, errors: &mut Vec<ValidationError>) {
    let host = route.host.as_deref().unwrap_or("");

    if (host.is_empty() && route.path.is_empty()) || route.backend.trim().is_empty() {
        errors.push(ValidationError::IncompleteRoute { index });
    }

    if !route.path.is_empty() && !route.path.starts_with('/') {
        errors.push(ValidationError::RelativePath {
            index,
            path: route.path.clone(),
        });
    }

    if let Some(value) = route.match_type.as_deref() {
        if MatchType::parse(value).is_none() {
            errors.push(ValidationError::UnknownMatchType {
                index,
                value: value.to_string(),
            });
        }
    }

    if !host.is_empty() && !is_valid_host(host) {
        errors.push(ValidationError::InvalidHost {
            index,
            host: host.to_string(),
        });
    }
}

fn validate_tls(server: &ServerConfig, errors: &mut Vec<ValidationError>) {
    if !server.use_tls {
        return;
    }

    let Some(mode) = TlsMode::parse(&server.tls_mode) else {
        errors.push(ValidationError::UnknownTlsMode(server.tls_mode.clone()));
        return;
    };

    match mode {
        TlsMode::Manual | TlsMode::Mtls => {
            if server.cert_file.is_empty() || server.key_file.is_empty() {
                errors.push(ValidationError::MissingCertificate(mode.as_str().to_string()));
            }
        }
        TlsMode::Autocert => {
            if server.autocert_domains.iter().all(|d| d.trim().is_empty()) {
                errors.push(ValidationError::MissingAutocertDomains);
            }
        }
    }

    if mode == TlsMode::Mtls {
        if server.mtls.ca_cert_file.is_empty() {
            errors.push(ValidationError::MissingCaFile);
        }
        if ClientAuthMode::parse(&server.mtls.client_auth_type).is_none() {
            errors.push(ValidationError::UnknownClientAuth(
                server.mtls.client_auth_type.clone(),
            ));
        }
    }

    if server.redirect_http && server.http_redirect_port.trim_start_matches(':').is_empty() {
        errors.push(ValidationError::MissingRedirectPort);
    }
}

/// `host` or `host:port`, no scheme, path or userinfo.
fn is_valid_host(host: &str) -> bool {
    if host.contains('@') {
        return false;
    }
    match host.parse::<Authority>() {
        Ok(authority) => !authority.host().is_empty(),
        Err(_) => false,
    }
}
