//! Environment variable overlay.
//!
//! Applied after the file is parsed and before validation, so an override
//! can supply a value the file leaves empty (e.g. the bind address).

use crate::config::schema::GatewayConfig;

/// Overrides `server.address`.
pub const ENV_ADDRESS: &str = "EDGE_GATEWAY_ADDRESS";
/// Overrides `server.use_tls` (`true`/`1` or `false`/`0`).
pub const ENV_USE_TLS: &str = "EDGE_GATEWAY_USE_TLS";
/// Overrides `server.cert_file`.
pub const ENV_CERT_FILE: &str = "EDGE_GATEWAY_CERT_FILE";
/// Overrides `server.key_file`.
pub const ENV_KEY_FILE: &str = "EDGE_GATEWAY_KEY_FILE";

/// Apply overrides read through `lookup`.
///
/// Empty values are ignored. An unparseable `EDGE_GATEWAY_USE_TLS` is logged
/// and ignored.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(address) = get(ENV_ADDRESS) {
        tracing::debug!(%address, "Address overridden from environment");
        config.server.address = address;
    }

    if let Some(raw) = get(ENV_USE_TLS) {
        match raw.to_ascii_lowercase().as_str() {
            "true" | "1" => config.server.use_tls = true,
            "false" | "0" => config.server.use_tls = false,
            _ => tracing::warn!(value = %raw, "Ignoring unrecognised {}", ENV_USE_TLS),
        }
    }

    if let Some(cert_file) = get(ENV_CERT_FILE) {
        config.server.cert_file = cert_file;
    }

    if let Some(key_file) = get(ENV_KEY_FILE) {
        config.server.key_file = key_file;
    }
}
