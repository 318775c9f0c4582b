//! Automated certificate issuance (ACME, TLS-ALPN-01).
//!
//! # Responsibilities
//! - Hold the autocert settings taken from configuration
//! - Build the ACME state machine and the acceptor the listener serves with
//! - Drive the ACME event stream on a background task, logging every event
//!
//! # Design Decisions
//! - Issued certificates and the account key persist in a directory cache
//! - Only the configured domains are ever requested

use std::path::PathBuf;

use futures_util::StreamExt;
use rustls_acme::axum::AxumAcceptor;
use rustls_acme::caches::DirCache;
use rustls_acme::{AcmeConfig, AcmeState};
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::net::tls::{install_crypto_provider, TlsError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcmeSettings {
    pub domains: Vec<String>,
    pub cache_dir: PathBuf,
    pub contact: Option<String>,
    pub staging: bool,
}

/// ACME state plus the acceptor bound to it.
pub struct AcmeSetup {
    acceptor: AxumAcceptor,
    state: AcmeState<std::io::Error>,
}

impl AcmeSettings {
    pub fn from_config(server: &ServerConfig) -> Self {
        Self {
            domains: server.autocert_domains.clone(),
            cache_dir: PathBuf::from(&server.autocert_cache_dir),
            contact: server.autocert_contact.clone(),
            staging: server.autocert_staging,
        }
    }

    /// Contact URI registered with the account, `mailto:` added when missing.
    pub fn contact_uri(&self) -> Option<String> {
        self.contact
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| {
                if c.contains(':') {
                    c.to_string()
                } else {
                    format!("mailto:{c}")
                }
            })
    }

    pub fn prepare(&self) -> Result<AcmeSetup, TlsError> {
        if self.domains.is_empty() {
            return Err(TlsError::Autocert("no domains configured".to_string()));
        }
        std::fs::create_dir_all(&self.cache_dir).map_err(|source| TlsError::Read {
            path: self.cache_dir.clone(),
            source,
        })?;

        install_crypto_provider();

        let mut config = AcmeConfig::new(self.domains.iter())
            .cache(DirCache::new(self.cache_dir.clone()))
            .directory_lets_encrypt(!self.staging);
        if let Some(contact) = self.contact_uri() {
            config = config.contact_push(contact);
        }

        let state = config.state();
        let acceptor = state.axum_acceptor(state.default_rustls_config());

        tracing::info!(
            domains = ?self.domains,
            cache_dir = %self.cache_dir.display(),
            staging = self.staging,
            "Autocert configured"
        );

        Ok(AcmeSetup { acceptor, state })
    }
}

impl AcmeSetup {
    /// Start the ACME driver and hand back the acceptor.
    pub fn spawn(self) -> (AxumAcceptor, JoinHandle<()>) {
        let mut state = self.state;
        let driver = tokio::spawn(async move {
            while let Some(event) = state.next().await {
                match event {
                    Ok(ok) => tracing::info!(event = ?ok, "ACME event"),
                    Err(err) => tracing::error!(error = ?err, "ACME error"),
                }
            }
        });
        (self.acceptor, driver)
    }
}
