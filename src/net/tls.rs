//! TLS termination policy and certificate loading.
//!
//! # Responsibilities
//! - Select one trust model from configuration (disabled, manual, autocert, mTLS)
//! - Load certificates, keys and CA bundles eagerly before the listener binds
//! - Build the rustls server configuration for each model
//!
//! # Design Decisions
//! - The policy is chosen once and never changes at runtime
//! - Missing or malformed material is a startup error, never a per-request one
//! - `require` demands a client certificate without chain validation;
//!   `requireAndVerify` and `optional` validate against the CA pool

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rustls::client::danger::HandshakeSignatureValid;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::server::{VerifierBuilderError, WebPkiClientVerifier};
use rustls::{DigitallySignedStruct, DistinguishedName, RootCertStore, ServerConfig, SignatureScheme};

use crate::config::ServerConfig as ServerSettings;
use crate::net::acme::{AcmeSettings, AcmeSetup};

/// Error type for TLS setup.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no PEM certificates found in {0}")]
    NoCertificates(PathBuf),

    #[error("no private key found in {0}")]
    NoPrivateKey(PathBuf),

    #[error("invalid CA certificate in {path}: {source}")]
    InvalidCa {
        path: PathBuf,
        #[source]
        source: rustls::Error,
    },

    #[error("client verifier: {0}")]
    Verifier(#[from] VerifierBuilderError),

    #[error("TLS configuration: {0}")]
    Rustls(#[from] rustls::Error),

    #[error("unknown tls_mode {0:?}")]
    UnknownMode(String),

    #[error("unknown client_auth_type {0:?}")]
    UnknownClientAuth(String),

    #[error("autocert: {0}")]
    Autocert(String),
}

/// Configured trust model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    Manual,
    Autocert,
    Mtls,
}

impl TlsMode {
    /// Case-insensitive. Empty means manual.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "" | "manual" => Some(TlsMode::Manual),
            "autocert" => Some(TlsMode::Autocert),
            "mtls" => Some(TlsMode::Mtls),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TlsMode::Manual => "manual",
            TlsMode::Autocert => "autocert",
            TlsMode::Mtls => "mtls",
        }
    }
}

/// Client certificate policy for mutual TLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientAuthMode {
    /// A client certificate must be presented; it is not chain-validated.
    Require,
    /// A client certificate must be presented and chain to the CA pool.
    #[default]
    RequireAndVerify,
    /// Verified when presented, accepted when absent.
    Optional,
}

impl ClientAuthMode {
    /// Case-insensitive. Empty means `requireAndVerify`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "require" => Some(ClientAuthMode::Require),
            "" | "requireandverify" => Some(ClientAuthMode::RequireAndVerify),
            "optional" => Some(ClientAuthMode::Optional),
            _ => None,
        }
    }
}

/// How the listener terminates TLS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsPolicy {
    Disabled,
    Manual {
        cert_file: PathBuf,
        key_file: PathBuf,
    },
    Autocert(AcmeSettings),
    MutualTls {
        cert_file: PathBuf,
        key_file: PathBuf,
        ca_cert_file: PathBuf,
        client_auth: ClientAuthMode,
    },
}

/// TLS material loaded and ready for the listener.
pub enum PreparedTls {
    Plain,
    Rustls(RustlsConfig),
    Acme(AcmeSetup),
}

impl TlsPolicy {
    /// Select the policy from server settings.
    pub fn from_config(server: &ServerSettings) -> Result<Self, TlsError> {
        if !server.use_tls {
            return Ok(TlsPolicy::Disabled);
        }

        let mode = TlsMode::parse(&server.tls_mode).ok_or_else(|| TlsError::UnknownMode(server.tls_mode.clone()))?;
        let policy = match mode {
            TlsMode::Manual => TlsPolicy::Manual {
                cert_file: PathBuf::from(&server.cert_file),
                key_file: PathBuf::from(&server.key_file),
            },
            TlsMode::Autocert => TlsPolicy::Autocert(AcmeSettings::from_config(server)),
            TlsMode::Mtls => TlsPolicy::MutualTls {
                cert_file: PathBuf::from(&server.cert_file),
                key_file: PathBuf::from(&server.key_file),
                ca_cert_file: PathBuf::from(&server.mtls.ca_cert_file),
                client_auth: ClientAuthMode::parse(&server.mtls.client_auth_type)
                    .ok_or_else(|| TlsError::UnknownClientAuth(server.mtls.client_auth_type.clone()))?,
            },
        };
        Ok(policy)
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, TlsPolicy::Disabled)
    }

    /// Scheme clients use to reach the listener.
    pub fn scheme(&self) -> &'static str {
        if self.is_enabled() {
            "https"
        } else {
            "http"
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TlsPolicy::Disabled => "disabled",
            TlsPolicy::Manual { .. } => "manual",
            TlsPolicy::Autocert(_) => "autocert",
            TlsPolicy::MutualTls { .. } => "mtls",
        }
    }

    /// Load every file the policy needs.
    pub fn prepare(&self) -> Result<PreparedTls, TlsError> {
        match self {
            TlsPolicy::Disabled => Ok(PreparedTls::Plain),
            TlsPolicy::Manual { cert_file, key_file } => {
                let config = manual_server_config(cert_file, key_file)?;
                Ok(PreparedTls::Rustls(RustlsConfig::from_config(Arc::new(config))))
            }
            TlsPolicy::Autocert(settings) => Ok(PreparedTls::Acme(settings.prepare()?)),
            TlsPolicy::MutualTls {
                cert_file,
                key_file,
                ca_cert_file,
                client_auth,
            } => {
                let config = mtls_server_config(cert_file, key_file, ca_cert_file, *client_auth)?;
                Ok(PreparedTls::Rustls(RustlsConfig::from_config(Arc::new(config))))
            }
        }
    }
}

/// Install the process-wide rustls provider if none is set yet.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

fn crypto_provider() -> Arc<CryptoProvider> {
    install_crypto_provider();
    CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path).map(BufReader::new).map_err(|source| TlsError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Read every certificate from a PEM file.
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

/// Read the first private key from a PEM file.
pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(path.to_path_buf()))
}

/// Build a trust store from a PEM CA bundle.
pub fn load_ca_roots(path: &Path) -> Result<RootCertStore, TlsError> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(path)? {
        roots.add(cert).map_err(|source| TlsError::InvalidCa {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(roots)
}

/// Client verifier for the given policy.
pub fn client_verifier(
    mode: ClientAuthMode,
    roots: RootCertStore,
    provider: Arc<CryptoProvider>,
) -> Result<Arc<dyn ClientCertVerifier>, TlsError> {
    let roots = Arc::new(roots);
    let verifier = match mode {
        ClientAuthMode::Require => Arc::new(AnyClientCert { provider }) as Arc<dyn ClientCertVerifier>,
        ClientAuthMode::RequireAndVerify => WebPkiClientVerifier::builder_with_provider(roots, provider).build()?,
        ClientAuthMode::Optional => WebPkiClientVerifier::builder_with_provider(roots, provider)
            .allow_unauthenticated()
            .build()?,
    };
    Ok(verifier)
}

pub fn manual_server_config(cert_file: &Path, key_file: &Path) -> Result<ServerConfig, TlsError> {
    let certs = load_certs(cert_file)?;
    let key = load_private_key(key_file)?;

    let mut config = ServerConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    config.alpn_protocols = alpn();
    Ok(config)
}

pub fn mtls_server_config(
    cert_file: &Path,
    key_file: &Path,
    ca_cert_file: &Path,
    mode: ClientAuthMode,
) -> Result<ServerConfig, TlsError> {
    let roots = load_ca_roots(ca_cert_file)?;
    let certs = load_certs(cert_file)?;
    let key = load_private_key(key_file)?;
    let provider = crypto_provider();
    let verifier = client_verifier(mode, roots, provider.clone())?;

    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_client_cert_verifier(verifier)
        .with_single_cert(certs, key)?;
    config.alpn_protocols = alpn();
    Ok(config)
}

fn alpn() -> Vec<Vec<u8>> {
    vec![b"h2".to_vec(), b"http/1.1".to_vec()]
}

/// Requires a client certificate but accepts any, as long as the handshake
/// signature made with it is valid.
#[derive(Debug)]
struct AnyClientCert {
    provider: Arc<CryptoProvider>,
}

impl ClientCertVerifier for AnyClientCert {
    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}
