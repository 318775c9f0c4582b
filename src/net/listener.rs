//! Listener lifecycle: bind, serve, drain.
//!
//! # Responsibilities
//! - Bind the configured address with the selected TLS policy
//! - Serve the gateway router until told to stop
//! - Run the optional HTTP→HTTPS redirect listener alongside
//! - Drain in-flight requests on `stop`, bounded by a caller deadline
//!
//! # Design Decisions
//! - A listener is single-use: `start` may succeed once
//! - TLS material is loaded before the socket is bound
//! - Shutdown is graceful only; an expired deadline is reported and the
//!   state moves to `Stopped`, remaining connections are not cut
//! - State is a `watch` channel so `stop` can await `Stopped`
//! - Every accepted socket carries the idle limit, below TLS

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::Router;
use axum_server::accept::DefaultAcceptor;
use axum_server::tls_rustls::RustlsAcceptor;
use axum_server::Handle;
use tokio::sync::watch;

use crate::config::ServerConfig;
use crate::lifecycle::ListenerState;
use crate::net::idle::IdleTimeoutAcceptor;
use crate::net::redirect::redirect_router;
use crate::net::tls::{PreparedTls, TlsError, TlsPolicy};
use crate::resilience::Timeouts;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("listener already started")]
    AlreadyStarted,

    #[error("listener is not running")]
    NotRunning,

    #[error("invalid listen address {0:?}")]
    Address(String),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),

    #[error("in-flight requests did not finish within {0:?}")]
    ShutdownTimeout(Duration),
}

/// The gateway's network listener.
pub struct GatewayListener {
    address: String,
    policy: TlsPolicy,
    redirect_port: Option<String>,
    app: Router,
    timeouts: Timeouts,
    handle: Handle,
    redirect_handle: Handle,
    state: watch::Sender<ListenerState>,
    failed: watch::Sender<bool>,
    started: AtomicBool,
}

impl GatewayListener {
    pub fn new(address: impl Into<String>, policy: TlsPolicy, app: Router) -> Self {
        let (state, _) = watch::channel(ListenerState::Stopped);
        let (failed, _) = watch::channel(false);
        Self {
            address: address.into(),
            policy,
            redirect_port: None,
            app,
            timeouts: Timeouts::default(),
            handle: Handle::new(),
            redirect_handle: Handle::new(),
            state,
            failed,
            started: AtomicBool::new(false),
        }
    }

    /// Build from server settings. The redirect listener is enabled when TLS
    /// and `redirect_http` are both set.
    pub fn from_config(server: &ServerConfig, app: Router) -> Result<Self, ListenerError> {
        let policy = TlsPolicy::from_config(server)?;
        let redirect = policy.is_enabled() && server.redirect_http;
        let listener = Self::new(&server.address, policy, app);
        Ok(if redirect {
            listener.with_redirect(&server.http_redirect_port)
        } else {
            listener
        })
    }

    /// Also answer plaintext requests on `port` with a redirect to HTTPS.
    pub fn with_redirect(mut self, port: &str) -> Self {
        self.redirect_port = Some(port.to_string());
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn policy(&self) -> &TlsPolicy {
        &self.policy
    }

    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ListenerState> {
        self.state.subscribe()
    }

    /// Bound address. Resolves once the socket is bound; `None` if `start`
    /// failed first.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        let mut failed = self.failed.subscribe();
        tokio::select! {
            addr = self.handle.listening() => addr,
            _ = failed.wait_for(|f| *f) => None,
        }
    }

    /// Serve until stopped. Resolves after the drain completes.
    pub async fn start(&self) -> Result<(), ListenerError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ListenerError::AlreadyStarted);
        }

        let result = self.serve().await;
        self.state.send_replace(ListenerState::Stopped);
        if result.is_err() {
            self.failed.send_replace(true);
        }

        match &result {
            Ok(()) => tracing::info!(address = %self.address, "Listener stopped"),
            Err(e) => tracing::error!(address = %self.address, error = %e, "Listener failed"),
        }
        result
    }

    /// Stop accepting and wait up to `deadline` for in-flight requests.
    pub async fn stop(&self, deadline: Duration) -> Result<(), ListenerError> {
        let stopping = self.state.send_if_modified(|state| {
            if *state == ListenerState::Running {
                *state = ListenerState::Stopping;
                true
            } else {
                false
            }
        });
        if !stopping {
            return Err(ListenerError::NotRunning);
        }

        let mut rx = self.state.subscribe();
        tracing::info!(address = %self.address, deadline = ?deadline, "Draining listener");
        self.handle.graceful_shutdown(None);
        self.redirect_handle.graceful_shutdown(None);

        let drained = tokio::time::timeout(deadline, rx.wait_for(|s| *s == ListenerState::Stopped))
            .await
            .is_ok();
        if drained {
            return Ok(());
        }

        // Leftover connections keep draining in the background; the
        // listener no longer accepts and is reported stopped.
        tracing::warn!(
            address = %self.address,
            connections = self.handle.connection_count(),
            "Shutdown deadline expired"
        );
        self.state.send_replace(ListenerState::Stopped);
        Err(ListenerError::ShutdownTimeout(deadline))
    }

    async fn serve(&self) -> Result<(), ListenerError> {
        let prepared = self.policy.prepare()?;
        let addr = resolve_address(&self.address).await?;
        let redirect_addr = match &self.redirect_port {
            Some(port) => Some(resolve_address(&port_address(port)).await?),
            None => None,
        };

        self.state.send_replace(ListenerState::Running);
        tracing::info!(
            address = %addr,
            tls = self.policy.name(),
            redirect = ?redirect_addr,
            "Listener starting"
        );

        let main = self.serve_gateway(addr, prepared);
        let redirect = self.serve_redirect(redirect_addr);
        tokio::try_join!(main, redirect)?;
        Ok(())
    }

    async fn serve_gateway(&self, addr: SocketAddr, prepared: PreparedTls) -> std::io::Result<()> {
        let app = self.app.clone().into_make_service_with_connect_info::<SocketAddr>();
        let idle = self.timeouts.idle;

        match prepared {
            PreparedTls::Plain => {
                let acceptor = IdleTimeoutAcceptor::new(DefaultAcceptor::new(), idle);
                let mut server = axum_server::bind(addr).acceptor(acceptor).handle(self.handle.clone());
                self.timeouts.apply(server.http_builder());
                server.serve(app).await
            }
            PreparedTls::Rustls(config) => {
                let acceptor = IdleTimeoutAcceptor::new(RustlsAcceptor::new(config), idle);
                let mut server = axum_server::bind(addr).acceptor(acceptor).handle(self.handle.clone());
                self.timeouts.apply(server.http_builder());
                server.serve(app).await
            }
            PreparedTls::Acme(setup) => {
                let (acceptor, driver) = setup.spawn();
                let acceptor = IdleTimeoutAcceptor::new(acceptor, idle);
                let mut server = axum_server::bind(addr).acceptor(acceptor).handle(self.handle.clone());
                self.timeouts.apply(server.http_builder());
                let result = server.serve(app).await;
                driver.abort();
                result
            }
        }
    }

    async fn serve_redirect(&self, addr: Option<SocketAddr>) -> std::io::Result<()> {
        let Some(addr) = addr else {
            return Ok(());
        };

        let app = redirect_router(listen_port(&self.address)).into_make_service();
        let acceptor = IdleTimeoutAcceptor::new(DefaultAcceptor::new(), self.timeouts.idle);
        let mut server = axum_server::bind(addr).acceptor(acceptor).handle(self.redirect_handle.clone());
        self.timeouts.apply(server.http_builder());
        server.serve(app).await
    }
}

/// Resolve `host:port`; a bare `:port` binds every interface.
pub async fn resolve_address(address: &str) -> Result<SocketAddr, ListenerError> {
    let address = address.trim();
    let full = if address.starts_with(':') {
        format!("0.0.0.0{address}")
    } else {
        address.to_string()
    };

    tokio::net::lookup_host(full.as_str())
        .await
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| ListenerError::Address(address.to_string()))
}

/// `"80"` and `":80"` both mean every interface on port 80.
fn port_address(port: &str) -> String {
    let port = port.trim();
    if port.contains(':') {
        port.to_string()
    } else {
        format!(":{port}")
    }
}

/// Port part of a listen address, empty when absent.
fn listen_port(address: &str) -> &str {
    address.rsplit_once(':').map(|(_, port)| port).unwrap_or("")
}
