//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the route table and TLS policy from validated configuration
//! - Assemble the router and listener
//! - Serve until a termination signal, then drain
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The listener runs on its own task so `stop` can drain it

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::http::build_router;
use crate::lifecycle::shutdown::{drain, SHUTDOWN_DEADLINE};
use crate::lifecycle::signals::wait_for_termination;
use crate::net::{GatewayListener, ListenerError, TlsPolicy};
use crate::resilience::Timeouts;
use crate::routing::{RouteTable, RouteTableError};

/// Error type for startup and the serve loop.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("route table: {0}")]
    Routes(#[from] RouteTableError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("signal handler: {0}")]
    Signal(#[source] std::io::Error),

    #[error("listener task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Build a ready-to-start listener from configuration.
pub fn build_listener(config: &GatewayConfig) -> Result<GatewayListener, StartupError> {
    let table = RouteTable::from_config(&config.routes)?;
    let policy = TlsPolicy::from_config(&config.server).map_err(ListenerError::from)?;
    let timeouts = Timeouts::default();

    let app = build_router(table, timeouts, policy.scheme());
    let listener = GatewayListener::from_config(&config.server, app)?.with_timeouts(timeouts);
    Ok(listener)
}

/// Serve until SIGINT/SIGTERM, then drain within the shutdown deadline.
pub async fn run(config: GatewayConfig) -> Result<(), StartupError> {
    let listener = Arc::new(build_listener(&config)?);

    let mut serving = {
        let listener = Arc::clone(&listener);
        tokio::spawn(async move { listener.start().await })
    };

    tokio::select! {
        result = &mut serving => {
            result??;
            Ok(())
        }
        signal = wait_for_termination() => {
            let name = signal.map_err(StartupError::Signal)?;
            tracing::info!(signal = name, "Termination signal received");
            drain(&listener, SHUTDOWN_DEADLINE).await?;
            serving.await??;
            Ok(())
        }
    }
}
