//! Shutdown coordination for the gateway.

use std::time::Duration;

use crate::net::{GatewayListener, ListenerError};

/// Drain budget given to in-flight requests on termination.
pub const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(5);

/// Stop `listener`, waiting at most `deadline` for in-flight requests.
pub async fn drain(listener: &GatewayListener, deadline: Duration) -> Result<(), ListenerError> {
    tracing::info!(deadline = ?deadline, "Graceful shutdown started");
    let result = listener.stop(deadline).await;
    match &result {
        Ok(()) => tracing::info!("Graceful shutdown complete"),
        Err(e) => tracing::error!(error = %e, "Graceful shutdown failed"),
    }
    result
}
