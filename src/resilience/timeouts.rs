//! Timeout enforcement.
//!
//! # Responsibilities
//! - Hold the listener's fixed read, write and idle timeouts
//! - Apply them to the connection builder and the upstream client
//! - Wrap upstream calls so a stalled backend becomes 504
//!
//! The idle limit on client connections is enforced per socket by
//! `net::idle`, not by the connection builder.
//!
//! # Design Decisions
//! - Timeouts are static durations fixed at listener construction
//! - Timeout errors are distinct from other upstream errors

use std::future::Future;
use std::time::Duration;

use hyper_util::rt::{TokioExecutor, TokioTimer};
use hyper_util::server::conn::auto::Builder;

/// Fixed HTTP-layer timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Time allowed to receive the request head.
    pub read: Duration,
    /// Time allowed to produce a response (covers the upstream wait).
    pub write: Duration,
    /// A connection with no socket activity for this long is closed.
    pub idle: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(10),
            write: Duration::from_secs(10),
            idle: Duration::from_secs(30),
        }
    }
}

impl Timeouts {
    /// Configure an accepted-connection builder.
    pub fn apply(&self, builder: &mut Builder<TokioExecutor>) {
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(self.read);
        builder.http2().timer(TokioTimer::new());
    }

    /// Deadline for the upstream wait. Shorter than `write` so a slow
    /// backend is reported by the dispatcher rather than the outer layer.
    pub fn upstream(&self) -> Duration {
        self.write - self.write / 10
    }
}

/// Outcome of an upstream call under a deadline.
#[derive(Debug)]
pub enum Upstream<T, E> {
    Completed(Result<T, E>),
    TimedOut,
}

/// Run `fut`, giving up after `limit`.
pub async fn with_timeout<T, E, F>(limit: Duration, fut: F) -> Upstream<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => Upstream::Completed(result),
        Err(_) => Upstream::TimedOut,
    }
}
