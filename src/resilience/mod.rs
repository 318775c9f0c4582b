//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Listener construction:
//!     timeouts.rs → header read timeout, HTTP/2 keep-alive
//!
//! Upstream request:
//!     → with_timeout(write) → Completed(result) | TimedOut (504)
//! ```
//!
//! # Design Decisions
//! - No retries: every exchange is a single request/response pair
//! - Upstream failures become HTTP responses, never listener errors

pub mod timeouts;

pub use timeouts::Timeouts;
