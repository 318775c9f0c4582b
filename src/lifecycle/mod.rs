//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → Route table → TLS policy → Router → Listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain in-flight → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then routing, then listeners
//! - Shutdown has a deadline; expiry is an error, not a forced close

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;

pub use shutdown::SHUTDOWN_DEADLINE;
pub use state::ListenerState;
