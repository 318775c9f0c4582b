//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Server settings
//!     → tls.rs (select policy, load certificates, build rustls config)
//!     → acme.rs (autocert only: ACME state + acceptor)
//!     → listener.rs (bind, serve router, drain on stop)
//!     → idle.rs (per-socket idle limit under every acceptor)
//!     → redirect.rs (optional plaintext listener answering 301)
//!
//! Listener States:
//!     Stopped → Running → Stopping → Stopped
//! ```
//!
//! # Design Decisions
//! - TLS policy is fixed at construction and loaded before binding
//! - One handle per server so `stop` drains both listeners

pub mod acme;
pub mod idle;
pub mod listener;
pub mod redirect;
pub mod tls;

pub use listener::{GatewayListener, ListenerError};
pub use tls::{ClientAuthMode, TlsError, TlsMode, TlsPolicy};
