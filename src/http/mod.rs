//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection (net layer)
//!     → server.rs (middleware, route lookup)
//!     → dispatch.rs (static files, proxy, or invalid backend)
//!         → rewrite.rs (proxied textual responses only)
//!     → response.rs (gateway-generated errors and placeholder)
//!     → Send to client
//! ```

pub mod dispatch;
pub mod request;
pub mod response;
pub mod rewrite;
pub mod server;

pub use dispatch::Dispatcher;
pub use request::X_REQUEST_ID;
pub use server::build_router;
