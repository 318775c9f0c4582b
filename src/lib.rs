//! Edge gateway library.
//!
//! Routes HTTP(S) requests by host and path to static directories or
//! upstream URLs, rewriting upstream origins in proxied textual responses.

// Core subsystems
pub mod backend;
pub mod config;
pub mod http;
pub mod net;
pub mod routing;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::GatewayConfig;
pub use net::GatewayListener;
pub use routing::RouteTable;
