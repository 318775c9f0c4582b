//! Backend resolution subsystem.
//!
//! # Data Flow
//! ```text
//! RouteConfig.backend (string)
//!     → classifier.rs (directory? absolute URL? neither?)
//!     → BackendResolution (cached on the route)
//!     → http::dispatch picks static / proxy / invalid handling per request
//! ```
//!
//! # Design Decisions
//! - Classification happens once, at route table construction
//! - Invalid descriptors do not abort startup; they answer 502 per request

pub mod classifier;

pub use classifier::{classify, BackendResolution, ProxyTarget};
