//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Forwarded request:
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-*)
//!     → upstream
//!
//! Relayed response:
//!     → headers.rs (strip hop-by-hop)
//!     → client
//! ```
//!
//! # Design Decisions
//! - Connection-scoped headers never cross the gateway
//! - Client-supplied X-Forwarded-For is extended, never trusted as the peer

pub mod headers;
