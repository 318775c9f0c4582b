//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, path)
//!     → table.rs (exact index, then ranked prefix list)
//!     → matcher.rs (evaluate host and path conditions)
//!     → Return: Matched(route) | NotFound | NoRoutes
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → RouteSpec (normalized)
//!     → classify backend once
//!     → rank prefixes (longest first, host-specific first, config order)
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (literal, segment-aware comparisons only)
//! - Deterministic: same input always matches same route
//! - Precedence is explicit, not inherited from the HTTP framework

pub mod matcher;
pub mod table;

pub use matcher::MatchType;
pub use table::{Route, RouteMatch, RouteSpec, RouteTable, RouteTableError};
