//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (request counters and latency histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line of a request via TraceLayer spans
//! - Metrics are cheap and disabled unless configured

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use self::metrics::{init_metrics, record_request, Outcome};
