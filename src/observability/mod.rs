//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured fields: connection_id, method, uri, status)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, pretty or JSON)
//!     → Prometheus exporter (optional scrape endpoint)
//! ```
//!
//! # Design Decisions
//! - Library code only emits; the binary (or a test) picks the subscriber
//!   and the recorder, so without one every call is a no-op
//! - Metric updates are fire-and-forget through the `metrics` facade

pub mod logging;
pub mod metrics;
