//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (id, tracking, hyper HTTP/1 glue)
//!         → http::inbound (assemble head + body into a Request)
//!         → routing::Router (dispatch on a spawned task)
//!         → HyperChannel (head via oneshot, body via mpsc stream)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - At most one logical request per connection is in flight

pub mod connection;
pub mod listener;
