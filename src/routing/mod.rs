//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route registration (before serving):
//!     path string
//!     → pattern.rs (normalize, compile to Literal/Parameter parts)
//!     → router.rs (append entry in registration order)
//!
//! Incoming Request (method, uri, headers)
//!     → matcher.rs (decode segments + query once per request)
//!     → router.rs (gate, ordered scan, recurse into mounts)
//!     → Handled, or a 404 from the top-level router
//! ```
//!
//! # Design Decisions
//! - Route tables are built before serving and read-only afterwards
//! - No regex in hot path (segment comparison only)
//! - Deterministic: same input always matches same route
//! - First match wins (registration order)

pub mod matcher;
pub mod pattern;
pub mod router;

pub use matcher::{PathMatch, PathMatcher};
pub use pattern::{Part, PathError, PathPattern};
pub use router::{Handler, Outcome, Router, API_KEY_HEADER};
