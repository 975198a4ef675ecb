//! HTTP request/response subsystem.
//!
//! # Data Flow
//! ```text
//! transport events (head, body chunks, end)
//!     → inbound.rs (assemble one Request per cycle)
//!     → [routing layer dispatches to a handler]
//!     → response.rs (head → body → terminator, finalize once)
//!     → channel.rs (frames handed to the transport)
//! ```
//!
//! `server.rs` wires the pieces to the TCP listener.

pub mod channel;
pub mod content_type;
pub mod inbound;
pub mod json;
pub mod request;
pub mod response;
pub mod server;

pub use channel::{Channel, ResponseHead, TransportError};
pub use content_type::ContentType;
pub use json::JsonValue;
pub use request::{Request, RequestHead};
pub use response::{Payload, Response};
pub use server::HttpServer;
