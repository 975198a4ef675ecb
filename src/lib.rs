//! In-process HTTP router and connection-state engine.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ net::listener ──▶ net::connection ──▶ http::inbound
//!                                       (hyper HTTP/1)      (assemble Request)
//!                                                                 │
//!                                                                 ▼
//!                                                          routing::Router
//!                                                  (gate, ordered scan, mounts)
//!                                                                 │
//!                                                                 ▼
//!     Client Response                                        handler callback
//!     ◀────────────── net::connection ◀── http::channel ◀── http::response
//!                     (stream body)                      (head → body → end)
//!
//!     Cross-cutting: config (TOML), observability (tracing, metrics)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use switchyard::{HttpServer, Outcome, Request, Response, Router};
//! use switchyard::config::ListenerConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut router = Router::new();
//! router.get("/echo/:word", |req: Request, res: Response| async move {
//!     res.send_text(format!("Echoed word: {}", req.parameter("word"))).await;
//!     Outcome::Handled
//! });
//!
//! HttpServer::new(router, ListenerConfig::default())
//!     .serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

// Core subsystems
pub mod http;
pub mod net;
pub mod routing;

// Cross-cutting concerns
pub mod config;
pub mod observability;

pub mod demo;

pub use config::AppConfig;
pub use http::{HttpServer, Payload, Request, Response};
pub use routing::{Outcome, Router};
