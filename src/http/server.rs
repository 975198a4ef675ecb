//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the worker runtime sized from config
//! - Run the accept loop over a bounded [`Listener`]
//! - Hand every connection to the hyper glue with the shared router
//! - Stop accepting on shutdown and drain live connections

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Runtime;

use crate::config::{ListenerConfig, RuntimeConfig};
use crate::net::connection::{serve_connection, ConnectionSettings, ConnectionTracker};
use crate::net::listener::{Listener, ListenerError};
use crate::routing::Router;

/// How long shutdown waits for open connections.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Multi-threaded runtime with `worker_threads` workers (0 = one per core).
pub fn build_runtime(config: &RuntimeConfig) -> io::Result<Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if config.worker_threads > 0 {
        builder.worker_threads(config.worker_threads);
    }
    builder.thread_name("switchyard-worker").enable_all().build()
}

/// Serves one router over TCP.
pub struct HttpServer {
    router: Arc<Router>,
    config: ListenerConfig,
    tracker: ConnectionTracker,
}

impl HttpServer {
    /// The router must be fully built; it is read-only from here on.
    pub fn new(router: Router, config: ListenerConfig) -> Self {
        Self {
            router: Arc::new(router),
            config,
            tracker: ConnectionTracker::new(),
        }
    }

    /// Bind the configured address.
    pub fn bind(&self) -> Result<Listener, ListenerError> {
        Listener::bind(&self.config)
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Accept connections on `listener` until `shutdown` resolves.
    pub async fn run<F>(self, listener: Listener, shutdown: F) -> Result<(), ListenerError>
    where
        F: Future<Output = ()>,
    {
        let addr: Option<SocketAddr> = listener.local_addr().ok();
        tracing::info!(address = ?addr, keep_alive = self.config.keep_alive, "HTTP server starting");

        let settings = ConnectionSettings {
            keep_alive: self.config.keep_alive,
            max_body_bytes: self.config.max_body_bytes,
        };

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let guard = self.tracker.track();
                        let router = Arc::clone(&self.router);
                        tokio::spawn(async move {
                            serve_connection(stream, peer, router, settings, guard).await;
                            drop(permit);
                        });
                    }
                    Err(err) => {
                        // transient (EMFILE, ECONNABORTED); back off briefly
                        tracing::warn!(error = %err, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                },
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, no longer accepting");
                    break;
                }
            }
        }

        drop(listener);
        if !self.tracker.wait_for_drain(DRAIN_TIMEOUT).await {
            tracing::warn!(open = self.tracker.active_count(), "Connections still open after drain timeout");
        }
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Bind, then serve until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ListenerError>
    where
        F: Future<Output = ()>,
    {
        let listener = self.bind()?;
        self.run(listener, shutdown).await
    }
}
