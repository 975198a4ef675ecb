//! Outbound channel contract.
//!
//! # Responsibilities
//! - Define the frame-level operations a transport exposes for one response
//! - Provide an in-memory channel for embedding and tests
//!
//! # Design Decisions
//! - Every operation completes asynchronously and reports success/failure
//! - A closed channel is a normal outcome (peer went away), not a bug

use std::sync::{Arc, Mutex};

use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use futures_util::future::{self, BoxFuture};
use thiserror::Error;

/// Status line and headers of an outbound response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

/// Errors reported by a transport channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The peer or the connection is gone.
    #[error("channel closed")]
    Closed,
    /// The transport failed to write a frame.
    #[error("write failed: {0}")]
    Write(String),
}

/// Frame-level writer for a single response.
pub trait Channel: Send + Sync {
    fn send_head(&self, head: ResponseHead) -> BoxFuture<'_, Result<(), TransportError>>;

    fn send_body(&self, chunk: Bytes) -> BoxFuture<'_, Result<(), TransportError>>;

    fn send_terminator(&self) -> BoxFuture<'_, Result<(), TransportError>>;

    fn close(&self) -> BoxFuture<'_, ()>;
}

/// A frame observed by [`MemoryChannel`].
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Head(ResponseHead),
    Body(Bytes),
    Terminator,
    Close,
}

/// Records every frame in memory. Can be told to fail writes.
#[derive(Debug, Clone, Default)]
pub struct MemoryChannel {
    frames: Arc<Mutex<Vec<Frame>>>,
    failing: bool,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel whose head, body and terminator writes all fail.
    pub fn failing() -> Self {
        Self {
            frames: Arc::default(),
            failing: true,
        }
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.lock().clone()
    }

    pub fn head(&self) -> Option<ResponseHead> {
        self.lock().iter().find_map(|frame| match frame {
            Frame::Head(head) => Some(head.clone()),
            _ => None,
        })
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.head().map(|head| head.status)
    }

    /// All body frames concatenated.
    pub fn body(&self) -> Bytes {
        let mut body = Vec::new();
        for frame in self.lock().iter() {
            if let Frame::Body(chunk) = frame {
                body.extend_from_slice(chunk);
            }
        }
        Bytes::from(body)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body()).into_owned()
    }

    pub fn count(&self, wanted: &Frame) -> usize {
        self.lock()
            .iter()
            .filter(|frame| std::mem::discriminant(*frame) == std::mem::discriminant(wanted))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Frame>> {
        self.frames.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, frame: Frame) -> Result<(), TransportError> {
        if self.failing {
            return Err(TransportError::Write("memory channel set to fail".into()));
        }
        self.lock().push(frame);
        Ok(())
    }
}

impl Channel for MemoryChannel {
    fn send_head(&self, head: ResponseHead) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(future::ready(self.record(Frame::Head(head))))
    }

    fn send_body(&self, chunk: Bytes) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(future::ready(self.record(Frame::Body(chunk))))
    }

    fn send_terminator(&self) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(future::ready(self.record(Frame::Terminator)))
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        self.lock().push(Frame::Close);
        Box::pin(future::ready(()))
    }
}
