//! Outbound response state machine.
//!
//! # States
//! ```text
//! Initial ──head──▶ SentHead ──body──▶ SentHead ──terminator──▶ Finished
//! ```
//!
//! # Design Decisions
//! - Transitions are a pure function
//! - Every send holds the response's write lock for its whole
//!   head/body/terminator sequence, so clones racing on one response cannot
//!   interleave frames; the loser finds the response finished
//! - Sending a body always finalizes, whether or not the write succeeded
//! - A failed write is logged and the response is force-finalized; it is
//!   never retried
//! - Anything sent after `Finished` is silently dropped

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use bytes::Bytes;
use serde::Serialize;

use crate::http::channel::{Channel, ResponseHead, TransportError};
use crate::http::content_type::ContentType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseState {
    Initial,
    SentHead,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseEvent {
    Head,
    Body,
    Terminator,
}

/// Next state for `event`, or `None` when the event is not allowed.
pub fn transition(state: ResponseState, event: ResponseEvent) -> Option<ResponseState> {
    use ResponseEvent::*;
    use ResponseState::*;

    match (state, event) {
        (Initial, Head) => Some(SentHead),
        (SentHead, Body) => Some(SentHead),
        (SentHead, Terminator) => Some(Finished),
        _ => None,
    }
}

/// Everything needed to answer a request in one go.
#[derive(Debug, Clone)]
pub struct Payload {
    status: StatusCode,
    headers: Vec<(String, String)>,
    content_type: Option<ContentType>,
    body: Bytes,
}

impl Payload {
    /// UTF-8 text, labelled `text/plain`.
    pub fn text(text: impl Into<String>) -> Self {
        Self::bytes(text.into(), Some(ContentType::Text))
    }

    pub fn bytes(body: impl Into<Bytes>, content_type: Option<ContentType>) -> Self {
        Self {
            status: StatusCode::OK,
            headers: Vec::new(),
            content_type,
            body: body.into(),
        }
    }

    /// Serialize `value` as JSON. An encoding failure yields an empty body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_else(|err| {
            tracing::error!(error = %err, "Failed to encode JSON body");
            Vec::new()
        });
        Self::bytes(body, Some(ContentType::Json))
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Add a header. Later headers replace earlier ones with the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_content_type(mut self, content_type: Option<ContentType>) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.headers.len() + 2);
        for (name, value) in &self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    map.insert(name, value);
                }
                _ => tracing::warn!(header = %name, "Dropping invalid response header"),
            }
        }
        if let Some(content_type) = &self.content_type {
            match HeaderValue::from_str(&content_type.as_header()) {
                Ok(value) => {
                    map.insert(header::CONTENT_TYPE, value);
                }
                Err(_) => tracing::warn!(%content_type, "Dropping invalid content type"),
            }
        }
        map.insert(header::CONTENT_LENGTH, HeaderValue::from(self.body.len()));
        map
    }
}

#[derive(Debug, Clone, Copy)]
struct Progress {
    state: ResponseState,
    status: Option<StatusCode>,
}

struct Inner {
    progress: Mutex<Progress>,
    // held across channel writes; `progress` is only ever held briefly
    writer: tokio::sync::Mutex<()>,
    channel: Arc<dyn Channel>,
}

/// Handle to the single response of one request cycle.
///
/// Clones share the same state, so whichever clone finalizes first wins
/// and every later send is a no-op.
#[derive(Clone)]
pub struct Response {
    inner: Arc<Inner>,
}

impl Response {
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self {
            inner: Arc::new(Inner {
                progress: Mutex::new(Progress {
                    state: ResponseState::Initial,
                    status: None,
                }),
                writer: tokio::sync::Mutex::new(()),
                channel,
            }),
        }
    }

    pub fn state(&self) -> ResponseState {
        self.progress().state
    }

    pub fn is_finished(&self) -> bool {
        self.state() == ResponseState::Finished
    }

    /// Status of the head that went out, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.progress().status
    }

    /// Send the status line and headers. No-op unless nothing was sent yet.
    pub async fn send_head(&self, status: StatusCode, headers: HeaderMap) {
        let _writer = self.inner.writer.lock().await;
        self.write_head(status, headers).await;
    }

    /// Send `chunk` as the whole body and finalize. Sends a `200` head with
    /// a computed length first if no head went out yet.
    pub async fn send_body(&self, chunk: Bytes) {
        let _writer = self.inner.writer.lock().await;
        if self.state() == ResponseState::Initial {
            self.write_payload(Payload::bytes(chunk, Some(ContentType::Binary))).await;
            return;
        }
        self.write_body(chunk).await;
    }

    /// Send a complete response.
    pub async fn send(&self, payload: Payload) {
        let _writer = self.inner.writer.lock().await;
        self.write_payload(payload).await;
    }

    pub async fn send_text(&self, text: impl Into<String>) {
        self.send(Payload::text(text)).await;
    }

    pub async fn send_json<T: Serialize + ?Sized>(&self, value: &T) {
        self.send(Payload::json(value)).await;
    }

    /// Emit the terminator and close the channel. Only the first call after
    /// the head has an effect.
    pub async fn finish(&self) {
        let _writer = self.inner.writer.lock().await;
        self.write_terminator().await;
    }

    // The write_* helpers expect the caller to hold `writer`.

    async fn write_payload(&self, payload: Payload) {
        if self.is_finished() {
            tracing::trace!("Ignoring send on finished response");
            return;
        }
        let headers = payload.header_map();
        self.write_head(payload.status, headers).await;
        self.write_body(payload.body).await;
    }

    async fn write_head(&self, status: StatusCode, headers: HeaderMap) {
        {
            let mut progress = self.progress();
            match transition(progress.state, ResponseEvent::Head) {
                Some(next) => {
                    progress.state = next;
                    progress.status = Some(status);
                }
                None => {
                    tracing::trace!(state = ?progress.state, "Ignoring head on started response");
                    return;
                }
            }
        }

        if let Err(err) = self.inner.channel.send_head(ResponseHead { status, headers }).await {
            log_write_failure("head", &err);
            self.write_terminator().await;
        }
    }

    async fn write_body(&self, chunk: Bytes) {
        if !self.advance(ResponseEvent::Body) {
            return;
        }
        if let Err(err) = self.inner.channel.send_body(chunk).await {
            log_write_failure("body", &err);
        }
        self.write_terminator().await;
    }

    async fn write_terminator(&self) {
        if !self.advance(ResponseEvent::Terminator) {
            return;
        }
        if let Err(err) = self.inner.channel.send_terminator().await {
            log_write_failure("terminator", &err);
        }
        self.inner.channel.close().await;
    }

    fn advance(&self, event: ResponseEvent) -> bool {
        let mut progress = self.progress();
        match transition(progress.state, event) {
            Some(next) => {
                progress.state = next;
                true
            }
            None => false,
        }
    }

    fn progress(&self) -> MutexGuard<'_, Progress> {
        self.inner.progress.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let progress = *self.progress();
        f.debug_struct("Response")
            .field("state", &progress.state)
            .field("status", &progress.status)
            .finish()
    }
}

fn log_write_failure(frame: &'static str, err: &TransportError) {
    match err {
        // peer went away while the handler was working
        TransportError::Closed => tracing::debug!(frame, "Response channel already closed"),
        TransportError::Write(_) => tracing::error!(frame, error = %err, "Response write failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::channel::{Frame, MemoryChannel};
    use futures_util::future::BoxFuture;

    fn response() -> (Response, MemoryChannel) {
        let channel = MemoryChannel::new();
        (Response::new(Arc::new(channel.clone())), channel)
    }

    #[test]
    fn test_transition_table() {
        use ResponseEvent::*;
        use ResponseState::*;

        assert_eq!(transition(Initial, Head), Some(SentHead));
        assert_eq!(transition(SentHead, Body), Some(SentHead));
        assert_eq!(transition(SentHead, Terminator), Some(Finished));
        assert_eq!(transition(Initial, Body), None);
        assert_eq!(transition(Initial, Terminator), None);
        assert_eq!(transition(SentHead, Head), None);
        assert_eq!(transition(Finished, Head), None);
        assert_eq!(transition(Finished, Body), None);
        assert_eq!(transition(Finished, Terminator), None);
    }

    #[tokio::test]
    async fn test_send_text_frames_in_order() {
        let (response, channel) = response();
        response.send_text("hello").await;

        let frames = channel.frames();
        assert_eq!(frames.len(), 4);
        assert!(matches!(frames[0], Frame::Head(_)));
        assert_eq!(frames[1], Frame::Body(Bytes::from_static(b"hello")));
        assert_eq!(frames[2], Frame::Terminator);
        assert_eq!(frames[3], Frame::Close);

        let head = channel.head().unwrap();
        assert_eq!(head.status, StatusCode::OK);
        assert_eq!(head.headers[header::CONTENT_TYPE], "text/plain");
        assert_eq!(head.headers[header::CONTENT_LENGTH], "5");
        assert!(response.is_finished());
    }

    #[tokio::test]
    async fn test_sends_after_finish_are_ignored() {
        let (response, channel) = response();
        response.send_text("first").await;
        response.send_text("second").await;
        response.send_body(Bytes::from_static(b"third")).await;
        response.finish().await;

        assert_eq!(channel.body_text(), "first");
        assert_eq!(channel.count(&Frame::Terminator), 1);
        assert_eq!(channel.count(&Frame::Close), 1);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let (response, channel) = response();
        let clone = response.clone();
        clone.send_text("from clone").await;
        response.send_text("from original").await;

        assert_eq!(channel.body_text(), "from clone");
        assert!(response.is_finished());
    }

    #[tokio::test]
    async fn test_head_then_body() {
        let (response, channel) = response();
        response.send_head(StatusCode::ACCEPTED, HeaderMap::new()).await;
        assert_eq!(response.state(), ResponseState::SentHead);
        // second head is a no-op
        response.send_head(StatusCode::IM_A_TEAPOT, HeaderMap::new()).await;
        response.send_body(Bytes::from_static(b"payload")).await;

        assert_eq!(channel.count(&Frame::Head(ResponseHead {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
        })), 1);
        assert_eq!(channel.status(), Some(StatusCode::ACCEPTED));
        assert_eq!(response.status(), Some(StatusCode::ACCEPTED));
        assert_eq!(channel.body_text(), "payload");
        assert!(response.is_finished());
    }

    #[tokio::test]
    async fn test_send_body_from_initial_computes_head() {
        let (response, channel) = response();
        response.send_body(Bytes::from_static(b"raw")).await;

        let head = channel.head().unwrap();
        assert_eq!(head.headers[header::CONTENT_LENGTH], "3");
        assert_eq!(head.headers[header::CONTENT_TYPE], "application/octet-stream");
        assert_eq!(channel.count(&Frame::Terminator), 1);
    }

    #[tokio::test]
    async fn test_write_failure_still_finalizes() {
        let channel = MemoryChannel::failing();
        let response = Response::new(Arc::new(channel.clone()));
        response.send_text("lost").await;

        assert!(response.is_finished());
        assert_eq!(channel.frames(), vec![Frame::Close]);
        // further sends stay silent
        response.send_text("again").await;
        assert_eq!(channel.frames(), vec![Frame::Close]);
    }

    #[tokio::test]
    async fn test_payload_headers_last_write_wins() {
        let (response, channel) = response();
        let payload = Payload::json(&serde_json::json!({"ok": true}))
            .with_status(StatusCode::CREATED)
            .with_header("X-Trace", "one")
            .with_header("x-trace", "two")
            .with_header("Content-Length", "999");
        response.send(payload).await;

        let head = channel.head().unwrap();
        assert_eq!(head.status, StatusCode::CREATED);
        assert_eq!(head.headers["x-trace"], "two");
        assert_eq!(head.headers.get_all("x-trace").iter().count(), 1);
        assert_eq!(head.headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(head.headers[header::CONTENT_LENGTH], "11");
        assert_eq!(channel.body_text(), r#"{"ok":true}"#);
    }

    /// Suspends before every head write, like a transport flushing a socket.
    struct SlowHeadChannel {
        inner: MemoryChannel,
    }

    impl Channel for SlowHeadChannel {
        fn send_head(&self, head: ResponseHead) -> BoxFuture<'_, Result<(), TransportError>> {
            Box::pin(async move {
                tokio::task::yield_now().await;
                self.inner.send_head(head).await
            })
        }

        fn send_body(&self, chunk: Bytes) -> BoxFuture<'_, Result<(), TransportError>> {
            self.inner.send_body(chunk)
        }

        fn send_terminator(&self) -> BoxFuture<'_, Result<(), TransportError>> {
            self.inner.send_terminator()
        }

        fn close(&self) -> BoxFuture<'_, ()> {
            self.inner.close()
        }
    }

    #[tokio::test]
    async fn test_racing_clones_never_interleave_frames() {
        let channel = MemoryChannel::new();
        let response = Response::new(Arc::new(SlowHeadChannel {
            inner: channel.clone(),
        }));
        let clone = response.clone();

        tokio::join!(response.send_text("aaaaaaaaaa"), clone.send_text("b"));

        let frames = channel.frames();
        assert_eq!(frames.len(), 4);
        assert!(matches!(frames[0], Frame::Head(_)));
        assert_eq!(frames[1], Frame::Body(Bytes::from_static(b"aaaaaaaaaa")));
        assert_eq!(frames[2], Frame::Terminator);
        assert_eq!(frames[3], Frame::Close);
        assert_eq!(channel.head().unwrap().headers[header::CONTENT_LENGTH], "10");
    }

    #[tokio::test]
    async fn test_finish_before_head_is_noop() {
        let (response, channel) = response();
        response.finish().await;
        assert_eq!(response.state(), ResponseState::Initial);
        assert!(channel.frames().is_empty());
    }
}
