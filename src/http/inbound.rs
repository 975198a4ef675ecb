//! Inbound request assembly state machine.
//!
//! # States
//! ```text
//! WaitingForRequest ──head──▶ WaitingForEndOfRequest(head, body)
//!                                 │  ▲
//!                                 └──┘ body chunk (appended)
//! WaitingForEndOfRequest ──end──▶ ProcessingRequest(request)
//! ProcessingRequest ──processed──▶ WaitingForRequest
//! ```
//!
//! # Design Decisions
//! - One instance per connection, owned by whoever drives that connection
//! - The transition function is pure; the only side effect of entering
//!   `ProcessingRequest` is handing the request back to the caller
//! - Events without a transition leave the state untouched and come back
//!   as an [`InboundAnomaly`] for the caller to log and count
//! - A new head is refused while a request is processing, so at most one
//!   logical request per connection is ever in flight

use bytes::{Bytes, BytesMut};
use thiserror::Error;

use crate::http::request::{Request, RequestHead};

#[derive(Debug)]
pub enum InboundState {
    WaitingForRequest,
    WaitingForEndOfRequest { head: RequestHead, body: BytesMut },
    ProcessingRequest(Request),
}

impl InboundState {
    pub fn name(&self) -> &'static str {
        match self {
            InboundState::WaitingForRequest => "waiting_for_request",
            InboundState::WaitingForEndOfRequest { .. } => "waiting_for_end_of_request",
            InboundState::ProcessingRequest(_) => "processing_request",
        }
    }
}

#[derive(Debug)]
pub enum InboundEvent {
    ReceivedHead(RequestHead),
    ReceivedBodyChunk(Bytes),
    ReceivedEnd,
    ProcessedRequest,
}

impl InboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            InboundEvent::ReceivedHead(_) => "received_head",
            InboundEvent::ReceivedBodyChunk(_) => "received_body_chunk",
            InboundEvent::ReceivedEnd => "received_end",
            InboundEvent::ProcessedRequest => "processed_request",
        }
    }
}

/// Result of applying an event to a state.
#[derive(Debug)]
pub enum Transition {
    /// The machine moved to this state.
    Moved(InboundState),
    /// No transition exists; the original state is handed back.
    Ignored(InboundState),
}

/// Pure transition function.
pub fn transition(state: InboundState, event: InboundEvent) -> Transition {
    use InboundEvent::*;
    use InboundState::*;

    match (state, event) {
        (WaitingForRequest, ReceivedHead(head)) => Transition::Moved(WaitingForEndOfRequest {
            head,
            body: BytesMut::new(),
        }),
        (WaitingForEndOfRequest { head, mut body }, ReceivedBodyChunk(chunk)) => {
            body.extend_from_slice(&chunk);
            Transition::Moved(WaitingForEndOfRequest { head, body })
        }
        (WaitingForEndOfRequest { head, body }, ReceivedEnd) => {
            Transition::Moved(ProcessingRequest(Request::new(head, body.freeze())))
        }
        (ProcessingRequest(_), ProcessedRequest) => Transition::Moved(WaitingForRequest),
        (state, _) => Transition::Ignored(state),
    }
}

/// An event arrived that has no transition from the current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("inbound event {event} ignored in state {state}")]
pub struct InboundAnomaly {
    pub state: &'static str,
    pub event: &'static str,
}

/// Per-connection assembly of transport events into requests.
#[derive(Debug)]
pub struct InboundAssembly {
    state: InboundState,
}

impl Default for InboundAssembly {
    fn default() -> Self {
        Self::new()
    }
}

impl InboundAssembly {
    pub fn new() -> Self {
        Self {
            state: InboundState::WaitingForRequest,
        }
    }

    pub fn state(&self) -> &InboundState {
        &self.state
    }

    /// Apply `event`. Returns the assembled request when the machine enters
    /// `ProcessingRequest`.
    pub fn fire(&mut self, event: InboundEvent) -> Result<Option<Request>, InboundAnomaly> {
        let event_name = event.name();
        let current = std::mem::replace(&mut self.state, InboundState::WaitingForRequest);

        match transition(current, event) {
            Transition::Moved(next) => {
                self.state = next;
                match &self.state {
                    InboundState::ProcessingRequest(request) => Ok(Some(request.clone())),
                    _ => Ok(None),
                }
            }
            Transition::Ignored(unchanged) => {
                let anomaly = InboundAnomaly {
                    state: unchanged.name(),
                    event: event_name,
                };
                self.state = unchanged;
                Err(anomaly)
            }
        }
    }

    /// Drop any partial request. Used when the transport aborts mid-request.
    pub fn reset(&mut self) {
        self.state = InboundState::WaitingForRequest;
    }
}
