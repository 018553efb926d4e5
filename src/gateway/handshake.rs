//! Handshake controller
//!
//! Drives the `connect` exchange that must succeed before any application
//! request is accepted:
//!
//! ```text
//!   IDLE ──open / challenge──▶ HANDSHAKE_SENT ──ok=true──▶ CONNECTED
//!    ▲                              │
//!    └────────challenge─────────────┤
//!                                   └──ok=false / error / timeout──▶ FAILED
//! ```
//!
//! The server may challenge any number of times before accepting. Each
//! challenge resends the same parameters under a fresh identifier, and the
//! single handshake call is moved to that identifier, so exactly one
//! handshake envelope is ever outstanding.

use serde_json::Value;
use tracing::{debug, info, warn};

use super::pending::{Completion, PendingCalls};
use super::protocol::{ConnectParams, RequestFrame, CONNECT_METHOD};

/// Handshake progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    /// Nothing in flight
    Idle,
    /// Connect envelope sent, awaiting its response
    HandshakeSent {
        /// Identifier of the outstanding connect call
        request_id: String,
    },
    /// Server accepted the connection
    Connected,
    /// Terminal failure
    Failed(String),
}

/// State machine for the connect exchange
#[derive(Debug)]
pub struct HandshakeController {
    params: ConnectParams,
    state: HandshakeState,
    /// Continuation for the connect call, until it is registered
    waiter: Option<Completion>,
    /// Registry key of the connect call; survives the re-challenge reset
    outstanding: Option<String>,
    attempts: u32,
}

impl HandshakeController {
    /// Create an idle controller that will send `params`
    pub fn new(params: ConnectParams) -> Self {
        HandshakeController {
            params,
            state: HandshakeState::Idle,
            waiter: None,
            outstanding: None,
            attempts: 0,
        }
    }

    /// Provide the continuation settled when the handshake finishes
    pub fn arm(&mut self, waiter: Completion) {
        self.waiter = Some(waiter);
    }

    /// Current state
    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    /// Whether the server accepted the connection
    pub fn is_connected(&self) -> bool {
        self.state == HandshakeState::Connected
    }

    /// Number of connect envelopes built so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether `id` belongs to the outstanding connect call
    pub fn is_handshake(&self, id: &str) -> bool {
        self.outstanding.as_deref() == Some(id)
    }

    /// Transport opened: send the first envelope
    pub fn on_open(&mut self, pending: &mut PendingCalls) -> Option<RequestFrame> {
        self.send(pending)
    }

    /// Server challenged: resend the envelope
    pub fn on_challenge(&mut self, pending: &mut PendingCalls) -> Option<RequestFrame> {
        match self.state {
            HandshakeState::HandshakeSent { .. } => {
                debug!("Connect challenge after handshake was sent, resending");
                self.state = HandshakeState::Idle;
                self.send(pending)
            }
            HandshakeState::Idle => self.send(pending),
            HandshakeState::Connected | HandshakeState::Failed(_) => {
                debug!("Ignoring connect challenge in state {:?}", self.state);
                None
            }
        }
    }

    /// IDLE → HANDSHAKE_SENT; a no-op from any other state
    fn send(&mut self, pending: &mut PendingCalls) -> Option<RequestFrame> {
        if self.state != HandshakeState::Idle {
            return None;
        }

        let id = pending.handshake_id(self.attempts + 1);

        match self.outstanding.take() {
            Some(previous) => {
                if !pending.rekey(&previous, id.clone()) {
                    warn!("Handshake call {} is no longer pending, not resending", previous);
                    return None;
                }
            }
            None => {
                let waiter = self.waiter.take()?;
                if let Err(e) = pending.register(id.clone(), CONNECT_METHOD, waiter) {
                    warn!("Could not register handshake call: {}", e);
                    return None;
                }
            }
        }

        self.attempts += 1;
        self.outstanding = Some(id.clone());
        self.state = HandshakeState::HandshakeSent {
            request_id: id.clone(),
        };

        Some(RequestFrame::new(id, CONNECT_METHOD, self.params.to_value()))
    }

    /// Response to the connect call arrived
    ///
    /// The caller settles the registry entry; this only moves the state.
    pub fn on_response(&mut self, id: &str, outcome: &std::result::Result<Value, String>) -> bool {
        if !self.is_handshake(id) {
            return false;
        }
        self.outstanding = None;

        match outcome {
            Ok(_) => {
                info!("Gateway accepted handshake after {} attempt(s)", self.attempts);
                self.state = HandshakeState::Connected;
            }
            Err(message) => {
                warn!("Gateway rejected handshake: {}", message);
                self.state = HandshakeState::Failed(message.clone());
            }
        }
        true
    }

    /// Transport error, close or deadline
    ///
    /// Returns the identifier of a still-outstanding connect call so the
    /// caller can reject it.
    pub fn fail(&mut self, reason: impl Into<String>) -> Option<String> {
        let reason = reason.into();
        if !matches!(self.state, HandshakeState::Failed(_)) {
            debug!("Handshake state {:?} -> failed: {}", self.state, reason);
            self.state = HandshakeState::Failed(reason);
        }
        self.waiter = None;
        self.outstanding.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::protocol::ClientDescriptor;
    use serde_json::json;
    use tokio::sync::oneshot;

    fn armed() -> (HandshakeController, PendingCalls, oneshot::Receiver<crate::Result<Value>>) {
        let mut controller =
            HandshakeController::new(ConnectParams::operator(ClientDescriptor::default(), None));
        let (tx, rx) = oneshot::channel();
        controller.arm(tx);
        (controller, PendingCalls::new(), rx)
    }

    #[test]
    fn test_open_sends_once() {
        let (mut hs, mut pending, _rx) = armed();

        let frame = hs.on_open(&mut pending).unwrap();
        assert_eq!(frame.method, "connect");
        assert!(frame.id.ends_with("-connect"));
        assert_eq!(frame.params["minProtocol"], 3);
        assert!(matches!(hs.state(), HandshakeState::HandshakeSent { .. }));

        // Overlapping trigger from the same state is a no-op
        assert!(hs.on_open(&mut pending).is_none());
        assert_eq!(pending.len(), 1);
        assert_eq!(hs.attempts(), 1);
    }

    #[test]
    fn test_challenges_keep_one_call_in_flight() {
        let (mut hs, mut pending, mut rx) = armed();
        let first = hs.on_open(&mut pending).unwrap();

        let mut last = first.clone();
        for _ in 0..4 {
            let next = hs.on_challenge(&mut pending).unwrap();
            assert_ne!(next.id, last.id);
            assert_eq!(next.params, first.params);
            assert_eq!(pending.len(), 1);
            assert!(pending.contains(&next.id));
            assert!(!hs.is_handshake(&last.id));
            last = next;
        }
        assert_eq!(hs.attempts(), 5);

        let outcome = Ok(json!({"hello": "ok"}));
        assert!(hs.on_response(&last.id, &outcome));
        assert!(pending.resolve(&last.id, json!({"hello": "ok"})));
        assert!(hs.is_connected());
        assert!(rx.try_recv().unwrap().is_ok());
    }

    #[test]
    fn test_challenge_before_open() {
        let (mut hs, mut pending, _rx) = armed();
        assert!(hs.on_challenge(&mut pending).is_some());
        assert!(hs.on_open(&mut pending).is_none());
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_rejection() {
        let (mut hs, mut pending, _rx) = armed();
        let frame = hs.on_open(&mut pending).unwrap();

        assert!(!hs.on_response("someone-else", &Ok(json!(null))));
        assert!(hs.on_response(&frame.id, &Err("bad token".to_string())));
        assert_eq!(hs.state(), &HandshakeState::Failed("bad token".to_string()));

        // Challenges after a terminal state are ignored
        assert!(hs.on_challenge(&mut pending).is_none());
    }

    #[test]
    fn test_fail_returns_outstanding() {
        let (mut hs, mut pending, _rx) = armed();
        let frame = hs.on_open(&mut pending).unwrap();

        assert_eq!(hs.fail("WebSocket error"), Some(frame.id));
        assert_eq!(hs.fail("again"), None);
        assert_eq!(hs.state(), &HandshakeState::Failed("WebSocket error".to_string()));
    }

    #[test]
    fn test_no_waiter_no_send() {
        let mut hs = HandshakeController::new(ConnectParams::operator(ClientDescriptor::default(), None));
        let mut pending = PendingCalls::new();
        assert!(hs.on_open(&mut pending).is_none());
        assert_eq!(hs.state(), &HandshakeState::Idle);
    }
}
