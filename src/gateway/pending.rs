//! Pending-call registry
//!
//! Maps correlation identifiers to the callers waiting on them. Each entry
//! is settled at most once: resolving, rejecting, cancelling and draining
//! all remove the entry before completing it.

use rand::Rng;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{Error, Result};

/// Suffix marking the handshake's correlation identifier
pub const HANDSHAKE_SUFFIX: &str = "connect";

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 6;

/// Continuation of an outstanding call
pub type Completion = oneshot::Sender<Result<Value>>;

/// One in-flight request
#[derive(Debug)]
pub struct PendingCall {
    /// Method the call was issued for, for diagnostics
    pub method: String,
    completion: Completion,
}

impl PendingCall {
    /// Settle the call; the receiver may already be gone
    fn complete(self, outcome: Result<Value>) {
        if self.completion.send(outcome).is_err() {
            debug!("Caller of {} stopped waiting", self.method);
        }
    }
}

/// Outstanding calls keyed by correlation identifier
#[derive(Debug, Default)]
pub struct PendingCalls {
    calls: HashMap<String, PendingCall>,
}

impl PendingCalls {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a call; an identifier may only be registered once at a time
    pub fn register(
        &mut self,
        id: impl Into<String>,
        method: impl Into<String>,
        completion: Completion,
    ) -> Result<()> {
        let id = id.into();
        if self.calls.contains_key(&id) {
            return Err(Error::InvalidInput(format!("Duplicate request id: {}", id)));
        }
        self.calls.insert(
            id,
            PendingCall {
                method: method.into(),
                completion,
            },
        );
        Ok(())
    }

    /// Complete a call with its payload; unknown IDs are ignored
    pub fn resolve(&mut self, id: &str, payload: Value) -> bool {
        self.settle(id, Ok(payload))
    }

    /// Fail a call; unknown IDs are ignored
    pub fn reject(&mut self, id: &str, error: Error) -> bool {
        self.settle(id, Err(error))
    }

    fn settle(&mut self, id: &str, outcome: Result<Value>) -> bool {
        match self.calls.remove(id) {
            Some(call) => {
                call.complete(outcome);
                true
            }
            None => {
                debug!("No pending call for response {}", id);
                false
            }
        }
    }

    /// Remove a call without completing it (its deadline passed)
    pub fn cancel(&mut self, id: &str) -> Option<PendingCall> {
        self.calls.remove(id)
    }

    /// Move a call to a new identifier, keeping its continuation
    pub fn rekey(&mut self, from: &str, to: impl Into<String>) -> bool {
        let to = to.into();
        if from == to {
            return self.calls.contains_key(from);
        }
        if self.calls.contains_key(&to) {
            return false;
        }
        match self.calls.remove(from) {
            Some(call) => {
                self.calls.insert(to, call);
                true
            }
            None => false,
        }
    }

    /// Fail every outstanding call and clear the registry
    pub fn drain_all(&mut self, error: impl Fn() -> Error) -> usize {
        let drained = self.calls.len();
        for (_, call) in self.calls.drain() {
            call.complete(Err(error()));
        }
        drained
    }

    /// Whether an identifier is outstanding
    pub fn contains(&self, id: &str) -> bool {
        self.calls.contains_key(id)
    }

    /// Number of outstanding calls
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Whether nothing is outstanding
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Generate an identifier not currently in use
    pub fn fresh_id(&self) -> String {
        loop {
            let id = format!("{}-{}", timestamp_millis(), random_suffix());
            if !self.calls.contains_key(&id) {
                return id;
            }
        }
    }

    /// Generate the identifier for a handshake attempt
    pub fn handshake_id(&self, attempt: u32) -> String {
        let mut id = format!("{}-{}-{}", timestamp_millis(), attempt, HANDSHAKE_SUFFIX);
        while self.calls.contains_key(&id) {
            id = format!("{}-{}-{}-{}", timestamp_millis(), attempt, random_suffix(), HANDSHAKE_SUFFIX);
        }
        id
    }
}

fn timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn random_suffix() -> String {
    let mut rng = rand::rng();
    (0..ID_SUFFIX_LEN)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect()
}
