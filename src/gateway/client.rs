//! Gateway RPC client
//!
//! One client owns one connection: `connect`, any number of `request`s,
//! then `close`. There is no reconnection; after a failed connect, a lost
//! socket or `close`, build a new client.
//!
//! Inbound frames are handled by a single dispatcher task per connection,
//! which is the only reader of the socket. The pending-call registry and the
//! handshake state sit behind one mutex that is never held across an
//! `.await`, so frame routing never waits on a caller.

use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::handshake::{HandshakeController, HandshakeState};
use super::pending::PendingCalls;
use super::protocol::{
    ClientDescriptor, ConnectParams, EventFrame, GatewayFrame, RequestFrame, ResponseFrame,
};
use super::transport::{Connector, Transport, TransportEvent, WsConnector};
use super::url::{parse_ws_url, to_ws_url};
use crate::config::Config;
use crate::error::{Error, Result};

/// Default overall deadline for `connect`
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default deadline for each request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(12);

const EVENT_BUFFER: usize = 256;

/// Client behaviour knobs
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Deadline for socket open plus handshake
    pub connect_timeout: Duration,
    /// Deadline for each request's response
    pub request_timeout: Duration,
    /// Descriptor sent in the handshake
    pub client: ClientDescriptor,
    /// Gateway token
    pub token: Option<secrecy::SecretString>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            client: ClientDescriptor::default(),
            token: None,
        }
    }
}

impl ClientOptions {
    /// Build options from configuration
    pub fn from_config(config: &Config) -> Self {
        ClientOptions {
            connect_timeout: config.gateway.connect_timeout,
            request_timeout: config.gateway.request_timeout,
            client: config.client.descriptor(),
            token: config.gateway.token(),
        }
    }
}

/// State shared between callers and the dispatcher
struct Shared {
    pending: PendingCalls,
    handshake: HandshakeController,
    transport: Option<Arc<dyn Transport>>,
    dispatcher: Option<JoinHandle<()>>,
    connecting: bool,
    closed: bool,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// WebSocket RPC client for the gateway
pub struct GatewayClient {
    url: String,
    options: ClientOptions,
    connector: Arc<dyn Connector>,
    shared: Arc<Mutex<Shared>>,
    events: broadcast::Sender<EventFrame>,
}

impl GatewayClient {
    /// Create a client for `url` with an optional token
    ///
    /// The URL is normalized (`https://` → `wss://`, bare host → `wss://`).
    pub fn new(url: &str, token: Option<&str>) -> Self {
        let options = ClientOptions {
            token: token
                .filter(|t| !t.trim().is_empty())
                .map(|t| secrecy::SecretString::from(t.trim().to_string())),
            ..ClientOptions::default()
        };
        Self::with_connector(url, options, Arc::new(WsConnector))
    }

    /// Create a client from configuration, validating the URL
    pub fn from_config(config: &Config) -> Result<Self> {
        let url = parse_ws_url(&config.gateway.url)?;
        Ok(Self::with_connector(
            url.as_str(),
            ClientOptions::from_config(config),
            Arc::new(WsConnector),
        ))
    }

    /// Create a client with a custom transport connector
    pub fn with_connector(url: &str, options: ClientOptions, connector: Arc<dyn Connector>) -> Self {
        let params = ConnectParams::operator(options.client.clone(), options.token.as_ref());
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        GatewayClient {
            url: to_ws_url(url),
            options,
            connector,
            shared: Arc::new(Mutex::new(Shared {
                pending: PendingCalls::new(),
                handshake: HandshakeController::new(params),
                transport: None,
                dispatcher: None,
                connecting: false,
                closed: false,
            })),
            events,
        }
    }

    /// Normalized WebSocket URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the handshake succeeded and the socket is still open
    pub fn is_connected(&self) -> bool {
        let shared = lock(&self.shared);
        !shared.closed
            && shared.handshake.is_connected()
            && shared.transport.as_ref().map_or(false, |t| t.is_open())
    }

    /// Number of requests awaiting a response
    pub fn in_flight(&self) -> usize {
        lock(&self.shared).pending.len()
    }

    /// Server events other than `connect.challenge`
    pub fn subscribe(&self) -> broadcast::Receiver<EventFrame> {
        self.events.subscribe()
    }

    /// Open the socket and complete the handshake
    ///
    /// Returns immediately when already connected. Any failure, including
    /// the connection deadline, leaves the client closed.
    pub async fn connect(&self) -> Result<()> {
        {
            let mut shared = lock(&self.shared);
            if shared.closed {
                return Err(Error::Closed);
            }
            if shared.handshake.is_connected()
                && shared.transport.as_ref().map_or(false, |t| t.is_open())
            {
                return Ok(());
            }
            if shared.connecting {
                return Err(Error::InvalidInput("Connect already in progress".to_string()));
            }
            shared.connecting = true;
        }

        let result = match tokio::time::timeout(self.options.connect_timeout, self.establish()).await {
            Ok(result) => result,
            Err(_) => Err(Error::HandshakeTimeout),
        };

        match result {
            Ok(()) => {
                lock(&self.shared).connecting = false;
                info!("Connected to gateway at {}", self.url);
                Ok(())
            }
            Err(e) => {
                warn!("Gateway connect failed: {}", e);
                {
                    let mut guard = lock(&self.shared);
                    let shared = &mut *guard;
                    shared.connecting = false;
                    if let Some(id) = shared.handshake.fail(e.to_string()) {
                        shared.pending.cancel(&id);
                    }
                }
                self.close().await;
                Err(e)
            }
        }
    }

    async fn establish(&self) -> Result<()> {
        let (transport, events) = self.connector.open(&self.url).await?;
        let (waiter, handshake_done) = oneshot::channel();

        let hello = {
            let mut guard = lock(&self.shared);
            let shared = &mut *guard;
            if shared.closed {
                None
            } else {
                shared.transport = Some(Arc::clone(&transport));
                shared.handshake.arm(waiter);
                let hello = shared.handshake.on_open(&mut shared.pending);
                shared.dispatcher = Some(tokio::spawn(dispatch(
                    events,
                    Arc::clone(&self.shared),
                    self.events.clone(),
                )));
                Some(hello)
            }
        };

        let Some(hello) = hello else {
            transport.close().await;
            return Err(Error::Closed);
        };

        if let Some(frame) = hello {
            send_frame(transport.as_ref(), frame).await?;
        }

        match handshake_done.await {
            Ok(outcome) => outcome.map(|_| ()),
            Err(_) => Err(Error::Closed),
        }
    }

    /// Issue one request and wait for its response
    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let (id, text, transport, mut response) = {
            let mut shared = lock(&self.shared);
            let transport = match shared.transport {
                Some(ref t) if !shared.closed && t.is_open() && shared.handshake.is_connected() => {
                    Arc::clone(t)
                }
                _ => return Err(Error::NotConnected),
            };

            let id = shared.pending.fresh_id();
            let text = RequestFrame::new(id.clone(), method, params).into_frame().encode()?;
            let (tx, rx) = oneshot::channel();
            shared.pending.register(id.clone(), method, tx)?;
            (id, text, transport, rx)
        };

        debug!("-> {} {}", method, id);
        if let Err(e) = transport.send(text).await {
            lock(&self.shared).pending.cancel(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.options.request_timeout, &mut response).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(Error::Closed),
            Err(_) => {
                let timed_out = lock(&self.shared).pending.cancel(&id).is_some();
                if timed_out {
                    warn!("Request {} ({}) timed out", method, id);
                    return Err(Error::RequestTimeout {
                        method: method.to_string(),
                    });
                }
                // Settled in the instant the deadline passed
                response.try_recv().unwrap_or(Err(Error::RequestTimeout {
                    method: method.to_string(),
                }))
            }
        }
    }

    /// Issue a request with typed parameters
    pub async fn call<P: Serialize>(&self, method: &str, params: &P) -> Result<Value> {
        let params = serde_json::to_value(params)?;
        self.request(method, params).await
    }

    /// Close the socket and fail everything still outstanding
    ///
    /// Idempotent and safe before `connect`.
    pub async fn close(&self) {
        let (transport, dispatcher) = {
            let mut shared = lock(&self.shared);
            shared.closed = true;
            (shared.transport.take(), shared.dispatcher.take())
        };

        // Stop routing first; the socket may report its own close while we wait
        if let Some(dispatcher) = dispatcher {
            dispatcher.abort();
        }
        if let Some(transport) = transport {
            transport.close().await;
            info!("Closed gateway connection to {}", self.url);
        }

        let mut guard = lock(&self.shared);
        let shared = &mut *guard;
        if let Some(id) = shared.handshake.fail("Client closed") {
            shared.pending.reject(&id, Error::Closed);
        }
        let drained = shared.pending.drain_all(|| Error::Closed);
        if drained > 0 {
            debug!("Failed {} outstanding call(s) on close", drained);
        }
    }

    /// Handshake state, for diagnostics
    pub fn handshake_state(&self) -> HandshakeState {
        lock(&self.shared).handshake.state().clone()
    }
}

impl Drop for GatewayClient {
    fn drop(&mut self) {
        let mut shared = lock(&self.shared);
        if let Some(dispatcher) = shared.dispatcher.take() {
            dispatcher.abort();
        }
        if let Some(transport) = shared.transport.take() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move { transport.close().await });
            }
        }
        shared.pending.drain_all(|| Error::Closed);
    }
}

async fn send_frame(transport: &dyn Transport, frame: RequestFrame) -> Result<()> {
    debug!("-> {} {}", frame.method, frame.id);
    transport.send(frame.into_frame().encode()?).await
}

/// Route inbound events for one connection, in arrival order
async fn dispatch(
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    shared: Arc<Mutex<Shared>>,
    subscribers: broadcast::Sender<EventFrame>,
) {
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Message(text) => {
                let frame = match GatewayFrame::decode(&text) {
                    Ok(frame) => frame,
                    Err(e) => {
                        debug!("Discarding inbound frame: {}", e);
                        continue;
                    }
                };

                match frame {
                    GatewayFrame::Response(response) => route_response(&shared, response),
                    GatewayFrame::Event(event) if event.is_challenge() => {
                        resend_handshake(&shared).await;
                    }
                    GatewayFrame::Event(event) => {
                        debug!("<- event {}", event.event);
                        // No subscribers is fine
                        let _ = subscribers.send(event);
                    }
                    GatewayFrame::Request(request) => {
                        debug!("Ignoring server-initiated request {}", request.method);
                    }
                }
            }
            TransportEvent::Error(message) => {
                warn!("Gateway transport error: {}", message);
                connection_lost(&shared, &message);
            }
            TransportEvent::Closed => break,
        }
    }

    connection_lost(&shared, "WebSocket closed");
}

fn route_response(shared: &Mutex<Shared>, response: ResponseFrame) {
    let id = response.id.clone();
    let outcome = response.into_outcome();
    debug!("<- res {} ok={}", id, outcome.is_ok());

    let mut guard = lock(shared);
    let shared = &mut *guard;
    let is_handshake = shared.handshake.on_response(&id, &outcome);

    match outcome {
        Ok(payload) => {
            shared.pending.resolve(&id, payload);
        }
        Err(message) if is_handshake => {
            shared.pending.reject(&id, Error::HandshakeRejected(message));
        }
        Err(message) => {
            shared.pending.reject(&id, Error::RequestRejected(message));
        }
    }
}

async fn resend_handshake(shared: &Mutex<Shared>) {
    let resend = {
        let mut guard = lock(shared);
        let shared = &mut *guard;
        let frame = shared.handshake.on_challenge(&mut shared.pending);
        frame.zip(shared.transport.clone())
    };

    if let Some((frame, transport)) = resend {
        if let Err(e) = send_frame(transport.as_ref(), frame).await {
            let mut guard = lock(shared);
            let shared = &mut *guard;
            if let Some(id) = shared.handshake.fail(e.to_string()) {
                shared.pending.reject(&id, e);
            }
        }
    }
}

fn connection_lost(shared: &Mutex<Shared>, reason: &str) {
    let mut guard = lock(shared);
    let shared = &mut *guard;
    if shared.closed {
        return;
    }

    if let Some(id) = shared.handshake.fail(reason) {
        shared.pending.reject(&id, Error::Transport(reason.to_string()));
    }
    let drained = shared.pending.drain_all(|| Error::Transport(reason.to_string()));
    if drained > 0 {
        warn!("Connection lost with {} call(s) outstanding: {}", drained, reason);
    }
    shared.closed = true;
}
