//! Transport adapter - one full-duplex message socket
//!
//! A [`Connector`] opens a session and hands back the sending half as a
//! [`Transport`] plus a channel of [`TransportEvent`]s. Each inbound text
//! frame, error and close is delivered exactly once on that channel, in the
//! order the socket produced them.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lifecycle and data events delivered by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One inbound text frame
    Message(String),
    /// Socket-level failure; a `Closed` follows
    Error(String),
    /// Session ended, locally or remotely
    Closed,
}

/// Sending half of an open session
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transmit one text frame; fails once the session is closed
    async fn send(&self, text: String) -> Result<()>;

    /// Close the session; idempotent
    async fn close(&self);

    /// Whether frames can still be sent
    fn is_open(&self) -> bool;
}

/// Opens transport sessions
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish a session to a normalized WebSocket URL
    async fn open(
        &self,
        url: &str,
    ) -> Result<(Arc<dyn Transport>, mpsc::UnboundedReceiver<TransportEvent>)>;
}

/// WebSocket connector backed by tokio-tungstenite
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn open(
        &self,
        url: &str,
    ) -> Result<(Arc<dyn Transport>, mpsc::UnboundedReceiver<TransportEvent>)> {
        debug!("Opening gateway socket: {}", url);

        let (ws, _) = connect_async(url).await.map_err(|e| {
            warn!("Gateway socket connect failed: {}", e);
            Error::Transport(format!("WebSocket error: {}", e))
        })?;

        info!("Gateway socket open: {}", url);

        let (transport, events) = WsTransport::start(ws);
        Ok((Arc::new(transport), events))
    }
}

/// Sending half of a WebSocket session
pub struct WsTransport {
    sink: Mutex<SplitSink<WsStream, Message>>,
    open: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl WsTransport {
    /// Split an open socket and start forwarding its inbound frames
    fn start(ws: WsStream) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (sink, stream) = ws.split();
        let open = Arc::new(AtomicBool::new(true));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn(read_loop(stream, events_tx, Arc::clone(&open)));

        let transport = WsTransport {
            sink: Mutex::new(sink),
            open,
            reader,
        };
        (transport, events_rx)
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, text: String) -> Result<()> {
        if !self.is_open() {
            return Err(Error::Transport("WebSocket is not open".to_string()));
        }

        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn close(&self) {
        if !self.open.swap(false, Ordering::SeqCst) {
            return;
        }

        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.close().await {
            debug!("Ignoring error while closing gateway socket: {}", e);
        }
        // The peer may never answer the close frame
        self.reader.abort();
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// Forward inbound frames until the socket ends
async fn read_loop(
    mut stream: SplitStream<WsStream>,
    events: mpsc::UnboundedSender<TransportEvent>,
    open: Arc<AtomicBool>,
) {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if events.send(TransportEvent::Message(text)).is_err() {
                    break;
                }
            }
            Ok(Message::Binary(data)) => match String::from_utf8(data) {
                Ok(text) => {
                    if events.send(TransportEvent::Message(text)).is_err() {
                        break;
                    }
                }
                Err(_) => debug!("Dropping non-UTF-8 binary frame"),
            },
            Ok(Message::Close(frame)) => {
                info!("Gateway closed connection: {:?}", frame);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Gateway socket error: {}", e);
                let _ = events.send(TransportEvent::Error(format!("WebSocket error: {}", e)));
                break;
            }
        }
    }

    open.store(false, Ordering::SeqCst);
    let _ = events.send(TransportEvent::Closed);
}

/// In-memory transport for tests
#[cfg(test)]
pub(crate) mod mock {
    use super::*;

    /// Test side of an in-memory session
    pub struct MockServer {
        /// Frames the client sent
        pub sent: mpsc::UnboundedReceiver<String>,
        /// Inject inbound frames and lifecycle events
        pub events: mpsc::UnboundedSender<TransportEvent>,
        /// Shared open flag
        pub open: Arc<AtomicBool>,
    }

    impl MockServer {
        /// Push one inbound text frame
        pub fn push(&self, text: impl Into<String>) {
            let _ = self.events.send(TransportEvent::Message(text.into()));
        }

        /// Push a JSON frame
        pub fn push_json(&self, value: serde_json::Value) {
            self.push(value.to_string());
        }

        /// Next outbound frame, parsed
        pub async fn next_frame(&mut self) -> serde_json::Value {
            let text = self.sent.recv().await.expect("client stopped sending");
            serde_json::from_str(&text).expect("client sent invalid JSON")
        }

        /// Simulate the socket dropping
        pub fn drop_connection(&self, error: Option<&str>) {
            self.open.store(false, Ordering::SeqCst);
            if let Some(error) = error {
                let _ = self.events.send(TransportEvent::Error(error.to_string()));
            }
            let _ = self.events.send(TransportEvent::Closed);
        }
    }

    /// Client side of an in-memory session
    pub struct MockTransport {
        sent: mpsc::UnboundedSender<String>,
        open: Arc<AtomicBool>,
        /// When set, `close` reports the session end the way a real socket does
        close_ack: Option<mpsc::UnboundedSender<TransportEvent>>,
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, text: String) -> Result<()> {
            if !self.is_open() {
                return Err(Error::Transport("WebSocket is not open".to_string()));
            }
            self.sent
                .send(text)
                .map_err(|_| Error::Transport("WebSocket is not open".to_string()))
        }

        async fn close(&self) {
            self.open.store(false, Ordering::SeqCst);
            if let Some(ref events) = self.close_ack {
                let _ = events.send(TransportEvent::Closed);
                // Give the reader a chance to see it before close returns
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        }

        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }
    }

    /// Connector that hands out one prepared in-memory session
    pub struct MockConnector {
        session: std::sync::Mutex<
            Option<(Arc<dyn Transport>, mpsc::UnboundedReceiver<TransportEvent>)>,
        >,
        refuse: Option<String>,
    }

    impl MockConnector {
        /// Create a connector and the server end of its session
        pub fn pair() -> (Self, MockServer) {
            Self::build(false)
        }

        /// Like `pair`, but closing emits `Closed` on the event channel
        pub fn pair_acknowledging_close() -> (Self, MockServer) {
            Self::build(true)
        }

        fn build(acknowledge_close: bool) -> (Self, MockServer) {
            let (sent_tx, sent_rx) = mpsc::unbounded_channel();
            let (events_tx, events_rx) = mpsc::unbounded_channel();
            let open = Arc::new(AtomicBool::new(true));

            let transport: Arc<dyn Transport> = Arc::new(MockTransport {
                sent: sent_tx,
                open: Arc::clone(&open),
                close_ack: acknowledge_close.then(|| events_tx.clone()),
            });

            let connector = MockConnector {
                session: std::sync::Mutex::new(Some((transport, events_rx))),
                refuse: None,
            };
            let server = MockServer {
                sent: sent_rx,
                events: events_tx,
                open,
            };
            (connector, server)
        }

        /// Connector whose open always fails
        pub fn refusing(message: &str) -> Self {
            MockConnector {
                session: std::sync::Mutex::new(None),
                refuse: Some(message.to_string()),
            }
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn open(
            &self,
            _url: &str,
        ) -> Result<(Arc<dyn Transport>, mpsc::UnboundedReceiver<TransportEvent>)> {
            if let Some(ref message) = self.refuse {
                return Err(Error::Transport(message.clone()));
            }
            self.session
                .lock()
                .expect("mock connector poisoned")
                .take()
                .ok_or_else(|| Error::Transport("mock session already used".to_string()))
        }
    }
}
