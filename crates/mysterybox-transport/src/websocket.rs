//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! Browsers speak JSON, so outgoing messages that are valid UTF-8 go out
//! as text frames; anything else falls back to a binary frame. Incoming
//! text and binary frames are both handed up as raw bytes.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::{Connection, ConnectionId, PendingConnection, Transport, TransportError};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// How long a freshly accepted TCP stream gets to finish the HTTP upgrade.
const UPGRADE_TIMEOUT: Duration = Duration::from_secs(5);

/// Wraps a tungstenite error so it fits the io-based [`TransportError`].
fn io_error(kind: io::ErrorKind, err: tungstenite::Error) -> io::Error {
    io::Error::new(kind, err)
}

/// Listens on a TCP socket and upgrades each accepted stream.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds to `addr`. Use port 0 to let the OS pick one, then ask
    /// [`local_addr`](Transport::local_addr).
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "websocket listener bound");
        Ok(Self { listener })
    }
}

impl Transport for WebSocketTransport {
    type Pending = PendingWebSocket;
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<PendingWebSocket, TransportError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::trace!(%peer, "tcp connection accepted");
        Ok(PendingWebSocket { stream, peer })
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// A TCP stream waiting for its WebSocket upgrade.
pub struct PendingWebSocket {
    stream: TcpStream,
    peer: SocketAddr,
}

impl PendingWebSocket {
    /// The remote address of the socket.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl PendingConnection for PendingWebSocket {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    /// Runs the HTTP upgrade, giving up after five seconds.
    async fn establish(self) -> Result<WebSocketConnection, TransportError> {
        let upgrade = tokio_tungstenite::accept_async(self.stream);
        let ws = match tokio::time::timeout(UPGRADE_TIMEOUT, upgrade).await {
            Ok(Ok(ws)) => ws,
            Ok(Err(e)) => {
                return Err(TransportError::AcceptFailed(io_error(
                    io::ErrorKind::ConnectionRefused,
                    e,
                )));
            }
            Err(_) => return Err(TransportError::UpgradeTimeout(UPGRADE_TIMEOUT)),
        };

        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, peer = %self.peer, "websocket upgraded");

        Ok(WebSocketConnection {
            id,
            ws: Arc::new(Mutex::new(ws)),
        })
    }
}

/// One upgraded client socket.
///
/// Reads and writes share a single lock. The server handles one request
/// at a time per connection, so they never contend.
pub struct WebSocketConnection {
    id: ConnectionId,
    ws: Arc<Mutex<WebSocketStream<TcpStream>>>,
}

/// Picks the frame type for an outgoing payload.
fn frame_for(data: &[u8]) -> Message {
    match std::str::from_utf8(data) {
        Ok(text) => Message::text(text.to_owned()),
        Err(_) => Message::binary(data.to_vec()),
    }
}

/// Extracts the payload of a data frame; `None` for control frames.
fn payload_of(msg: Message) -> Option<Vec<u8>> {
    match msg {
        Message::Text(text) => Some(text.as_bytes().to_vec()),
        Message::Binary(data) => Some(data.to_vec()),
        _ => None,
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut ws = self.ws.lock().await;
        ws.send(frame_for(data))
            .await
            .map_err(|e| TransportError::SendFailed(io_error(io::ErrorKind::BrokenPipe, e)))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut ws = self.ws.lock().await;
        while let Some(frame) = ws.next().await {
            let msg = frame.map_err(|e| {
                TransportError::ReceiveFailed(io_error(io::ErrorKind::ConnectionReset, e))
            })?;
            if msg.is_close() {
                return Ok(None);
            }
            // Pings are answered by tungstenite itself.
            if let Some(payload) = payload_of(msg) {
                return Ok(Some(payload));
            }
        }
        Ok(None)
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut ws = self.ws.lock().await;
        ws.close(None)
            .await
            .map_err(|e| TransportError::SendFailed(io_error(io::ErrorKind::BrokenPipe, e)))
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
