//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::http::StatusCode;

use crate::{Connection, ConnectionId, Handshake, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// Which browser origins may open a WebSocket.
///
/// Browsers always send an `Origin` header on upgrade requests; other
/// clients usually don't. Requests without the header are let through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginPolicy {
    allowed: Option<String>,
}

impl OriginPolicy {
    /// Accepts every origin.
    pub fn any() -> Self {
        Self { allowed: None }
    }

    /// Accepts only the given origin (plus requests with no origin).
    pub fn only(origin: impl Into<String>) -> Self {
        Self {
            allowed: Some(origin.into()),
        }
    }

    /// Returns `true` if an upgrade carrying `origin` should be accepted.
    pub fn permits(&self, origin: Option<&str>) -> bool {
        match (&self.allowed, origin) {
            (None, _) | (_, None) => true,
            (Some(allowed), Some(origin)) => {
                allowed.trim_end_matches('/') == origin.trim_end_matches('/')
            }
        }
    }
}

/// How long a freshly accepted socket gets to finish the HTTP upgrade.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// A WebSocket-based [`Transport`] that listens for incoming connections.
///
/// [`accept`](Transport::accept) only takes the TCP connection; the
/// upgrade runs in [`PendingWebSocket::complete`], so a peer that never
/// sends its upgrade request can't hold up the accept loop.
pub struct WebSocketTransport {
    listener: TcpListener,
    origins: OriginPolicy,
    handshake_timeout: Duration,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport that accepts any origin.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        Self::bind_with_policy(addr, OriginPolicy::any()).await
    }

    /// Binds a new WebSocket transport with an origin policy.
    pub async fn bind_with_policy(
        addr: &str,
        origins: OriginPolicy,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self {
            listener,
            origins,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        })
    }

    /// Sets how long a peer has to complete the upgrade.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }
}

impl Transport for WebSocketTransport {
    type Pending = PendingWebSocket;
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Pending, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        Ok(PendingWebSocket {
            stream,
            addr,
            origins: self.origins.clone(),
            timeout: self.handshake_timeout,
        })
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// A TCP connection that has not been upgraded yet.
pub struct PendingWebSocket {
    stream: TcpStream,
    addr: SocketAddr,
    origins: OriginPolicy,
    timeout: Duration,
}

impl PendingWebSocket {
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Handshake for PendingWebSocket {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    /// Runs the upgrade and origin check, bounded by the handshake
    /// timeout. Dropping the socket on timeout closes it.
    async fn complete(self) -> Result<Self::Connection, Self::Error> {
        let addr = self.addr;
        match tokio::time::timeout(self.timeout, upgrade(self.stream, addr, self.origins)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(%addr, "WebSocket handshake timed out");
                Err(TransportError::HandshakeTimeout(addr))
            }
        }
    }
}

async fn upgrade(
    stream: TcpStream,
    addr: SocketAddr,
    origins: OriginPolicy,
) -> Result<WebSocketConnection, TransportError> {
    let mut rejected_origin = None;
    let check_origin = |req: &Request, resp: Response| {
        let origin = req
            .headers()
            .get("origin")
            .and_then(|value| value.to_str().ok());
        if origins.permits(origin) {
            return Ok(resp);
        }
        rejected_origin = origin.map(str::to_string);
        let mut denied = ErrorResponse::new(Some("origin not allowed".into()));
        *denied.status_mut() = StatusCode::FORBIDDEN;
        Err(denied)
    };

    let handshake = tokio_tungstenite::accept_hdr_async(stream, check_origin).await;
    if let Some(origin) = rejected_origin {
        tracing::warn!(%addr, %origin, "rejected WebSocket upgrade");
        return Err(TransportError::OriginRejected(origin));
    }
    let ws = handshake.map_err(|e| {
        TransportError::AcceptFailed(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            e,
        ))
    })?;

    let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
    tracing::debug!(%id, %addr, "accepted WebSocket connection");

    let (sink, stream) = ws.split();
    Ok(WebSocketConnection {
        id,
        sink: Mutex::new(sink),
        stream: Mutex::new(stream),
    })
}

/// A single WebSocket connection.
///
/// The socket is split so a writer task can push frames while the
/// reader is parked in [`recv`](Connection::recv).
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, text: &str) -> Result<(), Self::Error> {
        self.sink
            .lock()
            .await
            .send(Message::text(text.to_string()))
            .await
            .map_err(|e| {
                TransportError::SendFailed(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    e,
                ))
            })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
