//! `MasqueradeServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → rate limiter → room
//! store, with the two sweepers running alongside.

use std::sync::Arc;
use std::time::Duration;

use masquerade_protocol::{Codec, JsonCodec, ServerEvent};
use masquerade_ratelimit::{RateLimitConfig, RateLimiter};
use masquerade_room::{RoomConfig, RoomStore};
use masquerade_transport::{
    ConnectionId, DEFAULT_HANDSHAKE_TIMEOUT, Handshake, OriginPolicy, Transport,
    WebSocketTransport,
};
use tokio::sync::Mutex;

use crate::MasqueradeError;
use crate::handler::handle_connection;
use crate::hub::Hub;
use crate::routes::Outbox;
use crate::sweeper::{spawn_limiter_sweeper, spawn_room_sweeper};

/// Shared server state passed to each connection handler task.
///
/// The store and limiter sit behind their own `Arc` so the sweepers can
/// hold them without holding the whole server.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) rooms: Arc<Mutex<RoomStore>>,
    pub(crate) limiter: Arc<Mutex<RateLimiter>>,
    pub(crate) hub: Hub,
    pub(crate) codec: C,
}

impl<C: Codec> ServerState<C> {
    /// Encodes and queues every event in `outbox`.
    pub(crate) async fn deliver(&self, outbox: Outbox) {
        let frames: Vec<(ConnectionId, String)> = outbox
            .into_iter()
            .filter_map(|(conn, event)| match self.codec.encode(&event) {
                Ok(frame) => Some((conn, frame)),
                Err(e) => {
                    tracing::warn!(%conn, error = %e, "failed to encode event");
                    None
                }
            })
            .collect();
        self.hub.send_many(frames).await;
    }

    pub(crate) async fn send(&self, conn: ConnectionId, event: ServerEvent) {
        let mut outbox = Outbox::new();
        outbox.send_to(conn, event);
        self.deliver(outbox).await;
    }
}

/// Builder for configuring and starting a Masquerade server.
///
/// # Example
///
/// ```rust,no_run
/// use masquerade::prelude::*;
///
/// # async fn start() -> Result<(), MasqueradeError> {
/// let server = MasqueradeServer::builder()
///     .bind("0.0.0.0:3001")
///     .allowed_origin("https://play.example.com")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct MasqueradeServerBuilder {
    bind_addr: String,
    allowed_origin: Option<String>,
    handshake_timeout: Duration,
    room_config: RoomConfig,
    rate_limit_config: RateLimitConfig,
}

impl MasqueradeServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:3001".to_string(),
            allowed_origin: None,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            room_config: RoomConfig::default(),
            rate_limit_config: RateLimitConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Only browsers on this origin may connect. Unset means any origin.
    pub fn allowed_origin(mut self, origin: impl Into<String>) -> Self {
        self.allowed_origin = Some(origin.into());
        self
    }

    /// How long a new socket may take to complete the WebSocket upgrade
    /// before it is dropped.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    pub fn rate_limit_config(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit_config = config;
        self
    }

    /// Binds the listener. Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<MasqueradeServer<JsonCodec>, MasqueradeError> {
        let origins = match self.allowed_origin {
            Some(origin) => OriginPolicy::only(origin),
            None => OriginPolicy::any(),
        };
        let transport = WebSocketTransport::bind_with_policy(&self.bind_addr, origins)
            .await?
            .with_handshake_timeout(self.handshake_timeout);

        let state = Arc::new(ServerState {
            rooms: Arc::new(Mutex::new(RoomStore::new(self.room_config))),
            limiter: Arc::new(Mutex::new(RateLimiter::new(self.rate_limit_config))),
            hub: Hub::default(),
            codec: JsonCodec,
        });

        Ok(MasqueradeServer { transport, state })
    }
}

impl Default for MasqueradeServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Masquerade server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct MasqueradeServer<C: Codec = JsonCodec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl MasqueradeServer<JsonCodec> {
    pub fn builder() -> MasqueradeServerBuilder {
        MasqueradeServerBuilder::new()
    }
}

impl<C: Codec> MasqueradeServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle on the room store, for inspection.
    pub fn rooms(&self) -> Arc<Mutex<RoomStore>> {
        Arc::clone(&self.state.rooms)
    }

    /// A handle on the rate limiter, for inspection.
    pub fn limiter(&self) -> Arc<Mutex<RateLimiter>> {
        Arc::clone(&self.state.limiter)
    }

    /// Starts both sweepers and runs the accept loop until the process
    /// exits. Each socket is upgraded on its own task, so a slow or
    /// silent peer only ever holds up itself. Failed handshakes
    /// (including rejected origins) are logged and dropped.
    pub async fn run(mut self) -> Result<(), MasqueradeError> {
        let room_sweep = self.state.rooms.lock().await.config().sweep_interval;
        let limiter_sweep = self.state.limiter.lock().await.config().sweep_interval;
        spawn_room_sweeper(Arc::clone(&self.state.rooms), room_sweep);
        spawn_limiter_sweeper(Arc::clone(&self.state.limiter), limiter_sweep);

        tracing::info!(addr = ?self.transport.local_addr().ok(), "Masquerade server running");

        loop {
            match self.transport.accept().await {
                Ok(pending) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let peer = pending.peer_addr();
                        let conn = match pending.complete().await {
                            Ok(conn) => conn,
                            Err(e) => {
                                tracing::debug!(%peer, error = %e, "handshake failed");
                                return;
                            }
                        };
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
