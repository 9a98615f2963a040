//! Per-connection handler: read loop, throttling, and dispatch.
//!
//! Each accepted connection gets its own Tokio task running
//! [`handle_connection`], plus a writer task that drains the
//! connection's outbound queue to the socket.

use std::sync::Arc;

use masquerade_protocol::{ClientEvent, Codec, ServerEvent};
use masquerade_ratelimit::ActionKind;
use masquerade_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::MasqueradeError;
use crate::routes::{self, action_kind};
use crate::server::ServerState;

/// Reply sent for frames that don't decode as a known event.
const INVALID_MESSAGE: &str = "invalid message";

/// Drop guard that detaches the connection when the handler exits,
/// including by panic. `Drop` is synchronous, so the async cleanup runs
/// on a fire-and-forget task.
struct ConnectionGuard<C: Codec> {
    conn_id: ConnectionId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            {
                let mut rooms = state.rooms.lock().await;
                let outbox = routes::disconnect(&mut rooms, conn_id);
                state.deliver(outbox).await;
            }
            state.limiter.lock().await.forget(conn_id);
            state.hub.unregister(conn_id).await;
            tracing::debug!(%conn_id, "connection cleaned up");
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), MasqueradeError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();

    let outbound = state.hub.register(conn_id).await;
    spawn_writer(Arc::clone(&conn), outbound);
    let _guard = ConnectionGuard {
        conn_id,
        state: Arc::clone(&state),
    };
    let connections = state.hub.len().await;
    tracing::info!(%conn_id, connections, "client connected");

    loop {
        let Some(data) = conn.recv().await? else {
            tracing::info!(%conn_id, "client disconnected");
            break;
        };

        let event: ClientEvent = match state.codec.decode(&data) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode event");
                reject_frame(&state, conn_id).await;
                continue;
            }
        };

        dispatch(&state, conn_id, event).await;
    }

    // _guard drops here → room departure and limiter cleanup.
    Ok(())
}

/// Answers an undecodable frame, at most once per throttle window.
async fn reject_frame<C: Codec>(state: &ServerState<C>, conn_id: ConnectionId) {
    let admitted = state
        .limiter
        .lock()
        .await
        .check(conn_id, ActionKind::InvalidFrame);
    if admitted.is_ok() {
        state
            .send(conn_id, ServerEvent::Error(INVALID_MESSAGE.to_string()))
            .await;
    }
}

/// Throttles, routes, and fans out one event.
async fn dispatch<C: Codec>(state: &ServerState<C>, conn_id: ConnectionId, event: ClientEvent) {
    let action = action_kind(&event);
    let admitted = state.limiter.lock().await.check(conn_id, action);
    if let Err(e) = admitted {
        state.send(conn_id, ServerEvent::Error(e.to_string())).await;
        return;
    }

    let mut rooms = state.rooms.lock().await;
    let outbox = routes::route(&mut rooms, conn_id, event);
    // Queued while the store is still locked, so members see events in
    // the same order the store applied them.
    state.deliver(outbox).await;
}

/// Drains `outbound` to the socket until the queue closes or a send fails.
fn spawn_writer(conn: Arc<WebSocketConnection>, mut outbound: UnboundedReceiver<String>) {
    tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if let Err(e) = conn.send(&frame).await {
                tracing::debug!(conn_id = %conn.id(), error = %e, "send failed");
                break;
            }
        }
    });
}
