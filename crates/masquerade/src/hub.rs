//! Outbound queues for every live connection.
//!
//! Each connection owns an unbounded queue drained by its writer task.
//! Pushing into a queue never waits on the network, so fan-out to a whole
//! room can happen while the room lock is held.

use std::collections::HashMap;

use masquerade_transport::ConnectionId;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Default)]
pub(crate) struct Hub {
    queues: Mutex<HashMap<ConnectionId, UnboundedSender<String>>>,
}

impl Hub {
    /// Opens a queue for `conn` and returns its receiving end.
    pub(crate) async fn register(&self, conn: ConnectionId) -> UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.queues.lock().await.insert(conn, tx);
        rx
    }

    /// Closes the queue for `conn`. The writer exits once it drains.
    pub(crate) async fn unregister(&self, conn: ConnectionId) {
        self.queues.lock().await.remove(&conn);
    }

    /// Queues every frame; frames for unknown or closed connections are
    /// dropped. Returns how many were queued.
    pub(crate) async fn send_many(
        &self,
        frames: impl IntoIterator<Item = (ConnectionId, String)>,
    ) -> usize {
        let queues = self.queues.lock().await;
        let mut queued = 0;
        for (conn, frame) in frames {
            match queues.get(&conn) {
                Some(tx) if tx.send(frame).is_ok() => queued += 1,
                _ => tracing::debug!(%conn, "dropping frame for closed connection"),
            }
        }
        queued
    }

    pub(crate) async fn len(&self) -> usize {
        self.queues.lock().await.len()
    }
}
