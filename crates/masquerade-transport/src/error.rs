/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The peer did not finish the upgrade in time.
    #[error("handshake with {0} timed out")]
    HandshakeTimeout(std::net::SocketAddr),

    /// The upgrade request came from an origin that is not allowed.
    #[error("origin not allowed: {0}")]
    OriginRejected(String),
}
