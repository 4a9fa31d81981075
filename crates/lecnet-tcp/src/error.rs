//! Error taxonomy for the framed TCP transport.

use thiserror::Error;

/// Errors produced by the client and server.
#[derive(Debug, Error)]
pub enum TcpError {
    /// The underlying TCP connect, accept, read, or write failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or certificate material was invalid.
    #[error("TLS error: {0}")]
    Tls(String),

    /// An operation was attempted before `connect()`/`start()` completed,
    /// or after `disconnect()`/`stop()`.
    #[error("not connected")]
    NotConnected,

    /// A synchronous `send_data` or `connect` call exceeded its deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The peer's address could not be parsed or resolved.
    #[error("invalid address {0:?}")]
    InvalidAddress(String),
}
