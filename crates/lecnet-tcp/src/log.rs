//! Log event taxonomy emitted by the server.
//!
//! Replaces the original library's `log(time_stamp(), message: &str)`
//! contract with a typed enum: the caller decides how (or whether) to
//! timestamp and format an event, rather than receiving a pre-formatted
//! string. [`LogEvent::tag`] gives a stable string for callers that still
//! want to grep-route by event kind.

use std::net::SocketAddr;

/// One loggable server event.
#[derive(Debug, Clone)]
pub enum LogEvent {
    /// The accept loop started listening.
    Started {
        /// The bound address.
        address: SocketAddr,
    },
    /// `start` was called while the accept loop was already running; the
    /// call is a no-op.
    AlreadyRunning,
    /// The accept loop stopped.
    Stopped,
    /// A client connected and was admitted.
    ClientConnected {
        /// The client's address.
        address: SocketAddr,
    },
    /// A client connected but was denied (admission cap reached).
    ClientDenied {
        /// The client's address.
        address: SocketAddr,
    },
    /// A client disconnected (gracefully or otherwise).
    ClientDisconnected {
        /// The client's address.
        address: SocketAddr,
    },
    /// A session received data that failed to decode as a valid frame.
    InvalidData {
        /// The client's address.
        address: SocketAddr,
    },
    /// An operational error not tied to a specific client.
    Error {
        /// Human-readable description.
        message: String,
    },
}

impl LogEvent {
    /// The stable string tag for this event, suitable for log scraping.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Started { .. } => "server_started",
            Self::AlreadyRunning => "server_already_running",
            Self::Stopped => "server_stopped",
            Self::ClientConnected { .. } => "client_connected",
            Self::ClientDenied { .. } => "client_denied",
            Self::ClientDisconnected { .. } => "client_disconnected",
            Self::InvalidData { .. } => "invalid_data",
            Self::Error { .. } => "error",
        }
    }
}

/// Callback invoked inline on the event loop for every [`LogEvent`]. Must
/// return quickly; heavy work belongs in the caller's own task.
pub type LogFn = std::sync::Arc<dyn Fn(LogEvent) + Send + Sync>;
