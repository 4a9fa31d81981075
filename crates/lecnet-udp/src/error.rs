//! Errors produced by the UDP broadcast/multicast helpers.

use thiserror::Error;

/// Failure modes for UDP send/receive operations.
#[derive(Debug, Error)]
pub enum UdpError {
    /// Binding or configuring the socket failed.
    #[error("failed to bind UDP socket: {0}")]
    Bind(#[source] std::io::Error),

    /// A send attempt failed partway through a retransmission run.
    ///
    /// `actual_count` is how many of the requested sends completed before
    /// the failure, mirroring the original API's out-parameter of the same
    /// name.
    #[error("send failed after {actual_count} of the requested sends: {reason}")]
    Send {
        /// Number of sends that completed before the failure.
        actual_count: u32,
        /// Description of the failure.
        reason: String,
    },

    /// A receive attempt failed or timed out without producing a message.
    #[error("receive failed: {0}")]
    Receive(String),

    /// A received datagram exceeded the 1024-byte message cap.
    #[error("received message of {0} bytes exceeds the 1024-byte cap")]
    MessageTooLarge(usize),
}
