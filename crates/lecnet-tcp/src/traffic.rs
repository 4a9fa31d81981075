//! Cumulative traffic accounting shared by the client and server.

use std::sync::atomic::{AtomicU64, Ordering};

/// A point-in-time snapshot of bytes sent and received.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Traffic {
    /// Bytes written to the wire.
    pub sent: u64,
    /// Bytes read from the wire.
    pub received: u64,
}

/// Lock-free cumulative counters for sent/received bytes.
///
/// Kept as its own field group per the concurrency model: traffic is never
/// updated under the same lock as the registry or pending map.
#[derive(Debug, Default)]
pub struct TrafficCounters {
    sent: AtomicU64,
    received: AtomicU64,
}

impl TrafficCounters {
    /// Record `n` bytes sent.
    pub fn record_sent(&self, n: u64) {
        self.sent.fetch_add(n, Ordering::Relaxed);
    }

    /// Record `n` bytes received.
    pub fn record_received(&self, n: u64) {
        self.received.fetch_add(n, Ordering::Relaxed);
    }

    /// Read the current totals.
    #[must_use]
    pub fn snapshot(&self) -> Traffic {
        Traffic {
            sent: self.sent.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
        }
    }
}

/// Traffic recorder handed to one session: every byte it records is added
/// both to that client's own counters and to the server's persistent
/// cumulative total, which a disconnecting client never subtracts from.
pub struct SessionTraffic {
    client: std::sync::Arc<TrafficCounters>,
    total: std::sync::Arc<TrafficCounters>,
}

impl SessionTraffic {
    /// Pair a per-client counter with the server-wide cumulative counter.
    #[must_use]
    pub fn new(client: std::sync::Arc<TrafficCounters>, total: std::sync::Arc<TrafficCounters>) -> Self {
        Self { client, total }
    }

    /// Record `n` bytes sent, both per-client and cumulatively.
    pub fn record_sent(&self, n: u64) {
        self.client.record_sent(n);
        self.total.record_sent(n);
    }

    /// Record `n` bytes received, both per-client and cumulatively.
    pub fn record_received(&self, n: u64) {
        self.client.record_received(n);
        self.total.record_received(n);
    }
}
