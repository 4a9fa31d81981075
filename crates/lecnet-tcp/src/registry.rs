//! Registry of currently-connected clients, keyed by address.

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use parking_lot::RwLock;
use tokio::sync::Notify;

use crate::traffic::{SessionTraffic, Traffic, TrafficCounters};

/// What the registry keeps per connected client.
pub struct ClientEntry {
    /// Cumulative bytes sent/received on this connection.
    pub traffic: Arc<TrafficCounters>,
    /// Signaled once to ask the session to close; the session removes
    /// itself from the registry once it has actually shut down.
    pub close: Arc<Notify>,
}

/// A snapshot of one registered client, returned by
/// [`Registry::client_info`].
#[derive(Debug, Clone, Copy)]
pub struct ClientInfo {
    /// The client's address.
    pub address: SocketAddr,
    /// Traffic to/from this client.
    pub traffic: Traffic,
}

/// `client_address -> ClientEntry`, guarded by its own lock per the
/// concurrency model (never held across an `.await`, never taken together
/// with the server's total-traffic or starting-flag locks).
pub struct Registry {
    clients: RwLock<HashMap<SocketAddr, ClientEntry>>,
    /// Cumulative traffic across every client this server has ever
    /// admitted, since `start`. Unlike `clients`, an unregistering session
    /// never subtracts from this — it only ever grows.
    total: Arc<TrafficCounters>,
    /// Fired whenever `unregister` leaves the registry empty, so
    /// [`Registry::wait_until_empty`] can replace a spin-wait with a single
    /// notify-driven await.
    drained: Notify,
}

impl Default for Registry {
    fn default() -> Self {
        Self { clients: RwLock::default(), total: Arc::default(), drained: Notify::new() }
    }
}

impl Registry {
    /// Register a newly-accepted, admitted client. Returns the traffic
    /// recorder the session should update and the `Notify` it should
    /// select on to learn it has been asked to close.
    pub fn register(&self, address: SocketAddr) -> (SessionTraffic, Arc<Notify>) {
        let traffic = Arc::new(TrafficCounters::default());
        let close = Arc::new(Notify::new());
        let entry = ClientEntry { traffic: Arc::clone(&traffic), close: Arc::clone(&close) };
        self.clients.write().insert(address, entry);
        (SessionTraffic::new(traffic, Arc::clone(&self.total)), close)
    }

    /// Remove a client. Called by the session itself after its socket is
    /// fully shut down, never before.
    pub fn unregister(&self, address: &SocketAddr) {
        self.clients.write().remove(address);
        if self.is_empty() {
            self.drained.notify_waiters();
        }
    }

    /// Wait until no clients are registered. Returns immediately if the
    /// registry is already empty.
    pub async fn wait_until_empty(&self) {
        loop {
            let drained = self.drained.notified();
            if self.is_empty() {
                return;
            }
            drained.await;
        }
    }

    /// Number of currently-registered (admitted) clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    /// Whether the registry currently holds no clients.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }

    /// Signal a specific client's session to close.
    #[must_use]
    pub fn request_close(&self, address: &SocketAddr) -> bool {
        if let Some(entry) = self.clients.read().get(address) {
            entry.close.notify_one();
            true
        } else {
            false
        }
    }

    /// Signal every registered client's session to close.
    pub fn request_close_all(&self) {
        for entry in self.clients.read().values() {
            entry.close.notify_one();
        }
    }

    /// Snapshot of every currently-registered client's address and traffic.
    #[must_use]
    pub fn client_info(&self) -> Vec<ClientInfo> {
        self.clients
            .read()
            .iter()
            .map(|(address, entry)| ClientInfo { address: *address, traffic: entry.traffic.snapshot() })
            .collect()
    }

    /// Cumulative traffic since `start`, across every client ever admitted
    /// — including ones that have since disconnected.
    ///
    /// Denied connections never register, so their bytes never appear here.
    #[must_use]
    pub fn total_traffic(&self) -> Traffic {
        self.total.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_unregister() {
        let registry = Registry::default();
        let addr: SocketAddr = "127.0.0.1:9000".parse().expect("addr");

        let (traffic, _close) = registry.register(addr);
        assert_eq!(registry.len(), 1);
        traffic.record_sent(10);
        traffic.record_received(5);

        let info = registry.client_info();
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].traffic.sent, 10);
        assert_eq!(info[0].traffic.received, 5);

        registry.unregister(&addr);
        assert!(registry.is_empty());
    }

    #[test]
    fn close_unknown_address_is_noop() {
        let registry = Registry::default();
        let addr: SocketAddr = "127.0.0.1:9001".parse().expect("addr");
        assert!(!registry.request_close(&addr));
    }

    #[test]
    fn total_traffic_survives_unregister() {
        let registry = Registry::default();
        let addr: SocketAddr = "127.0.0.1:9002".parse().expect("addr");

        let (traffic, _close) = registry.register(addr);
        traffic.record_sent(10);
        traffic.record_received(20);
        registry.unregister(&addr);

        assert!(registry.is_empty());
        let total = registry.total_traffic();
        assert_eq!(total.sent, 10);
        assert_eq!(total.received, 20);
    }
}
