//! UDP broadcast sender and receiver.

use std::{
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::{net::UdpSocket, sync::Notify};

use crate::error::UdpError;

const MAX_MESSAGE_LEN: usize = 1024;

fn bind_sender_socket() -> Result<UdpSocket, UdpError> {
    let socket = socket2::Socket::new(socket2::Domain::IPV4, socket2::Type::DGRAM, None)
        .map_err(UdpError::Bind)?;
    socket.set_broadcast(true).map_err(UdpError::Bind)?;
    socket.set_reuse_address(true).map_err(UdpError::Bind)?;
    socket
        .bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0).into())
        .map_err(UdpError::Bind)?;
    socket.set_nonblocking(true).map_err(UdpError::Bind)?;
    UdpSocket::from_std(socket.into()).map_err(UdpError::Bind)
}

/// Sends datagrams to the local broadcast address on a fixed port.
pub struct Sender {
    socket: Arc<UdpSocket>,
    target: SocketAddr,
}

impl Sender {
    /// Bind a sender targeting the broadcast address on `port`.
    ///
    /// # Errors
    ///
    /// Returns [`UdpError::Bind`] if the underlying socket cannot be
    /// created or configured for broadcast.
    pub fn new(port: u16) -> Result<Self, UdpError> {
        let socket = bind_sender_socket()?;
        let target = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::BROADCAST, port));
        Ok(Self { socket: Arc::new(socket), target })
    }

    /// Send `message` up to `max_count` times, waiting `retry_interval`
    /// between attempts, returning the number of sends that succeeded.
    ///
    /// A send error aborts the run early; the number of sends completed
    /// before the failure is reported via [`UdpError::Send::actual_count`].
    ///
    /// # Errors
    ///
    /// Returns [`UdpError::Send`] if any individual send fails.
    pub async fn send(
        &self,
        message: &[u8],
        max_count: u32,
        retry_interval: Duration,
    ) -> Result<u32, UdpError> {
        if message.len() > MAX_MESSAGE_LEN {
            return Err(UdpError::MessageTooLarge(message.len()));
        }

        let mut sent = 0u32;
        for attempt in 0..max_count {
            if let Err(err) = self.socket.send_to(message, self.target).await {
                return Err(UdpError::Send { actual_count: sent, reason: err.to_string() });
            }
            sent += 1;
            if attempt + 1 < max_count {
                tokio::time::sleep(retry_interval).await;
            }
        }
        Ok(sent)
    }

    /// Spawn `send` as a background task, returning a handle to poll its
    /// progress and collect its eventual result.
    #[must_use]
    pub fn send_async(
        self: &Arc<Self>,
        message: Bytes,
        max_count: u32,
        retry_interval: Duration,
    ) -> SendHandle {
        let in_flight = Arc::new(AtomicBool::new(true));
        let result = Arc::new(Mutex::new(None));

        let sender = Arc::clone(self);
        let in_flight_task = Arc::clone(&in_flight);
        let result_task = Arc::clone(&result);
        tokio::spawn(async move {
            let outcome = sender.send(&message, max_count, retry_interval).await;
            *result_task.lock() = Some(outcome);
            in_flight_task.store(false, Ordering::SeqCst);
        });

        SendHandle { in_flight, result }
    }
}

/// Handle to an in-flight [`Sender::send_async`] call.
pub struct SendHandle {
    in_flight: Arc<AtomicBool>,
    result: Arc<Mutex<Option<Result<u32, UdpError>>>>,
}

impl SendHandle {
    /// Whether the background send run is still in progress.
    #[must_use]
    pub fn sending(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Take the result of a completed send run, if any. Consumes the
    /// stored result; a second call returns `None`.
    pub fn result(&self) -> Option<Result<u32, UdpError>> {
        self.result.lock().take()
    }
}

/// Listens for broadcast datagrams on a fixed port.
pub struct Receiver {
    socket: Arc<UdpSocket>,
}

impl Receiver {
    /// Bind a receiver on `listen_address:port` with broadcast reception
    /// enabled.
    ///
    /// # Errors
    ///
    /// Returns [`UdpError::Bind`] if the socket cannot be bound or
    /// configured.
    pub fn new(port: u16, listen_address: Ipv4Addr) -> Result<Self, UdpError> {
        let socket = socket2::Socket::new(socket2::Domain::IPV4, socket2::Type::DGRAM, None)
            .map_err(UdpError::Bind)?;
        socket.set_reuse_address(true).map_err(UdpError::Bind)?;
        socket.set_broadcast(true).map_err(UdpError::Bind)?;
        socket
            .bind(&SocketAddrV4::new(listen_address, port).into())
            .map_err(UdpError::Bind)?;
        socket.set_nonblocking(true).map_err(UdpError::Bind)?;
        let socket = UdpSocket::from_std(socket.into()).map_err(UdpError::Bind)?;
        Ok(Self { socket: Arc::new(socket) })
    }

    /// Start one deadline-bounded receive in the background.
    #[must_use]
    pub fn run(self: &Arc<Self>, timeout: Duration) -> ReceiveHandle {
        let running = Arc::new(AtomicBool::new(true));
        let result = Arc::new(Mutex::new(None));
        let stop = Arc::new(Notify::new());

        let socket = Arc::clone(self);
        let running_task = Arc::clone(&running);
        let result_task = Arc::clone(&result);
        let stop_task = Arc::clone(&stop);

        tokio::spawn(async move {
            let mut buf = [0u8; MAX_MESSAGE_LEN];
            let outcome = tokio::select! {
                recv = tokio::time::timeout(timeout, socket.socket.recv_from(&mut buf)) => {
                    match recv {
                        Ok(Ok((len, _addr))) => Ok(Bytes::copy_from_slice(&buf[..len])),
                        Ok(Err(err)) => Err(UdpError::Receive(err.to_string())),
                        Err(_elapsed) => Err(UdpError::Receive("timed out".to_string())),
                    }
                }
                () = stop_task.notified() => Err(UdpError::Receive("stopped".to_string())),
            };
            *result_task.lock() = Some(outcome);
            running_task.store(false, Ordering::SeqCst);
        });

        ReceiveHandle { running, result, stop }
    }
}

/// Handle to an in-flight [`Receiver::run`] call.
pub struct ReceiveHandle {
    running: Arc<AtomicBool>,
    result: Arc<Mutex<Option<Result<Bytes, UdpError>>>>,
    stop: Arc<Notify>,
}

impl ReceiveHandle {
    /// Whether the background receive is still waiting for a datagram.
    #[must_use]
    pub fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Take the result of a completed receive, if any. Consumes the stored
    /// result; a second call returns `None`.
    pub fn get(&self) -> Option<Result<Bytes, UdpError>> {
        self.result.lock().take()
    }

    /// Request the background receive to stop early. Best-effort: observe
    /// [`ReceiveHandle::running`] to confirm it has actually ended.
    pub fn stop(&self) {
        self.stop.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn broadcast_round_trip() {
        let port = 0;
        let receiver = Arc::new(Receiver::new(port, Ipv4Addr::UNSPECIFIED).expect("bind receiver"));
        let local_port = receiver.socket.local_addr().expect("local addr").port();

        let handle = receiver.run(Duration::from_secs(2));

        let sender = Arc::new(Sender::new(local_port).expect("bind sender"));
        sender.send(b"hello", 1, Duration::from_millis(0)).await.expect("send");

        for _ in 0..50 {
            if !handle.running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let received = handle.get().expect("result available").expect("receive ok");
        assert_eq!(&received[..], b"hello");
    }
}
