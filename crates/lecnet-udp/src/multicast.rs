//! UDP multicast sender and receiver.
//!
//! Mirrors [`crate::broadcast`]'s API shape with one addition: both sides
//! take a multicast group address, joining it on the receiver and
//! targeting it on the sender.

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

/// Sends datagrams to a multicast group on a fixed port.
pub struct Sender {
    socket: Arc<UdpSocket>,
    target: SocketAddr,
}

impl Sender {
    /// Bind a sender targeting `group:port`.
    ///
    /// # Errors
    ///
    /// Returns [`UdpError::Bind`] if the underlying socket cannot be
    /// created or configured.
    pub fn new(group: Ipv4Addr, port: u16) -> Result<Self, UdpError> {
        let socket = socket2::Socket::new(socket2::Domain::IPV4, socket2::Type::DGRAM, None)
            .map_err(UdpError::Bind)?;
        socket.set_reuse_address(true).map_err(UdpError::Bind)?;
        socket
            .bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0).into())
            .map_err(UdpError::Bind)?;
        socket.set_nonblocking(true).map_err(UdpError::Bind)?;
        let socket = UdpSocket::from_std(socket.into()).map_err(UdpError::Bind)?;

        Ok(Self { socket: Arc::new(socket), target: SocketAddr::V4(SocketAddrV4::new(group, port)) })
    }

    /// Send `message` up to `max_count` times, waiting `retry_interval`
    /// between attempts, returning the number of sends that succeeded.
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

    /// Take the result of a completed send run, if any.
    pub fn result(&self) -> Option<Result<u32, UdpError>> {
        self.result.lock().take()
    }
}

/// Listens for datagrams sent to a multicast group.
pub struct Receiver {
    socket: Arc<UdpSocket>,
}

impl Receiver {
    /// Bind a receiver on `listen_address:port` and join `group`.
    ///
    /// # Errors
    ///
    /// Returns [`UdpError::Bind`] if the socket cannot be bound, configured,
    /// or joined to the multicast group.
    pub fn new(group: Ipv4Addr, port: u16, listen_address: Ipv4Addr) -> Result<Self, UdpError> {
        let socket = socket2::Socket::new(socket2::Domain::IPV4, socket2::Type::DGRAM, None)
            .map_err(UdpError::Bind)?;
        socket.set_reuse_address(true).map_err(UdpError::Bind)?;
        socket
            .bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port).into())
            .map_err(UdpError::Bind)?;
        socket.join_multicast_v4(&group, &listen_address).map_err(UdpError::Bind)?;
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

    /// Take the result of a completed receive, if any.
    pub fn get(&self) -> Option<Result<Bytes, UdpError>> {
        self.result.lock().take()
    }

    /// Request the background receive to stop early.
    pub fn stop(&self) {
        self.stop.notify_one();
    }
}
