//! Per-connection server-side state machine.
//!
//! A session's lifecycle is `Accepted -> [Denied -> Closed]` or
//! `Accepted -> Registered -> (Reading <-> Writing) -> Closed`. Denied
//! sessions never register with the [`Registry`] and never touch traffic
//! counters, so they are invisible to [`crate::server::Server::traffic`].
//!
//! `BadMagic` and truncated-header frames are logged as invalid data and
//! the session is kept open by default (`max_invalid_frames: None`): a
//! hostile peer can hold a slot open indefinitely by sending garbage. Set
//! [`ServerHandle::max_invalid_frames`] to close a session after repeated
//! garbage if that trade-off does not suit your deployment.

use std::{net::SocketAddr, sync::Arc};

use bytes::BytesMut;
use lecnet_proto::Decoded;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    sync::{Mutex as AsyncMutex, Notify},
};

use crate::{log::LogEvent, log::LogFn, registry::Registry, socket::ServerSocket, traffic::SessionTraffic};

const READ_CHUNK: usize = 64 * 1024;

/// Callback invoked for every complete, correctly-tagged frame. Returns the
/// reply payload; an empty payload means "write nothing" (the original
/// library's "write zero bytes" case is implemented as skipping the write
/// entirely). Must return quickly: it runs inline on the session's task.
pub type OnReceiveFn = Arc<dyn Fn(SocketAddr, &[u8]) -> Vec<u8> + Send + Sync>;

/// Shared, cheaply-clonable state every session needs. Replaces a raw
/// back-pointer to the server with an explicit bundle of the pieces a
/// session actually touches.
#[derive(Clone)]
pub struct ServerHandle {
    /// Registry of admitted clients.
    pub registry: Arc<Registry>,
    /// Expected frame magic number.
    pub magic: u32,
    /// Callback dispatched for each decoded frame.
    pub on_receive: OnReceiveFn,
    /// Callback dispatched for each loggable event.
    pub log: LogFn,
    /// Optional cap on consecutive invalid frames before the session
    /// closes itself. `None` preserves the original's permissive behavior.
    pub max_invalid_frames: Option<u32>,
}

/// One accepted connection's read/write loop.
pub struct Session {
    socket: AsyncMutex<ServerSocket>,
    address: SocketAddr,
    handle: ServerHandle,
}

impl Session {
    /// Wrap an accepted socket, ready to [`Session::run`].
    #[must_use]
    pub fn new(socket: ServerSocket, address: SocketAddr, handle: ServerHandle) -> Self {
        Self { socket: AsyncMutex::new(socket), address, handle }
    }

    /// Run the session to completion.
    ///
    /// If `denied` is set (the admission cap was already reached when this
    /// connection was accepted), the socket is closed immediately without
    /// registering or reading any data.
    pub async fn run(self, denied: bool) {
        if denied {
            (self.handle.log)(LogEvent::ClientDenied { address: self.address });
            let mut socket = self.socket.lock().await;
            let _ = socket.shutdown().await;
            return;
        }

        let (traffic, close) = self.handle.registry.register(self.address);
        (self.handle.log)(LogEvent::ClientConnected { address: self.address });

        self.read_loop(&traffic, &close).await;

        {
            let mut socket = self.socket.lock().await;
            let _ = socket.shutdown().await;
        }
        self.handle.registry.unregister(&self.address);
        (self.handle.log)(LogEvent::ClientDisconnected { address: self.address });
    }

    async fn read_loop(&self, traffic: &SessionTraffic, close: &Notify) {
        let mut accumulator = BytesMut::new();
        let mut scratch = vec![0u8; READ_CHUNK];
        let mut invalid_frames = 0u32;

        loop {
            let read = {
                let mut socket = self.socket.lock().await;
                tokio::select! {
                    read = socket.read(&mut scratch) => read,
                    () = close.notified() => break,
                }
            };

            let n = match read {
                Ok(0) => break,
                Ok(n) => n,
                Err(_) => break,
            };

            traffic.record_received(n as u64);
            accumulator.extend_from_slice(&scratch[..n]);

            loop {
                match lecnet_proto::try_decode(&accumulator, self.handle.magic) {
                    Decoded::Incomplete => break,
                    Decoded::BadMagic => {
                        (self.handle.log)(LogEvent::InvalidData { address: self.address });
                        invalid_frames += 1;
                        accumulator.clear();
                        if let Some(max) = self.handle.max_invalid_frames {
                            if invalid_frames >= max {
                                return;
                            }
                        }
                        break;
                    },
                    Decoded::Ready { msg_id, payload, consumed } => {
                        invalid_frames = 0;
                        let reply = (self.handle.on_receive)(self.address, payload);
                        let _ = accumulator.split_to(consumed);
                        if !reply.is_empty() {
                            self.write_reply(msg_id, &reply, traffic).await;
                        }
                    },
                }
            }
        }
    }

    async fn write_reply(&self, msg_id: u32, payload: &[u8], traffic: &SessionTraffic) {
        let frame = match lecnet_proto::encode(self.handle.magic, msg_id, payload) {
            Ok(frame) => frame,
            Err(err) => {
                (self.handle.log)(LogEvent::Error { message: err.to_string() });
                return;
            },
        };

        let mut socket = self.socket.lock().await;
        if socket.write_all(&frame).await.is_ok() {
            traffic.record_sent(frame.len() as u64);
        }
    }
}
