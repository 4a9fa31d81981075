//! Framed TCP client (C4).
//!
//! One background I/O task owns the socket's read half for the lifetime of
//! the connection; synchronous and asynchronous sends write through a
//! shared, lock-guarded write half. `msg_id` (from `next_msg_id`) is the
//! *only* counter that ever becomes a wire id: every frame this client
//! writes, sync or async, is correlated through the `pending` map by
//! `msg_id`, so ids stay unique on the connection as the glossary requires.
//! `data_id` (from `next_data_id`) is a separate, purely local handle
//! [`Client::send_data_async`] hands back to index the `async_queue`
//! result slot — it never appears on the wire.

use std::{
    collections::HashMap,
    net::SocketAddr,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    time::Duration,
};

use bytes::{Bytes, BytesMut};
use lecnet_proto::Decoded;
use parking_lot::{Mutex, RwLock};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf},
    net::TcpStream,
    sync::{Mutex as AsyncMutex, oneshot},
    task::JoinHandle,
};
use tokio_rustls::TlsConnector;

use crate::{error::TcpError, socket::ClientSocket, tls, traffic::{Traffic, TrafficCounters}};

const READ_CHUNK: usize = 64 * 1024;

/// Configuration for [`Client::connect`].
#[derive(Debug, Clone)]
pub struct ClientParams {
    /// Server address to connect to.
    pub address: String,
    /// Server port to connect to.
    pub port: u16,
    /// Connect-phase timeout, in seconds. Does not bound individual
    /// `send_data` calls; those take their own `timeout` parameter.
    pub timeout_seconds: u64,
    /// Whether to negotiate TLS.
    pub use_ssl: bool,
    /// CA certificate used to verify the server.
    pub ca_cert_path: PathBuf,
    /// Magic number every frame must carry.
    pub magic_number: u32,
}

impl Default for ClientParams {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 50001,
            timeout_seconds: 10,
            use_ssl: true,
            ca_cert_path: PathBuf::from("ca.crt"),
            magic_number: 0,
        }
    }
}

struct AsyncSlot {
    sending: AtomicBool,
    result: Mutex<Option<Result<Bytes, TcpError>>>,
}

/// The framed TCP client.
pub struct Client {
    params: ClientParams,
    connecting: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
    write_half: Arc<AsyncMutex<Option<WriteHalf<ClientSocket>>>>,
    pending: Arc<RwLock<HashMap<u32, oneshot::Sender<Bytes>>>>,
    async_queue: Arc<RwLock<HashMap<u32, Arc<AsyncSlot>>>>,
    next_msg_id: Arc<AtomicU32>,
    next_data_id: Arc<AtomicU32>,
    traffic: Arc<TrafficCounters>,
    read_task: Option<JoinHandle<()>>,
    last_error: Arc<Mutex<Option<String>>>,
}

fn next_wrapping_id(counter: &AtomicU32) -> u32 {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |id| {
            Some(if id >= u32::MAX - 1 { 1 } else { id + 1 })
        })
        .unwrap_or(1)
}

impl Client {
    /// Construct a client in the not-yet-connected state.
    #[must_use]
    pub fn new(params: ClientParams) -> Self {
        Self {
            params,
            connecting: Arc::new(AtomicBool::new(false)),
            connected: Arc::new(AtomicBool::new(false)),
            write_half: Arc::new(AsyncMutex::new(None)),
            pending: Arc::new(RwLock::new(HashMap::new())),
            async_queue: Arc::new(RwLock::new(HashMap::new())),
            next_msg_id: Arc::new(AtomicU32::new(1)),
            next_data_id: Arc::new(AtomicU32::new(1)),
            traffic: Arc::new(TrafficCounters::default()),
            read_task: None,
            last_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Connect to the configured server, completing the TLS handshake if
    /// `use_ssl` is set.
    ///
    /// # Errors
    ///
    /// Returns [`TcpError::Timeout`] if the connect phase exceeds
    /// `timeout_seconds`, or [`TcpError::Io`]/[`TcpError::Tls`] on other
    /// connect/handshake failures.
    pub async fn connect(&mut self) -> Result<(), TcpError> {
        self.connecting.store(true, Ordering::SeqCst);
        let result = self.connect_inner().await;
        self.connecting.store(false, Ordering::SeqCst);
        if let Err(ref err) = result {
            *self.last_error.lock() = Some(err.to_string());
        }
        result
    }

    async fn connect_inner(&mut self) -> Result<(), TcpError> {
        let addr = format!("{}:{}", self.params.address, self.params.port);
        let timeout = Duration::from_secs(self.params.timeout_seconds);

        let stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| TcpError::Timeout(timeout))??;

        let socket = if self.params.use_ssl {
            let config = tls::client_config(&self.params.ca_cert_path)?;
            let connector = TlsConnector::from(Arc::new(config));
            let server_name = rustls_pki_types::ServerName::try_from(self.params.address.clone())
                .map_err(|_| TcpError::InvalidAddress(self.params.address.clone()))?;
            let tls_stream = tokio::time::timeout(timeout, connector.connect(server_name, stream))
                .await
                .map_err(|_| TcpError::Timeout(timeout))?
                .map_err(|e| TcpError::Tls(e.to_string()))?;
            ClientSocket::Tls(Box::new(tls_stream))
        } else {
            ClientSocket::Plain(stream)
        };

        let (read_half, write_half) = tokio::io::split(socket);
        *self.write_half.lock().await = Some(write_half);

        let connected = Arc::clone(&self.connected);
        let pending = Arc::clone(&self.pending);
        let traffic = Arc::clone(&self.traffic);
        let magic = self.params.magic_number;

        let last_error = Arc::clone(&self.last_error);
        self.read_task = Some(tokio::spawn(read_loop(read_half, magic, pending, traffic, connected, last_error)));

        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Whether [`Client::connect`] is currently in progress.
    #[must_use]
    pub fn connecting(&self) -> bool {
        self.connecting.load(Ordering::SeqCst)
    }

    /// Whether the client currently believes it is connected. Does not
    /// perform a liveness check; a peer-initiated close is only observed
    /// once the read loop notices the socket has shut down.
    #[must_use]
    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Whether the background read task is still running.
    #[must_use]
    pub fn running(&self) -> bool {
        self.read_task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Send `data` and block until a reply with the same `msg_id` arrives,
    /// times out, or the connection drops.
    ///
    /// `busy_fn` is invoked periodically while waiting, standing in for the
    /// original API's busy-poll callback (e.g. to pump a UI event loop);
    /// it is never relied on to detect completion, only informational.
    ///
    /// # Errors
    ///
    /// Returns [`TcpError::NotConnected`] if not connected,
    /// [`TcpError::Timeout`] if no reply arrives in time.
    pub async fn send_data<F: FnMut()>(
        &self,
        data: &[u8],
        timeout: Duration,
        busy_fn: F,
    ) -> Result<Bytes, TcpError> {
        send_data_on(
            self.params.magic_number,
            &self.connected,
            &self.pending,
            &self.next_msg_id,
            &self.write_half,
            &self.traffic,
            data,
            timeout,
            busy_fn,
        )
        .await
    }

    /// Send `data` without blocking for a reply, returning a `data_id` to
    /// later poll with [`Client::sending`]/[`Client::get_response`].
    ///
    /// Spawns a background task that internally calls the same send/receive
    /// path as [`Client::send_data`] — the wire `msg_id` it writes comes
    /// from the shared `next_msg_id` counter, exactly as a synchronous send
    /// would. `data_id` never touches the wire; it only indexes the result
    /// slot this call hands back.
    ///
    /// # Errors
    ///
    /// Returns [`TcpError::NotConnected`] if not connected.
    pub async fn send_data_async(&self, data: Bytes, timeout: Duration) -> Result<u32, TcpError> {
        if !self.connected() {
            return Err(TcpError::NotConnected);
        }

        let data_id = next_wrapping_id(&self.next_data_id);
        let slot = Arc::new(AsyncSlot { sending: AtomicBool::new(true), result: Mutex::new(None) });
        self.async_queue.write().insert(data_id, Arc::clone(&slot));

        let magic = self.params.magic_number;
        let connected = Arc::clone(&self.connected);
        let pending = Arc::clone(&self.pending);
        let next_msg_id = Arc::clone(&self.next_msg_id);
        let write_half = Arc::clone(&self.write_half);
        let traffic = Arc::clone(&self.traffic);

        tokio::spawn(async move {
            let result = send_data_on(
                magic,
                &connected,
                &pending,
                &next_msg_id,
                &write_half,
                &traffic,
                &data,
                timeout,
                || {},
            )
            .await;
            *slot.result.lock() = Some(result);
            slot.sending.store(false, Ordering::SeqCst);
        });

        Ok(data_id)
    }

    /// Whether the async send identified by `data_id` is still in flight.
    #[must_use]
    pub fn sending(&self, data_id: u32) -> bool {
        self.async_queue.read().get(&data_id).is_some_and(|slot| slot.sending.load(Ordering::SeqCst))
    }

    /// Retrieve the result of a completed async send, removing it from the
    /// tracking queue. Returns `None` while still in flight or for an
    /// unknown `data_id`.
    ///
    /// # Errors
    ///
    /// The inner `Result` carries whatever [`Client::send_data`] would have
    /// returned for the same call — [`TcpError::Timeout`] if the deadline
    /// elapsed with no reply, or the write/connection error that aborted
    /// the send.
    pub fn get_response(&self, data_id: u32) -> Option<Result<Bytes, TcpError>> {
        let mut queue = self.async_queue.write();
        let slot = queue.get(&data_id)?;
        if slot.sending.load(Ordering::SeqCst) {
            return None;
        }
        let response = slot.result.lock().take();
        queue.remove(&data_id);
        response
    }

    /// Close the connection, aborting the background read task.
    pub async fn disconnect(&mut self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(mut half) = self.write_half.lock().await.take() {
            let _ = half.shutdown().await;
        }
        if let Some(task) = self.read_task.take() {
            task.abort();
        }
        self.pending.write().clear();
        self.async_queue.write().clear();
    }

    /// Cumulative bytes sent/received on this connection.
    #[must_use]
    pub fn traffic(&self) -> Traffic {
        self.traffic.snapshot()
    }

    /// The most recent connect/send error message, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    /// The server address this client targets.
    #[must_use]
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        format!("{}:{}", self.params.address, self.params.port).parse().ok()
    }
}

/// Shared body of [`Client::send_data`] and the background task spawned by
/// [`Client::send_data_async`]: allocate a fresh wire `msg_id` from
/// `next_msg_id`, register it in `pending`, write the frame, and wait for
/// the matching reply or the deadline. Every frame this client writes goes
/// through here, so `msg_id` is always drawn from the single shared
/// counter regardless of which public entry point was used.
#[allow(clippy::too_many_arguments)]
async fn send_data_on(
    magic: u32,
    connected: &Arc<AtomicBool>,
    pending: &Arc<RwLock<HashMap<u32, oneshot::Sender<Bytes>>>>,
    next_msg_id: &Arc<AtomicU32>,
    write_half: &Arc<AsyncMutex<Option<WriteHalf<ClientSocket>>>>,
    traffic: &Arc<TrafficCounters>,
    data: &[u8],
    timeout: Duration,
    mut busy_fn: impl FnMut(),
) -> Result<Bytes, TcpError> {
    if !connected.load(Ordering::SeqCst) {
        return Err(TcpError::NotConnected);
    }

    let msg_id = next_wrapping_id(next_msg_id);
    let (tx, rx) = oneshot::channel();
    pending.write().insert(msg_id, tx);

    let frame = match lecnet_proto::encode(magic, msg_id, data) {
        Ok(frame) => frame,
        Err(err) => {
            pending.write().remove(&msg_id);
            return Err(TcpError::Tls(err.to_string()));
        },
    };

    {
        let mut guard = write_half.lock().await;
        let Some(half) = guard.as_mut() else {
            pending.write().remove(&msg_id);
            return Err(TcpError::NotConnected);
        };
        if let Err(err) = half.write_all(&frame).await {
            pending.write().remove(&msg_id);
            return Err(TcpError::Io(err));
        }
    }
    traffic.record_sent(frame.len() as u64);

    let deadline = tokio::time::Instant::now() + timeout;
    let mut ticker = tokio::time::interval(Duration::from_millis(50));
    tokio::pin!(rx);

    loop {
        tokio::select! {
            result = &mut rx => {
                return result.map_err(|_| TcpError::NotConnected);
            }
            _ = ticker.tick() => {
                busy_fn();
                if tokio::time::Instant::now() >= deadline {
                    pending.write().remove(&msg_id);
                    return Err(TcpError::Timeout(timeout));
                }
            }
        }
    }
}

async fn read_loop(
    mut read_half: ReadHalf<ClientSocket>,
    magic: u32,
    pending: Arc<RwLock<HashMap<u32, oneshot::Sender<Bytes>>>>,
    traffic: Arc<TrafficCounters>,
    connected: Arc<AtomicBool>,
    last_error: Arc<Mutex<Option<String>>>,
) {
    let mut accumulator = BytesMut::new();
    let mut scratch = vec![0u8; READ_CHUNK];

    let disconnect_reason = loop {
        let n = match read_half.read(&mut scratch).await {
            Ok(0) => break "connection closed by peer".to_string(),
            Err(err) => break err.to_string(),
            Ok(n) => n,
        };
        traffic.record_received(n as u64);
        accumulator.extend_from_slice(&scratch[..n]);

        loop {
            match lecnet_proto::try_decode(&accumulator, magic) {
                Decoded::Incomplete => break,
                Decoded::BadMagic => {
                    *last_error.lock() = Some("Invalid data received".to_string());
                    accumulator.clear();
                    break;
                },
                Decoded::Ready { msg_id, payload, consumed } => {
                    let payload = Bytes::copy_from_slice(payload);
                    let _ = accumulator.split_to(consumed);

                    if let Some(tx) = pending.write().remove(&msg_id) {
                        let _ = tx.send(payload);
                    }
                },
            }
        }
    };

    connected.store(false, Ordering::SeqCst);
    *last_error.lock() = Some(format!("Client disconnected from server: {disconnect_reason}"));
}
