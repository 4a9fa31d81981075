//! Async accept loop (C3): one task per server, one task per session.

use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::{net::TcpListener, sync::Notify, task::JoinHandle};
use tokio_rustls::TlsAcceptor;

use crate::{
    error::TcpError,
    log::{LogEvent, LogFn},
    registry::{ClientInfo, Registry},
    session::{OnReceiveFn, ServerHandle, Session},
    socket::ServerSocket,
    tls,
    traffic::Traffic,
};

/// Configuration for [`Server::start`].
#[derive(Clone)]
pub struct ServerParams {
    /// Local address to bind to, e.g. `"0.0.0.0"`.
    pub address: String,
    /// Local port to bind to.
    pub port: u16,
    /// Maximum number of simultaneously-admitted clients. Connections
    /// beyond this cap are accepted, then immediately denied and closed.
    pub max_clients: usize,
    /// Magic number every frame must carry to be accepted.
    pub magic_number: u32,
    /// Whether to wrap accepted connections in TLS.
    pub use_ssl: bool,
    /// PEM certificate chain path. `None` with `use_ssl` generates an
    /// ephemeral self-signed certificate.
    pub cert_path: Option<PathBuf>,
    /// PEM private key path. Empty/`None` while `cert_path` is set reuses
    /// `cert_path` as a combined cert+key file.
    pub key_path: Option<PathBuf>,
    /// Password protecting an encrypted private key, if any.
    pub key_password: Option<String>,
    /// Cap on consecutive invalid (bad-magic) frames per session before it
    /// is closed. `None` preserves the permissive original behavior.
    pub max_invalid_frames: Option<u32>,
}

impl Default for ServerParams {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 50001,
            max_clients: 1000,
            magic_number: 0,
            use_ssl: true,
            cert_path: None,
            key_path: None,
            key_password: None,
            max_invalid_frames: None,
        }
    }
}

/// The async TCP server (C3).
pub struct Server {
    params: ServerParams,
    registry: Arc<Registry>,
    starting: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    stop_signal: Arc<Notify>,
    accept_task: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
    log: Option<LogFn>,
}

impl Server {
    /// Construct a server that has not yet started listening.
    #[must_use]
    pub fn new(params: ServerParams) -> Self {
        Self {
            params,
            registry: Arc::new(Registry::default()),
            starting: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
            stop_signal: Arc::new(Notify::new()),
            accept_task: None,
            local_addr: None,
            log: None,
        }
    }

    /// Bind and start accepting connections, dispatching each decoded frame
    /// to `on_receive` and each loggable event to `log`.
    ///
    /// Idempotent: calling `start` while the server is already running logs
    /// [`LogEvent::AlreadyRunning`] and returns `Ok(())` without touching
    /// the existing listener or sessions.
    ///
    /// # Errors
    ///
    /// Returns [`TcpError::Io`] if the listener cannot be bound, or
    /// [`TcpError::Tls`] if TLS is enabled and the certificate material is
    /// invalid.
    pub async fn start(&mut self, on_receive: OnReceiveFn, log: LogFn) -> Result<(), TcpError> {
        if self.running.load(Ordering::SeqCst) {
            log(LogEvent::AlreadyRunning);
            return Ok(());
        }

        self.starting.store(true, Ordering::SeqCst);

        let bind_addr = format!("{}:{}", self.params.address, self.params.port);
        let listener = TcpListener::bind(&bind_addr).await?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);

        let acceptor = if self.params.use_ssl {
            let config = tls::server_config(
                self.params.cert_path.as_deref(),
                self.params.key_path.as_deref().or(self.params.cert_path.as_deref()),
                self.params.key_password.as_deref(),
            )?;
            Some(TlsAcceptor::from(Arc::new(config)))
        } else {
            None
        };

        let handle = ServerHandle {
            registry: Arc::clone(&self.registry),
            magic: self.params.magic_number,
            on_receive,
            log: Arc::clone(&log),
            max_invalid_frames: self.params.max_invalid_frames,
        };

        let max_clients = self.params.max_clients;
        let registry = Arc::clone(&self.registry);
        let running = Arc::clone(&self.running);
        let stop_signal = Arc::clone(&self.stop_signal);

        log(LogEvent::Started { address: local_addr });
        self.running.store(true, Ordering::SeqCst);
        self.starting.store(false, Ordering::SeqCst);
        self.log = Some(Arc::clone(&log));

        let task = tokio::spawn(async move {
            accept_loop(listener, acceptor, handle, registry, max_clients, stop_signal).await;
            running.store(false, Ordering::SeqCst);
        });
        self.accept_task = Some(task);

        Ok(())
    }

    /// Whether the server is in the middle of [`Server::start`].
    #[must_use]
    pub fn starting(&self) -> bool {
        self.starting.load(Ordering::SeqCst)
    }

    /// Whether the accept loop is currently running.
    #[must_use]
    pub fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The address the server is bound to, once started.
    ///
    /// # Errors
    ///
    /// Returns [`TcpError::NotConnected`] if the server has not started.
    pub fn local_addr(&self) -> Result<SocketAddr, TcpError> {
        self.local_addr.ok_or(TcpError::NotConnected)
    }

    /// Request a specific client's session to close.
    #[must_use]
    pub fn close(&self, address: &SocketAddr) -> bool {
        self.registry.request_close(address)
    }

    /// Request every connected client's session to close, and wait until
    /// the registry is empty. The accept loop itself keeps running, so
    /// clients may reconnect.
    pub async fn close_all(&self) {
        self.registry.request_close_all();
        self.registry.wait_until_empty().await;
    }

    /// Stop accepting new connections and close every connected client,
    /// waiting until both have fully torn down. Idempotent: calling `stop`
    /// on an already-stopped server is a no-op.
    pub async fn stop(&mut self) {
        if !self.running.load(Ordering::SeqCst) && self.accept_task.is_none() {
            return;
        }

        self.stop_signal.notify_one();
        self.close_all().await;

        if let Some(task) = self.accept_task.take() {
            let _ = task.await;
        }

        if let Some(log) = &self.log {
            log(LogEvent::Stopped);
        }
    }

    /// Snapshot of every currently-connected client.
    #[must_use]
    pub fn client_info(&self) -> Vec<ClientInfo> {
        self.registry.client_info()
    }

    /// Cumulative traffic since [`Server::start`], across every client ever
    /// admitted, including ones that have since disconnected. Denied
    /// connections are never counted.
    #[must_use]
    pub fn traffic(&self) -> Traffic {
        self.registry.total_traffic()
    }
}

async fn accept_loop(
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
    handle: ServerHandle,
    registry: Arc<Registry>,
    max_clients: usize,
    stop_signal: Arc<Notify>,
) {
    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            () = stop_signal.notified() => break,
        };

        let (stream, address) = match accepted {
            Ok(pair) => pair,
            Err(err) => {
                (handle.log)(LogEvent::Error { message: err.to_string() });
                continue;
            },
        };

        let denied = registry.len() >= max_clients;

        let handle = handle.clone();
        let acceptor = acceptor.clone();
        tokio::spawn(async move {
            let socket = match acceptor {
                Some(acceptor) => match acceptor.accept(stream).await {
                    Ok(tls_stream) => ServerSocket::Tls(Box::new(tls_stream)),
                    Err(err) => {
                        (handle.log)(LogEvent::Error { message: err.to_string() });
                        return;
                    },
                },
                None => ServerSocket::Plain(stream),
            };

            Session::new(socket, address, handle).run(denied).await;
        });
    }
}
