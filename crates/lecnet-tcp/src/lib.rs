//! Framed TCP client and async server transport.
//!
//! This is the core of the lecnet workspace: a length-prefixed request/
//! response protocol over TCP, optionally behind TLS, with bounded
//! concurrency and per-message correlation. It is not a general RPC
//! framework — there is no method dispatch, schema, or streaming beyond
//! what a single framed connection gives you for free; payloads are opaque
//! bytes to every type in this crate.
//!
//! # Components
//!
//! - [`client::Client`]: connects to a server, sends framed requests
//!   synchronously ([`client::Client::send_data`]) or asynchronously
//!   ([`client::Client::send_data_async`]).
//! - [`server::Server`]: accepts connections, admits up to `max_clients`,
//!   and dispatches decoded frames to a caller-supplied callback.
//! - [`session::Session`]: one accepted connection's read/write loop.
//! - [`registry::Registry`]: admitted clients, keyed by address.
//! - [`tls`]: certificate/key loading for both roles.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
mod error;
pub mod log;
mod registry;
pub mod server;
mod session;
mod socket;
pub mod tls;
mod traffic;

pub use client::{Client, ClientParams};
pub use error::TcpError;
pub use log::LogEvent;
pub use registry::ClientInfo;
pub use server::{Server, ServerParams};
pub use session::OnReceiveFn;
pub use traffic::Traffic;
