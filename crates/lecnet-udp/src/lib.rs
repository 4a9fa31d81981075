//! UDP broadcast and multicast sender/receiver pairs.
//!
//! Independent of the TCP transport in [`lecnet-tcp`]: no framing, no
//! reliability layer, no fragmentation beyond what the OS MTU allows.
//! Messages are capped at 1024 bytes, matching the original library's
//! receive buffer size.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod broadcast;
mod error;
pub mod multicast;

pub use error::UdpError;
