//! Thin ambient utilities shared across the lecnet workspace, plus a
//! facade re-exporting the transport, UDP, and certificate crates.
//!
//! These are explicitly out of the core transport's protocol-engineering
//! scope, but the original library ships them as small standalone
//! collaborators: a local timestamp formatter, host IP enumeration, and a
//! human-readable byte-count formatter.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::net::IpAddr;

pub use lecnet_cert as cert;
pub use lecnet_proto as proto;
pub use lecnet_tcp as tcp;
pub use lecnet_udp as udp;

/// Format the current local time as `YYYY-MM-DD HH:MM:SS`.
///
/// Falls back to UTC if the local UTC offset cannot be determined (for
/// instance, inside some containerized or multi-threaded environments
/// where `time` refuses to trust `localtime_r`).
#[must_use]
pub fn time_stamp() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    let format = time::macros::format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    );
    now.format(&format).unwrap_or_else(|_| now.to_string())
}

/// Enumerate this host's non-loopback IP addresses.
///
/// Returns an empty vector rather than an error if interface enumeration
/// fails; callers needing diagnostics should consult OS-level tooling.
#[must_use]
pub fn host_ips() -> Vec<IpAddr> {
    if_addrs::get_if_addrs()
        .map(|addrs| {
            addrs
                .into_iter()
                .filter(|iface| !iface.is_loopback())
                .map(|iface| iface.ip())
                .collect()
        })
        .unwrap_or_default()
}

/// Render `bytes` as a human-readable size (`"1.5 MiB"`, `"42 B"`, ...).
#[must_use]
pub fn human_readable_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} {}", UNITS[unit])
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}
