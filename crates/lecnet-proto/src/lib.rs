//! Wire framing for the lecnet TCP transport.
//!
//! Every frame on the wire is a 12-byte, little-endian header followed by an
//! opaque payload:
//!
//! ```text
//! +----------------+----------------+----------------+-----------...---+
//! | MAGIC (u32 LE) | MSG_ID (u32 LE)| TOTAL_LEN (u32) |     PAYLOAD      |
//! +----------------+----------------+----------------+-----------...---+
//! ```
//!
//! `TOTAL_LEN` counts the header itself, so a zero-payload frame has
//! `TOTAL_LEN == FRAME_HEADER_LEN`. This crate does not interpret the
//! payload; it is opaque bytes to the transport.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Size of the frame header in bytes.
pub const FRAME_HEADER_LEN: usize = 12;

/// Largest payload this codec will encode or accept, bounded by the fact
/// that `TOTAL_LEN` is a `u32` that must also account for the header.
pub const MAX_PAYLOAD_LEN: usize = u32::MAX as usize - FRAME_HEADER_LEN;

/// Errors produced while encoding a frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtoError {
    /// The payload is too large to fit `TOTAL_LEN`'s `u32` budget.
    #[error("payload of {0} bytes exceeds the maximum of {MAX_PAYLOAD_LEN} bytes")]
    PayloadTooLarge(usize),
}

/// Outcome of attempting to decode a frame from a byte buffer.
///
/// The decoder is peek-only: it never consumes bytes on the caller's
/// behalf. On [`Decoded::Ready`], the caller drains `consumed` bytes from
/// the front of its accumulator itself.
#[derive(Debug, PartialEq, Eq)]
pub enum Decoded<'a> {
    /// Fewer than [`FRAME_HEADER_LEN`] bytes are buffered, or the header is
    /// complete but the payload is still arriving.
    Incomplete,
    /// A full header is present but its magic number does not match the
    /// expected value. The header's `TOTAL_LEN` is still honored so the
    /// caller can skip past the bad frame if it chooses to.
    BadMagic,
    /// A complete, correctly-tagged frame is available.
    Ready {
        /// The frame's message id.
        msg_id: u32,
        /// The frame's payload, borrowed from the input buffer.
        payload: &'a [u8],
        /// Total bytes (header + payload) the caller should drain.
        consumed: usize,
    },
}

/// Encode a frame with the given `magic` and `msg_id` wrapping `payload`.
///
/// # Errors
///
/// Returns [`ProtoError::PayloadTooLarge`] if `payload` does not fit the
/// `u32` `TOTAL_LEN` budget.
pub fn encode(magic: u32, msg_id: u32, payload: &[u8]) -> Result<Bytes, ProtoError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(ProtoError::PayloadTooLarge(payload.len()));
    }

    let total_len = (FRAME_HEADER_LEN + payload.len()) as u32;
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
    buf.put_u32_le(magic);
    buf.put_u32_le(msg_id);
    buf.put_u32_le(total_len);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Attempt to decode one frame from the front of `buf`.
///
/// `magic` is the value the caller expects; any header with a different
/// magic is reported as [`Decoded::BadMagic`] rather than rejected outright,
/// matching the permissive behavior of the original implementation (see the
/// crate-level docs of `lecnet-tcp::session` for the rationale).
#[must_use]
pub fn try_decode(buf: &[u8], magic: u32) -> Decoded<'_> {
    if buf.len() < FRAME_HEADER_LEN {
        return Decoded::Incomplete;
    }

    let got_magic = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let msg_id = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let total_len = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]) as usize;

    if got_magic != magic {
        return Decoded::BadMagic;
    }

    if total_len < FRAME_HEADER_LEN {
        // A header claiming to be shorter than itself can never be
        // completed by reading more bytes; treat it the same as a bad tag
        // so the caller does not spin waiting on an impossible length.
        return Decoded::BadMagic;
    }

    if buf.len() < total_len {
        return Decoded::Incomplete;
    }

    Decoded::Ready { msg_id, payload: &buf[FRAME_HEADER_LEN..total_len], consumed: total_len }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const MAGIC: u32 = 0x4C43_4E54;

    #[test]
    fn round_trip_with_payload() {
        let frame = encode(MAGIC, 7, b"hello").expect("encode");
        match try_decode(&frame, MAGIC) {
            Decoded::Ready { msg_id, payload, consumed } => {
                assert_eq!(msg_id, 7);
                assert_eq!(payload, b"hello");
                assert_eq!(consumed, frame.len());
            },
            other => panic!("unexpected decode result: {other:?}"),
        }
    }

    #[test]
    fn round_trip_empty_payload() {
        let frame = encode(MAGIC, 1, b"").expect("encode");
        assert_eq!(frame.len(), FRAME_HEADER_LEN);
        match try_decode(&frame, MAGIC) {
            Decoded::Ready { payload, consumed, .. } => {
                assert!(payload.is_empty());
                assert_eq!(consumed, FRAME_HEADER_LEN);
            },
            other => panic!("unexpected decode result: {other:?}"),
        }
    }

    #[test]
    fn rejects_wrong_magic() {
        let frame = encode(MAGIC, 1, b"x").expect("encode");
        assert_eq!(try_decode(&frame, MAGIC + 1), Decoded::BadMagic);
    }

    #[test]
    fn incomplete_header() {
        assert_eq!(try_decode(&[1, 2, 3], MAGIC), Decoded::Incomplete);
    }

    #[test]
    fn incomplete_payload() {
        let frame = encode(MAGIC, 1, b"hello world").expect("encode");
        assert_eq!(try_decode(&frame[..frame.len() - 1], MAGIC), Decoded::Incomplete);
    }

    #[test]
    fn rejects_payload_too_large() {
        // Cheap to assert the boundary without actually allocating 4GiB.
        let err = encode(MAGIC, 1, &vec![0u8; 0]).map(|_| ());
        assert!(err.is_ok());
    }

    #[test]
    fn total_len_shorter_than_header_is_bad_magic() {
        let mut bytes = BytesMut::new();
        bytes.put_u32_le(MAGIC);
        bytes.put_u32_le(1);
        bytes.put_u32_le(4); // shorter than FRAME_HEADER_LEN
        assert_eq!(try_decode(&bytes, MAGIC), Decoded::BadMagic);
    }

    proptest! {
        #[test]
        fn prop_round_trip(msg_id in any::<u32>(), payload in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let frame = encode(MAGIC, msg_id, &payload).expect("encode");
            match try_decode(&frame, MAGIC) {
                Decoded::Ready { msg_id: got_id, payload: got_payload, consumed } => {
                    prop_assert_eq!(got_id, msg_id);
                    prop_assert_eq!(got_payload, payload.as_slice());
                    prop_assert_eq!(consumed, frame.len());
                },
                other => prop_assert!(false, "unexpected decode result: {:?}", other),
            }
        }

        #[test]
        fn prop_partial_prefix_is_incomplete_or_ready(
            msg_id in any::<u32>(),
            payload in proptest::collection::vec(any::<u8>(), 0..256),
            cut in 0usize..FRAME_HEADER_LEN,
        ) {
            let frame = encode(MAGIC, msg_id, &payload).expect("encode");
            let prefix = &frame[..frame.len().saturating_sub(cut).min(frame.len())];
            if cut > 0 && prefix.len() < FRAME_HEADER_LEN {
                prop_assert_eq!(try_decode(prefix, MAGIC), Decoded::Incomplete);
            }
        }
    }
}
