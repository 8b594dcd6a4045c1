// SPDX-License-Identifier: AGPL-3.0-only

//! Datagram codec.
//!
//! Two framings share one numeric layout:
//!
//! ```text
//! Raw (reference):
//!   request  : f32 × N                       4×N bytes
//!   response : i32 label [+ ignored bytes]   ≥ 4 bytes
//!
//! Correlated:
//!   request  : u64 round_id, f32 × N         8 + 4×N bytes
//!   response : u64 round_id, i32 label [..]  ≥ 12 bytes
//! ```
//!
//! Every numeric field uses the contract's [`ByteOrder`]. Encoding is pure
//! and total; decoding fails only on short or wrongly-sized payloads.

use crate::error::FormatError;
use serde::{Deserialize, Serialize};

/// Bytes per encoded f32 or i32
pub const VALUE_BYTES: usize = 4;

/// Bytes of the round id header under correlated framing
pub const ROUND_ID_BYTES: usize = 8;

/// Largest payload a single UDP datagram can carry over IPv4
pub const MAX_DATAGRAM_LEN: usize = 65_507;

/// Byte order of numeric fields on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    /// Least significant byte first
    Little,
    /// Most significant byte first
    Big,
    /// In-memory order of the host (reference behavior)
    Native,
}

impl ByteOrder {
    fn put_f32s(self, out: &mut Vec<u8>, values: &[f32]) {
        match self {
            Self::Native => out.extend_from_slice(bytemuck::cast_slice::<f32, u8>(values)),
            Self::Little => values.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
            Self::Big => values.iter().for_each(|v| out.extend_from_slice(&v.to_be_bytes())),
        }
    }

    fn put_i32(self, out: &mut Vec<u8>, v: i32) {
        out.extend_from_slice(&match self {
            Self::Native => v.to_ne_bytes(),
            Self::Little => v.to_le_bytes(),
            Self::Big => v.to_be_bytes(),
        });
    }

    fn put_u64(self, out: &mut Vec<u8>, v: u64) {
        out.extend_from_slice(&match self {
            Self::Native => v.to_ne_bytes(),
            Self::Little => v.to_le_bytes(),
            Self::Big => v.to_be_bytes(),
        });
    }

    fn f32_from(self, b: [u8; 4]) -> f32 {
        match self {
            Self::Native => f32::from_ne_bytes(b),
            Self::Little => f32::from_le_bytes(b),
            Self::Big => f32::from_be_bytes(b),
        }
    }

    fn i32_from(self, b: [u8; 4]) -> i32 {
        match self {
            Self::Native => i32::from_ne_bytes(b),
            Self::Little => i32::from_le_bytes(b),
            Self::Big => i32::from_be_bytes(b),
        }
    }

    fn u64_from(self, b: [u8; 8]) -> u64 {
        match self {
            Self::Native => u64::from_ne_bytes(b),
            Self::Little => u64::from_le_bytes(b),
            Self::Big => u64::from_be_bytes(b),
        }
    }
}

/// Datagram framing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// No header; reply correlation relies on a fresh socket per round
    #[default]
    Raw,
    /// 8-byte round id in both request and reply
    Correlated,
}

impl Framing {
    /// Header length in bytes
    pub const fn header_len(self) -> usize {
        match self {
            Self::Raw => 0,
            Self::Correlated => ROUND_ID_BYTES,
        }
    }
}

/// Decoded reply datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    /// Echoed round id (correlated framing only)
    pub round_id: Option<u64>,
    /// Remote label
    pub label: i32,
}

/// Decoded request datagram (endpoint side)
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Round id (correlated framing only)
    pub round_id: Option<u64>,
    /// Input values in wire order
    pub values: Vec<f32>,
}

/// Serialize an input vector in the reference layout: 4×N bytes, no header.
pub fn encode(input: &[f32], order: ByteOrder) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() * VALUE_BYTES);
    order.put_f32s(&mut out, input);
    out
}

/// Interpret the first 4 bytes of a reply as an i32; trailing bytes are ignored.
///
/// # Errors
///
/// Returns [`FormatError::TooShort`] if fewer than 4 bytes were received.
pub fn decode(datagram: &[u8], order: ByteOrder) -> Result<i32, FormatError> {
    let head = take::<4>(datagram, 0)?;
    Ok(order.i32_from(head))
}

/// Codec parameters derived from a `ModelContract`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireFormat {
    /// Numeric byte order
    pub byte_order: ByteOrder,
    /// Datagram framing
    pub framing: Framing,
}

impl WireFormat {
    /// Create a wire format
    pub const fn new(byte_order: ByteOrder, framing: Framing) -> Self {
        Self {
            byte_order,
            framing,
        }
    }

    /// Request length for an input of `width` values
    pub const fn request_len(&self, width: usize) -> usize {
        self.framing.header_len() + width * VALUE_BYTES
    }

    /// Request datagram length, `None` on overflow
    pub const fn checked_request_len(&self, width: usize) -> Option<usize> {
        match width.checked_mul(VALUE_BYTES) {
            Some(payload) => payload.checked_add(self.framing.header_len()),
            None => None,
        }
    }

    /// Minimum decodable reply length
    pub const fn min_reply_len(&self) -> usize {
        self.framing.header_len() + VALUE_BYTES
    }

    /// Encode a request; `round_id` is ignored under raw framing.
    pub fn encode_request(&self, round_id: u64, input: &[f32]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.request_len(input.len()));
        self.encode_request_into(&mut out, round_id, input);
        out
    }

    /// Encode a request into a reusable buffer
    pub fn encode_request_into(&self, out: &mut Vec<u8>, round_id: u64, input: &[f32]) {
        out.clear();
        out.reserve(self.request_len(input.len()));
        if self.framing == Framing::Correlated {
            self.byte_order.put_u64(out, round_id);
        }
        self.byte_order.put_f32s(out, input);
    }

    /// Decode a request carrying exactly `width` values
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::WidthMismatch`] unless the datagram length is
    /// exactly [`request_len(width)`](Self::request_len).
    pub fn decode_request(&self, bytes: &[u8], width: usize) -> Result<Request, FormatError> {
        let expected = self.request_len(width);
        if bytes.len() != expected {
            return Err(FormatError::WidthMismatch {
                got: bytes.len(),
                expected,
            });
        }
        let round_id = self.read_round_id(bytes);
        let values = bytes[self.framing.header_len()..]
            .chunks_exact(VALUE_BYTES)
            .map(|c| self.byte_order.f32_from([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Request { round_id, values })
    }

    /// Encode a reply; `round_id` is ignored under raw framing.
    pub fn encode_response(&self, round_id: u64, label: i32) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.min_reply_len());
        if self.framing == Framing::Correlated {
            self.byte_order.put_u64(&mut out, round_id);
        }
        self.byte_order.put_i32(&mut out, label);
        out
    }

    /// Decode a reply, ignoring any trailing bytes
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::TooShort`] below [`min_reply_len`](Self::min_reply_len).
    pub fn decode_response(&self, bytes: &[u8]) -> Result<Reply, FormatError> {
        if bytes.len() < self.min_reply_len() {
            return Err(FormatError::TooShort {
                len: bytes.len(),
                min: self.min_reply_len(),
            });
        }
        let round_id = self.read_round_id(bytes);
        let label = decode(&bytes[self.framing.header_len()..], self.byte_order)?;
        Ok(Reply { round_id, label })
    }

    /// Round id carried by a datagram, if the framing has one and it fits
    pub fn read_round_id(&self, bytes: &[u8]) -> Option<u64> {
        match self.framing {
            Framing::Raw => None,
            Framing::Correlated => take::<8>(bytes, 0)
                .ok()
                .map(|b| self.byte_order.u64_from(b)),
        }
    }
}

fn take<const N: usize>(bytes: &[u8], at: usize) -> Result<[u8; N], FormatError> {
    bytes
        .get(at..at + N)
        .and_then(|s| s.try_into().ok())
        .ok_or(FormatError::TooShort {
            len: bytes.len(),
            min: at + N,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW_LE: WireFormat = WireFormat::new(ByteOrder::Little, Framing::Raw);
    const CORR_BE: WireFormat = WireFormat::new(ByteOrder::Big, Framing::Correlated);

    #[test]
    fn encode_length_is_four_per_value() {
        for n in [0usize, 1, 10, 784] {
            let input = vec![0.25f32; n];
            assert_eq!(encode(&input, ByteOrder::Native).len(), 4 * n);
            assert_eq!(RAW_LE.encode_request(0, &input).len(), 4 * n);
        }
    }

    #[test]
    fn little_endian_layout() {
        let bytes = encode(&[1.0, -2.0], ByteOrder::Little);
        assert_eq!(bytes, [0x00, 0x00, 0x80, 0x3f, 0x00, 0x00, 0x00, 0xc0]);
    }

    #[test]
    fn big_endian_layout() {
        let bytes = encode(&[1.0], ByteOrder::Big);
        assert_eq!(bytes, [0x3f, 0x80, 0x00, 0x00]);
    }

    #[test]
    fn native_matches_memory_layout() {
        let input = [0.1f32, 3.5, -7.25];
        let expected: Vec<u8> = input.iter().flat_map(|v| v.to_ne_bytes()).collect();
        assert_eq!(encode(&input, ByteOrder::Native), expected);
    }

    #[test]
    fn decode_reads_first_word_only() {
        assert_eq!(decode(b"\x01\x00\x00\x00", ByteOrder::Little), Ok(1));
        assert_eq!(decode(b"\x00\x00\x00\x00", ByteOrder::Little), Ok(0));
        assert_eq!(decode(b"\x01\x00\x00\x00\xff\xff", ByteOrder::Little), Ok(1));
        assert_eq!(decode(b"\x00\x00\x00\x01", ByteOrder::Big), Ok(1));
    }

    #[test]
    fn decode_short_reply_fails() {
        assert_eq!(
            decode(b"\x01\x00", ByteOrder::Little),
            Err(FormatError::TooShort { len: 2, min: 4 })
        );
        assert!(decode(&[], ByteOrder::Native).is_err());
    }

    #[test]
    fn response_label_survives_any_byte_order() {
        for order in [ByteOrder::Little, ByteOrder::Big, ByteOrder::Native] {
            let wire = WireFormat::new(order, Framing::Raw);
            for label in [i32::MIN, -1, 0, 1, i32::MAX] {
                let reply = wire.decode_response(&wire.encode_response(0, label)).unwrap();
                assert_eq!(reply.label, label);
                assert_eq!(reply.round_id, None);
            }
        }
    }

    #[test]
    fn correlated_reply_carries_round_id() {
        let bytes = CORR_BE.encode_response(0xdead_beef_0000_0001, -3);
        assert_eq!(bytes.len(), 12);
        assert_eq!(CORR_BE.read_round_id(&bytes), Some(0xdead_beef_0000_0001));
        let reply = CORR_BE.decode_response(&bytes).unwrap();
        assert_eq!(reply.label, -3);
    }

    #[test]
    fn correlated_reply_needs_twelve_bytes() {
        let err = CORR_BE.decode_response(&[0u8; 11]).unwrap_err();
        assert_eq!(err, FormatError::TooShort { len: 11, min: 12 });
        assert_eq!(CORR_BE.read_round_id(&[0u8; 7]), None);
        assert_eq!(RAW_LE.read_round_id(&[0u8; 12]), None);
    }

    #[test]
    fn request_decoding_requires_exact_width() {
        let bytes = CORR_BE.encode_request(9, &[1.5, 2.5]);
        let req = CORR_BE.decode_request(&bytes, 2).unwrap();
        assert_eq!(req.round_id, Some(9));
        assert_eq!(req.values, vec![1.5, 2.5]);

        let err = CORR_BE.decode_request(&bytes, 3).unwrap_err();
        assert_eq!(err, FormatError::WidthMismatch { got: 16, expected: 20 });
    }

    #[test]
    fn encode_into_reuses_buffer() {
        let mut buf = vec![0xaa; 64];
        RAW_LE.encode_request_into(&mut buf, 0, &[1.0]);
        assert_eq!(buf, [0x00, 0x00, 0x80, 0x3f]);
    }
}
