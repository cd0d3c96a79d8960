//! Postilion Frame Codec
//!
//! Every message on an issuing or acquiring link travels inside a frame made of a
//! 2-byte big-endian length header followed by exactly that many payload bytes.
//!
//! ```text
//! +----------------+-----------------------------+
//! | length (u16)   | payload (length bytes)      |
//! | big-endian     | opaque message content      |
//! +----------------+-----------------------------+
//!      2 bytes          0 ..= 65535 bytes
//! ```
//!
//! The length counts payload bytes only. There is no magic number, version
//! byte or checksum.
//!
//! ## How Extraction Works
//!
//! [`try_extract_frame`] looks at a buffered byte slice and returns either:
//! - `Some((frame, remaining))` - a complete frame, plus the slice right after it
//! - `None` - the header or the payload is not fully buffered yet
//!
//! Nothing is copied: the frame payload and the remainder are sub-slices of the
//! input. The caller advances its own buffer by [`Frame::encoded_len`].

use bytes::{BufMut, BytesMut};
use thiserror::Error;

/// Size of the length header in bytes.
pub const HEADER_LEN: usize = 2;

/// Largest payload a single frame can carry.
///
/// This is also the maximum outbound message size: anything larger cannot be
/// described by the header and is rejected at send time.
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

/// Errors produced while encoding frames.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The payload does not fit in a 16-bit length header
    #[error("payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

/// Result type for framing operations.
pub type FrameResult<T> = Result<T, FrameError>;

/// A complete frame borrowed from a receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    payload: &'a [u8],
}

impl<'a> Frame<'a> {
    /// The payload bytes, excluding the header.
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Payload length.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Number of buffered bytes this frame occupied, header included.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }
}

/// Decodes a big-endian length header.
#[inline]
pub fn parse_header(header: [u8; HEADER_LEN]) -> u16 {
    u16::from_be_bytes(header)
}

/// Encodes the header for a payload of `length` bytes.
///
/// Lengths above [`MAX_PAYLOAD_SIZE`] are rejected rather than truncated.
#[inline]
pub fn emit_header(length: usize) -> FrameResult<[u8; HEADER_LEN]> {
    let length = u16::try_from(length).map_err(|_| FrameError::PayloadTooLarge {
        size: length,
        max: MAX_PAYLOAD_SIZE,
    })?;
    Ok(length.to_be_bytes())
}

/// Attempts to extract one complete frame from the front of `buf`.
///
/// Returns `None` when fewer than [`HEADER_LEN`] bytes are buffered, or when the
/// header announces more payload than is currently available.
pub fn try_extract_frame(buf: &[u8]) -> Option<(Frame<'_>, &[u8])> {
    if buf.len() < HEADER_LEN {
        return None;
    }

    let length = parse_header([buf[0], buf[1]]) as usize;
    let end = HEADER_LEN + length;
    if buf.len() < end {
        return None;
    }

    let frame = Frame {
        payload: &buf[HEADER_LEN..end],
    };
    Some((frame, &buf[end..]))
}

/// Appends a complete frame (header and payload) to `dst`.
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> FrameResult<()> {
    let header = emit_header(payload.len())?;
    dst.reserve(HEADER_LEN + payload.len());
    dst.put_slice(&header);
    dst.put_slice(payload);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(payload: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_frame(payload, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_parse_header_big_endian() {
        assert_eq!(parse_header([0x00, 0x01]), 1);
        assert_eq!(parse_header([0x01, 0x00]), 256);
        assert_eq!(parse_header([0xFF, 0xFF]), 65535);
    }

    #[test]
    fn test_emit_header() {
        assert_eq!(emit_header(0).unwrap(), [0x00, 0x00]);
        assert_eq!(emit_header(1).unwrap(), [0x00, 0x01]);
        assert_eq!(emit_header(0x1234).unwrap(), [0x12, 0x34]);
        assert_eq!(emit_header(MAX_PAYLOAD_SIZE).unwrap(), [0xFF, 0xFF]);
    }

    #[test]
    fn test_emit_header_rejects_oversize() {
        let err = emit_header(MAX_PAYLOAD_SIZE + 1).unwrap_err();
        assert_eq!(
            err,
            FrameError::PayloadTooLarge {
                size: 65536,
                max: 65535
            }
        );
    }

    #[test]
    fn test_extract_single_byte_frame() {
        let input = [0x00, 0x01, 0xFF];
        let (frame, rest) = try_extract_frame(&input).unwrap();
        assert_eq!(frame.payload(), &[0xFF]);
        assert_eq!(frame.encoded_len(), 3);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_extract_empty_frame() {
        let input = [0x00, 0x00];
        let (frame, rest) = try_extract_frame(&input).unwrap();
        assert!(frame.is_empty());
        assert_eq!(frame.encoded_len(), HEADER_LEN);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_extract_leaves_trailing_bytes() {
        let mut input = framed(b"0200");
        input.extend_from_slice(&[0x00, 0x05, b'a']);

        let (frame, rest) = try_extract_frame(&input).unwrap();
        assert_eq!(frame.payload(), b"0200");
        assert_eq!(rest, &[0x00, 0x05, b'a']);

        // The trailing partial frame is not ready yet
        assert!(try_extract_frame(rest).is_none());
    }

    #[test]
    fn test_extract_multiple_frames() {
        let mut input = framed(b"first");
        input.extend_from_slice(&framed(b""));
        input.extend_from_slice(&framed(b"third"));

        let mut remaining = &input[..];
        let mut payloads = Vec::new();
        while let Some((frame, rest)) = try_extract_frame(remaining) {
            payloads.push(frame.payload().to_vec());
            remaining = rest;
        }

        assert_eq!(payloads, vec![b"first".to_vec(), vec![], b"third".to_vec()]);
        assert!(remaining.is_empty());
    }

    #[test]
    fn test_incomplete_header() {
        assert!(try_extract_frame(&[]).is_none());
        assert!(try_extract_frame(&[0x00]).is_none());
    }

    #[test]
    fn test_byte_at_a_time_never_yields_early() {
        let payload: Vec<u8> = (0..300u16).map(|i| i as u8).collect();
        let wire = framed(&payload);

        for end in 0..wire.len() {
            assert!(
                try_extract_frame(&wire[..end]).is_none(),
                "frame produced after only {} of {} bytes",
                end,
                wire.len()
            );
        }

        let (frame, rest) = try_extract_frame(&wire).unwrap();
        assert_eq!(frame.payload(), &payload[..]);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_roundtrip_boundary_lengths() {
        for len in [0usize, 1, 255, 256, 4096, MAX_PAYLOAD_SIZE] {
            let payload = vec![0xA5; len];
            let mut wire = framed(&payload);
            wire.extend_from_slice(b"tail");

            let (frame, rest) = try_extract_frame(&wire).unwrap();
            assert_eq!(frame.len(), len);
            assert_eq!(frame.payload(), &payload[..]);
            assert_eq!(frame.encoded_len(), len + HEADER_LEN);
            assert_eq!(rest, b"tail");
        }
    }

    #[test]
    fn test_encode_frame_oversize_leaves_buffer_untouched() {
        let mut buf = BytesMut::new();
        let payload = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        assert!(encode_frame(&payload, &mut buf).is_err());
        assert!(buf.is_empty());
    }
}
