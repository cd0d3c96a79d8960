//! Postilion Wire Protocol
//!
//! The wire protocol on both links is a stream of length-prefixed frames:
//! a 2-byte big-endian payload length followed by the payload.
//!
//! ## Modules
//!
//! - `framing`: Header encode/decode and zero-copy frame extraction
//! - `message`: The opaque `Message` carried by one frame
//!
//! ## Example
//!
//! ```
//! use postilion_proxy::protocol::{encode_frame, try_extract_frame};
//! use bytes::BytesMut;
//!
//! let mut wire = BytesMut::new();
//! encode_frame(&[0xFF], &mut wire).unwrap();
//! assert_eq!(&wire[..], &[0x00, 0x01, 0xFF]);
//!
//! let (frame, rest) = try_extract_frame(&wire).unwrap();
//! assert_eq!(frame.payload(), &[0xFF]);
//! assert!(rest.is_empty());
//! ```

pub mod framing;
pub mod message;

// Re-export commonly used types for convenience
pub use framing::{
    emit_header, encode_frame, parse_header, try_extract_frame, Frame, FrameError, FrameResult,
    HEADER_LEN, MAX_PAYLOAD_SIZE,
};
pub use message::Message;
