//! Transport-level message type.
//!
//! At this layer a message is the opaque content of one frame. Field-level
//! encoding of the financial message lives outside the transport core; here we
//! only carry the bytes and enforce the outbound size limit.

use crate::protocol::framing::{FrameError, FrameResult, MAX_PAYLOAD_SIZE};
use bytes::Bytes;
use std::fmt;

/// One message as carried by a single frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    payload: Bytes,
}

impl Message {
    /// Creates a message from an owned payload.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Builds a message from a received frame payload.
    ///
    /// The bytes are copied, so the source buffer can be released as soon as
    /// this returns.
    pub fn parse(buf: &[u8]) -> Self {
        Self {
            payload: Bytes::copy_from_slice(buf),
        }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Appends the encoded message to `dst` and returns the number of bytes written.
    ///
    /// Fails without touching `dst` if the encoded form would exceed
    /// [`MAX_PAYLOAD_SIZE`].
    pub fn encode_into(&self, dst: &mut Vec<u8>) -> FrameResult<usize> {
        if self.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(FrameError::PayloadTooLarge {
                size: self.payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        dst.extend_from_slice(&self.payload);
        Ok(self.payload.len())
    }
}

impl From<Vec<u8>> for Message {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}

impl From<&'static [u8]> for Message {
    fn from(value: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(value))
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Message({} bytes)", self.payload.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_copies_payload() {
        let mut source = vec![0x02, 0x00, 0x30];
        let message = Message::parse(&source);
        source.clear();

        assert_eq!(message.payload().as_ref(), &[0x02, 0x00, 0x30]);
        assert_eq!(message.len(), 3);
    }

    #[test]
    fn test_encode_into_appends() {
        let message = Message::from(&b"0800"[..]);
        let mut dst = b"xx".to_vec();

        let written = message.encode_into(&mut dst).unwrap();
        assert_eq!(written, 4);
        assert_eq!(dst, b"xx0800");
    }

    #[test]
    fn test_encode_into_rejects_oversize() {
        let message = Message::from(vec![0u8; MAX_PAYLOAD_SIZE + 1]);
        let mut dst = Vec::new();

        let err = message.encode_into(&mut dst).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 65536, .. }));
        assert!(dst.is_empty());
    }

    #[test]
    fn test_empty_message() {
        let message = Message::default();
        assert!(message.is_empty());
        assert_eq!(message.to_string(), "Message(0 bytes)");
    }
}
