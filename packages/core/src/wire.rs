//! Length-prefixed JSON framing for the front-end ↔ back-end stream protocol.
//!
//! Every message travels as a 4-byte big-endian `u32` length prefix followed
//! by exactly that many bytes of UTF-8 JSON. The codec layer is schema-less:
//! it produces and consumes `serde_json::Value`, and the two services apply
//! their typed request/response schemas on top of it.
//!
//! Implemented as a `tokio_util::codec` `Encoder`/`Decoder` pair so both
//! sides speak through `Framed` streams and partial reads accumulate until a
//! whole frame is available.

use bytes::{Buf, BufMut, BytesMut};
use serde_json::Value;
use tokio_util::codec::{Decoder, Encoder};

/// Number of bytes in the length prefix.
const HEADER_LEN: usize = 4;

/// Default cap on the declared payload length: 16 MiB.
///
/// A hostile or corrupt peer can otherwise declare a multi-gigabyte frame
/// and drive the receiver into unbounded allocation before a single payload
/// byte arrives.
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Failures produced by the framing layer.
///
/// `Truncated` and `MalformedPayload` are distinct, catchable conditions:
/// connection handlers convert them to error responses instead of letting
/// them take the process down.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The stream closed before a complete header or body was read.
    #[error("stream closed before a complete frame was read")]
    Truncated,

    /// The frame body is not valid JSON.
    #[error("frame payload is not valid JSON: {0}")]
    MalformedPayload(#[source] serde_json::Error),

    /// The declared payload length exceeds the configured cap.
    #[error("declared frame length {len} exceeds maximum {max}")]
    FrameTooLarge { len: usize, max: usize },

    /// Transport-level I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Codec speaking the `[u32 length][JSON payload]` wire format.
#[derive(Debug, Clone)]
pub struct WireCodec {
    max_frame_len: usize,
}

impl WireCodec {
    /// Creates a codec with an explicit payload length cap.
    #[must_use]
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }
}

impl Default for WireCodec {
    fn default() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }
}

impl Decoder for WireCodec {
    type Item = Value;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Value>, WireError> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&src[..HEADER_LEN]);
        let len = u32::from_be_bytes(header) as usize;

        if len > self.max_frame_len {
            return Err(WireError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }

        if src.len() < HEADER_LEN + len {
            // Reserve enough for the rest of the frame so the next read can
            // complete it in one pass.
            src.reserve(HEADER_LEN + len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let body = src.split_to(len);
        let value = serde_json::from_slice(&body).map_err(WireError::MalformedPayload)?;
        Ok(Some(value))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Value>, WireError> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            // Bytes left over with the stream closed: a short read of either
            // the header or the body.
            None => Err(WireError::Truncated),
        }
    }
}

impl Encoder<Value> for WireCodec {
    type Error = WireError;

    fn encode(&mut self, item: Value, dst: &mut BytesMut) -> Result<(), WireError> {
        let body = serde_json::to_vec(&item).map_err(WireError::MalformedPayload)?;

        if body.len() > self.max_frame_len {
            return Err(WireError::FrameTooLarge {
                len: body.len(),
                max: self.max_frame_len,
            });
        }

        dst.reserve(HEADER_LEN + body.len());
        // The cap check above keeps the length within u32 range.
        dst.put_u32(u32::try_from(body.len()).map_err(|_| WireError::FrameTooLarge {
            len: body.len(),
            max: u32::MAX as usize,
        })?);
        dst.put_slice(&body);
        Ok(())
    }
}

/// Encodes a single message into a standalone frame.
///
/// Convenience for tests and one-shot writers; the streaming paths go
/// through [`WireCodec`] with `Framed`.
///
/// # Errors
///
/// Returns [`WireError::FrameTooLarge`] if the serialized payload exceeds
/// `max_frame_len`.
pub fn encode_frame(message: &Value, max_frame_len: usize) -> Result<Vec<u8>, WireError> {
    let mut codec = WireCodec::with_max_frame_len(max_frame_len);
    let mut buf = BytesMut::new();
    codec.encode(message.clone(), &mut buf)?;
    Ok(buf.to_vec())
}
