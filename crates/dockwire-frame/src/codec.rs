use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::stream::StreamKind;

/// Frame header: selector (1) + reserved (3) + length (4) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Default maximum payload size: the full range of the length field.
///
/// The wire format itself imposes no bound beyond `u32`; callers that need
/// one set [`FrameConfig::max_payload_size`].
pub const DEFAULT_MAX_PAYLOAD: usize = u32::MAX as usize;

/// One demultiplexed chunk of process output (or input).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The process stream this payload belongs to.
    pub kind: StreamKind,
    /// The payload bytes, exactly as declared by the header.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(kind: StreamKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Result of decoding one complete frame off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A frame for stdin, stdout or stderr.
    Frame(Frame),
    /// A frame whose selector byte is not a known stream. The payload was
    /// consumed to keep the stream aligned and then dropped.
    Unrouted { selector: u8, len: usize },
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────────────┬────────────┬──────────────────┐
/// │ Stream   │ Reserved     │ Length     │ Payload          │
/// │ (1B)     │ (3B, zero)   │ (4B BE)    │ (Length bytes)   │
/// │ 0/1/2    │              │            │                  │
/// └──────────┴──────────────┴────────────┴──────────────────┘
/// ```
pub fn encode_frame(kind: StreamKind, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    encode_raw_frame(kind.selector(), payload, dst)
}

/// Encode a frame with an arbitrary selector byte.
///
/// Engines only emit 0, 1 and 2; other selectors exist for fixtures that
/// exercise unrouted frames.
pub fn encode_raw_frame(selector: u8, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > u32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u8(selector);
    dst.put_slice(&[0, 0, 0]);
    dst.put_u32(payload.len() as u32);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Decoded>> {
    if src.len() < HEADER_SIZE {
        return Ok(None); // Need more data
    }

    let selector = src[0];
    let payload_len = u32::from_be_bytes([src[4], src[5], src[6], src[7]]) as usize;

    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    if src.len() - HEADER_SIZE < payload_len {
        return Ok(None); // Need more data
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();

    match StreamKind::from_selector(selector) {
        Some(kind) => Ok(Some(Decoded::Frame(Frame { kind, payload }))),
        None => Ok(Some(Decoded::Unrouted {
            selector,
            len: payload_len,
        })),
    }
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: unbounded (`u32::MAX`).
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
