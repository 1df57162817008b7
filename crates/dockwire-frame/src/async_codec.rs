//! `tokio_util` codec for the multiplexed stdio format.
//!
//! Shares [`decode_frame`] with the blocking [`StdioReader`](crate::StdioReader),
//! so both paths agree on truncation and unknown-selector handling.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::codec::{decode_frame, encode_frame, Decoded, Frame, DEFAULT_MAX_PAYLOAD};
use crate::error::{FrameError, Result};

/// Decodes stdio frames from an `AsyncRead` via `FramedRead`.
#[derive(Debug, Clone)]
pub struct StdioCodec {
    max_payload_size: usize,
}

impl StdioCodec {
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    pub fn with_max_payload(max_payload_size: usize) -> Self {
        Self { max_payload_size }
    }
}

impl Default for StdioCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for StdioCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        loop {
            match decode_frame(src, self.max_payload_size)? {
                Some(Decoded::Frame(frame)) => return Ok(Some(frame)),
                Some(Decoded::Unrouted { selector, len }) => {
                    debug!(selector, len, "skipping frame with unknown stream selector");
                }
                None => return Ok(None),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if !src.is_empty() {
            debug!(
                pending = src.len(),
                "discarding truncated frame at end of stream"
            );
            src.clear();
        }
        Ok(None)
    }
}

impl Encoder<Frame> for StdioCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        if frame.payload.len() > self.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: frame.payload.len(),
                max: self.max_payload_size,
            });
        }
        encode_frame(frame.kind, &frame.payload, dst)
    }
}
