use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use dockwire_transport::EngineStream;
use tracing::{debug, trace};

use crate::codec::{decode_frame, Decoded, Frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete stdio frames from any `Read` stream.
///
/// Handles partial reads internally; callers only ever see whole frames.
/// End-of-input in the middle of a header or payload is not an error: the
/// partial frame is discarded and the reader reports a clean end.
pub struct StdioReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
    finished: bool,
}

impl<T: Read> StdioReader<T> {
    /// Create a new stdio reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new stdio reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            finished: false,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Ok(None)` once the source is exhausted. Frames with an
    /// unknown selector are consumed and skipped.
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            match decode_frame(&mut self.buf, self.config.max_payload_size)? {
                Some(Decoded::Frame(frame)) => return Ok(Some(frame)),
                Some(Decoded::Unrouted { selector, len }) => {
                    debug!(selector, len, "skipping frame with unknown stream selector");
                    continue;
                }
                None => {}
            }

            if self.finished {
                return Ok(None);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                self.finish();
                return Ok(None);
            }

            trace!(read, buffered = self.buf.len(), "read stdio chunk");
            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Whether the source has reported end-of-input.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn finish(&mut self) {
        if !self.buf.is_empty() {
            debug!(
                pending = self.buf.len(),
                "discarding truncated frame at end of stream"
            );
            self.buf.clear();
        }
        self.finished = true;
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent frame decoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl<T: Read> Iterator for StdioReader<T> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_frame().transpose()
    }
}

impl StdioReader<EngineStream> {
    /// Create a stdio reader for `EngineStream` and apply read timeout from config.
    pub fn with_config_engine(inner: EngineStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: dockwire_transport::TransportError) -> FrameError {
    match err {
        dockwire_transport::TransportError::Io(io) => FrameError::Io(io),
        dockwire_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
