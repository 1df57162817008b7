use std::io::{ErrorKind, Read};
use std::marker::PhantomData;

use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;
use tracing::trace;

use crate::error::{JsonError, Result};
use crate::splitter::JsonSplitter;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Decodes one complete unit of JSON text into a target value.
pub type DecodeFn<T> = fn(&[u8]) -> Result<T>;

/// Decode a unit with `serde_json`.
pub fn decode_json<T: DeserializeOwned>(text: &[u8]) -> Result<T> {
    serde_json::from_slice(text).map_err(JsonError::Decode)
}

/// Configuration for JSON stream framing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonConfig {
    /// Reject a unit once it grows past this many bytes. `None` disables the limit.
    pub max_unit_size: Option<usize>,
}

/// Reads a stream of concatenated JSON values and yields them one at a time.
///
/// Reading is lazy: the underlying source is only read when the buffered
/// bytes do not contain a complete unit. An unterminated unit at end of
/// input ends the sequence without an error.
pub struct JsonStreamReader<R, T> {
    inner: R,
    pending: BytesMut,
    splitter: JsonSplitter,
    decode: DecodeFn<T>,
    finished: bool,
    _target: PhantomData<fn() -> T>,
}

impl<R: Read, T: DeserializeOwned> JsonStreamReader<R, T> {
    /// Decode units into `T` with `serde_json`.
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, JsonConfig::default())
    }

    pub fn with_config(inner: R, config: JsonConfig) -> Self {
        Self::with_decoder(inner, config, decode_json::<T>)
    }
}

impl<R: Read, T> JsonStreamReader<R, T> {
    /// Decode units with an explicit decode function.
    pub fn with_decoder(inner: R, config: JsonConfig, decode: DecodeFn<T>) -> Self {
        Self {
            inner,
            pending: BytesMut::with_capacity(READ_CHUNK_SIZE),
            splitter: JsonSplitter::with_max_unit_size(config.max_unit_size),
            decode,
            finished: false,
            _target: PhantomData,
        }
    }

    /// Read the raw text of the next complete unit, whitespace elided.
    pub fn next_text(&mut self) -> Result<Option<Bytes>> {
        loop {
            if let Some(unit) = self.splitter.split(&mut self.pending)? {
                return Ok(Some(unit));
            }

            if self.finished {
                return Ok(None);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.finished = true;
                    return Err(JsonError::Io(err));
                }
            };

            if read == 0 {
                self.splitter.finish();
                self.finished = true;
                return Ok(None);
            }

            trace!(read, "read json stream chunk");
            self.pending.extend_from_slice(&chunk[..read]);
        }
    }

    /// Read and decode the next unit.
    pub fn next_value(&mut self) -> Result<Option<T>> {
        match self.next_text()? {
            Some(text) => (self.decode)(&text).map(Some),
            None => Ok(None),
        }
    }

    /// Whether the source has reported end-of-input.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read, T> Iterator for JsonStreamReader<R, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_value().transpose()
    }
}
