//! `tokio_util` codec for concatenated JSON streams.

use std::fmt;
use std::marker::PhantomData;

use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;
use tokio_util::codec::Decoder;

use crate::error::{JsonError, Result};
use crate::reader::{decode_json, DecodeFn, JsonConfig};
use crate::splitter::JsonSplitter;

/// Splits and decodes JSON units from an `AsyncRead` via `FramedRead`.
///
/// The splitter keeps partial units internally, so every byte handed to
/// `decode` is consumed immediately.
pub struct JsonStreamCodec<T> {
    splitter: JsonSplitter,
    decode: DecodeFn<T>,
    _target: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> JsonStreamCodec<T> {
    pub fn new() -> Self {
        Self::with_config(JsonConfig::default())
    }

    pub fn with_config(config: JsonConfig) -> Self {
        Self::with_decoder(config, decode_json::<T>)
    }
}

impl<T: DeserializeOwned> Default for JsonStreamCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> JsonStreamCodec<T> {
    pub fn with_decoder(config: JsonConfig, decode: DecodeFn<T>) -> Self {
        Self {
            splitter: JsonSplitter::with_max_unit_size(config.max_unit_size),
            decode,
            _target: PhantomData,
        }
    }
}

impl<T> fmt::Debug for JsonStreamCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonStreamCodec")
            .field("splitter", &self.splitter)
            .finish_non_exhaustive()
    }
}

impl<T> Decoder for JsonStreamCodec<T> {
    type Item = T;
    type Error = JsonError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<T>> {
        match self.splitter.split(src)? {
            Some(text) => (self.decode)(&text).map(Some),
            None => Ok(None),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<T>> {
        if let Some(value) = self.decode(src)? {
            return Ok(Some(value));
        }
        self.splitter.finish();
        Ok(None)
    }
}

/// Yields raw unit text without decoding.
#[derive(Debug, Default)]
pub struct JsonTextCodec {
    splitter: JsonSplitter,
}

impl JsonTextCodec {
    pub fn new(config: JsonConfig) -> Self {
        Self {
            splitter: JsonSplitter::with_max_unit_size(config.max_unit_size),
        }
    }
}

impl Decoder for JsonTextCodec {
    type Item = Bytes;
    type Error = JsonError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        self.splitter.split(src)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        if let Some(text) = self.splitter.split(src)? {
            return Ok(Some(text));
        }
        self.splitter.finish();
        Ok(None)
    }
}
