//! Multi-JSON framing for container engine progress streams.
//!
//! Build, pull, push and event endpoints answer with a body of JSON values
//! written back to back, with no delimiter beyond optional whitespace.
//! [`JsonSplitter`] recovers unit boundaries incrementally;
//! [`JsonStreamReader`] drives it over a blocking `Read` and decodes each
//! unit into a target type.

pub mod error;
pub mod progress;
pub mod reader;
pub mod splitter;

#[cfg(feature = "async")]
pub mod async_codec;

#[cfg(feature = "async")]
pub use async_codec::{JsonStreamCodec, JsonTextCodec};
pub use error::{JsonError, Result};
pub use progress::{
    BuildInfo, CreateImageInfo, ErrorDetail, EventActor, EventMessage, ProgressDetail,
    ProgressRecord, PushImageInfo,
};
pub use reader::{decode_json, DecodeFn, JsonConfig, JsonStreamReader};
pub use splitter::{split_all, JsonSplitter};
