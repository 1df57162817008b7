//! Multiplexed stdio framing for container engine attach and logs streams.
//!
//! When a container runs without a TTY the engine interleaves stdin,
//! stdout and stderr on one connection. Every chunk is prefixed with an
//! 8-byte header:
//! - 1 byte stream selector (0 stdin, 1 stdout, 2 stderr)
//! - 3 reserved bytes
//! - a 4-byte big-endian payload length
//!
//! [`StdioReader`] turns a byte stream back into ordered [`Frame`]s. A frame
//! cut short by end-of-input is dropped silently rather than reported.

pub mod codec;
pub mod error;
pub mod reader;
pub mod stream;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

#[cfg(feature = "async")]
pub use async_codec::StdioCodec;
pub use codec::{
    decode_frame, encode_frame, encode_raw_frame, Decoded, Frame, FrameConfig,
    DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::StdioReader;
pub use stream::{StreamKind, STDERR, STDIN, STDOUT};
pub use writer::FrameWriter;
