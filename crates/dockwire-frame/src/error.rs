/// Errors that can occur during stdio frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The writer accepted zero bytes.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,

    /// A stream name did not match stdin, stdout or stderr.
    #[error("unknown stream '{0}' (expected stdin, stdout or stderr)")]
    UnknownStream(String),
}

pub type Result<T> = std::result::Result<T, FrameError>;
