/// Errors that can occur while framing or decoding a JSON stream.
#[derive(Debug, thiserror::Error)]
pub enum JsonError {
    /// An I/O error occurred while reading the stream.
    #[error("json stream I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A complete unit did not decode into the target type.
    #[error("failed to decode json unit: {0}")]
    Decode(#[from] serde_json::Error),

    /// A unit grew past the configured size limit before balancing.
    #[error("json unit too large ({size} bytes, max {max})")]
    UnitTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, JsonError>;
