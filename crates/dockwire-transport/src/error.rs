use crate::address::EngineAddress;

/// Errors that can occur while dialing or using an engine stream.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to the engine address.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: EngineAddress,
        source: std::io::Error,
    },

    /// The connect attempt did not complete within the configured timeout.
    #[error("timed out connecting to {address} after {timeout:?}")]
    ConnectTimeout {
        address: EngineAddress,
        timeout: std::time::Duration,
    },

    /// A TCP host could not be resolved to any socket address.
    #[error("failed to resolve {host}: {source}")]
    Resolve {
        host: String,
        source: std::io::Error,
    },

    /// The engine address string could not be parsed.
    #[error("invalid engine address '{0}'")]
    InvalidAddress(String),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: std::path::PathBuf,
        len: usize,
        max: usize,
    },

    /// The address scheme is not available on this platform.
    #[error("unsupported transport: {0}")]
    Unsupported(String),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
