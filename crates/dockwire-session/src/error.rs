/// Errors that can occur in streaming sessions and the WebSocket upgrade.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error (dial, socket options).
    #[error("transport error: {0}")]
    Transport(#[from] dockwire_transport::TransportError),

    /// Stdio frame error.
    #[error("frame error: {0}")]
    Frame(#[from] dockwire_frame::FrameError),

    /// JSON stream error.
    #[error("json stream error: {0}")]
    Json(#[from] dockwire_json::JsonError),

    /// The WebSocket upgrade was refused or malformed.
    #[error("websocket handshake failed: {0}")]
    Handshake(String),

    /// I/O error outside of frame decoding (half-close, handshake write).
    #[error("session I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
