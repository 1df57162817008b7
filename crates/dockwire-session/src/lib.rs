//! Streaming sessions for container engine responses.
//!
//! A [`StreamingSession`] wraps exactly one response body, frames it with
//! either the multiplexed stdio reader or the JSON splitter, and fans each
//! unit out to subscriber callbacks in registration order. [`websocket`]
//! performs the HTTP upgrade used by interactive attach and exec.
//!
//! With the `async` feature, [`AsyncSession`] drains the same formats from
//! a `tokio` reader.

pub mod cancel;
pub mod error;
pub mod format;
pub mod session;
mod subscribers;
pub mod websocket;

#[cfg(feature = "async")]
pub mod async_session;

#[cfg(feature = "async")]
pub use async_session::AsyncSession;
pub use cancel::{CancelHandle, Cancellable, SocketHalves};
pub use error::{Result, SessionError};
pub use format::{ResponseStream, StreamFormat};
pub use session::{Framing, JsonSession, SessionState, StdioSession, StreamingSession};
pub use websocket::{HandshakeResponse, WebSocketConfig};
