//! Engine socket addressing and duplex streams.
//!
//! The lowest layer of dockwire. Resolves where the container engine
//! listens (Unix domain socket or TCP), dials it, and hands back an
//! [`EngineStream`] that every higher layer reads frames from.
//!
//! Connection settings live in an explicit [`EngineConfig`]; the process
//! environment is consulted only by [`EngineConfig::from_env`].

pub mod address;
pub mod config;
pub mod error;
pub mod stream;

pub use address::{EngineAddress, DEFAULT_TCP_PORT, DEFAULT_UNIX_SOCKET};
pub use config::{EngineConfig, DEFAULT_CONNECT_TIMEOUT, ENV_API_VERSION, ENV_HOST};
pub use error::{Result, TransportError};
pub use stream::EngineStream;
