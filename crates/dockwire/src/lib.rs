//! Streaming protocol layer for container engine APIs.
//!
//! dockwire turns one long-lived HTTP byte stream from a Docker-compatible
//! engine into ordered, typed events: demultiplexed stdout/stderr frames,
//! JSON progress records, or an upgraded WebSocket socket.
//!
//! # Crate Structure
//!
//! - [`transport`]: Engine addresses and Unix/TCP streams
//! - [`frame`]: 8-byte-header stdio multiplexing
//! - [`json`]: Multi-JSON framing and progress records
//! - [`session`]: Streaming sessions, cancellation and the WebSocket upgrade

/// Re-export transport types.
pub mod transport {
    pub use dockwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use dockwire_frame::*;
}

/// Re-export JSON stream types.
pub mod json {
    pub use dockwire_json::*;
}

/// Re-export session types.
pub mod session {
    pub use dockwire_session::*;
}
