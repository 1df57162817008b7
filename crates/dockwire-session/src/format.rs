//! Content-type routing for streaming response bodies.

use std::fmt;
use std::io::Read;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::session::{JsonSession, StdioSession};

/// Engine content type for multiplexed stdio bodies.
pub const RAW_STREAM: &str = "application/vnd.docker.raw-stream";
/// Newer engine content type for multiplexed stdio bodies.
pub const MULTIPLEXED_STREAM: &str = "application/vnd.docker.multiplexed-stream";
pub const JSON: &str = "application/json";
pub const X_JSON_STREAM: &str = "application/x-json-stream";

/// How a response body must be framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFormat {
    /// 8-byte-header stdio frames.
    Stdio,
    /// Concatenated JSON values.
    Json,
    /// Anything else; decoded by the caller.
    Plain,
}

impl StreamFormat {
    /// Classify a `Content-Type` header value. Parameters and case are ignored.
    pub fn from_content_type(content_type: &str) -> Self {
        let media_type = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match media_type.as_str() {
            RAW_STREAM | MULTIPLEXED_STREAM => Self::Stdio,
            JSON | X_JSON_STREAM => Self::Json,
            _ => Self::Plain,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Json => "json",
            Self::Plain => "plain",
        }
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A response body routed by its format.
pub enum ResponseStream<R: Read, T> {
    Stdio(StdioSession<R>),
    Json(JsonSession<R, T>),
    /// Not a streaming format; the body is handed back untouched.
    Plain(R),
}

impl<R: Read, T: DeserializeOwned> ResponseStream<R, T> {
    /// Wrap `body` in the session matching `format`.
    pub fn open(format: StreamFormat, body: R) -> Self {
        debug!(%format, "opening response stream");
        match format {
            StreamFormat::Stdio => Self::Stdio(StdioSession::stdio(body)),
            StreamFormat::Json => Self::Json(JsonSession::json(body)),
            StreamFormat::Plain => Self::Plain(body),
        }
    }

    /// Route by `Content-Type` header value.
    pub fn from_content_type(content_type: &str, body: R) -> Self {
        Self::open(StreamFormat::from_content_type(content_type), body)
    }

    pub fn format(&self) -> StreamFormat {
        match self {
            Self::Stdio(_) => StreamFormat::Stdio,
            Self::Json(_) => StreamFormat::Json,
            Self::Plain(_) => StreamFormat::Plain,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    use bytes::BytesMut;
    use dockwire_frame::{encode_frame, StreamKind};

    use super::*;

    #[test]
    fn classifies_content_types() {
        assert_eq!(StreamFormat::from_content_type(RAW_STREAM), StreamFormat::Stdio);
        assert_eq!(
            StreamFormat::from_content_type("application/vnd.docker.multiplexed-stream"),
            StreamFormat::Stdio
        );
        assert_eq!(
            StreamFormat::from_content_type("Application/JSON; charset=utf-8"),
            StreamFormat::Json
        );
        assert_eq!(StreamFormat::from_content_type(X_JSON_STREAM), StreamFormat::Json);
        assert_eq!(StreamFormat::from_content_type("text/plain"), StreamFormat::Plain);
        assert_eq!(StreamFormat::from_content_type(""), StreamFormat::Plain);
    }

    #[test]
    fn raw_stream_body_opens_stdio_session() {
        let mut wire = BytesMut::new();
        encode_frame(StreamKind::Stdout, b"attached", &mut wire).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let stream = ResponseStream::<_, serde_json::Value>::from_content_type(
            RAW_STREAM,
            Cursor::new(wire.to_vec()),
        );
        assert_eq!(stream.format(), StreamFormat::Stdio);

        let ResponseStream::Stdio(mut session) = stream else {
            panic!("expected stdio session");
        };
        session.on_stdout(move |payload| sink.lock().unwrap().extend_from_slice(payload));
        session.wait().unwrap();

        assert_eq!(seen.lock().unwrap().as_slice(), b"attached");
    }

    #[test]
    fn json_body_opens_json_session() {
        let body = Cursor::new(br#"{"Type":"image"}{"Type":"container"}"#.to_vec());
        let stream = ResponseStream::<_, serde_json::Value>::open(StreamFormat::Json, body);

        let ResponseStream::Json(mut session) = stream else {
            panic!("expected json session");
        };
        let count = Arc::new(Mutex::new(0));
        let seen = Arc::clone(&count);
        session.on_frame(move |_value| *seen.lock().unwrap() += 1);
        session.wait().unwrap();

        assert_eq!(*count.lock().unwrap(), 2);
    }

    #[test]
    fn plain_body_is_returned() {
        let stream = ResponseStream::<_, serde_json::Value>::from_content_type(
            "text/plain",
            Cursor::new(b"OK".to_vec()),
        );
        match stream {
            ResponseStream::Plain(body) => assert_eq!(body.into_inner(), b"OK"),
            _ => panic!("expected plain body"),
        }
    }
}
