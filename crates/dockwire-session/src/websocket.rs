//! WebSocket upgrade for interactive attach and exec sessions.
//!
//! Only the HTTP/1.1 upgrade is performed here. Once the engine answers
//! `101 Switching Protocols` the socket is handed back untouched; message
//! framing on top of it belongs to the caller.

use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::net::Shutdown;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use dockwire_transport::{EngineAddress, EngineConfig, EngineStream, DEFAULT_CONNECT_TIMEOUT};
use rand::RngCore;
use tracing::{debug, info};

use crate::error::{Result, SessionError};

/// `Sec-WebSocket-Version` sent with every upgrade.
pub const WEBSOCKET_VERSION: &str = "13";

/// Upper bound on status line plus response headers.
pub const DEFAULT_MAX_HEADER_BYTES: usize = 16 * 1024;

const KEY_LEN: usize = 16;

/// Configuration for the WebSocket upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSocketConfig {
    /// Timeout for establishing the socket connection.
    pub connect_timeout: Duration,
    /// Read/write timeout while the upgrade request and response are in
    /// flight. Replaced by `read_timeout` once the upgrade succeeds.
    pub handshake_timeout: Option<Duration>,
    /// Read timeout left on the upgraded stream. `None` blocks forever.
    pub read_timeout: Option<Duration>,
    /// Maximum bytes accepted for the status line and headers.
    pub max_header_bytes: usize,
    /// Value of the `Host` header.
    pub host: String,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            handshake_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            read_timeout: None,
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
            host: "localhost".to_string(),
        }
    }
}

impl From<&EngineConfig> for WebSocketConfig {
    fn from(engine: &EngineConfig) -> Self {
        Self {
            connect_timeout: engine.connect_timeout,
            handshake_timeout: Some(engine.connect_timeout),
            read_timeout: engine.read_timeout,
            ..Self::default()
        }
    }
}

/// The engine's answer to an upgrade request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// Full status line, e.g. `HTTP/1.1 101 UPGRADED`.
    pub status_line: String,
    headers: HashMap<String, String>,
}

impl HandshakeResponse {
    /// Look up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn header_count(&self) -> usize {
        self.headers.len()
    }
}

/// Upgrade `path` on the engine at `address` using default configuration.
pub fn connect<I, K, V>(address: &EngineAddress, path: &str, query: I) -> Result<EngineStream>
where
    I: IntoIterator,
    I::Item: std::borrow::Borrow<(K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    connect_with_config(address, path, query, &WebSocketConfig::default())
}

/// Upgrade `path` on the engine at `address` using explicit configuration.
///
/// On any failure after the socket opens, the socket is shut down before
/// the error is returned.
pub fn connect_with_config<I, K, V>(
    address: &EngineAddress,
    path: &str,
    query: I,
    config: &WebSocketConfig,
) -> Result<EngineStream>
where
    I: IntoIterator,
    I::Item: std::borrow::Borrow<(K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let target = request_target(path, query);
    debug!(%address, path = %target, "dialing engine for websocket upgrade");

    let mut stream = EngineStream::connect(address, config.connect_timeout)?;

    match establish(&mut stream, &target, config) {
        Ok(response) => {
            info!(
                %address,
                path = %target,
                status = %response.status_line,
                "websocket upgrade established"
            );
            Ok(stream)
        }
        Err(err) => {
            if let Err(shutdown_err) = stream.shutdown(Shutdown::Both) {
                debug!(error = %shutdown_err, "failed to shut down socket after handshake error");
            }
            Err(err)
        }
    }
}

fn establish(
    stream: &mut EngineStream,
    target: &str,
    config: &WebSocketConfig,
) -> Result<HandshakeResponse> {
    stream.set_read_timeout(config.handshake_timeout)?;
    stream.set_write_timeout(config.handshake_timeout)?;

    let response = upgrade(stream, target, &generate_key(), config)?;

    stream.set_read_timeout(config.read_timeout)?;
    stream.set_write_timeout(None)?;
    Ok(response)
}

/// Build the request target: `path` plus URL-encoded query parameters.
pub fn request_target<I, K, V>(path: &str, query: I) -> String
where
    I: IntoIterator,
    I::Item: std::borrow::Borrow<(K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let encoded = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(query)
        .finish();

    if encoded.is_empty() {
        return path.to_string();
    }
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{path}{separator}{encoded}")
}

/// A random `Sec-WebSocket-Key`: 16 bytes, base64-encoded.
pub fn generate_key() -> String {
    let mut key = [0u8; KEY_LEN];
    rand::rng().fill_bytes(&mut key);
    BASE64.encode(key)
}

/// Perform the upgrade exchange over an already-open stream.
///
/// Reads the response one byte at a time and stops at the blank line that
/// ends the headers, so bytes the engine sends after it stay unread.
pub fn upgrade<S: Read + Write>(
    stream: &mut S,
    target: &str,
    key: &str,
    config: &WebSocketConfig,
) -> Result<HandshakeResponse> {
    let request = format!(
        "GET {target} HTTP/1.1\r\n\
         Host: {host}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {key}\r\n\
         Sec-WebSocket-Version: {WEBSOCKET_VERSION}\r\n\
         \r\n",
        host = config.host,
    );
    stream.write_all(request.as_bytes())?;
    stream.flush()?;
    debug!(path = %target, "sent websocket upgrade request");

    let mut budget = config.max_header_bytes;
    let status_line = read_line(stream, &mut budget, config.max_header_bytes)?;
    if !is_switching_protocols(&status_line) {
        return Err(SessionError::Handshake(format!(
            "unexpected status line '{status_line}' (expected HTTP/1.1 101)"
        )));
    }

    let mut headers = HashMap::new();
    loop {
        let line = read_line(stream, &mut budget, config.max_header_bytes)?;
        if line.is_empty() {
            break;
        }
        match line.split_once(':') {
            Some((name, value)) => {
                headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
            }
            None => debug!(line = %line, "ignoring malformed response header"),
        }
    }

    let response = HandshakeResponse {
        status_line,
        headers,
    };
    expect_header(&response, "Upgrade", "websocket")?;
    expect_header(&response, "Connection", "upgrade")?;
    Ok(response)
}

fn is_switching_protocols(status_line: &str) -> bool {
    let mut parts = status_line.split_whitespace();
    parts.next() == Some("HTTP/1.1") && parts.next() == Some("101")
}

fn expect_header(response: &HandshakeResponse, name: &str, expected: &str) -> Result<()> {
    match response.header(name) {
        Some(value) if value.eq_ignore_ascii_case(expected) => Ok(()),
        Some(value) => Err(SessionError::Handshake(format!(
            "{name} header is '{value}' (expected '{expected}')"
        ))),
        None => Err(SessionError::Handshake(format!("missing {name} header"))),
    }
}

fn read_line<S: Read>(stream: &mut S, budget: &mut usize, max: usize) -> Result<String> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match stream.read(&mut byte) {
            Ok(0) => {
                return Err(SessionError::Handshake(
                    "connection closed before handshake completed".to_string(),
                ))
            }
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(SessionError::Io(err)),
        }

        if *budget == 0 {
            return Err(SessionError::Handshake(format!(
                "response headers exceed {max} bytes"
            )));
        }
        *budget -= 1;

        if byte[0] == b'\n' {
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            return Ok(String::from_utf8_lossy(&line).into_owned());
        }
        line.push(byte[0]);
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::os::unix::net::UnixListener;
    use std::path::PathBuf;
    use std::thread;

    use super::*;

    const OK_RESPONSE: &str = "HTTP/1.1 101 UPGRADED\r\n\
        Content-Type: application/vnd.docker.raw-stream\r\n\
        Connection: Upgrade\r\n\
        Upgrade: websocket\r\n\
        \r\n";

    struct FakeSocket {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl FakeSocket {
        fn answering(response: &[u8]) -> Self {
            Self {
                input: Cursor::new(response.to_vec()),
                output: Vec::new(),
            }
        }
    }

    impl Read for FakeSocket {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for FakeSocket {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn temp_sock_path(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "dockwire-session-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("engine.sock")
    }

    fn read_request<S: Read>(stream: &mut S) -> String {
        let mut request = Vec::new();
        let mut byte = [0u8; 1];
        while !request.ends_with(b"\r\n\r\n") {
            if stream.read(&mut byte).unwrap() == 0 {
                break;
            }
            request.push(byte[0]);
        }
        String::from_utf8(request).unwrap()
    }

    #[test]
    fn request_target_encodes_query() {
        assert_eq!(
            request_target(
                "/containers/abc/attach/ws",
                [("stream", "1"), ("stdout", "1"), ("detachKeys", "ctrl-p,ctrl-q")]
            ),
            "/containers/abc/attach/ws?stream=1&stdout=1&detachKeys=ctrl-p%2Cctrl-q"
        );
        assert_eq!(
            request_target("/exec/1/start?tty=1", [("logs", "true")]),
            "/exec/1/start?tty=1&logs=true"
        );
        assert_eq!(
            request_target("/containers/abc/attach/ws", Vec::<(String, String)>::new()),
            "/containers/abc/attach/ws"
        );
    }

    #[test]
    fn generated_keys_are_random_16_bytes() {
        let first = generate_key();
        let second = generate_key();

        assert_eq!(BASE64.decode(&first).unwrap().len(), 16);
        assert_eq!(first.len(), 24);
        assert_ne!(first, second);
    }

    #[test]
    fn upgrade_writes_exact_request() {
        let mut socket = FakeSocket::answering(OK_RESPONSE.as_bytes());
        upgrade(
            &mut socket,
            "/containers/abc/attach/ws?stream=1",
            "dGhlIHNhbXBsZSBub25jZQ==",
            &WebSocketConfig::default(),
        )
        .unwrap();

        assert_eq!(
            String::from_utf8(socket.output).unwrap(),
            "GET /containers/abc/attach/ws?stream=1 HTTP/1.1\r\n\
             Host: localhost\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
             Sec-WebSocket-Version: 13\r\n\
             \r\n"
        );
    }

    #[test]
    fn upgrade_parses_headers_case_insensitively() {
        let response = "HTTP/1.1 101 Switching Protocols\r\n\
            UPGRADE:   WebSocket  \r\n\
            connection: upgrade\r\n\
            X-Extra: a:b\r\n\
            \r\n";
        let mut socket = FakeSocket::answering(response.as_bytes());
        let parsed = upgrade(&mut socket, "/", "k", &WebSocketConfig::default()).unwrap();

        assert_eq!(parsed.status_line, "HTTP/1.1 101 Switching Protocols");
        assert_eq!(parsed.header("upgrade"), Some("WebSocket"));
        assert_eq!(parsed.header("X-EXTRA"), Some("a:b"));
        assert_eq!(parsed.header_count(), 3);
    }

    #[test]
    fn upgrade_leaves_post_handshake_bytes_unread() {
        let mut wire = OK_RESPONSE.as_bytes().to_vec();
        wire.extend_from_slice(b"\x81\x05hello");
        let mut socket = FakeSocket::answering(&wire);

        upgrade(&mut socket, "/", "k", &WebSocketConfig::default()).unwrap();

        assert_eq!(socket.input.position() as usize, OK_RESPONSE.len());
    }

    #[test]
    fn non_101_status_is_rejected() {
        let mut socket = FakeSocket::answering(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
        let err = upgrade(&mut socket, "/", "k", &WebSocketConfig::default()).unwrap_err();

        match err {
            SessionError::Handshake(message) => assert!(message.contains("HTTP/1.1 200 OK")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn http_1_0_101_is_rejected() {
        let mut socket = FakeSocket::answering(b"HTTP/1.0 101 Switching\r\n\r\n");
        let err = upgrade(&mut socket, "/", "k", &WebSocketConfig::default()).unwrap_err();
        assert!(matches!(err, SessionError::Handshake(_)));
    }

    #[test]
    fn missing_upgrade_header_is_rejected() {
        let mut socket =
            FakeSocket::answering(b"HTTP/1.1 101 Switching\r\nConnection: Upgrade\r\n\r\n");
        let err = upgrade(&mut socket, "/", "k", &WebSocketConfig::default()).unwrap_err();
        assert!(matches!(err, SessionError::Handshake(ref m) if m == "missing Upgrade header"));
    }

    #[test]
    fn wrong_connection_header_is_rejected() {
        let mut socket = FakeSocket::answering(
            b"HTTP/1.1 101 Switching\r\nUpgrade: websocket\r\nConnection: keep-alive\r\n\r\n",
        );
        let err = upgrade(&mut socket, "/", "k", &WebSocketConfig::default()).unwrap_err();
        assert!(matches!(err, SessionError::Handshake(ref m) if m.contains("keep-alive")));
    }

    #[test]
    fn eof_before_blank_line_is_rejected() {
        let mut socket = FakeSocket::answering(b"HTTP/1.1 101 Switching\r\nUpgrade: websocket\r\n");
        let err = upgrade(&mut socket, "/", "k", &WebSocketConfig::default()).unwrap_err();
        assert!(matches!(err, SessionError::Handshake(ref m) if m.contains("closed")));
    }

    #[test]
    fn oversized_headers_are_rejected() {
        let mut response = b"HTTP/1.1 101 Switching\r\n".to_vec();
        for i in 0..64 {
            response.extend_from_slice(format!("X-Filler-{i}: {}\r\n", "x".repeat(32)).as_bytes());
        }
        response.extend_from_slice(b"\r\n");

        let config = WebSocketConfig {
            max_header_bytes: 256,
            ..WebSocketConfig::default()
        };
        let mut socket = FakeSocket::answering(&response);
        let err = upgrade(&mut socket, "/", "k", &config).unwrap_err();
        assert!(matches!(err, SessionError::Handshake(ref m) if m.contains("256")));
    }

    #[test]
    fn connect_over_unix_socket_returns_open_stream() {
        let path = temp_sock_path("ws-ok");
        let listener = UnixListener::bind(&path).unwrap();

        let engine = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let request = read_request(&mut conn);
            conn.write_all(OK_RESPONSE.as_bytes()).unwrap();
            conn.write_all(b"post-upgrade").unwrap();
            request
        });

        let mut stream = connect(
            &EngineAddress::unix(&path),
            "/containers/abc/attach/ws",
            [("stdin", "1"), ("stream", "1")],
        )
        .unwrap();

        let mut rest = [0u8; 12];
        stream.read_exact(&mut rest).unwrap();
        assert_eq!(&rest, b"post-upgrade");

        let request = engine.join().unwrap();
        assert!(request.starts_with("GET /containers/abc/attach/ws?stdin=1&stream=1 HTTP/1.1\r\n"));
        assert!(request.contains("Sec-WebSocket-Version: 13\r\n"));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn engine_config_sets_timeouts() {
        let engine = EngineConfig {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Some(Duration::from_millis(750)),
            ..EngineConfig::default()
        };
        let config = WebSocketConfig::from(&engine);

        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.handshake_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.read_timeout, Some(Duration::from_millis(750)));
        assert_eq!(config.max_header_bytes, DEFAULT_MAX_HEADER_BYTES);
        assert_eq!(config.host, "localhost");
    }

    #[test]
    fn upgraded_stream_keeps_engine_read_timeout() {
        let path = temp_sock_path("ws-read-timeout");
        let listener = UnixListener::bind(&path).unwrap();
        let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();

        let engine = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            read_request(&mut conn);
            conn.write_all(OK_RESPONSE.as_bytes()).unwrap();
            // Stay silent until the client has timed out.
            let _ = done_rx.recv();
        });

        let engine_config = EngineConfig {
            address: EngineAddress::unix(&path),
            read_timeout: Some(Duration::from_millis(50)),
            ..EngineConfig::default()
        };
        let mut stream = connect_with_config(
            &engine_config.address,
            "/containers/abc/attach/ws",
            [("stream", "1")],
            &WebSocketConfig::from(&engine_config),
        )
        .unwrap();

        let started = std::time::Instant::now();
        let mut byte = [0u8; 1];
        let err = stream.read(&mut byte).unwrap_err();
        assert!(
            matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut),
            "unexpected error: {err:?}"
        );
        assert!(started.elapsed() < Duration::from_secs(5));

        done_tx.send(()).unwrap();
        engine.join().unwrap();
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn refused_upgrade_closes_socket() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let engine = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            read_request(&mut conn);
            conn.write_all(b"HTTP/1.1 200 OK\r\n").unwrap();

            let mut trailing = Vec::new();
            conn.read_to_end(&mut trailing).unwrap();
            trailing
        });

        let err = connect(
            &EngineAddress::tcp("127.0.0.1", port),
            "/exec/e1/start",
            Vec::<(String, String)>::new(),
        )
        .unwrap_err();

        assert!(matches!(err, SessionError::Handshake(ref m) if m.contains("200")));
        assert!(engine.join().unwrap().is_empty(), "engine should observe EOF");
    }

    #[test]
    fn dial_failure_is_transport_error() {
        let path = temp_sock_path("ws-missing");
        let err = connect(&EngineAddress::unix(&path), "/", [("a", "b")]).unwrap_err();
        assert!(matches!(err, SessionError::Transport(_)));
    }
}
