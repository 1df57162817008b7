use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;
#[cfg(unix)]
use std::time::Instant;

#[cfg(unix)]
use socket2::{Domain, SockAddr, Socket, Type};
use tracing::debug;

use crate::address::EngineAddress;
use crate::error::{Result, TransportError};

/// Poll interval while a Unix socket backlog is full.
#[cfg(unix)]
const UNIX_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// A connected engine stream implementing `Read` and `Write`.
///
/// This is the duplex byte channel handed to streaming sessions and
/// returned by the WebSocket upgrade. On Unix it may wrap either a Unix
/// domain socket or a TCP socket.
pub struct EngineStream {
    inner: EngineStreamInner,
}

enum EngineStreamInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    Tcp(TcpStream),
}

impl Read for EngineStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            EngineStreamInner::Unix(stream) => stream.read(buf),
            EngineStreamInner::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for EngineStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            EngineStreamInner::Unix(stream) => stream.write(buf),
            EngineStreamInner::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            EngineStreamInner::Unix(stream) => stream.flush(),
            EngineStreamInner::Tcp(stream) => stream.flush(),
        }
    }
}

impl EngineStream {
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Dial the engine (blocking).
    ///
    /// Both transports are bounded by `timeout`. A Unix socket whose accept
    /// backlog is full is retried until the deadline passes.
    pub fn connect(address: &EngineAddress, timeout: Duration) -> Result<Self> {
        match address {
            EngineAddress::Unix(path) => Self::connect_unix(address, path, timeout),
            EngineAddress::Tcp { host, port } => Self::connect_tcp(address, host, *port, timeout),
        }
    }

    #[cfg(unix)]
    fn connect_unix(
        address: &EngineAddress,
        path: &std::path::Path,
        timeout: Duration,
    ) -> Result<Self> {
        let len = path.as_os_str().len();
        if len >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path: path.to_path_buf(),
                len,
                max: Self::MAX_PATH_LEN,
            });
        }

        let connect_err = |source: std::io::Error| TransportError::Connect {
            address: address.clone(),
            source,
        };

        let sock_addr = SockAddr::unix(path).map_err(connect_err)?;
        let socket = Socket::new(Domain::UNIX, Type::STREAM, None).map_err(connect_err)?;
        socket.set_nonblocking(true).map_err(connect_err)?;

        let deadline = Instant::now() + timeout;
        loop {
            match socket.connect(&sock_addr) {
                Ok(()) => break,
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::Interrupted =>
                {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(TransportError::ConnectTimeout {
                            address: address.clone(),
                            timeout,
                        });
                    }
                    std::thread::sleep(UNIX_RETRY_INTERVAL.min(deadline - now));
                }
                Err(err) => return Err(connect_err(err)),
            }
        }

        socket.set_nonblocking(false).map_err(connect_err)?;
        debug!(?path, "connected to engine unix socket");
        Ok(Self::from_unix(socket.into()))
    }

    #[cfg(not(unix))]
    fn connect_unix(
        _address: &EngineAddress,
        _path: &std::path::Path,
        _timeout: Duration,
    ) -> Result<Self> {
        Err(TransportError::Unsupported(
            "unix domain sockets are not available on this platform".to_string(),
        ))
    }

    fn connect_tcp(address: &EngineAddress, host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let addrs = (host, port)
            .to_socket_addrs()
            .or_else(|_| format!("{host}:{port}").to_socket_addrs())
            .map_err(|e| TransportError::Resolve {
                host: host.to_string(),
                source: e,
            })?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    debug!(%addr, "connected to engine tcp socket");
                    return Ok(Self::from_tcp(stream));
                }
                Err(err) if err.kind() == ErrorKind::TimedOut => {
                    last_err = Some(TransportError::ConnectTimeout {
                        address: address.clone(),
                        timeout,
                    });
                }
                Err(err) => {
                    last_err = Some(TransportError::Connect {
                        address: address.clone(),
                        source: err,
                    });
                }
            }
        }

        Err(last_err.unwrap_or_else(|| TransportError::Resolve {
            host: host.to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "host resolved to no addresses",
            ),
        }))
    }

    /// Create an EngineStream from a Unix domain socket stream.
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: EngineStreamInner::Unix(stream),
        }
    }

    /// Create an EngineStream from a TCP stream.
    pub fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: EngineStreamInner::Tcp(stream),
        }
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            EngineStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            EngineStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            EngineStreamInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            EngineStreamInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Shut down the read half, the write half, or both.
    ///
    /// Shutting down the read half unblocks a thread parked in `read`,
    /// which then observes end-of-input.
    pub fn shutdown(&self, how: Shutdown) -> Result<()> {
        let result = match &self.inner {
            #[cfg(unix)]
            EngineStreamInner::Unix(stream) => stream.shutdown(how),
            EngineStreamInner::Tcp(stream) => stream.shutdown(how),
        };
        match result {
            Ok(()) => Ok(()),
            // Already torn down by the peer.
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            #[cfg(unix)]
            EngineStreamInner::Unix(stream) => Ok(Self::from_unix(stream.try_clone()?)),
            EngineStreamInner::Tcp(stream) => Ok(Self::from_tcp(stream.try_clone()?)),
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            #[cfg(unix)]
            EngineStreamInner::Unix(_) => "unix-domain-socket",
            EngineStreamInner::Tcp(_) => "tcp",
        }
    }
}

impl std::fmt::Debug for EngineStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineStream")
            .field("type", &self.transport_name())
            .finish()
    }
}
