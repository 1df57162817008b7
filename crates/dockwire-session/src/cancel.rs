//! Cross-thread cancellation of a blocking drain.

use std::fmt;
use std::io::{self, Read};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dockwire_transport::{EngineStream, TransportError};
use tracing::debug;

type AbortHook = Arc<dyn Fn() + Send + Sync>;

/// Cancels a session from any thread.
///
/// Setting the flag makes the session's body reader report end-of-input.
/// When the body is a socket, the handle also shuts down the socket's read
/// side so a read blocked in the kernel returns immediately.
#[derive(Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
    abort: Option<AbortHook>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        if self.flag.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(abort_read = self.abort.is_some(), "session cancelled");
        if let Some(abort) = &self.abort {
            abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Install a hook that interrupts a blocked read.
    pub(crate) fn set_abort<F>(&mut self, abort: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.abort = Some(Arc::new(abort));
    }

    pub(crate) fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .field("abort_read", &self.abort.is_some())
            .finish()
    }
}

/// Body reader that reports end-of-input once its session is cancelled.
#[derive(Debug)]
pub struct Cancellable<R> {
    inner: R,
    flag: Arc<AtomicBool>,
}

impl<R> Cancellable<R> {
    pub(crate) fn new(inner: R, flag: Arc<AtomicBool>) -> Self {
        Self { inner, flag }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for Cancellable<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.flag.load(Ordering::SeqCst) {
            return Ok(0);
        }
        match self.inner.read(buf) {
            Err(err) if self.flag.load(Ordering::SeqCst) => {
                debug!(error = %err, "read error after cancellation treated as end of stream");
                Ok(0)
            }
            other => other,
        }
    }
}

/// A duplex socket whose halves can be shut down independently.
pub trait SocketHalves: Sized {
    /// Shut down the read half; a blocked reader wakes with end-of-input.
    fn shutdown_read(&self) -> io::Result<()>;

    /// Shut down the write half; the peer observes end-of-input.
    fn shutdown_write(&self) -> io::Result<()>;

    /// A second handle to the same socket.
    fn try_clone_socket(&self) -> io::Result<Self>;
}

impl SocketHalves for EngineStream {
    fn shutdown_read(&self) -> io::Result<()> {
        self.shutdown(Shutdown::Read).map_err(into_io)
    }

    fn shutdown_write(&self) -> io::Result<()> {
        self.shutdown(Shutdown::Write).map_err(into_io)
    }

    fn try_clone_socket(&self) -> io::Result<Self> {
        self.try_clone().map_err(into_io)
    }
}

#[cfg(unix)]
impl SocketHalves for std::os::unix::net::UnixStream {
    fn shutdown_read(&self) -> io::Result<()> {
        ignore_not_connected(self.shutdown(Shutdown::Read))
    }

    fn shutdown_write(&self) -> io::Result<()> {
        ignore_not_connected(self.shutdown(Shutdown::Write))
    }

    fn try_clone_socket(&self) -> io::Result<Self> {
        self.try_clone()
    }
}

impl SocketHalves for TcpStream {
    fn shutdown_read(&self) -> io::Result<()> {
        ignore_not_connected(self.shutdown(Shutdown::Read))
    }

    fn shutdown_write(&self) -> io::Result<()> {
        ignore_not_connected(self.shutdown(Shutdown::Write))
    }

    fn try_clone_socket(&self) -> io::Result<Self> {
        self.try_clone()
    }
}

fn into_io(err: TransportError) -> io::Error {
    match err {
        TransportError::Io(io) => io,
        other => io::Error::other(other),
    }
}

fn ignore_not_connected(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
        other => other,
    }
}
