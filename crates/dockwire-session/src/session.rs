use std::fmt;
use std::io::Read;

use dockwire_frame::{Frame, FrameConfig, StdioReader, StreamKind};
use dockwire_json::{decode_json, DecodeFn, JsonConfig, JsonStreamReader};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::cancel::{CancelHandle, Cancellable, SocketHalves};
use crate::error::{Result, SessionError};
use crate::subscribers::Subscribers;

/// A framing layer that turns a body into discrete units.
pub trait Framing {
    /// The unit delivered to subscribers.
    type Unit;
    /// The byte source being framed.
    type Source;

    /// Read the next complete unit, `None` at end of input.
    fn next_unit(&mut self) -> Result<Option<Self::Unit>>;

    /// The stdio stream a unit belongs to, if the framing has one.
    fn route(unit: &Self::Unit) -> Option<StreamKind>;

    fn source(&self) -> &Self::Source;
}

impl<R: Read> Framing for StdioReader<R> {
    type Unit = Frame;
    type Source = R;

    fn next_unit(&mut self) -> Result<Option<Frame>> {
        Ok(self.read_frame()?)
    }

    fn route(unit: &Frame) -> Option<StreamKind> {
        Some(unit.kind)
    }

    fn source(&self) -> &R {
        self.get_ref()
    }
}

impl<R: Read, T> Framing for JsonStreamReader<R, T> {
    type Unit = T;
    type Source = R;

    fn next_unit(&mut self) -> Result<Option<T>> {
        Ok(self.next_value()?)
    }

    fn route(_unit: &T) -> Option<StreamKind> {
        None
    }

    fn source(&self) -> &R {
        self.get_ref()
    }
}

/// Lifecycle of a streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Units may still arrive.
    Open,
    /// The remote end finished the stream.
    Closed,
    /// The caller cancelled the stream.
    Cancelled,
    /// A transport or decode error ended the stream.
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        self != Self::Open
    }
}

/// Stdio session over a raw-stream body.
pub type StdioSession<R> = StreamingSession<StdioReader<Cancellable<R>>>;

/// JSON progress session decoding units into `T`.
pub type JsonSession<R, T> = StreamingSession<JsonStreamReader<Cancellable<R>, T>>;

/// Binds one framing layer to one response body and fans units out to
/// subscribers.
///
/// Register callbacks first, then call [`wait`](Self::wait) to drain. Units
/// are delivered on the draining thread, strictly in wire order, and each
/// unit reaches callbacks in registration order.
pub struct StreamingSession<F: Framing> {
    framing: F,
    subscribers: Subscribers<F::Unit>,
    state: SessionState,
    cancel: CancelHandle,
}

impl<F: Framing> StreamingSession<F> {
    fn from_parts(framing: F, cancel: CancelHandle) -> Self {
        Self {
            framing,
            subscribers: Subscribers::new(),
            state: SessionState::Open,
            cancel,
        }
    }

    /// Subscribe to every unit.
    pub fn on_frame<C>(&mut self, callback: C) -> &mut Self
    where
        C: FnMut(&F::Unit) + Send + 'static,
    {
        self.subscribers.push(None, Box::new(callback));
        self
    }

    /// Drain the body until it ends, delivering units as they complete.
    ///
    /// Returns immediately once the session is no longer open.
    pub fn wait(&mut self) -> Result<()> {
        if self.state.is_terminal() {
            return Ok(());
        }

        let mut delivered = 0usize;
        loop {
            if self.cancel.is_cancelled() {
                return self.finish_cancelled(delivered);
            }

            match self.framing.next_unit() {
                Ok(Some(unit)) => {
                    if self.cancel.is_cancelled() {
                        return self.finish_cancelled(delivered);
                    }
                    self.subscribers.dispatch(&unit, F::route(&unit));
                    delivered += 1;
                }
                Ok(None) => {
                    if self.cancel.is_cancelled() {
                        return self.finish_cancelled(delivered);
                    }
                    debug!(delivered, "stream closed by remote");
                    self.state = SessionState::Closed;
                    return Ok(());
                }
                Err(err) => {
                    if self.cancel.is_cancelled() {
                        warn!(error = %err, "stream error after cancellation");
                        return self.finish_cancelled(delivered);
                    }
                    debug!(error = %err, delivered, "stream failed");
                    self.state = SessionState::Failed;
                    return Err(err);
                }
            }
        }
    }

    /// Alias of [`wait`](Self::wait).
    pub fn listen(&mut self) -> Result<()> {
        self.wait()
    }

    fn finish_cancelled(&mut self, delivered: usize) -> Result<()> {
        debug!(delivered, "stream drain stopped by cancellation");
        self.state = SessionState::Cancelled;
        Ok(())
    }

    /// Cancel the session. Safe to call before, during or after a drain.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A handle that can cancel this session from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Borrow the framing layer.
    pub fn framing(&self) -> &F {
        &self.framing
    }
}

impl<F, S> StreamingSession<F>
where
    F: Framing<Source = Cancellable<S>>,
    S: SocketHalves,
{
    /// Shut down the write half of the body, then drain what remains.
    pub fn close_and_read(&mut self) -> Result<()> {
        if self.state.is_terminal() {
            return Ok(());
        }
        self.framing
            .source()
            .get_ref()
            .shutdown_write()
            .map_err(SessionError::Io)?;
        debug!("write half closed, draining");
        self.wait()
    }
}

impl<R: Read> StdioSession<R> {
    /// Wrap a raw-stream body.
    pub fn stdio(body: R) -> Self {
        Self::stdio_with_config(body, FrameConfig::default())
    }

    pub fn stdio_with_config(body: R, config: FrameConfig) -> Self {
        let cancel = CancelHandle::new();
        let source = Cancellable::new(body, cancel.flag());
        Self::from_parts(StdioReader::with_config(source, config), cancel)
    }

    /// Subscribe to one stdio stream.
    pub fn on_stream<C>(&mut self, kind: StreamKind, mut callback: C) -> &mut Self
    where
        C: FnMut(&[u8]) + Send + 'static,
    {
        self.subscribers.push(
            Some(kind),
            Box::new(move |frame: &Frame| callback(&frame.payload)),
        );
        self
    }

    pub fn on_stdout<C>(&mut self, callback: C) -> &mut Self
    where
        C: FnMut(&[u8]) + Send + 'static,
    {
        self.on_stream(StreamKind::Stdout, callback)
    }

    pub fn on_stderr<C>(&mut self, callback: C) -> &mut Self
    where
        C: FnMut(&[u8]) + Send + 'static,
    {
        self.on_stream(StreamKind::Stderr, callback)
    }

    pub fn on_stdin<C>(&mut self, callback: C) -> &mut Self
    where
        C: FnMut(&[u8]) + Send + 'static,
    {
        self.on_stream(StreamKind::Stdin, callback)
    }
}

impl<S: Read + SocketHalves + Send + Sync + 'static> StdioSession<S> {
    /// Wrap a socket body. Cancelling also shuts down the socket's read side.
    pub fn stdio_socket(socket: S) -> Result<Self> {
        let aborter = socket.try_clone_socket()?;
        let mut session = Self::stdio(socket);
        session.cancel.set_abort(move || abort_read(&aborter));
        Ok(session)
    }
}

impl<R: Read, T: DeserializeOwned> JsonSession<R, T> {
    /// Wrap a JSON progress body, decoding units with `serde_json`.
    pub fn json(body: R) -> Self {
        Self::json_with_decoder(body, JsonConfig::default(), decode_json::<T>)
    }
}

impl<R: Read, T> JsonSession<R, T> {
    /// Wrap a JSON progress body with an explicit decode function.
    pub fn json_with_decoder(body: R, config: JsonConfig, decode: DecodeFn<T>) -> Self {
        let cancel = CancelHandle::new();
        let source = Cancellable::new(body, cancel.flag());
        Self::from_parts(JsonStreamReader::with_decoder(source, config, decode), cancel)
    }
}

impl<S, T> JsonSession<S, T>
where
    S: Read + SocketHalves + Send + Sync + 'static,
    T: DeserializeOwned,
{
    /// Wrap a socket body. Cancelling also shuts down the socket's read side.
    pub fn json_socket(socket: S) -> Result<Self> {
        let aborter = socket.try_clone_socket()?;
        let mut session = Self::json(socket);
        session.cancel.set_abort(move || abort_read(&aborter));
        Ok(session)
    }
}

fn abort_read<S: SocketHalves>(socket: &S) {
    if let Err(err) = socket.shutdown_read() {
        debug!(error = %err, "failed to shut down read half on cancel");
    }
}

impl<F: Framing> fmt::Debug for StreamingSession<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingSession")
            .field("state", &self.state)
            .field("subscribers", &self.subscribers.len())
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}
