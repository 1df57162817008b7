//! Cooperative streaming session over `tokio` readers.

use std::fmt;
use std::future::poll_fn;
use std::pin::Pin;

use dockwire_frame::{Frame, StdioCodec, StreamKind};
use dockwire_json::JsonStreamCodec;
use futures_core::Stream;
use serde::de::DeserializeOwned;
use tokio::io::AsyncRead;
use tokio_util::codec::{Decoder, FramedRead};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Result, SessionError};
use crate::session::SessionState;
use crate::subscribers::Subscribers;

type Route<U> = fn(&U) -> Option<StreamKind>;

fn route_frame(frame: &Frame) -> Option<StreamKind> {
    Some(frame.kind)
}

fn unrouted<U>(_unit: &U) -> Option<StreamKind> {
    None
}

/// Async counterpart of [`StreamingSession`](crate::StreamingSession).
///
/// Drains a `FramedRead` over the same codecs the blocking readers use.
/// The only suspension point is waiting for the next chunk of the body;
/// cancelling the token wins over a pending read.
pub struct AsyncSession<R, C: Decoder> {
    framed: FramedRead<R, C>,
    subscribers: Subscribers<C::Item>,
    route: Route<C::Item>,
    state: SessionState,
    token: CancellationToken,
}

impl<R, C> AsyncSession<R, C>
where
    R: AsyncRead + Unpin,
    C: Decoder,
    SessionError: From<C::Error>,
{
    /// Wrap a body with an arbitrary codec.
    pub fn with_codec(body: R, codec: C, route: Route<C::Item>) -> Self {
        Self {
            framed: FramedRead::new(body, codec),
            subscribers: Subscribers::new(),
            route,
            state: SessionState::Open,
            token: CancellationToken::new(),
        }
    }

    /// Subscribe to every unit.
    pub fn on_frame<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&C::Item) + Send + 'static,
    {
        self.subscribers.push(None, Box::new(callback));
        self
    }

    /// Drain the body until it ends, delivering units as they complete.
    pub async fn wait(&mut self) -> Result<()> {
        if self.state.is_terminal() {
            return Ok(());
        }

        let framed = &mut self.framed;
        let token = &self.token;
        let mut delivered = 0usize;

        loop {
            let next = tokio::select! {
                biased;

                _ = token.cancelled() => {
                    debug!(delivered, "async stream drain stopped by cancellation");
                    self.state = SessionState::Cancelled;
                    return Ok(());
                }

                item = poll_fn(|cx| Pin::new(&mut *framed).poll_next(cx)) => item,
            };

            match next {
                Some(Ok(unit)) => {
                    if token.is_cancelled() {
                        self.state = SessionState::Cancelled;
                        return Ok(());
                    }
                    self.subscribers.dispatch(&unit, (self.route)(&unit));
                    delivered += 1;
                }
                None => {
                    debug!(delivered, "async stream closed by remote");
                    self.state = SessionState::Closed;
                    return Ok(());
                }
                Some(Err(err)) => {
                    let err = SessionError::from(err);
                    if token.is_cancelled() {
                        warn!(error = %err, "async stream error after cancellation");
                        self.state = SessionState::Cancelled;
                        return Ok(());
                    }
                    self.state = SessionState::Failed;
                    return Err(err);
                }
            }
        }
    }

    /// Alias of [`wait`](Self::wait).
    pub async fn listen(&mut self) -> Result<()> {
        self.wait().await
    }
}

impl<R, C: Decoder> AsyncSession<R, C> {
    /// Cancel the session.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Token that cancels this session when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }
}

impl<R: AsyncRead + Unpin> AsyncSession<R, StdioCodec> {
    /// Wrap a raw-stream body.
    pub fn stdio(body: R) -> Self {
        Self::with_codec(body, StdioCodec::new(), route_frame)
    }

    /// Subscribe to one stdio stream.
    pub fn on_stream<F>(&mut self, kind: StreamKind, mut callback: F) -> &mut Self
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        self.subscribers.push(
            Some(kind),
            Box::new(move |frame: &Frame| callback(&frame.payload)),
        );
        self
    }

    pub fn on_stdout<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        self.on_stream(StreamKind::Stdout, callback)
    }

    pub fn on_stderr<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        self.on_stream(StreamKind::Stderr, callback)
    }

    pub fn on_stdin<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        self.on_stream(StreamKind::Stdin, callback)
    }
}

impl<R: AsyncRead + Unpin, T: DeserializeOwned> AsyncSession<R, JsonStreamCodec<T>> {
    /// Wrap a JSON progress body, decoding units with `serde_json`.
    pub fn json(body: R) -> Self {
        Self::with_codec(body, JsonStreamCodec::new(), unrouted::<T>)
    }
}

impl<R, C: Decoder> fmt::Debug for AsyncSession<R, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncSession")
            .field("state", &self.state)
            .field("subscribers", &self.subscribers.len())
            .field("cancelled", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}
