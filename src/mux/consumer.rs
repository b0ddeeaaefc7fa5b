//! Blocking content consumer
//!
//! [`ContentChannel`] is the only state shared between the transport's I/O
//! thread and the engine's worker thread: the lifecycle state, the buffered
//! body fragment, and a condition variable that wakes a worker waiting for
//! the next fragment. The fragment lock is only ever held for a few field
//! updates; it is never held while calling the transport or the engine.

use super::content::ContentBuffer;
use super::state::{AtomicState, State};
use super::{Error, Result, StreamId, Transport};
use crate::http::{self, ContentSource};
use bytes::Bytes;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Per-stream body channel between the driver and the engine
pub struct ContentChannel {
    state: AtomicState,
    buffer: Mutex<ContentBuffer>,
    arrived: Condvar,
    transport: Arc<dyn Transport>,
}

impl ContentChannel {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        ContentChannel {
            state: AtomicState::default(),
            buffer: Mutex::new(ContentBuffer::new()),
            arrived: Condvar::new(),
            transport,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.transport.stream_id()
    }

    pub fn state(&self) -> State {
        self.state.load()
    }

    pub(crate) fn set_state(&self, state: State) {
        self.state.store(state);
    }

    fn lock(&self) -> MutexGuard<'_, ContentBuffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Buffer a delivered fragment and wake a waiting worker
    ///
    /// Fails when the previous fragment has not been consumed yet.
    pub(crate) fn deliver(&self, fragment: Bytes, end_of_body: bool) -> Result<()> {
        let len = fragment.len();
        let filled = self.lock().fill(fragment, end_of_body);
        if let Err(pending) = filled {
            warn!(
                stream = self.stream_id(),
                pending, "body frame delivered before previous fragment was consumed"
            );
            return Err(Error::IllegalState {
                operation: "body frame with unconsumed content",
                state: self.state(),
            });
        }
        debug!(stream = self.stream_id(), "HTTP {} bytes of content", len);
        self.arrived.notify_all();
        Ok(())
    }

    /// Mark the body complete and wake a waiting worker
    pub(crate) fn finish(&self) {
        self.lock().mark_complete();
        self.arrived.notify_all();
    }

    /// Unconsumed part of the buffered fragment, without consuming it
    pub fn peek(&self) -> Bytes {
        self.lock().remaining()
    }

    /// Whether a new body frame can be accepted
    pub fn is_drained(&self) -> bool {
        self.lock().is_drained()
    }

    /// Length of the buffered, unconsumed body bytes
    pub fn available_now(&self) -> Result<usize> {
        let state = self.state();
        if !state.is_reading() {
            return Err(Error::IllegalState {
                operation: "available_now",
                state,
            });
        }
        Ok(self.lock().len())
    }

    /// Wait up to `max_idle` for the next body bytes
    ///
    /// Returns immediately when bytes are buffered, or `None` once the body
    /// is complete and drained. Otherwise pulls more frames from the
    /// transport, then waits. A wait that expires terminates the whole
    /// session and fails with [`Error::ReadTimeout`].
    pub fn block_until_content(&self, max_idle: Duration) -> Result<Option<Bytes>> {
        let mut pulled = false;
        loop {
            // Pulling frames may move the state, so re-read it every pass
            let state = self.state();
            if !state.can_block_for_content() {
                return Err(Error::IllegalState {
                    operation: "block_until_content",
                    state,
                });
            }

            {
                let buffer = self.lock();
                debug!(stream = self.stream_id(), "Consuming {} content bytes", buffer.len());
                if !buffer.is_drained() {
                    return Ok(Some(buffer.remaining()));
                }
                if buffer.is_complete() {
                    return Ok(None);
                }

                if pulled {
                    debug!(
                        stream = self.stream_id(),
                        "Waiting at most {:?} for content bytes", max_idle
                    );
                    let begin = Instant::now();
                    let (guard, wait) = self
                        .arrived
                        .wait_timeout_while(buffer, max_idle, |b| {
                            b.is_drained() && !b.is_complete()
                        })
                        .unwrap_or_else(PoisonError::into_inner);
                    drop(guard);
                    if wait.timed_out() {
                        return Err(self.read_timeout(max_idle));
                    }
                    debug!(
                        stream = self.stream_id(),
                        "Waited {:?} for content bytes",
                        begin.elapsed()
                    );
                    continue;
                }
            }

            self.transport.request_more_frames()?;
            pulled = true;
        }
    }

    /// A stalled stream is taken as a sign of a broken session
    fn read_timeout(&self, max_idle: Duration) -> Error {
        warn!(
            stream = self.stream_id(),
            "no content within {:?}, terminating session", max_idle
        );
        if let Err(err) = self.transport.terminate_session() {
            warn!(stream = self.stream_id(), "session termination failed: {}", err);
        }
        Error::ReadTimeout(max_idle)
    }

    /// Release `len` bytes of the buffered fragment
    pub fn consume(&self, len: usize) -> Result<()> {
        let mut buffer = self.lock();
        if len > buffer.len() {
            return Err(Error::IllegalState {
                operation: "consume beyond buffered content",
                state: self.state(),
            });
        }
        buffer.consume(len);
        Ok(())
    }

    /// Give up on the rest of the body
    ///
    /// The buffered fragment and every later one are dropped on delivery,
    /// so the stream can still reach its final state. Frames held back by
    /// the transport are pulled once, without waiting for them.
    pub fn discard(&self) -> Result<()> {
        let (dropped, exhausted) = {
            let mut buffer = self.lock();
            let dropped = buffer.discard();
            (dropped, buffer.is_exhausted())
        };
        debug!(
            stream = self.stream_id(),
            "Discarding request body, {} buffered bytes dropped", dropped
        );
        if !exhausted {
            self.transport.request_more_frames()?;
        }
        Ok(())
    }
}

impl ContentSource for ContentChannel {
    fn available_now(&self) -> http::Result<usize> {
        Ok(ContentChannel::available_now(self)?)
    }

    fn block_until_content(&self, max_idle: Duration) -> http::Result<Option<Bytes>> {
        Ok(ContentChannel::block_until_content(self, max_idle)?)
    }

    fn consume(&self, len: usize) -> http::Result<()> {
        Ok(ContentChannel::consume(self, len)?)
    }

    fn discard_remaining(&self, _max_idle: Duration) -> http::Result<()> {
        Ok(ContentChannel::discard(self)?)
    }
}
