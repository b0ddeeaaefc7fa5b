//! Response generation
//!
//! [`ResponseGenerator`] accumulates what the engine produces (status,
//! reason, header fields, body bytes) and hands it to a [`ResponseSink`] at
//! the points where a byte-stream generator would serialize: when headers
//! are committed, at every flush, and on completion.

use super::{Error, Headers, ResponseHead, Result, Status, Version};
use bytes::{Bytes, BytesMut};
use std::io;

/// Destination of a generated response
pub trait ResponseSink {
    /// Headers are final. `buffered` holds the body bytes accumulated so
    /// far (possibly empty); `last` is set when no more body will follow.
    fn emit_headers(&mut self, head: &ResponseHead, buffered: Bytes, last: bool) -> Result<()>;

    /// Body bytes flushed after the headers were committed
    fn emit_body(&mut self, chunk: Bytes, last: bool) -> Result<()>;

    /// The response is complete
    fn finish(&mut self) -> Result<()>;

    /// Send an interim 1xx response
    fn emit_informational(&mut self, _status: Status) -> Result<()> {
        Err(Error::Unsupported("informational response"))
    }

    /// Write pre-serialized bytes, bypassing the generator
    fn emit_raw(&mut self, _bytes: &[u8]) -> Result<()> {
        Err(Error::Unsupported("raw response bytes"))
    }
}

impl<S: ResponseSink + ?Sized> ResponseSink for Box<S> {
    fn emit_headers(&mut self, head: &ResponseHead, buffered: Bytes, last: bool) -> Result<()> {
        (**self).emit_headers(head, buffered, last)
    }

    fn emit_body(&mut self, chunk: Bytes, last: bool) -> Result<()> {
        (**self).emit_body(chunk, last)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }

    fn emit_informational(&mut self, status: Status) -> Result<()> {
        (**self).emit_informational(status)
    }

    fn emit_raw(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).emit_raw(bytes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Open,
    Committed,
    Completed,
}

/// Accumulating response generator over a sink
pub struct ResponseGenerator<S: ResponseSink> {
    sink: S,
    head: ResponseHead,
    buffer: BytesMut,
    capacity: usize,
    phase: Phase,
    /// Body bytes are dropped, as for a response to HEAD
    omit_body: bool,
}

impl<S: ResponseSink> ResponseGenerator<S> {
    /// Create a generator that flushes on its own once `capacity` bytes
    /// are buffered
    pub fn new(sink: S, capacity: usize) -> Self {
        ResponseGenerator {
            sink,
            head: ResponseHead::new(Status::OK),
            buffer: BytesMut::with_capacity(capacity.min(64 * 1024)),
            capacity: capacity.max(1),
            phase: Phase::Open,
            omit_body: false,
        }
    }

    /// Drop every body byte written; headers are still sent
    pub fn omit_body(mut self, omit: bool) -> Self {
        self.omit_body = omit;
        self
    }

    pub fn set_status(&mut self, status: Status) {
        if self.guard_committed("status") {
            self.head.status = status;
        }
    }

    /// Override the canonical reason phrase
    pub fn set_reason(&mut self, reason: impl Into<String>) {
        if self.guard_committed("reason") {
            self.head.reason = Some(reason.into());
        }
    }

    pub fn set_version(&mut self, version: Version) {
        if self.guard_committed("version") {
            self.head.version = version;
        }
    }

    /// Set a header field, replacing earlier values
    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        if self.guard_committed("header") {
            self.head.headers.set(name, value);
        }
    }

    /// Append a header field
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        if self.guard_committed("header") {
            self.head.headers.insert(name, value);
        }
    }

    /// Head changes after commit are ignored, as on a byte stream
    fn guard_committed(&self, what: &str) -> bool {
        if self.phase != Phase::Open {
            tracing::debug!("response committed, ignoring {} change", what);
            return false;
        }
        true
    }

    pub fn status(&self) -> Status {
        self.head.status
    }

    pub fn headers(&self) -> &Headers {
        &self.head.headers
    }

    pub fn is_committed(&self) -> bool {
        self.phase != Phase::Open
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Completed
    }

    /// Body bytes accumulated and not yet handed to the sink
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Discard buffered body bytes and head changes; only possible before
    /// commit
    pub fn reset(&mut self) -> Result<()> {
        if self.is_committed() {
            return Err(Error::IllegalState("reset after commit".to_string()));
        }
        self.buffer.clear();
        self.head = ResponseHead::new(Status::OK);
        Ok(())
    }

    /// Append body bytes, flushing when the buffer reaches capacity
    pub fn write_body(&mut self, data: &[u8]) -> Result<()> {
        if self.phase == Phase::Completed {
            return Err(Error::IllegalState("write after completion".to_string()));
        }
        if self.omit_body {
            return Ok(());
        }
        self.buffer.extend_from_slice(data);
        if self.buffer.len() >= self.capacity {
            self.flush_body()?;
        }
        Ok(())
    }

    /// Hand buffered bytes to the sink
    ///
    /// Headers are committed by the first flush that carries body bytes; a
    /// flush with nothing buffered before commit is deferred so the reply
    /// is not closed ahead of a body that is still to come.
    pub fn flush_body(&mut self) -> Result<()> {
        match self.phase {
            Phase::Open if self.buffer.is_empty() => Ok(()),
            Phase::Open => self.commit(false),
            Phase::Committed if self.buffer.is_empty() => Ok(()),
            Phase::Committed => {
                let chunk = self.buffer.split().freeze();
                self.sink.emit_body(chunk, false)
            }
            Phase::Completed => Ok(()),
        }
    }

    /// Finish the response
    ///
    /// Commits the headers together with everything buffered as the final
    /// piece, or sends the remaining body as the final piece when headers
    /// were already committed. Completing twice is a no-op.
    pub fn complete(&mut self) -> Result<()> {
        match self.phase {
            Phase::Completed => return Ok(()),
            Phase::Open => self.commit(true)?,
            Phase::Committed => {
                if !self.buffer.is_empty() {
                    let chunk = self.buffer.split().freeze();
                    self.sink.emit_body(chunk, true)?;
                }
            }
        }
        self.phase = Phase::Completed;
        self.sink.finish()
    }

    /// Send an interim 1xx response; not every sink can
    pub fn send_informational(&mut self, status: Status) -> Result<()> {
        if !status.is_informational() {
            return Err(Error::InvalidStatus(format!(
                "{} is not informational",
                status.code()
            )));
        }
        if self.is_committed() {
            return Err(Error::IllegalState("informational after commit".to_string()));
        }
        self.sink.emit_informational(status)
    }

    /// Write pre-serialized bytes straight to the sink; not every sink can
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.sink.emit_raw(bytes)
    }

    fn commit(&mut self, last: bool) -> Result<()> {
        let buffered = self.buffer.split().freeze();
        tracing::debug!(
            status = self.head.status.code(),
            buffered = buffered.len(),
            last,
            "committing response"
        );
        self.phase = Phase::Committed;
        self.sink.emit_headers(&self.head, buffered, last)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

impl<S: ResponseSink> io::Write for ResponseGenerator<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_body(buf).map_err(into_io)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_body().map_err(into_io)
    }
}

fn into_io(err: Error) -> io::Error {
    match err {
        Error::Io(err) => err,
        other => io::Error::new(io::ErrorKind::Other, other.to_string()),
    }
}
