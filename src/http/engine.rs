//! Seams between the adapter and the sequential request engine
//!
//! The engine is driven through [`RequestHandler`] callbacks, in the order a
//! byte-stream HTTP/1.1 parser would produce them. While handling a request
//! on its worker thread it reads the body through [`ContentSource`], which
//! behaves like a blocking socket.

use super::{Error, Result};
use bytes::Bytes;
use std::io::{self, Read};
use std::sync::Arc;
use std::time::Duration;

/// Lifecycle callbacks of the sequential engine
///
/// For every well-formed request the adapter calls `on_request_start`
/// exactly once, then `on_header_field` for each forwarded field, then
/// `on_header_section_complete` exactly once, then zero or more
/// `on_body_chunk`, then `on_message_complete`.
pub trait RequestHandler {
    fn on_request_start(&mut self, method: &str, target: &str, version: &str) -> Result<()>;

    fn on_header_field(&mut self, name: &str, value: &str) -> Result<()>;

    fn on_header_section_complete(&mut self) -> Result<()>;

    /// A non-empty body fragment was buffered. The fragment is still owned by
    /// the content source; reading it is done through [`ContentSource`].
    fn on_body_chunk(&mut self, chunk: &Bytes) -> Result<()>;

    /// The request is complete. The length hint is always zero: trailing
    /// length is not tracked by the adapter.
    fn on_message_complete(&mut self, content_length_hint: u64) -> Result<()>;
}

/// Blocking access to the request body, mimicking a socket read
pub trait ContentSource: Send + Sync {
    /// Number of buffered, unconsumed body bytes
    fn available_now(&self) -> Result<usize>;

    /// Wait up to `max_idle` for body bytes
    ///
    /// Returns the unconsumed part of the buffered fragment, or `None` once
    /// the body is complete and drained. The returned bytes stay buffered
    /// until released with [`consume`](ContentSource::consume).
    fn block_until_content(&self, max_idle: Duration) -> Result<Option<Bytes>>;

    /// Mark `len` bytes of the buffered fragment as read
    fn consume(&self, len: usize) -> Result<()>;

    /// Skip whatever is left of the body
    ///
    /// The default reads and consumes until the end of the body.
    fn discard_remaining(&self, max_idle: Duration) -> Result<()> {
        while let Some(fragment) = self.block_until_content(max_idle)? {
            self.consume(fragment.len())?;
        }
        Ok(())
    }
}

/// `std::io::Read` over a [`ContentSource`]
pub struct RequestBody {
    source: Arc<dyn ContentSource>,
    max_idle: Duration,
}

impl RequestBody {
    pub fn new(source: Arc<dyn ContentSource>, max_idle: Duration) -> Self {
        RequestBody { source, max_idle }
    }

    /// Bytes that can be read without blocking
    pub fn available(&self) -> Result<usize> {
        self.source.available_now()
    }

    /// Read the rest of the body into memory
    pub fn read_to_vec(&mut self) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        self.read_to_end(&mut body)?;
        Ok(body)
    }

    /// Drop the unread rest of the body
    pub fn discard(&mut self) -> Result<()> {
        self.source.discard_remaining(self.max_idle)
    }
}

impl Read for RequestBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let fragment = match self.source.block_until_content(self.max_idle) {
            Ok(Some(fragment)) => fragment,
            Ok(None) => return Ok(0),
            Err(err) => return Err(into_io(err)),
        };
        let n = fragment.len().min(buf.len());
        buf[..n].copy_from_slice(&fragment[..n]);
        self.source.consume(n).map_err(into_io)?;
        Ok(n)
    }
}

/// Map an engine error onto the I/O error a socket read would have raised
fn into_io(err: Error) -> io::Error {
    match err {
        Error::Io(err) => err,
        Error::Timeout => io::Error::new(io::ErrorKind::UnexpectedEof, "read timeout"),
        other => io::Error::new(io::ErrorKind::Other, other.to_string()),
    }
}
