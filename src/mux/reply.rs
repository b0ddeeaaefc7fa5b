//! Response frame adapter
//!
//! [`FrameSink`] receives the generator's output at the points where a
//! byte-stream generator would serialize it and re-encodes it as one reply
//! frame followed by data frames.

use super::{Error, StreamId, Transport, STATUS, VERSION};
use crate::http::{self, Headers, ResponseHead, ResponseSink, Status, Version};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn};

/// Build the reply metadata for a response head
///
/// The `status` field carries the code and reason, `version` carries the
/// configured protocol version, and every response header follows with a
/// single value per name.
pub fn reply_headers(head: &ResponseHead, version: Version) -> Headers {
    let mut headers = Headers::new();
    headers.insert(STATUS, head.status_line());
    headers.insert(VERSION, version.as_str());
    for (name, value) in head.headers.iter() {
        headers.set(name, value);
    }
    headers
}

/// [`ResponseSink`] that writes reply and data frames to a stream
pub struct FrameSink {
    transport: Arc<dyn Transport>,
    version: Version,
    replied: bool,
    closed: bool,
}

impl FrameSink {
    pub fn new(transport: Arc<dyn Transport>, version: Version) -> Self {
        FrameSink {
            transport,
            version,
            replied: false,
            closed: false,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.transport.stream_id()
    }

    /// Whether a frame marked as closing the stream was sent
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn send_data(&mut self, data: Bytes, close: bool) -> http::Result<()> {
        debug!(
            stream = self.stream_id(),
            len = data.len(),
            close,
            "sending data frame"
        );
        self.transport.send_body_frame(data, close)?;
        self.closed = close;
        Ok(())
    }
}

impl ResponseSink for FrameSink {
    fn emit_headers(&mut self, head: &ResponseHead, buffered: Bytes, last: bool) -> http::Result<()> {
        if self.replied {
            return Err(Error::IllegalState {
                operation: "second reply on a stream",
                state: super::State::Final,
            }
            .into());
        }
        let headers = reply_headers(head, self.version);
        // No bytes buffered at commit means no body will follow
        let close = buffered.is_empty();
        debug!(
            stream = self.stream_id(),
            status = %head.status_line(),
            close,
            "sending reply"
        );
        self.transport.send_reply(headers, close)?;
        self.replied = true;
        self.closed = close;
        if !close {
            self.send_data(buffered, last)?;
        }
        Ok(())
    }

    fn emit_body(&mut self, chunk: Bytes, last: bool) -> http::Result<()> {
        if !self.replied || self.closed {
            return Err(http::Error::IllegalState(format!(
                "data frame on stream {} without an open reply",
                self.stream_id()
            )));
        }
        if chunk.is_empty() && !last {
            return Ok(());
        }
        self.send_data(chunk, last)
    }

    fn finish(&mut self) -> http::Result<()> {
        if self.replied && !self.closed {
            self.send_data(Bytes::new(), true)?;
        }
        Ok(())
    }

    fn emit_informational(&mut self, status: Status) -> http::Result<()> {
        warn!(
            stream = self.stream_id(),
            code = status.code(),
            "informational responses cannot be framed"
        );
        Err(Error::Unsupported("informational response").into())
    }

    fn emit_raw(&mut self, _bytes: &[u8]) -> http::Result<()> {
        warn!(stream = self.stream_id(), "raw response bytes cannot be framed");
        Err(Error::Unsupported("raw response bytes").into())
    }
}
