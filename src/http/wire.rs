//! Byte-stream response sink
//!
//! Serializes a generated response as HTTP/1.1 bytes, the way the engine
//! answers on a plain connection.

use super::{chunked, Error, Headers, ResponseHead, ResponseSink, Result, Status, CRLF};
use bytes::Bytes;
use std::io::Write;

/// How the body following the header section is framed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    /// Nothing written yet
    Pending,
    /// Length known up front, body bytes written as they are
    Identity,
    Chunked,
    Done,
}

/// [`ResponseSink`] writing HTTP/1.1 to any `Write`
pub struct WireSink<W: Write> {
    writer: W,
    framing: Framing,
}

impl<W: Write> WireSink<W> {
    pub fn new(writer: W) -> Self {
        WireSink {
            writer,
            framing: Framing::Pending,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_head(&mut self, head: &ResponseHead, headers: &Headers) -> Result<()> {
        let mut wire = Vec::new();

        // Status line
        wire.extend_from_slice(head.version.as_str().as_bytes());
        wire.push(b' ');
        wire.extend_from_slice(head.status_line().as_bytes());
        wire.extend_from_slice(CRLF.as_bytes());

        // Headers
        for (name, value) in headers.iter() {
            wire.extend_from_slice(name.as_bytes());
            wire.extend_from_slice(b": ");
            wire.extend_from_slice(value.as_bytes());
            wire.extend_from_slice(CRLF.as_bytes());
        }

        // Empty line
        wire.extend_from_slice(CRLF.as_bytes());

        self.writer.write_all(&wire)?;
        Ok(())
    }

    fn write_body(&mut self, data: &[u8]) -> Result<()> {
        match self.framing {
            Framing::Identity => self.writer.write_all(data)?,
            Framing::Chunked => chunked::write_chunk(&mut self.writer, data)?,
            Framing::Pending | Framing::Done => {
                return Err(Error::IllegalState(
                    "body outside of a response".to_string(),
                ))
            }
        }
        Ok(())
    }
}

/// Responses that never carry a body
fn is_bodiless(status: Status) -> bool {
    status.is_informational() || status.code() == 204 || status.code() == 304
}

impl<W: Write> ResponseSink for WireSink<W> {
    fn emit_headers(&mut self, head: &ResponseHead, buffered: Bytes, last: bool) -> Result<()> {
        if self.framing != Framing::Pending {
            return Err(Error::IllegalState("headers already written".to_string()));
        }

        let mut headers = head.headers.clone();
        let explicit_length = headers.contains("Content-Length");
        self.framing = if explicit_length || is_bodiless(head.status) {
            Framing::Identity
        } else if last {
            headers.set("Content-Length", buffered.len().to_string());
            Framing::Identity
        } else {
            headers.set("Transfer-Encoding", "chunked");
            Framing::Chunked
        };

        self.write_head(head, &headers)?;
        self.write_body(&buffered)?;
        if last {
            self.finish()?;
        }
        Ok(())
    }

    fn emit_body(&mut self, chunk: Bytes, last: bool) -> Result<()> {
        self.write_body(&chunk)?;
        if last {
            self.finish()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        match self.framing {
            Framing::Chunked => chunked::write_last_chunk(&mut self.writer)?,
            Framing::Identity => self.writer.flush()?,
            Framing::Pending | Framing::Done => return Ok(()),
        }
        self.framing = Framing::Done;
        Ok(())
    }

    fn emit_informational(&mut self, status: Status) -> Result<()> {
        let head = ResponseHead::new(status);
        self.write_head(&head, &Headers::new())?;
        self.writer.flush()?;
        Ok(())
    }

    fn emit_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        Ok(())
    }
}
