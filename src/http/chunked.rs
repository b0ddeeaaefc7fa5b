//! Chunked transfer encoding
//!
//! Used by the byte-stream sink when a response body is streamed without a
//! known length.

use super::{Result, CRLF};
use std::io::Write;

/// Write one chunk; empty data writes nothing, since a zero-size chunk
/// terminates the body
pub fn write_chunk<W: Write>(writer: &mut W, data: &[u8]) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    write!(writer, "{:x}{}", data.len(), CRLF)?;
    writer.write_all(data)?;
    writer.write_all(CRLF.as_bytes())?;
    Ok(())
}

/// Write the terminating zero-size chunk with an empty trailer section
pub fn write_last_chunk<W: Write>(writer: &mut W) -> Result<()> {
    write!(writer, "0{}{}", CRLF, CRLF)?;
    writer.flush()?;
    Ok(())
}
