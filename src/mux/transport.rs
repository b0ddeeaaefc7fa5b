//! Operations the adapter consumes from the multiplexed transport
//!
//! The transport owns the stream and the session; the adapter only holds a
//! handle to the one stream it serves.

use super::Result;
use crate::http::Headers;
use bytes::Bytes;

/// Stream identifier within a session
pub type StreamId = u32;

/// Handle on one logical stream of a multiplexed session
///
/// Implementations are called from both the I/O thread (replies to
/// malformed requests) and the engine's worker thread (response frames,
/// pulling more input, terminating the session), so they must be
/// thread-safe. None of the calls may block waiting on the adapter.
pub trait Transport: Send + Sync {
    fn stream_id(&self) -> StreamId;

    /// Send the reply frame; `close` marks that no data frame follows
    fn send_reply(&self, headers: Headers, close: bool) -> Result<()>;

    /// Send one data frame; `close` ends the stream
    fn send_body_frame(&self, data: Bytes, close: bool) -> Result<()>;

    /// Read and dispatch whatever frames are available without blocking
    fn request_more_frames(&self) -> Result<()>;

    /// Ask the session to stop accepting new streams and shut down
    /// gracefully
    fn terminate_session(&self) -> Result<()>;
}
