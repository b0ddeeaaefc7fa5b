//! Sequential HTTP/1.1 side of the bridge
//!
//! This module holds everything the blocking request engine sees: header
//! collections, request/response heads, the callback and content seams the
//! adapter drives, and the response generator that hands its output to a
//! pluggable sink.
//!
//! # Architecture
//!
//! The response path uses a sink abstraction so that the same generator can
//! serialize either to a byte stream or to multiplexed frames:
//!
//! - `ResponseSink` defines the operations (emit headers, emit body, finish)
//! - `ResponseGenerator` accumulates status, headers and body bytes and calls
//!   into its sink at commit and flush points
//! - `WireSink` writes HTTP/1.1 bytes; `mux::FrameSink` writes frames
//!
//! # Examples
//!
//! ```
//! use muxbridge::http::{ResponseGenerator, WireSink, Status};
//! use std::io::Write;
//!
//! let mut out = Vec::new();
//! let mut response = ResponseGenerator::new(WireSink::new(&mut out), 8192);
//! response.set_status(Status::OK);
//! response.header("Content-Type", "text/plain");
//! response.write_all(b"Hello").unwrap();
//! response.complete().unwrap();
//! drop(response);
//!
//! let wire = String::from_utf8(out).unwrap();
//! assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
//! assert!(wire.ends_with("\r\n\r\nHello"));
//! ```

pub mod chunked;
pub mod engine;
pub mod exchange;
pub mod generator;
pub mod headers;
pub mod message;
pub mod wire;

pub use engine::{ContentSource, RequestBody, RequestHandler};
pub use exchange::{Exchange, Handler, Request, Response};
pub use generator::{ResponseGenerator, ResponseSink};
pub use headers::Headers;
pub use message::{Method, RequestHead, ResponseHead, Status, Version};
pub use wire::WireSink;

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid HTTP version: {0}")]
    InvalidVersion(String),

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Invalid HTTP status: {0}")]
    InvalidStatus(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Timeout")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// CRLF line ending
pub const CRLF: &str = "\r\n";
