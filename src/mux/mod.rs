//! Adapter between a multiplexed stream and the sequential engine
//!
//! One [`StreamDriver`] exists per logical stream. The transport feeds it
//! metadata and body frames; the driver walks the request lifecycle and
//! invokes the engine's [`RequestHandler`](crate::http::RequestHandler)
//! callbacks. The engine's worker thread reads the body through the
//! stream's [`ContentChannel`] and writes its response through a
//! [`FrameSink`], which re-encodes it as one reply frame followed by data
//! frames.
//!
//! ```text
//! transport --frames--> StreamDriver --callbacks--> engine
//!     ^                      |                        |
//!     |                ContentChannel <--blocking read-+
//!     +------frames------ FrameSink <---ResponseGenerator
//! ```
//!
//! # Threading
//!
//! Frames are delivered on the transport's I/O thread, one call at a time
//! per driver. The engine's worker thread only touches the shared
//! [`ContentChannel`] (lifecycle state and the buffered fragment) and the
//! transport handle; it never calls back into the driver itself.

pub mod config;
pub mod consumer;
pub mod content;
pub mod driver;
pub mod reply;
pub mod state;
pub mod translate;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{AdapterConfig, AdapterConfigBuilder};
pub use consumer::ContentChannel;
pub use content::ContentBuffer;
pub use driver::StreamDriver;
pub use reply::FrameSink;
pub use state::State;
pub use translate::{HeaderTranslator, RequestLine};
pub use transport::{StreamId, Transport};

use crate::http;
use std::time::Duration;

/// Metadata field carrying the request method
pub const METHOD: &str = "method";
/// Metadata field carrying the request target
pub const URL: &str = "url";
/// Metadata field carrying the request version; also used in replies
pub const VERSION: &str = "version";
/// Reply field carrying the status code and reason
pub const STATUS: &str = "status";

/// Adapter errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failure reported by the sequential engine
    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),

    /// Request-line fields missing from the first metadata frame
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// No body bytes arrived within the idle deadline
    #[error("Read timeout after {0:?}")]
    ReadTimeout(Duration),

    /// Operation invoked in an incompatible lifecycle state
    #[error("Illegal state for {operation}: {state:?}")]
    IllegalState { operation: &'static str, state: State },

    /// Byte-oriented operation that would bypass frame encoding
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    /// Failure reported by the multiplexed transport
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Status of the error reply this failure turns into
    pub fn status(&self) -> http::Status {
        match self {
            Error::MalformedRequest(_) => http::Status::BAD_REQUEST,
            _ => http::Status::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for http::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Http(err) => err,
            Error::ReadTimeout(_) => http::Error::Timeout,
            Error::Unsupported(operation) => http::Error::Unsupported(operation),
            Error::Transport(message) => http::Error::Transport(message),
            Error::MalformedRequest(message) => http::Error::Parse(message),
            err @ (Error::IllegalState { .. } | Error::InvalidConfig(_)) => {
                http::Error::IllegalState(err.to_string())
            }
        }
    }
}

/// Result type for adapter operations
pub type Result<T> = std::result::Result<T, Error>;
