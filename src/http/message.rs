//! HTTP message heads
//!
//! The request head is what the reference engine assembles from the
//! adapter's callbacks; the response head is what the generator hands to its
//! sink when headers are committed.

use super::{Error, Headers, Result};
use std::fmt;

/// HTTP methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Connect,
    Options,
    Trace,
    Patch,
}

impl Method {
    /// Parse a method token
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "CONNECT" => Ok(Method::Connect),
            "OPTIONS" => Ok(Method::Options),
            "TRACE" => Ok(Method::Trace),
            "PATCH" => Ok(Method::Patch),
            _ => Err(Error::InvalidMethod(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Connect => "CONNECT",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Patch => "PATCH",
        }
    }

    /// Whether a response to this method carries a body
    pub fn allows_response_body(&self) -> bool {
        !matches!(self, Method::Head)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP version of the sequential engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Version {
    Http10,
    #[default]
    Http11,
}

impl Version {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "HTTP/1.0" => Ok(Version::Http10),
            "HTTP/1.1" => Ok(Version::Http11),
            _ => Err(Error::InvalidVersion(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status {
    code: u16,
}

impl Status {
    /// Create a status, rejecting codes outside 100..600
    pub fn new(code: u16) -> Result<Self> {
        if (100..600).contains(&code) {
            Ok(Status { code })
        } else {
            Err(Error::InvalidStatus(format!("Invalid status code: {}", code)))
        }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    /// Canonical reason phrase for this status code
    pub fn reason_phrase(&self) -> &'static str {
        match self.code {
            100 => "Continue",
            101 => "Switching Protocols",
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            204 => "No Content",
            206 => "Partial Content",
            301 => "Moved Permanently",
            302 => "Found",
            303 => "See Other",
            304 => "Not Modified",
            307 => "Temporary Redirect",
            308 => "Permanent Redirect",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            408 => "Request Timeout",
            411 => "Length Required",
            413 => "Payload Too Large",
            414 => "URI Too Long",
            415 => "Unsupported Media Type",
            417 => "Expectation Failed",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            505 => "HTTP Version Not Supported",
            _ => "Unknown",
        }
    }

    /// Informational (1xx) responses cannot be carried by a reply frame
    pub fn is_informational(&self) -> bool {
        (100..200).contains(&self.code)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.code)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.code)
    }

    pub const CONTINUE: Status = Status { code: 100 };
    pub const OK: Status = Status { code: 200 };
    pub const BAD_REQUEST: Status = Status { code: 400 };
    pub const NOT_FOUND: Status = Status { code: 404 };
    pub const INTERNAL_SERVER_ERROR: Status = Status { code: 500 };
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.reason_phrase())
    }
}

/// Request line plus header fields, as seen by the engine
#[derive(Debug, Clone)]
pub struct RequestHead {
    method: Method,
    target: String,
    version: Version,
    headers: Headers,
}

impl RequestHead {
    pub fn new(method: Method, target: impl Into<String>, version: Version) -> Self {
        RequestHead {
            method,
            target: target.into(),
            version,
            headers: Headers::new(),
        }
    }

    /// Parse the three request-line tokens handed over by the adapter
    pub fn from_request_line(method: &str, target: &str, version: &str) -> Result<Self> {
        Ok(RequestHead::new(
            Method::parse(method)?,
            target,
            Version::parse(version)?,
        ))
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// The target exactly as received, possibly an absolute URL
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Path component of the target, without scheme, authority or query
    pub fn path(&self) -> &str {
        let origin = strip_authority(&self.target);
        match origin.find('?') {
            Some(q) => &origin[..q],
            None => origin,
        }
    }

    /// Query component of the target, if any
    pub fn query(&self) -> Option<&str> {
        let origin = strip_authority(&self.target);
        origin.find('?').map(|q| &origin[q + 1..])
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }
}

/// Reduce an absolute-form target to its origin-form (path and query)
fn strip_authority(target: &str) -> &str {
    match target.find("://") {
        Some(scheme_end) => {
            let rest = &target[scheme_end + 3..];
            match rest.find(|c| c == '/' || c == '?') {
                Some(start) => &rest[start..],
                None => "/",
            }
        }
        None => target,
    }
}

/// Status, reason and header fields of a response about to be committed
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub version: Version,
    pub status: Status,
    pub reason: Option<String>,
    pub headers: Headers,
}

impl ResponseHead {
    pub fn new(status: Status) -> Self {
        ResponseHead {
            version: Version::default(),
            status,
            reason: None,
            headers: Headers::new(),
        }
    }

    /// Reason text, falling back to the canonical phrase
    pub fn reason(&self) -> &str {
        self.reason
            .as_deref()
            .unwrap_or_else(|| self.status.reason_phrase())
    }

    /// Status line value, e.g. `200 OK`
    pub fn status_line(&self) -> String {
        let reason = self.reason();
        if reason.is_empty() {
            self.status.code().to_string()
        } else {
            format!("{} {}", self.status.code(), reason)
        }
    }
}
