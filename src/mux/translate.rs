//! Header translation
//!
//! Maps the metadata fields of a stream onto the request line and header
//! fields a byte-stream HTTP/1.1 parser would have produced.

use super::{Error, Result, METHOD, URL, VERSION};
use crate::http::Headers;
use url::Url;

/// The three request-line tokens carried as metadata fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub target: String,
    pub version: String,
}

impl RequestLine {
    /// Extract the request line; every token must be present
    pub fn from_headers(headers: &Headers) -> Result<Self> {
        let field = |name: &str| {
            headers
                .get(name)
                .map(str::to_string)
                .ok_or_else(|| Error::MalformedRequest(format!("missing '{}' field", name)))
        };
        Ok(RequestLine {
            method: field(METHOD)?,
            target: field(URL)?,
            version: field(VERSION)?,
        })
    }
}

/// Disposition rules for metadata fields
#[derive(Debug, Clone)]
pub struct HeaderTranslator {
    synthesize_host: bool,
}

impl HeaderTranslator {
    pub fn new(synthesize_host: bool) -> Self {
        HeaderTranslator { synthesize_host }
    }

    /// Header fields to forward to the engine, in delivery order
    ///
    /// - `method` and `version` only feed the request line
    /// - `url` becomes a `host` field when it is an absolute URL
    /// - `connection`, `keep-alive` and `host` are dropped; the session owns
    ///   the connection and the host comes from the target
    /// - everything else is forwarded with its single value
    pub fn translate(&self, headers: &Headers) -> Vec<(String, String)> {
        let mut forwarded = Vec::with_capacity(headers.len());
        for (name, value) in headers.iter() {
            let lower = name.to_ascii_lowercase();
            match lower.as_str() {
                METHOD | VERSION => continue,
                URL => {
                    if !self.synthesize_host {
                        continue;
                    }
                    if let Some(host) = parse_host(value) {
                        forwarded.push(("host".to_string(), host));
                    }
                }
                "connection" | "keep-alive" | "host" => continue,
                _ => forwarded.push((name.to_string(), value.to_string())),
            }
        }
        forwarded
    }
}

impl Default for HeaderTranslator {
    fn default() -> Self {
        HeaderTranslator::new(true)
    }
}

/// Authority of an absolute URL: the host, plus the port when it is not the
/// scheme's default
///
/// Relative or unparsable targets yield `None`.
pub fn parse_host(target: &str) -> Option<String> {
    let url = Url::parse(target).ok()?;
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}
