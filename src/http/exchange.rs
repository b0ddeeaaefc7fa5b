//! Reference sequential engine
//!
//! [`Exchange`] assembles a request from the adapter's callbacks and, once
//! the header section is complete, runs an application [`Handler`] on its
//! own worker thread. The handler reads the body with blocking reads and
//! writes its response through a [`ResponseGenerator`], exactly as it would
//! on a plain connection.

use super::{
    ContentSource, Error, Method, RequestBody, RequestHandler, RequestHead, ResponseGenerator,
    ResponseSink, Result, Status,
};
use bytes::Bytes;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Response handed to handlers
pub type Response = ResponseGenerator<Box<dyn ResponseSink + Send>>;

/// Application request handler
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, request: &mut Request, response: &mut Response) -> Result<()>;
}

impl<F> Handler for F
where
    F: Fn(&mut Request, &mut Response) -> Result<()> + Send + Sync + 'static,
{
    fn handle(&self, request: &mut Request, response: &mut Response) -> Result<()> {
        self(request, response)
    }
}

/// A request as seen by a handler
pub struct Request {
    head: RequestHead,
    body: RequestBody,
}

impl Request {
    pub fn new(head: RequestHead, body: RequestBody) -> Self {
        Request { head, body }
    }

    pub fn head(&self) -> &RequestHead {
        &self.head
    }

    pub fn method(&self) -> Method {
        self.head.method()
    }

    pub fn path(&self) -> &str {
        self.head.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.head.query()
    }

    /// First value of a header field
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers().get(name)
    }

    /// Blocking reader over the request body
    pub fn body(&mut self) -> &mut RequestBody {
        &mut self.body
    }
}

/// [`RequestHandler`] running a [`Handler`] per request
pub struct Exchange<F: Handler> {
    handler: Arc<F>,
    content: Arc<dyn ContentSource>,
    sink: Option<Box<dyn ResponseSink + Send>>,
    head: Option<RequestHead>,
    line_error: Option<String>,
    /// Rejected before a worker ran; body bytes are dropped as they arrive
    rejected: bool,
    max_idle: Duration,
    buffer_size: usize,
    worker: Option<JoinHandle<Result<()>>>,
}

impl<F: Handler> Exchange<F> {
    pub fn new(
        handler: Arc<F>,
        content: Arc<dyn ContentSource>,
        sink: Box<dyn ResponseSink + Send>,
    ) -> Self {
        Exchange {
            handler,
            content,
            sink: Some(sink),
            head: None,
            line_error: None,
            rejected: false,
            max_idle: Duration::from_secs(30),
            buffer_size: 16384,
            worker: None,
        }
    }

    /// Deadline for each blocking body read
    pub fn max_idle(mut self, max_idle: Duration) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Response bytes buffered before the generator flushes on its own
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Request assembled so far
    pub fn head(&self) -> Option<&RequestHead> {
        self.head.as_ref()
    }

    /// Take the worker handle, leaving nothing to join
    pub fn take_worker(&mut self) -> Option<JoinHandle<Result<()>>> {
        self.worker.take()
    }

    /// Wait for the worker to finish and return the handler's outcome
    pub fn join(&mut self) -> Result<()> {
        match self.worker.take() {
            Some(worker) => join_worker(worker),
            None => Ok(()),
        }
    }

    fn reject(&mut self, sink: Box<dyn ResponseSink + Send>, reason: &str) -> Result<()> {
        warn!("bad request line: {}", reason);
        self.rejected = true;
        let mut response = ResponseGenerator::new(sink, self.buffer_size);
        response.set_status(Status::BAD_REQUEST);
        response.complete()
    }
}

/// Join a worker thread, turning a panic into an error
pub fn join_worker(worker: JoinHandle<Result<()>>) -> Result<()> {
    worker
        .join()
        .map_err(|_| Error::IllegalState("request worker panicked".to_string()))?
}

/// Run the handler and complete the response
///
/// A failed handler gets a 500 reply when nothing was committed yet; the
/// error is still returned. Body bytes the handler left unread are
/// discarded so the stream can finish.
fn serve<F: Handler>(handler: &F, mut request: Request, mut response: Response) -> Result<()> {
    let outcome = match handler.handle(&mut request, &mut response) {
        Ok(()) => response.complete(),
        Err(err) => {
            warn!(
                "handler failed for {} {}: {}",
                request.method(),
                request.head().target(),
                err
            );
            if !response.is_committed() {
                response.reset()?;
                response.set_status(Status::INTERNAL_SERVER_ERROR);
            }
            if let Err(complete_err) = response.complete() {
                warn!("failed to complete error response: {}", complete_err);
            }
            Err(err)
        }
    };
    if let Err(err) = request.body().discard() {
        warn!("failed to discard request body: {}", err);
    }
    outcome
}

impl<F: Handler> RequestHandler for Exchange<F> {
    fn on_request_start(&mut self, method: &str, target: &str, version: &str) -> Result<()> {
        match RequestHead::from_request_line(method, target, version) {
            Ok(head) => self.head = Some(head),
            Err(err) => self.line_error = Some(err.to_string()),
        }
        Ok(())
    }

    fn on_header_field(&mut self, name: &str, value: &str) -> Result<()> {
        if let Some(head) = self.head.as_mut() {
            head.headers_mut().insert(name, value);
        }
        Ok(())
    }

    fn on_header_section_complete(&mut self) -> Result<()> {
        let sink = self
            .sink
            .take()
            .ok_or_else(|| Error::IllegalState("request already dispatched".to_string()))?;

        if let Some(reason) = self.line_error.take() {
            return self.reject(sink, &reason);
        }
        let head = self
            .head
            .take()
            .ok_or_else(|| Error::IllegalState("header section without request line".to_string()))?;

        let name = format!("worker {} {}", head.method(), head.path());
        debug!("dispatching {}", name);
        let handler = self.handler.clone();
        let response = ResponseGenerator::new(sink, self.buffer_size)
            .omit_body(!head.method().allows_response_body());
        let request = Request::new(head, RequestBody::new(self.content.clone(), self.max_idle));
        let worker = thread::Builder::new()
            .name(name)
            .spawn(move || serve(handler.as_ref(), request, response))?;
        self.worker = Some(worker);
        Ok(())
    }

    fn on_body_chunk(&mut self, chunk: &Bytes) -> Result<()> {
        if self.rejected {
            trace!("dropping {} body bytes of a rejected request", chunk.len());
            return self.content.consume(chunk.len());
        }
        trace!("{} body bytes buffered for the worker", chunk.len());
        Ok(())
    }

    fn on_message_complete(&mut self, content_length_hint: u64) -> Result<()> {
        debug!("request complete, length hint {}", content_length_hint);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::WireSink;
    use std::io::{self, Read, Write};
    use std::sync::Mutex;

    /// Write target shared with the test after the worker is done
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Body source holding one fixed fragment
    struct FixedBody(Mutex<Bytes>);

    impl ContentSource for FixedBody {
        fn available_now(&self) -> Result<usize> {
            Ok(self.0.lock().unwrap().len())
        }

        fn block_until_content(&self, _max_idle: Duration) -> Result<Option<Bytes>> {
            let body = self.0.lock().unwrap();
            Ok(if body.is_empty() { None } else { Some(body.clone()) })
        }

        fn consume(&self, len: usize) -> Result<()> {
            let _ = self.0.lock().unwrap().split_to(len);
            Ok(())
        }
    }

    fn exchange<F: Handler>(handler: F, body: &'static [u8]) -> (SharedBuf, Exchange<F>) {
        let out = SharedBuf::default();
        let content = Arc::new(FixedBody(Mutex::new(Bytes::from_static(body))));
        let exchange = Exchange::new(Arc::new(handler), content, Box::new(WireSink::new(out.clone())));
        (out, exchange)
    }

    fn run<F: Handler>(exchange: &mut Exchange<F>, method: &str, target: &str) -> Result<()> {
        exchange.on_request_start(method, target, "HTTP/1.1")?;
        exchange.on_header_field("host", "localhost")?;
        exchange.on_header_section_complete()?;
        exchange.on_message_complete(0)?;
        exchange.join()
    }

    #[test]
    fn test_handler_sees_request() {
        let seen = Arc::new(Mutex::new(None));
        let record = seen.clone();
        let (out, mut exchange) = exchange(
            move |request: &mut Request, response: &mut Response| -> Result<()> {
                *record.lock().unwrap() = Some((
                    request.method(),
                    request.path().to_string(),
                    request.query().map(str::to_string),
                    request.header("Host").map(str::to_string),
                ));
                response.write_all(b"hello")?;
                Ok(())
            },
            b"",
        );

        run(&mut exchange, "GET", "http://localhost/foo?p=1").unwrap();

        assert_eq!(
            seen.lock().unwrap().clone(),
            Some((
                Method::Get,
                "/foo".to_string(),
                Some("p=1".to_string()),
                Some("localhost".to_string())
            ))
        );
        let wire = out.text();
        assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(wire.ends_with("\r\n\r\nhello"));
    }

    #[test]
    fn test_handler_reads_body() {
        let (out, mut exchange) = exchange(
            |request: &mut Request, response: &mut Response| -> Result<()> {
                let mut body = String::new();
                request.body().read_to_string(&mut body)?;
                response.header("Content-Type", "text/plain");
                response.write_all(body.to_uppercase().as_bytes())?;
                Ok(())
            },
            b"a=1&b=2",
        );

        run(&mut exchange, "POST", "/form").unwrap();
        assert!(out.text().ends_with("\r\n\r\nA=1&B=2"));
    }

    #[test]
    fn test_unread_body_is_discarded() {
        let out = SharedBuf::default();
        let content = Arc::new(FixedBody(Mutex::new(Bytes::from_static(b"a=1&b=2"))));
        let mut exchange = Exchange::new(
            Arc::new(|_: &mut Request, response: &mut Response| -> Result<()> {
                response.write_all(b"skipped")?;
                Ok(())
            }),
            content.clone(),
            Box::new(WireSink::new(out.clone())),
        );

        run(&mut exchange, "POST", "/form").unwrap();
        assert_eq!(content.available_now().unwrap(), 0);
        assert!(out.text().ends_with("\r\n\r\nskipped"));
    }

    #[test]
    fn test_head_response_has_no_body() {
        let (out, mut exchange) = exchange(
            |_: &mut Request, response: &mut Response| -> Result<()> {
                response.write_all(b"hidden")?;
                Ok(())
            },
            b"",
        );

        run(&mut exchange, "HEAD", "/").unwrap();
        let wire = out.text();
        assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(!wire.contains("hidden"));
    }

    #[test]
    fn test_bad_request_line_drops_body() {
        let content = Arc::new(FixedBody(Mutex::new(Bytes::from_static(b"xyz"))));
        let mut exchange = Exchange::new(
            Arc::new(|_: &mut Request, _: &mut Response| -> Result<()> {
                panic!("handler must not run")
            }),
            content.clone(),
            Box::new(WireSink::new(SharedBuf::default())),
        );

        exchange.on_request_start("BREW", "/pot", "HTTP/1.1").unwrap();
        exchange.on_header_section_complete().unwrap();
        exchange.on_body_chunk(&Bytes::from_static(b"xyz")).unwrap();
        assert_eq!(content.available_now().unwrap(), 0);
    }

    #[test]
    fn test_bad_request_line() {
        let (out, mut exchange) = exchange(
            |_: &mut Request, _: &mut Response| -> Result<()> {
                panic!("handler must not run")
            },
            b"",
        );

        run(&mut exchange, "BREW", "/pot").unwrap();
        assert!(out.text().starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[test]
    fn test_handler_error_becomes_500() {
        let (out, mut exchange) = exchange(
            |_: &mut Request, response: &mut Response| -> Result<()> {
                response.write_all(b"partial")?;
                Err(Error::Parse("boom".to_string()))
            },
            b"",
        );

        let err = run(&mut exchange, "GET", "/").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));

        let wire = out.text();
        assert!(wire.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
        assert!(!wire.contains("partial"));
    }

    #[test]
    fn test_dispatch_only_once() {
        let (_, mut exchange) = exchange(|_: &mut Request, _: &mut Response| -> Result<()> { Ok(()) }, b"");
        exchange.on_request_start("GET", "/", "HTTP/1.1").unwrap();
        exchange.on_header_section_complete().unwrap();
        assert!(exchange.on_header_section_complete().is_err());
        exchange.join().unwrap();
    }
}
