//! In-memory session used by the integration tests
//!
//! `MockSession` plays the transport: it queues inbound frames, pumps them
//! into the stream's driver (on the test thread, or on the worker thread
//! when the engine asks for more frames) and records every outbound frame.

#![allow(dead_code)]

use bytes::{Bytes, BytesMut};
use muxbridge::http::{exchange::join_worker, Exchange, Handler, Headers, RequestHandler};
use muxbridge::mux::{self, AdapterConfig, StreamDriver, StreamId, Transport};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Install a test-writer subscriber once per test binary
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Frame sent by the remote peer
#[derive(Debug, Clone)]
pub enum Inbound {
    Metadata(Headers),
    HeadersEnd,
    Body(Bytes, bool),
    End,
}

/// Frame sent by the adapter
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Reply(Headers, bool),
    Data(Bytes, bool),
}

pub struct MockSession<H: RequestHandler + Send + 'static> {
    id: StreamId,
    driver: Mutex<Option<StreamDriver<H>>>,
    inbound: Mutex<VecDeque<Inbound>>,
    outbound: Mutex<Vec<Outbound>>,
    pub pulls: AtomicUsize,
    pub terminations: AtomicUsize,
}

impl<H: RequestHandler + Send + 'static> MockSession<H> {
    pub fn new(id: StreamId) -> Arc<Self> {
        Arc::new(MockSession {
            id,
            driver: Mutex::new(None),
            inbound: Mutex::new(VecDeque::new()),
            outbound: Mutex::new(Vec::new()),
            pulls: AtomicUsize::new(0),
            terminations: AtomicUsize::new(0),
        })
    }

    pub fn attach(&self, driver: StreamDriver<H>) {
        *self.driver.lock().unwrap() = Some(driver);
    }

    /// Queue frames and deliver as many as back-pressure allows
    pub fn send(&self, frames: impl IntoIterator<Item = Inbound>) {
        self.inbound.lock().unwrap().extend(frames);
        self.pump().unwrap();
    }

    /// Deliver queued frames in order, stopping at a body frame while the
    /// previous fragment is still unconsumed
    pub fn pump(&self) -> mux::Result<()> {
        let mut guard = self.driver.lock().unwrap();
        let driver = match guard.as_mut() {
            Some(driver) => driver,
            None => return Ok(()),
        };
        loop {
            let frame = {
                let mut inbound = self.inbound.lock().unwrap();
                match inbound.front() {
                    Some(Inbound::Body(..)) if !driver.content().is_drained() => return Ok(()),
                    Some(_) => inbound.pop_front(),
                    None => return Ok(()),
                }
            };
            match frame {
                Some(Inbound::Metadata(headers)) => driver.on_metadata_frame(headers)?,
                Some(Inbound::HeadersEnd) => driver.on_headers_end()?,
                Some(Inbound::Body(data, end)) => driver.on_body_frame(data, end)?,
                Some(Inbound::End) => driver.on_stream_end()?,
                None => return Ok(()),
            }
        }
    }

    pub fn with_driver<R>(&self, f: impl FnOnce(&mut StreamDriver<H>) -> R) -> Option<R> {
        self.driver.lock().unwrap().as_mut().map(f)
    }

    pub fn outbound(&self) -> Vec<Outbound> {
        self.outbound.lock().unwrap().clone()
    }

    /// Headers and close flag of the single reply frame
    pub fn reply(&self) -> (Headers, bool) {
        let replies: Vec<_> = self
            .outbound()
            .into_iter()
            .filter_map(|frame| match frame {
                Outbound::Reply(headers, close) => Some((headers, close)),
                Outbound::Data(..) => None,
            })
            .collect();
        assert_eq!(replies.len(), 1, "expected exactly one reply frame");
        replies.into_iter().next().unwrap()
    }

    /// Data frames in the order they were sent
    pub fn data_frames(&self) -> Vec<(Bytes, bool)> {
        self.outbound()
            .into_iter()
            .filter_map(|frame| match frame {
                Outbound::Data(data, close) => Some((data, close)),
                Outbound::Reply(..) => None,
            })
            .collect()
    }

    /// Concatenated response body
    pub fn body(&self) -> Bytes {
        let mut body = BytesMut::new();
        for (data, _) in self.data_frames() {
            body.extend_from_slice(&data);
        }
        body.freeze()
    }

    /// Nothing was sent back yet
    pub fn reply_pending(&self) -> bool {
        self.outbound().is_empty()
    }

    /// Whether the last outbound frame closed the stream
    pub fn closed(&self) -> bool {
        match self.outbound().last() {
            Some(Outbound::Reply(_, close)) | Some(Outbound::Data(_, close)) => *close,
            None => false,
        }
    }
}

impl<F: Handler> MockSession<Exchange<F>> {
    /// Session with one stream served by `handler`
    pub fn serve(handler: F, config: &AdapterConfig) -> Arc<Self> {
        let session: Arc<Self> = MockSession::new(1);
        let driver = StreamDriver::for_exchange(Arc::new(handler), session.clone(), config);
        session.attach(driver);
        session
    }

    /// Wait for the request worker; the driver lock is not held meanwhile
    pub fn join(&self) -> muxbridge::http::Result<()> {
        let worker = self
            .with_driver(|driver| driver.handler_mut().take_worker())
            .flatten();
        match worker {
            Some(worker) => join_worker(worker),
            None => Ok(()),
        }
    }
}

impl<H: RequestHandler + Send + 'static> Transport for MockSession<H> {
    fn stream_id(&self) -> StreamId {
        self.id
    }

    fn send_reply(&self, headers: Headers, close: bool) -> mux::Result<()> {
        self.outbound
            .lock()
            .unwrap()
            .push(Outbound::Reply(headers, close));
        Ok(())
    }

    fn send_body_frame(&self, data: Bytes, close: bool) -> mux::Result<()> {
        self.outbound.lock().unwrap().push(Outbound::Data(data, close));
        Ok(())
    }

    fn request_more_frames(&self) -> mux::Result<()> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        self.pump()
    }

    fn terminate_session(&self) -> mux::Result<()> {
        self.terminations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// First metadata frame of a request
pub fn request(method: &str, url: &str) -> Headers {
    Headers::new()
        .with("method", method)
        .with("url", url)
        .with("version", "HTTP/1.1")
}

/// Parse an `application/x-www-form-urlencoded` body without decoding
pub fn form_params(body: &str) -> Vec<(String, String)> {
    body.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((name, value)) => (name.to_string(), value.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}
