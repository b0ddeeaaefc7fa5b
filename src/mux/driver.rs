//! State machine driver
//!
//! The transport calls into [`StreamDriver`] as frames arrive for its
//! stream. Each call moves the lifecycle forward and then runs the dispatch
//! loop, which performs the action of every state entered until no
//! transition is pending. A single frame may therefore produce several
//! engine callbacks (request start, header fields and header section
//! complete) before the call returns.

use super::config::AdapterConfig;
use super::consumer::ContentChannel;
use super::reply::{reply_headers, FrameSink};
use super::state::State;
use super::translate::{HeaderTranslator, RequestLine};
use super::{Error, Result, StreamId, Transport};
use crate::http::{Exchange, Handler, Headers, RequestHandler, ResponseHead, Version};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Per-stream adapter driving a [`RequestHandler`]
pub struct StreamDriver<H: RequestHandler> {
    handler: H,
    channel: Arc<ContentChannel>,
    transport: Arc<dyn Transport>,
    translator: HeaderTranslator,
    reply_version: Version,
    /// Metadata frame waiting to be translated
    metadata: Option<Headers>,
    /// A transition happened whose action has not run yet
    pending: bool,
    /// The request was refused with a 400 reply
    rejected: bool,
}

impl<H: RequestHandler> StreamDriver<H> {
    /// Create the driver for a stream
    ///
    /// `make_handler` receives the stream's content channel so the engine
    /// can read the body from its worker thread.
    pub fn new(
        transport: Arc<dyn Transport>,
        config: &AdapterConfig,
        make_handler: impl FnOnce(Arc<ContentChannel>) -> H,
    ) -> Self {
        let channel = Arc::new(ContentChannel::new(transport.clone()));
        let handler = make_handler(channel.clone());
        StreamDriver {
            handler,
            channel,
            transport,
            translator: HeaderTranslator::new(config.synthesize_host),
            reply_version: config.reply_version,
            metadata: None,
            pending: false,
            rejected: false,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.transport.stream_id()
    }

    pub fn state(&self) -> State {
        self.channel.state()
    }

    /// The stream's content channel
    pub fn content(&self) -> &Arc<ContentChannel> {
        &self.channel
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Whether the request was refused as malformed
    pub fn is_rejected(&self) -> bool {
        self.rejected
    }

    /// Metadata frame delivered by the transport
    ///
    /// The first non-empty frame carries the request line. Later frames
    /// continue the header section until it is ended; metadata after that
    /// (trailers) is not supported.
    pub fn on_metadata_frame(&mut self, headers: Headers) -> Result<()> {
        if self.rejected {
            return Ok(());
        }
        match self.state() {
            State::Initial if headers.is_empty() => {
                debug!(stream = self.stream_id(), "ignoring empty metadata frame");
                return Ok(());
            }
            State::Initial => {
                self.metadata = Some(headers);
                self.transition(State::RequestLine);
            }
            State::RequestLine | State::HeaderFields => {
                self.metadata = Some(headers);
                self.transition(State::HeaderFields);
            }
            state => {
                return Err(Error::IllegalState {
                    operation: "metadata frame after header section",
                    state,
                })
            }
        }
        self.run()
    }

    /// No more metadata frames will arrive
    pub fn on_headers_end(&mut self) -> Result<()> {
        if self.rejected {
            return Ok(());
        }
        match self.state() {
            State::Initial => Err(Error::IllegalState {
                operation: "end of headers before request line",
                state: State::Initial,
            }),
            State::RequestLine | State::HeaderFields => {
                self.transition(State::HeadersComplete);
                self.run()
            }
            _ => Ok(()),
        }
    }

    /// Body frame delivered by the transport
    ///
    /// `end_of_body` only marks the body complete; the stream moves to its
    /// final state on [`on_stream_end`](Self::on_stream_end).
    pub fn on_body_frame(&mut self, data: Bytes, end_of_body: bool) -> Result<()> {
        if self.rejected {
            return Ok(());
        }
        self.on_headers_end()?;
        if self.rejected {
            return Ok(());
        }
        let state = self.state();
        if !state.is_reading() {
            return Err(Error::IllegalState {
                operation: "body frame",
                state,
            });
        }
        self.channel.deliver(data, end_of_body)?;
        self.transition(State::Body);
        self.run()
    }

    /// The stream was half-closed by the remote peer
    pub fn on_stream_end(&mut self) -> Result<()> {
        if self.rejected {
            return Ok(());
        }
        match self.state() {
            State::Final => return Ok(()),
            state @ (State::Initial | State::RequestLine) => {
                return Err(Error::IllegalState {
                    operation: "stream end before request line",
                    state,
                })
            }
            _ => {}
        }
        self.on_headers_end()?;
        if self.rejected {
            return Ok(());
        }
        self.channel.finish();
        self.transition(State::Final);
        self.run()
    }

    /// Perform the actions of every state entered since the last dispatch
    ///
    /// Calling it again without an intervening transition has no effect.
    pub fn dispatch(&mut self) -> Result<()> {
        while std::mem::take(&mut self.pending) {
            let state = self.state();
            self.act(state)?;
        }
        Ok(())
    }

    fn transition(&mut self, state: State) {
        trace!(
            stream = self.stream_id(),
            "state {:?} -> {:?}",
            self.state(),
            state
        );
        self.channel.set_state(state);
        self.pending = true;
    }

    fn act(&mut self, state: State) -> Result<()> {
        match state {
            State::Initial => {}
            State::RequestLine => {
                let headers = self.metadata.as_ref().ok_or(Error::IllegalState {
                    operation: "request line without metadata",
                    state,
                })?;
                let line = RequestLine::from_headers(headers)?;
                debug!(
                    stream = self.stream_id(),
                    "HTTP > {} {} {}", line.method, line.target, line.version
                );
                self.handler
                    .on_request_start(&line.method, &line.target, &line.version)?;
                self.transition(State::HeaderFields);
            }
            State::HeaderFields => {
                if let Some(headers) = self.metadata.take() {
                    for (name, value) in self.translator.translate(&headers) {
                        debug!(stream = self.stream_id(), "HTTP > {}: {}", name, value);
                        self.handler.on_header_field(&name, &value)?;
                    }
                }
            }
            State::HeadersComplete => {
                self.handler.on_header_section_complete()?;
            }
            State::Body => {
                let fragment = self.channel.peek();
                if !fragment.is_empty() {
                    self.handler.on_body_chunk(&fragment)?;
                }
            }
            State::Final => {
                // Trailing length is not tracked here
                self.handler.on_message_complete(0)?;
            }
        }
        Ok(())
    }

    /// Dispatch, turning a malformed request into a 400 reply
    fn run(&mut self) -> Result<()> {
        match self.dispatch() {
            Err(err @ Error::MalformedRequest(_)) => self.reject(&err),
            other => other,
        }
    }

    fn reject(&mut self, err: &Error) -> Result<()> {
        warn!(stream = self.stream_id(), "rejecting request: {}", err);
        self.rejected = true;
        self.pending = false;
        self.metadata = None;
        self.channel.finish();
        self.channel.set_state(State::Final);

        let headers = reply_headers(&ResponseHead::new(err.status()), self.reply_version);
        self.transport.send_reply(headers, true)
    }
}

impl<F: Handler> StreamDriver<Exchange<F>> {
    /// Driver whose engine runs `handler` on a worker thread and answers
    /// with frames
    pub fn for_exchange(
        handler: Arc<F>,
        transport: Arc<dyn Transport>,
        config: &AdapterConfig,
    ) -> Self {
        let sink = FrameSink::new(transport.clone(), config.reply_version);
        StreamDriver::new(transport, config, |channel| {
            Exchange::new(handler, channel, Box::new(sink))
                .max_idle(config.max_idle)
                .buffer_size(config.response_buffer_size)
        })
    }
}
