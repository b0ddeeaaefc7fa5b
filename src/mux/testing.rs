//! Test doubles shared by the adapter unit tests

use super::{Result, StreamId, Transport};
use crate::http::{self, Headers, RequestHandler};
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Reply(Headers, bool),
    Data(Bytes, bool),
}

/// Transport that records outgoing frames and runs a hook on pull
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<Sent>>,
    pub pulls: AtomicUsize,
    pub terminations: AtomicUsize,
    pub on_pull: Mutex<Option<Box<dyn FnMut() + Send>>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(RecordingTransport::default())
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

impl Transport for RecordingTransport {
    fn stream_id(&self) -> StreamId {
        1
    }

    fn send_reply(&self, headers: Headers, close: bool) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Reply(headers, close));
        Ok(())
    }

    fn send_body_frame(&self, data: Bytes, close: bool) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Data(data, close));
        Ok(())
    }

    fn request_more_frames(&self) -> Result<()> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = self.on_pull.lock().unwrap().as_mut() {
            hook();
        }
        Ok(())
    }

    fn terminate_session(&self) -> Result<()> {
        self.terminations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Start(String, String, String),
    Field(String, String),
    HeadersDone,
    Chunk(Bytes),
    Complete(u64),
}

/// Engine that records every callback
#[derive(Debug, Default)]
pub struct Recorder {
    pub events: Vec<Event>,
}

impl RequestHandler for Recorder {
    fn on_request_start(&mut self, method: &str, target: &str, version: &str) -> http::Result<()> {
        self.events
            .push(Event::Start(method.into(), target.into(), version.into()));
        Ok(())
    }

    fn on_header_field(&mut self, name: &str, value: &str) -> http::Result<()> {
        self.events.push(Event::Field(name.into(), value.into()));
        Ok(())
    }

    fn on_header_section_complete(&mut self) -> http::Result<()> {
        self.events.push(Event::HeadersDone);
        Ok(())
    }

    fn on_body_chunk(&mut self, chunk: &Bytes) -> http::Result<()> {
        self.events.push(Event::Chunk(chunk.clone()));
        Ok(())
    }

    fn on_message_complete(&mut self, content_length_hint: u64) -> http::Result<()> {
        self.events.push(Event::Complete(content_length_hint));
        Ok(())
    }
}
