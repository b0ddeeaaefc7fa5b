//! Single-fragment body buffer
//!
//! Holds the most recently delivered body fragment of one request and the
//! end-of-body marker. Only one fragment is buffered at a time: a new one is
//! refused until the previous one has been fully consumed, which bounds the
//! per-stream queue depth to one. Once the reader gives up on the body,
//! fragments are dropped as they are delivered.

use bytes::Bytes;

/// Buffered body fragment plus end-of-body marker
#[derive(Debug, Default)]
pub struct ContentBuffer {
    fragment: Bytes,
    complete: bool,
    discarding: bool,
}

impl ContentBuffer {
    pub fn new() -> Self {
        ContentBuffer::default()
    }

    /// Store a delivered fragment
    ///
    /// Returns the previous unconsumed bytes as the error when the buffer
    /// is not drained.
    pub fn fill(&mut self, fragment: Bytes, end_of_body: bool) -> Result<(), usize> {
        if !self.fragment.is_empty() {
            return Err(self.fragment.len());
        }
        if !self.discarding {
            self.fragment = fragment;
        }
        self.complete |= end_of_body;
        Ok(())
    }

    /// Unconsumed part of the fragment
    pub fn remaining(&self) -> Bytes {
        self.fragment.clone()
    }

    pub fn len(&self) -> usize {
        self.fragment.len()
    }

    pub fn is_drained(&self) -> bool {
        self.fragment.is_empty()
    }

    /// Advance past `len` consumed bytes, returning how many were consumed
    pub fn consume(&mut self, len: usize) -> usize {
        let len = len.min(self.fragment.len());
        let _ = self.fragment.split_to(len);
        len
    }

    /// No more body will arrive
    pub fn mark_complete(&mut self) {
        self.complete = true;
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Drop the buffered fragment and every later one, returning how many
    /// bytes were dropped
    pub fn discard(&mut self) -> usize {
        self.discarding = true;
        std::mem::take(&mut self.fragment).len()
    }

    /// Body finished and every byte consumed
    pub fn is_exhausted(&self) -> bool {
        self.complete && self.fragment.is_empty()
    }
}
