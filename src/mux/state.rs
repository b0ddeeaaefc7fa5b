//! Request lifecycle state
//!
//! The state is written by the driver on the I/O thread and read by the
//! engine's worker thread, so it lives in an atomic with sequentially
//! consistent ordering.

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of one adapted request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum State {
    /// Adapter constructed, nothing received
    Initial = 0,
    /// First metadata frame received; request line pending
    RequestLine = 1,
    /// Request line delivered; header fields being forwarded
    HeaderFields = 2,
    /// No more header frames will arrive
    HeadersComplete = 3,
    /// A body fragment was delivered
    Body = 4,
    /// End of stream signaled
    Final = 5,
}

impl State {
    fn from_u8(value: u8) -> State {
        match value {
            0 => State::Initial,
            1 => State::RequestLine,
            2 => State::HeaderFields,
            3 => State::HeadersComplete,
            4 => State::Body,
            _ => State::Final,
        }
    }

    /// States in which buffered body bytes may be inspected
    pub fn is_reading(&self) -> bool {
        matches!(self, State::HeadersComplete | State::Body)
    }

    /// States in which the engine may block for body bytes
    pub fn can_block_for_content(&self) -> bool {
        matches!(self, State::HeadersComplete | State::Body | State::Final)
    }
}

/// Lifecycle state shared between the I/O thread and the worker thread
#[derive(Debug)]
pub struct AtomicState(AtomicU8);

impl AtomicState {
    pub fn new(state: State) -> Self {
        AtomicState(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> State {
        State::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn store(&self, state: State) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

impl Default for AtomicState {
    fn default() -> Self {
        AtomicState::new(State::Initial)
    }
}
