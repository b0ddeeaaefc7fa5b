//! muxbridge - sequential HTTP processing over multiplexed streams
//!
//! This crate adapts the frames of one logical stream of a multiplexed
//! transport into the callbacks of a sequential, blocking HTTP/1.1 request
//! engine, and turns the engine's generated response back into reply and
//! data frames.
//!
//! - [`http`] holds the sequential side: headers, messages, the engine seams,
//!   the response generator and a small reference engine.
//! - [`mux`] holds the stream adapter: lifecycle state, content buffering,
//!   header translation, the state machine driver and the frame sink.

pub mod http;
pub mod mux;
