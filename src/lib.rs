//! Ring Buffer and Replay Stream for Bitstream Readers
//!
//! A decoder reading a bitstream often has to look ahead, find out it went
//! too far, and back up. This crate lets it do that without asking the
//! underlying source to seek:
//! - [`RingBuffer`]: fixed-capacity byte ring with look-back offsets,
//!   internally locked so it can be shared across threads
//! - [`ReplayStream`]: wraps a [`ByteSource`], records every pulled byte in a
//!   ring and replays up to the ring's capacity after `unread`
//!
//! Boundary conditions are reported through the `log` facade as structured
//! JSON events (see [`telemetry`]).

pub mod config;
pub mod streaming;
pub mod telemetry;

pub use config::{ConfigError, OverflowPolicy, ReplayConfig};
pub use streaming::{
    ByteSource, ReaderSource, ReplayStream, RingBuffer, RingError, SliceSource, StreamError,
};
