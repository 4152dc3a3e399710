//! Streaming module for bounded pushback reading
//!
//! This module provides:
//! - A fixed-capacity byte ring with look-back access
//! - The byte source pull interface and adapters
//! - A replay stream that can unread recently produced bytes

pub mod ring_buffer;
pub mod replay_stream;
pub mod source;

pub use ring_buffer::{RingBuffer, RingError};
pub use replay_stream::{ReplayStream, StreamError};
pub use source::{ByteSource, ReaderSource, SliceSource};
