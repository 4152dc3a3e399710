//! Replay Stream with Bounded Unread
//!
//! Wraps a [`ByteSource`] and remembers the most recent bytes it pulled in a
//! [`RingBuffer`]. A consumer that read too far calls `unread(n)`, and the
//! next reads hand back those `n` bytes from the ring before pulling anything
//! new. The source never sees a re-read and never needs to seek.
//!
//! Not synchronized: one consumer per stream.

use std::io::{self, Read};

use log::{debug, trace};
use thiserror::Error;

use super::ring_buffer::{RingBuffer, RingError};
use super::source::ByteSource;
use crate::config::{ConfigError, OverflowPolicy, ReplayConfig};
use crate::telemetry;

/// Replay stream errors
#[derive(Debug, Error)]
pub enum StreamError {
    #[error(transparent)]
    Ring(#[from] RingError),

    /// Only returned under [`OverflowPolicy::Reject`]
    #[error("unread of {requested} bytes with {pending} pending exceeds back buffer of {capacity}")]
    UnreadOverflow {
        pending: usize,
        requested: usize,
        capacity: usize,
    },

    #[error("range {offset}+{length} out of bounds for buffer of {buffer_len} bytes")]
    InvalidRange {
        offset: usize,
        length: usize,
        buffer_len: usize,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("source I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<StreamError> for io::Error {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::Io(e) => e,
            other => io::Error::other(other),
        }
    }
}

/// Pushback-capable reader over a byte source
pub struct ReplayStream<S> {
    source: S,
    /// History of pulled bytes, newest at offset 0
    ring: RingBuffer,
    /// Bytes still to be replayed from `ring` before pulling fresh ones
    pending_replay: usize,
    overflow_policy: OverflowPolicy,
    log_replays: bool,
    total_pulled: u64,
}

impl<S: ByteSource> ReplayStream<S> {
    /// Bind to `source` with `back_buffer_size` bytes of unread history.
    pub fn new(source: S, back_buffer_size: usize) -> Result<Self, StreamError> {
        Ok(Self {
            source,
            ring: RingBuffer::new(back_buffer_size)?,
            pending_replay: 0,
            overflow_policy: OverflowPolicy::default(),
            log_replays: false,
            total_pulled: 0,
        })
    }

    /// Create from configuration
    pub fn with_config(source: S, config: &ReplayConfig) -> Result<Self, StreamError> {
        config.validate()?;
        let mut stream = Self::new(source, config.back_buffer_size)?;
        stream.overflow_policy = config.unread_overflow;
        stream.log_replays = config.log_replays;
        Ok(stream)
    }

    /// Fill `buf`, replaying pending bytes first and pulling the rest from the
    /// source in one batch.
    ///
    /// A count below `buf.len()` means the source ran dry. It is not an error.
    /// A source error is only returned when nothing was replayed on this call.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        let mut produced = 0;

        if self.pending_replay > 0 && !buf.is_empty() {
            let take = self.pending_replay.min(buf.len());
            let high = self.pending_replay - 1;
            let low = self.pending_replay - take;

            // Offsets high..=low come back oldest first, matching the order
            // the bytes were originally produced in.
            let replayed = self.ring.range(high as isize, low as isize)?;
            buf[..take].copy_from_slice(&replayed);
            self.pending_replay = low;
            produced = take;

            if self.log_replays {
                trace!(
                    "replayed {} bytes, {} still pending",
                    take,
                    self.pending_replay
                );
            }
        }

        if produced < buf.len() {
            let wanted = buf.len() - produced;
            let fresh = &mut buf[produced..];
            let pulled = match self.source.read_into(fresh) {
                Ok(n) => n.min(wanted),
                // Replayed bytes are already in `buf` and no longer pending.
                // Hand them over; the next call surfaces the error.
                Err(e) if produced > 0 => {
                    debug!("source error after replaying {} bytes: {}", produced, e);
                    return Ok(produced);
                }
                Err(e) => return Err(e.into()),
            };

            self.ring.extend_from_slice(&fresh[..pulled]);
            self.total_pulled += pulled as u64;
            produced += pulled;

            if pulled < wanted {
                telemetry::source_exhausted(wanted, pulled).emit();
            }
        }

        Ok(produced)
    }

    /// Fill `buf[offset..offset + length]`.
    pub fn read_at(
        &mut self,
        buf: &mut [u8],
        offset: usize,
        length: usize,
    ) -> Result<usize, StreamError> {
        let end = offset
            .checked_add(length)
            .filter(|&end| end <= buf.len())
            .ok_or(StreamError::InvalidRange {
                offset,
                length,
                buffer_len: buf.len(),
            })?;
        self.read(&mut buf[offset..end])
    }

    /// Mark the last `length` produced bytes for replay on the next read.
    ///
    /// Unreading more than the back buffer holds follows the overflow
    /// policy: `Warn` accepts it (the excess replays stale ring contents) and
    /// `Reject` fails without touching state.
    pub fn unread(&mut self, length: usize) -> Result<(), StreamError> {
        let pending = self.pending_replay.saturating_add(length);
        let capacity = self.ring.capacity();

        if pending > capacity {
            match self.overflow_policy {
                OverflowPolicy::Reject => {
                    return Err(StreamError::UnreadOverflow {
                        pending: self.pending_replay,
                        requested: length,
                        capacity,
                    });
                }
                OverflowPolicy::Warn => {
                    telemetry::unread_overflow(pending, length, capacity).emit();
                }
            }
        }

        self.pending_replay = pending;
        Ok(())
    }

    /// Close the underlying source.
    pub fn close(&mut self) -> Result<(), StreamError> {
        self.source.close()?;
        Ok(())
    }

    /// Bytes still waiting to be replayed
    pub fn pending_replay(&self) -> usize {
        self.pending_replay
    }

    /// Get back buffer capacity
    pub fn back_buffer_size(&self) -> usize {
        self.ring.capacity()
    }

    /// Bytes pulled from the source over the stream's lifetime
    pub fn total_pulled(&self) -> u64 {
        self.total_pulled
    }

    /// History of pulled bytes
    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }

    /// Borrow the source
    pub fn get_ref(&self) -> &S {
        &self.source
    }

    /// Mutably borrow the source
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Unwrap the source. Pending replay bytes are dropped.
    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S: ByteSource> Read for ReplayStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        ReplayStream::read(self, buf).map_err(io::Error::from)
    }
}
