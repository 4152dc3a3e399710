//! Byte Sources
//!
//! The pull interface a replay stream reads fresh bytes through. A source may
//! hand back fewer bytes than asked for; a replay stream treats a short pull
//! as end of data.

use std::io::{self, ErrorKind, Read};

/// External byte producer
pub trait ByteSource {
    /// Fill up to `buf.len()` bytes, returning how many were written.
    fn read_into(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Release the source's resources.
    fn close(&mut self) -> io::Result<()>;
}

/// Lets a stream borrow its source instead of owning it.
impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read_into(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_into(buf)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read_into(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_into(buf)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// Adapts any `io::Read` into a [`ByteSource`].
///
/// A plain reader may return short counts mid-stream (pipes, sockets), so
/// `read_into` keeps reading until the slice is full or the reader hits EOF.
/// That way a short result really does mean end of data.
#[derive(Debug)]
pub struct ReaderSource<R> {
    reader: Option<R>,
}

impl<R: Read> ReaderSource<R> {
    /// Wrap a reader
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
        }
    }

    /// Whether `close()` has been called
    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }

    /// Take the reader back, unless already closed.
    pub fn into_inner(self) -> Option<R> {
        self.reader
    }
}

impl<R: Read> ByteSource for ReaderSource<R> {
    fn read_into(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(0);
        };

        let mut filled = 0;
        while filled < buf.len() {
            match reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn close(&mut self) -> io::Result<()> {
        self.reader = None;
        Ok(())
    }
}

/// In-memory source over owned bytes.
///
/// Tracks how much has been pulled and whether it was closed, which makes it
/// handy for checking that replayed bytes are never re-requested.
#[derive(Debug, Clone, Default)]
pub struct SliceSource {
    data: Vec<u8>,
    position: usize,
    /// Cap on bytes handed out per `read_into` call (0 = no cap)
    max_chunk: usize,
    closed: bool,
}

impl SliceSource {
    /// Create over `data`, unchunked
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    /// Hand out at most `max_chunk` bytes per pull.
    pub fn with_max_chunk(mut self, max_chunk: usize) -> Self {
        self.max_chunk = max_chunk;
        self
    }

    /// Bytes handed out so far
    pub fn pulled(&self) -> usize {
        self.position
    }

    /// Bytes not yet handed out
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Whether `close()` has been called
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl ByteSource for SliceSource {
    fn read_into(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Ok(0);
        }
        let mut n = buf.len().min(self.remaining());
        if self.max_chunk > 0 {
            n = n.min(self.max_chunk);
        }
        buf[..n].copy_from_slice(&self.data[self.position..self.position + n]);
        self.position += n;
        Ok(n)
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        Ok(())
    }
}
