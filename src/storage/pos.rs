//! Position-tracking I/O wrappers.
//!
//! [`ReaderWithPos`] and [`WriterWithPos`] wrap a seekable handle and cache
//! the logical offset of the next sequential read/write, so the segment code
//! can snapshot `pos()` without a syscall after every transfer. The counter
//! advances by the number of bytes actually moved, so short reads and short
//! writes are accounted for exactly. Errors from the underlying handle are
//! surfaced unchanged.

use std::io::{self, Read, Seek, SeekFrom, Write};

/// Readable handle with a cached logical position.
#[derive(Debug)]
pub struct ReaderWithPos<R: Read + Seek> {
    inner: R,
    pos: u64,
}

impl<R: Read + Seek> ReaderWithPos<R> {
    /// Wrap `inner`, picking up its current stream position.
    pub fn new(mut inner: R) -> io::Result<Self> {
        let pos = inner.stream_position()?;
        Ok(Self { inner, pos })
    }

    /// Logical offset of the next sequential read. O(1), no syscall.
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Read exactly `buf.len()` bytes starting at `offset`, without moving
    /// the logical position.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        let res = self.inner.read_exact(buf);
        let back = self.inner.seek(SeekFrom::Start(self.pos));
        res?;
        back?;
        Ok(())
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }
}

impl<R: Read + Seek> Read for ReaderWithPos<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R: Read + Seek> Seek for ReaderWithPos<R> {
    fn seek(&mut self, to: SeekFrom) -> io::Result<u64> {
        self.pos = self.inner.seek(to)?;
        Ok(self.pos)
    }
}

/// Writable handle with a cached logical position.
#[derive(Debug)]
pub struct WriterWithPos<W: Write + Seek> {
    inner: W,
    pos: u64,
}

impl<W: Write + Seek> WriterWithPos<W> {
    /// Wrap `inner`, picking up its current stream position.
    pub fn new(mut inner: W) -> io::Result<Self> {
        let pos = inner.stream_position()?;
        Ok(Self { inner, pos })
    }

    /// Logical offset of the next sequential write. O(1), no syscall.
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Write all of `buf` at `offset`, without moving the logical position.
    pub fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        let res = self.inner.write_all(buf);
        let back = self.inner.seek(SeekFrom::Start(self.pos));
        res?;
        back?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }
}

impl<W: Write + Seek> Write for WriterWithPos<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write + Seek> Seek for WriterWithPos<W> {
    fn seek(&mut self, to: SeekFrom) -> io::Result<u64> {
        self.pos = self.inner.seek(to)?;
        Ok(self.pos)
    }
}
