//! Peekable reader for sniffing the start of a container range.
//!
//! Thin convenience wrapper around standard library I/O primitives
//! ([`Read::take`], [`Cursor`], [`Chain`]) for the peek-decide-stream pattern.

use crate::Compression;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::io::{Chain, Cursor, Read};

/// A resumable [`Read`]er for peek-decide-stream workflows.
///
/// Read enough raw data to inspect (e.g., gzip magic bytes at a record
/// offset), then stream the full content onward via
/// [`into_reader`](Self::into_reader) without re-reading the range.
pub struct PeekableReader<R> {
    inner: R,
    buffer: Vec<u8>,
}

impl<R: Read> PeekableReader<R> {
    /// Wrap any reader for peeking.
    pub fn new(inner: R) -> Self {
        Self { inner, buffer: Vec::new() }
    }

    /// Read up to `limit` bytes of the content.
    ///
    /// Successive calls do not accumulate:
    /// - `peek(2)` puts 2 bytes in the buffer, returns 2 bytes
    /// - `peek(8)` puts an additional 6 bytes in the buffer, returns 8 bytes
    /// - `peek(4)` immediately returns 4 bytes (because buffer already has 8)
    pub fn peek(&mut self, limit: usize) -> Result<&[u8]> {
        if self.buffer.len() >= limit {
            return Ok(&self.buffer[..limit]);
        }
        let needed = (limit - self.buffer.len()) as u64;
        (&mut self.inner).take(needed).read_to_end(&mut self.buffer).or_raise(|| ErrorKind::Io)?;
        Ok(&self.buffer[..self.buffer.len().min(limit)])
    }

    /// Convert into a [`Read`]er that replays the buffered head, then
    /// streams the remaining input.
    pub fn into_reader(self) -> Chain<Cursor<Vec<u8>>, R> {
        Cursor::new(self.buffer).chain(self.inner)
    }
}

impl Compression {
    /// Detect the compression of a raw container range from its magic bytes
    /// and return a reader yielding the decompressed record.
    ///
    /// An empty range is reported as [`Compression::None`] and yields nothing.
    ///
    /// # Example
    ///
    /// ```
    /// use rewind_compress::Compression;
    /// use std::io::{Cursor, Read};
    ///
    /// let member = Compression::Gzip.compress(b"WARC/1.0\r\n").unwrap();
    /// let (format, mut reader) = Compression::sniff_reader(Cursor::new(member)).unwrap();
    /// assert_eq!(format, Compression::Gzip);
    ///
    /// let mut record = Vec::new();
    /// reader.read_to_end(&mut record).unwrap();
    /// assert_eq!(record, b"WARC/1.0\r\n");
    /// ```
    pub fn sniff_reader<'a, R: Read + Send + 'a>(reader: R) -> Result<(Compression, Box<dyn Read + Send + 'a>)> {
        let mut peekable = PeekableReader::new(reader);
        let format = Compression::from_magic_bytes(peekable.peek(Compression::magic_len())?);
        tracing::trace!(%format, "detected container compression");
        Ok((format, format.wrap_reader(peekable.into_reader())))
    }
}
