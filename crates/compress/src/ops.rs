//! Compression Operations

use crate::Compression;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use flate2::{Compression as GzCompression, read::GzDecoder, write::GzEncoder};
use std::io::{Read, Write};
use tracing::instrument;

// Recorded containers are written once and replayed many times; favour size.
const GZIP_LEVEL: GzCompression = GzCompression::best();

impl Compression {
    /// Compress one record in memory.
    ///
    /// For [`Gzip`](Self::Gzip) the output is exactly one gzip member, which
    /// is what a container record must be so that it can be inflated on its
    /// own from its offset.
    ///
    /// # Examples
    ///
    /// ```
    /// use rewind_compress::Compression;
    ///
    /// let record = b"WARC/1.0\r\nWARC-Type: warcinfo\r\nContent-Length: 0\r\n\r\n\r\n\r\n";
    /// let member = Compression::Gzip.compress(record).unwrap();
    /// assert_eq!(Compression::from_magic_bytes(&member), Compression::Gzip);
    /// ```
    #[instrument(level = "trace", skip(input), fields(format = %self, input_size = input.len()))]
    pub fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(input.to_vec()),
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(Vec::with_capacity(input.len() / 2), GZIP_LEVEL);
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)
            },
        }
    }

    /// Inflate the first gzip member of `input`; anything after it is ignored.
    #[instrument(level = "trace", skip(input), fields(format = %self, input_size = input.len()))]
    pub fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.wrap_reader(input).read_to_end(&mut output).or_raise(|| ErrorKind::InvalidData)?;
        Ok(output)
    }

    /// Wrap a reader with the appropriate decompression layer.
    ///
    /// The returned reader is `Send` so that a record stream opened on an
    /// async task can be handed to a blocking parser thread. A gzip reader
    /// stops at the end of the first member: one record, never the next.
    pub fn wrap_reader<'a, R: Read + Send + 'a>(&self, reader: R) -> Box<dyn Read + Send + 'a> {
        match self {
            Compression::None => Box::new(reader),
            Compression::Gzip => Box::new(GzDecoder::new(reader)),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Compression;
    use rstest::rstest;
    use std::io::{Cursor, Read};

    #[rstest]
    #[case(Compression::None)]
    #[case(Compression::Gzip)]
    fn test_compress_decompress(#[case] format: Compression) {
        let original = b"WARC/1.0\r\nWARC-Type: response\r\nContent-Length: 0\r\n\r\n";
        let compressed = format.compress(original).unwrap();
        assert_eq!(format.decompress(&compressed).unwrap(), original);
    }

    #[test]
    fn test_invalid_compressed_data() {
        assert!(Compression::Gzip.decompress(b"This is not compressed data").is_err());
    }

    #[test]
    fn test_reader_stops_at_member_boundary() {
        let mut container = Compression::Gzip.compress(b"first record").unwrap();
        container.extend(Compression::Gzip.compress(b"second record").unwrap());
        let mut reader = Compression::Gzip.wrap_reader(Cursor::new(&container));
        let mut output = Vec::new();
        reader.read_to_end(&mut output).unwrap();
        assert_eq!(output, b"first record");
        assert_eq!(Compression::Gzip.decompress(&container).unwrap(), b"first record");
    }

    #[test]
    fn test_empty_member() {
        let member = Compression::Gzip.compress(b"").unwrap();
        assert_eq!(Compression::from_magic_bytes(&member), Compression::Gzip);
        assert!(Compression::Gzip.decompress(&member).unwrap().is_empty());
    }
}
