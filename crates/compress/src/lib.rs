//! Compression handling for archive containers.
//!
//! ARC and WARC containers are almost always stored as a concatenation of
//! gzip members, one member per record, so that any record can be read by
//! seeking to its offset and inflating a single member. Some collections keep
//! plain (uncompressed) containers instead. This crate hides the difference
//! behind the [`Compression`] enum:
//!
//! - **Format detection** from magic bytes ([`Compression::from_magic_bytes`])
//! - **In-memory** compression/decompression ([`Compression::compress`],
//!   [`Compression::decompress`]), used to produce one gzip member per record
//! - **Streaming** decompression via [`Compression::wrap_reader`]
//! - **Sniffing** a raw range via [`PeekableReader`]: peek at the magic bytes
//!   without losing them, then stream the decompressed record onwards
//!   ([`Compression::sniff_reader`]).

mod construct;
pub mod error;
mod ops;
mod peekable;
mod util;

pub use crate::peekable::PeekableReader;

/// A supported container compression format.
///
/// Defaults to [`None`](Self::None) (uncompressed).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Uncompressed
    #[default]
    None,
    /// Gzip compression (.gz), one member per record
    Gzip,
}
