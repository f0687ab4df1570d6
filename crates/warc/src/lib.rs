//! ARC and WARC records.
//!
//! [`RecordLoader`] materializes a single record from a container range into
//! an [`ArchiveRecord`] whose payload stream is bounded to the record.
//! [`WarcRecordBuilder`] and [`MultiFileWarcWriter`] produce new records.

pub mod error;
pub mod headers;
mod loader;
mod record;
mod writer;

pub use crate::headers::{StatusAndHeaders, StatusAndHeadersParser};
pub use crate::loader::{DEFAULT_BLOCK_SIZE, RecordLoader, parse_record_stream};
pub use crate::record::{ArchiveRecord, ContainerFormat, RecordReader, RecordType};
pub use crate::writer::{MultiFileWarcWriter, RolloverSettings, WarcRecordBuilder, WrittenRecord, warc_date};
