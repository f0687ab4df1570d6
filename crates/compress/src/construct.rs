use crate::Compression;

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

impl Compression {
    /// Detect compression format from magic bytes.
    ///
    /// Returns `None` variant if no magic bytes match or if the input
    /// is too short to detect any format.
    #[must_use]
    pub fn from_magic_bytes(bytes: &[u8]) -> Self {
        if bytes.starts_with(&GZIP_MAGIC) {
            return Compression::Gzip;
        }
        Compression::None
    }

    /// Number of leading bytes needed by [`from_magic_bytes`](Self::from_magic_bytes).
    #[must_use]
    pub const fn magic_len() -> usize {
        GZIP_MAGIC.len()
    }
}
