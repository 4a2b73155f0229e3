//! On-disk format constants.

/// Magic bytes at the start of an insert journal.
pub const JOURNAL_MAGIC: [u8; 4] = *b"SVJL";
/// Current journal format version.
pub const FORMAT_VERSION: u32 = 1;

/// Default name of the forward relation snapshot.
pub const DEFAULT_RELATION_FILE: &str = "merchant.json";
/// Default name of the inverted relation snapshot.
pub const DEFAULT_INVERTED_FILE: &str = "inverted_index.json";
/// Default name of the insert journal.
pub const DEFAULT_JOURNAL_FILE: &str = "inserts.journal";
/// Default data directory.
pub const DEFAULT_DATA_DIR: &str = "merchants";
