//! Append-only insert journal.
//!
//! Used by the journal persistence policy: every accepted insert becomes one record, and the
//! JSON snapshots are only rewritten on compaction.
//!
//! ## Layout (must not change without a format bump)
//!
//! - **Header**: `[JOURNAL_MAGIC][FORMAT_VERSION:u32][relation_crc:u32][inverted_crc:u32]`
//!   (little-endian). The two CRCs identify the exact snapshot bytes the records apply on top of.
//! - **Record**: `len:u32 | crc32:u32 | payload`, payload is a postcard [`JournalEntry`],
//!   checksum is `crc32fast` over the payload.
//! - **Limits**: payload length is capped at `MAX_RECORD_BYTES`.
//!
//! ## Recovery posture
//!
//! `BestEffort` stops cleanly at a torn final record (crash mid-append). A complete record
//! with a bad checksum is always an error.

use crate::error::{IndexError, IndexResult};
use crate::formats::{FORMAT_VERSION, JOURNAL_MAGIC};
use crate::storage::{self, Directory};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};

/// Entries are two short strings; anything bigger is corruption.
const MAX_RECORD_BYTES: u32 = 64 * 1024;

/// One accepted insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Merchant id.
    pub merchant: String,
    /// Pincode.
    pub pincode: String,
}

impl JournalEntry {
    /// Entry for `(merchant, pincode)`.
    pub fn new(merchant: &str, pincode: &str) -> Self {
        Self {
            merchant: merchant.to_string(),
            pincode: pincode.to_string(),
        }
    }
}

/// Fixed-size journal header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalHeader {
    /// CRC32 of the relation snapshot bytes this journal extends.
    pub relation_crc: u32,
    /// CRC32 of the inverted snapshot bytes this journal extends.
    pub inverted_crc: u32,
}

impl JournalHeader {
    /// Serialized header size in bytes.
    pub const SIZE: usize = 4 + 4 + 4 + 4;

    /// Write the header to a stream.
    pub fn write<W: Write>(&self, w: &mut W) -> IndexResult<()> {
        w.write_all(&JOURNAL_MAGIC)?;
        w.write_u32::<LittleEndian>(FORMAT_VERSION)?;
        w.write_u32::<LittleEndian>(self.relation_crc)?;
        w.write_u32::<LittleEndian>(self.inverted_crc)?;
        Ok(())
    }

    /// Read and check the header from a stream.
    pub fn read<R: Read + ?Sized>(r: &mut R) -> IndexResult<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if magic != JOURNAL_MAGIC {
            return Err(IndexError::Format("invalid journal magic".into()));
        }
        let version = r.read_u32::<LittleEndian>()?;
        if version != FORMAT_VERSION {
            return Err(IndexError::Format(format!(
                "journal version mismatch (expected {FORMAT_VERSION}, got {version})"
            )));
        }
        Ok(Self {
            relation_crc: r.read_u32::<LittleEndian>()?,
            inverted_crc: r.read_u32::<LittleEndian>()?,
        })
    }

    fn to_bytes(self) -> IndexResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        self.write(&mut buf)?;
        Ok(buf)
    }
}

/// How to treat a damaged tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Any truncation is an error.
    Strict,
    /// A truncated final record is dropped.
    BestEffort,
}

/// Decoded journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalContents {
    /// Header CRCs.
    pub header: JournalHeader,
    /// Complete, checksum-valid entries in append order.
    pub entries: Vec<JournalEntry>,
    /// True if a partial final record was dropped.
    pub torn_tail: bool,
}

/// Appends entries to a journal file.
pub struct JournalWriter {
    dir: Arc<dyn Directory>,
    path: String,
    header_checked: bool,
    w: Option<Mutex<Box<dyn Write + Send>>>,
    sync: bool,
    appended: u64,
    needs_reset: bool,
}

impl JournalWriter {
    /// Writer for `path`. An existing journal is appended to after its header is checked.
    pub fn new(dir: impl Into<Arc<dyn Directory>>, path: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            path: path.into(),
            header_checked: false,
            w: None,
            sync: false,
            appended: 0,
            needs_reset: false,
        }
    }

    /// `fsync` the journal after every append (needs a filesystem-backed directory).
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// Path of the journal file.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Entries appended through this writer since it was created or last reset.
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// True after a failed append: the file may end in a partial record, so nothing more
    /// may be appended until [`reset`](Self::reset) or [`remove`](Self::remove).
    pub fn needs_reset(&self) -> bool {
        self.needs_reset
    }

    /// Replace the journal with an empty one extending the given snapshots.
    pub fn reset(&mut self, header: JournalHeader) -> IndexResult<()> {
        self.w = None;
        self.dir.atomic_write(&self.path, &header.to_bytes()?)?;
        if self.sync {
            storage::sync_file(&*self.dir, &self.path)?;
            storage::sync_parent_dir(&*self.dir, &self.path)?;
        }
        self.header_checked = true;
        self.needs_reset = false;
        self.appended = 0;
        Ok(())
    }

    /// Delete the journal file.
    pub fn remove(&mut self) -> IndexResult<()> {
        self.w = None;
        self.header_checked = false;
        self.appended = 0;
        self.dir.delete(&self.path)?;
        self.needs_reset = false;
        Ok(())
    }

    fn ensure_header(&mut self) -> IndexResult<()> {
        if self.header_checked {
            return Ok(());
        }
        if !self.dir.exists(&self.path) {
            return Err(IndexError::InvalidState(format!(
                "journal {} has no header; reset it before appending",
                self.path
            )));
        }
        let mut r = self.dir.open_file(&self.path)?;
        JournalHeader::read(&mut *r)?;
        self.header_checked = true;
        Ok(())
    }

    /// Append one entry and flush it (and `fsync` when enabled) before returning.
    ///
    /// Any failure once bytes may have reached the file sets [`needs_reset`](Self::needs_reset).
    pub fn append(&mut self, entry: &JournalEntry) -> IndexResult<()> {
        if self.needs_reset {
            return Err(IndexError::InvalidState(format!(
                "journal {} may end in a partial record; reset it before appending",
                self.path
            )));
        }
        self.ensure_header()?;
        let payload =
            postcard::to_allocvec(entry).map_err(|e| IndexError::Encode(e.to_string()))?;
        let len = u32::try_from(payload.len())
            .ok()
            .filter(|&n| n <= MAX_RECORD_BYTES)
            .ok_or_else(|| {
                IndexError::Format(format!(
                    "journal record too large: {} bytes (max {MAX_RECORD_BYTES})",
                    payload.len()
                ))
            })?;

        let mut frame = Vec::with_capacity(8 + payload.len());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        frame.extend_from_slice(&payload);

        if let Err(e) = self.write_frame(&frame) {
            self.w = None;
            self.needs_reset = true;
            tracing::warn!(path = %self.path, error = %e, "journal append failed");
            return Err(e);
        }
        self.appended += 1;
        Ok(())
    }

    fn write_frame(&mut self, frame: &[u8]) -> IndexResult<()> {
        if self.w.is_none() {
            self.w = Some(Mutex::new(self.dir.append_file(&self.path)?));
        }
        if let Some(w) = self.w.as_mut().map(|m| m.get_mut().unwrap_or_else(|e| e.into_inner())) {
            w.write_all(frame)?;
            w.flush()?;
        }
        if self.sync {
            storage::sync_file(&*self.dir, &self.path)?;
        }
        Ok(())
    }
}

/// Reads a journal file.
pub struct JournalReader {
    dir: Arc<dyn Directory>,
    path: String,
}

impl JournalReader {
    /// Reader for `path`.
    pub fn new(dir: impl Into<Arc<dyn Directory>>, path: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            path: path.into(),
        }
    }

    /// Read the whole journal. `Ok(None)` if there is no journal.
    ///
    /// In `BestEffort` mode a file too short to hold a header also counts as no journal
    /// (crash while creating it).
    pub fn read(&self, mode: ReadMode) -> IndexResult<Option<JournalContents>> {
        if !self.dir.exists(&self.path) {
            return Ok(None);
        }
        let bytes = storage::read_all(&*self.dir, &self.path)?;
        if bytes.len() < JournalHeader::SIZE && mode == ReadMode::BestEffort {
            return Ok(None);
        }
        parse(&bytes, mode).map(Some)
    }
}

/// Decode journal bytes.
pub fn parse(bytes: &[u8], mode: ReadMode) -> IndexResult<JournalContents> {
    let mut r = std::io::Cursor::new(bytes);
    let header = JournalHeader::read(&mut r)?;
    let mut entries = Vec::new();
    let mut torn_tail = false;
    loop {
        match next_record(&mut r)? {
            Frame::End => break,
            Frame::Torn => {
                if mode == ReadMode::Strict {
                    return Err(IndexError::Format("journal ends in a torn record".into()));
                }
                torn_tail = true;
                break;
            }
            Frame::Record(payload) => {
                let entry: JournalEntry = postcard::from_bytes(&payload)
                    .map_err(|e| IndexError::Decode(e.to_string()))?;
                entries.push(entry);
            }
        }
    }
    Ok(JournalContents {
        header,
        entries,
        torn_tail,
    })
}

enum Frame {
    End,
    Torn,
    Record(Vec<u8>),
}

fn next_record(r: &mut std::io::Cursor<&[u8]>) -> IndexResult<Frame> {
    let remaining = r.get_ref().len() as u64 - r.position();
    if remaining == 0 {
        return Ok(Frame::End);
    }
    if remaining < 8 {
        return Ok(Frame::Torn);
    }
    let len = r.read_u32::<LittleEndian>()?;
    if len > MAX_RECORD_BYTES {
        return Err(IndexError::Format(format!(
            "journal record length too large: {len} (max {MAX_RECORD_BYTES})"
        )));
    }
    let expected = r.read_u32::<LittleEndian>()?;
    if remaining - 8 < u64::from(len) {
        return Ok(Frame::Torn);
    }
    let mut payload = vec![0u8; len as usize];
    r.read_exact(&mut payload)?;
    let actual = crc32fast::hash(&payload);
    if actual != expected {
        return Err(IndexError::CrcMismatch { expected, actual });
    }
    Ok(Frame::Record(payload))
}
