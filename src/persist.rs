//! Persistence gateway: JSON snapshots of both maps, plus the optional insert journal.
//!
//! Each map is stored in its own file as `{ "<key>": ["<v1>", ...], ... }` with keys in stored
//! order. There is no checksum or version field inside the JSON files.
//!
//! Two policies:
//! - [`PersistPolicy::Snapshot`]: every mutation rewrites both files.
//! - [`PersistPolicy::Journal`]: inserts are appended to a CRC-framed journal and the files
//!   are rewritten every `compact_every` inserts (compaction).
//!
//! Journal replay rule: the journal header records the CRC32 of the snapshot bytes it extends.
//! On load, records are applied to a file's map only if that file's CRC still matches. A
//! mismatch means compaction already rewrote that file before a crash, so the records are in it.

use crate::error::{IndexError, IndexResult};
use crate::formats::{DEFAULT_INVERTED_FILE, DEFAULT_JOURNAL_FILE, DEFAULT_RELATION_FILE};
use crate::inverted::{InvertedIndex, InvertedRelation};
use crate::journal::{JournalEntry, JournalHeader, JournalReader, JournalWriter, ReadMode};
use crate::relation::Relation;
use crate::storage::{self, Directory, DurableDirectory};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;

/// How snapshot files are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Truncate and overwrite in place. A crash mid-write can leave a torn file.
    #[default]
    Direct,
    /// Temp file + rename; readers see the old or the new file.
    Atomic,
    /// Like `Atomic`, plus `fsync` of file and parent directory. Filesystem backends only.
    Durable,
}

/// When mutations reach the snapshot files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistPolicy {
    /// Rewrite both snapshots after every mutation.
    #[default]
    Snapshot,
    /// Journal each insert; rewrite snapshots every `compact_every` inserts.
    Journal {
        /// Inserts between compactions (at least 1).
        compact_every: u64,
    },
}

/// Relative paths of the three files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    /// Forward relation snapshot.
    pub relation: String,
    /// Inverted relation snapshot.
    pub inverted: String,
    /// Insert journal.
    pub journal: String,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self {
            relation: DEFAULT_RELATION_FILE.to_string(),
            inverted: DEFAULT_INVERTED_FILE.to_string(),
            journal: DEFAULT_JOURNAL_FILE.to_string(),
        }
    }
}

/// Both maps as reloaded from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedState {
    /// Forward relation.
    pub relation: Relation,
    /// Inverted relation.
    pub inverted: InvertedRelation,
    /// Journal records found on top of the snapshots.
    pub replayed: usize,
}

/// Reads and writes the durable form of both maps.
pub struct PersistenceGateway {
    dir: Arc<dyn Directory>,
    paths: StoragePaths,
    write_mode: WriteMode,
    policy: PersistPolicy,
    journal: JournalWriter,
}

impl PersistenceGateway {
    /// Gateway over `dir`.
    ///
    /// Fails with `InvalidConfig` for a zero compaction interval and with `NotSupported`
    /// for `Durable` writes on a backend without filesystem paths.
    pub fn new(
        dir: impl Into<Arc<dyn Directory>>,
        paths: StoragePaths,
        write_mode: WriteMode,
        policy: PersistPolicy,
    ) -> IndexResult<Self> {
        let dir = dir.into();
        if let PersistPolicy::Journal { compact_every: 0 } = policy {
            return Err(IndexError::InvalidConfig(
                "journal compaction interval must be at least 1".into(),
            ));
        }
        if write_mode == WriteMode::Durable && dir.file_path(&paths.relation).is_none() {
            return Err(IndexError::NotSupported(
                "durable writes require a filesystem-backed directory".into(),
            ));
        }
        let journal = JournalWriter::new(dir.clone(), paths.journal.clone())
            .with_sync(write_mode == WriteMode::Durable);
        Ok(Self {
            dir,
            paths,
            write_mode,
            policy,
            journal,
        })
    }

    /// Snapshot-policy gateway with direct writes and default file names.
    pub fn with_defaults(dir: impl Into<Arc<dyn Directory>>) -> IndexResult<Self> {
        Self::new(
            dir,
            StoragePaths::default(),
            WriteMode::default(),
            PersistPolicy::default(),
        )
    }

    /// File paths in use.
    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Active policy.
    pub fn policy(&self) -> PersistPolicy {
        self.policy
    }

    /// Serialize `value` as JSON to `path`, returning the CRC32 of the bytes written.
    pub fn save<T: Serialize>(&self, value: &T, path: &str) -> IndexResult<u32> {
        let bytes = serde_json::to_vec(value).map_err(|e| IndexError::Encode(e.to_string()))?;
        self.write_bytes(path, &bytes)?;
        tracing::debug!(path, bytes = bytes.len(), "wrote snapshot");
        Ok(crc32fast::hash(&bytes))
    }

    /// Load a JSON map from `path`.
    ///
    /// A missing file is reported as such (see [`IndexError::is_missing`]); unreadable or
    /// malformed contents are `Decode` errors.
    pub fn load<T: DeserializeOwned>(&self, path: &str) -> IndexResult<T> {
        self.load_with_crc(path).map(|(v, _)| v)
    }

    fn load_with_crc<T: DeserializeOwned>(&self, path: &str) -> IndexResult<(T, u32)> {
        let bytes = storage::read_all(&*self.dir, path)?;
        let value = serde_json::from_slice(&bytes)
            .map_err(|e| IndexError::Decode(format!("{path}: {e}")))?;
        Ok((value, crc32fast::hash(&bytes)))
    }

    fn write_bytes(&self, path: &str, bytes: &[u8]) -> IndexResult<()> {
        match self.write_mode {
            WriteMode::Direct => {
                let mut w = self.dir.create_file(path)?;
                w.write_all(bytes)?;
                w.flush()?;
                Ok(())
            }
            WriteMode::Atomic => self.dir.atomic_write(path, bytes),
            WriteMode::Durable => self.dir.atomic_write_durable(path, bytes),
        }
    }

    /// Write both snapshots, then bring the journal in line with them.
    ///
    /// Under the journal policy the journal is reset to extend the new files; under the
    /// snapshot policy any journal is removed.
    pub fn save_state(
        &mut self,
        relation: &Relation,
        inverted: &InvertedRelation,
    ) -> IndexResult<()> {
        let relation_crc = self.save(relation, &self.paths.relation)?;
        let inverted_crc = self.save(inverted, &self.paths.inverted)?;
        match self.policy {
            PersistPolicy::Journal { .. } => self.journal.reset(JournalHeader {
                relation_crc,
                inverted_crc,
            })?,
            PersistPolicy::Snapshot => {
                if self.dir.exists(&self.paths.journal) {
                    self.journal.remove()?;
                }
            }
        }
        tracing::info!(
            relation = %self.paths.relation,
            inverted = %self.paths.inverted,
            merchants = relation.merchant_count(),
            pincodes = inverted.pincode_count(),
            "persisted snapshots"
        );
        Ok(())
    }

    /// Load both snapshots and replay the journal on top.
    ///
    /// The relation file is required. A missing inverted file is rebuilt from the relation
    /// (after replay) and written back. If the journal held records, was torn, or no longer
    /// matches one of the files, the merged state is written back at once so the journal again
    /// extends the current files.
    pub fn load_state(&mut self) -> IndexResult<LoadedState> {
        let (mut relation, relation_crc) =
            self.load_with_crc::<Relation>(&self.paths.relation)?;
        let (mut inverted, inverted_crc) =
            match self.load_with_crc::<InvertedRelation>(&self.paths.inverted) {
                Ok((inverted, crc)) => (Some(inverted), Some(crc)),
                Err(e) if e.is_missing() => {
                    tracing::warn!(
                        path = %self.paths.inverted,
                        "inverted snapshot missing; rebuilding it from the relation"
                    );
                    (None, None)
                }
                Err(e) => return Err(e),
            };

        let reader = JournalReader::new(self.dir.clone(), self.paths.journal.clone());
        let journal = reader.read(ReadMode::BestEffort)?;
        let mut replayed = 0;
        let mut compact = false;
        if let Some(journal) = &journal {
            let apply_relation = journal.header.relation_crc == relation_crc;
            let apply_inverted = inverted_crc == Some(journal.header.inverted_crc);
            if !apply_relation || (!apply_inverted && inverted.is_some()) {
                tracing::warn!(
                    apply_relation,
                    apply_inverted,
                    records = journal.entries.len(),
                    "journal predates a snapshot; skipping it for that file"
                );
            }
            for JournalEntry { merchant, pincode } in &journal.entries {
                if apply_relation {
                    relation.insert(merchant, pincode);
                }
                if let (true, Some(inverted)) = (apply_inverted, inverted.as_mut()) {
                    inverted.insert(merchant, pincode);
                }
            }
            replayed = journal.entries.len();
            compact = replayed > 0
                || journal.torn_tail
                || !apply_relation
                || !apply_inverted
                || self.policy == PersistPolicy::Snapshot;
            if compact {
                tracing::info!(replayed, torn_tail = journal.torn_tail, "compacting journal");
            }
        }

        let rebuilt = inverted.is_none();
        let inverted = match inverted {
            Some(inverted) => inverted,
            None => InvertedIndex::build_from(&relation).into_inverted(),
        };

        if compact || rebuilt {
            self.save_state(&relation, &inverted)?;
        } else if let (None, PersistPolicy::Journal { .. }, Some(inverted_crc)) =
            (&journal, self.policy, inverted_crc)
        {
            self.journal.reset(JournalHeader {
                relation_crc,
                inverted_crc,
            })?;
        }

        tracing::info!(
            merchants = relation.merchant_count(),
            pincodes = inverted.pincode_count(),
            replayed,
            "loaded snapshots"
        );
        Ok(LoadedState {
            relation,
            inverted,
            replayed,
        })
    }

    /// Durable pre-write for an insert that is about to be applied in memory.
    ///
    /// Appends to the journal under the journal policy; does nothing under the snapshot policy.
    /// `relation` and `inverted` are the maps as they are before the insert. If an earlier
    /// append failed and may have left a partial record, they are compacted first so the new
    /// record lands in a clean journal.
    pub fn log_insert(
        &mut self,
        merchant: &str,
        pincode: &str,
        relation: &Relation,
        inverted: &InvertedRelation,
    ) -> IndexResult<()> {
        if let PersistPolicy::Journal { .. } = self.policy {
            if self.journal.needs_reset() {
                tracing::info!("compacting after failed journal append");
                self.save_state(relation, inverted)?;
            }
            self.journal.append(&JournalEntry::new(merchant, pincode))?;
        }
        Ok(())
    }

    /// Post-write for an insert that has been applied in memory.
    ///
    /// Rewrites both snapshots under the snapshot policy, or when the journal reached its
    /// compaction interval.
    pub fn commit_insert(
        &mut self,
        relation: &Relation,
        inverted: &InvertedRelation,
    ) -> IndexResult<()> {
        match self.policy {
            PersistPolicy::Snapshot => self.save_state(relation, inverted),
            PersistPolicy::Journal { compact_every } => {
                if self.journal.appended() >= compact_every {
                    self.save_state(relation, inverted)
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Whether both snapshot files exist.
    pub fn has_snapshots(&self) -> bool {
        self.dir.exists(&self.paths.relation) && self.dir.exists(&self.paths.inverted)
    }
}
