//! `serviceability`: which merchants deliver to which pincodes, indexed both ways.
//!
//! The forward relation (merchant -> pincodes) and the inverted relation
//! (pincode -> merchants) are kept in memory, mutated together, and written to two JSON
//! files. The coordinator answers "who serves this pincode?" from the inverted side.
//!
//! Scope:
//! - input syntax checks (`validate`)
//! - the two maps (`relation`, `inverted`) over an insertion-ordered multimap (`listmap`)
//! - synthetic bulk data (`generate`)
//! - storage backends (`storage`), JSON snapshots and the optional insert journal
//!   (`persist`, `journal`)
//! - lifecycle and the query/insert surface (`coordinator`)
//!
//! ## Contract (what you can rely on)
//!
//! - After any successful operation on a `Ready` coordinator, both maps hold exactly the
//!   same (merchant, pincode) pairs, repeats included.
//! - Lists keep insertion order. Nothing is deduplicated.
//! - A rejected insert mutates nothing, in memory or on storage.
//! - Under the default snapshot policy, a successful insert has already rewritten both files.
//!   Under the journal policy it has been appended to the journal, and reopening replays it.
//!
//! ## Durability levels
//!
//! - [`persist::WriteMode::Direct`] truncates and rewrites in place; a crash mid-write can
//!   leave a torn file, which is reported as a decode error on the next load.
//! - [`persist::WriteMode::Atomic`] publishes through temp file + rename.
//! - [`persist::WriteMode::Durable`] also `fsync`s the file and its parent directory.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod formats;
pub mod generate;
pub mod inverted;
pub mod journal;
pub mod listmap;
pub mod persist;
pub mod relation;
pub mod sample;
pub mod storage;
pub mod validate;

pub use config::{ActivationPolicy, IndexConfig};
pub use coordinator::{IndexCoordinator, IndexStats, InsertOutcome, Phase, SearchResult};
pub use error::{ErrorClass, GenerationError, IndexError, IndexResult};
pub use generate::GenerationParams;
pub use inverted::{InvertedIndex, InvertedRelation};
pub use persist::{PersistPolicy, PersistenceGateway, WriteMode};
pub use relation::{Merchant, Pincode, Relation, RelationStore};
pub use sample::{Sample, SparseMatrix};
pub use storage::{Directory, DurableDirectory, FsDirectory, MemoryDirectory};
pub use validate::ValidationError;
