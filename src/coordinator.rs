//! Coordinator that owns both maps and the persistence gateway.
//!
//! Lifecycle: `Uninitialized -> Generated -> Ready`. Queries and inserts need `Ready`.
//! `Generated` is only observable when the first persist after generation failed; calling
//! [`IndexCoordinator::activate`] again resumes from there without regenerating.
//!
//! All state sits behind one `RwLock`, so an insert updates the relation, the inverted
//! relation and storage before any reader can look at either map.

use crate::config::{ActivationPolicy, IndexConfig};
use crate::error::{IndexError, IndexResult};
use crate::inverted::{self, InvertedIndex, InvertedRelation};
use crate::persist::PersistenceGateway;
use crate::relation::{Merchant, Relation, RelationStore};
use crate::sample::{Sample, SparseMatrix};
use crate::storage::{Directory, FsDirectory};
use crate::validate::{validate_pair, ValidationError};
use serde::Serialize;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

/// Coordinator lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Nothing loaded or generated yet.
    Uninitialized,
    /// Relation generated and inverted relation built, but not yet persisted.
    Generated,
    /// Both maps in memory and on storage; queries allowed.
    Ready,
}

/// Result of an insert that reached the validator.
///
/// Malformed input is reported here rather than as an `Err`: it is expected, and nothing
/// was mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertOutcome {
    /// True if the pair was stored.
    pub ok: bool,
    /// Why the pair was rejected.
    pub error: Option<ValidationError>,
}

impl InsertOutcome {
    fn accepted() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    fn rejected(error: ValidationError) -> Self {
        Self {
            ok: false,
            error: Some(error),
        }
    }
}

/// Answer to "which merchants serve this pincode?".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    /// True if at least one merchant serves the pincode.
    #[serde(rename = "servicable")]
    pub serviceable: bool,
    /// Serving merchants in insertion order. Empty when not serviceable.
    pub merchants: Vec<Merchant>,
}

/// Sizes of the in-memory maps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Distinct merchants.
    pub merchants: usize,
    /// Distinct pincodes with at least one merchant.
    pub pincodes: usize,
    /// Stored (merchant, pincode) entries, repeats included.
    pub pairs: usize,
}

struct State {
    phase: Phase,
    store: RelationStore,
    index: InvertedIndex,
    gateway: PersistenceGateway,
}

impl State {
    fn ensure_ready(&self, op: &str) -> IndexResult<()> {
        if self.phase == Phase::Ready {
            Ok(())
        } else {
            Err(IndexError::InvalidState(format!(
                "{op} requires an active index (phase: {:?})",
                self.phase
            )))
        }
    }

    /// Build the inverted relation from the store, persist both, and become `Ready`.
    fn build_and_persist(&mut self) -> IndexResult<()> {
        let start = Instant::now();
        self.index = InvertedIndex::build_from(self.store.snapshot());
        tracing::info!(
            pincodes = self.index.snapshot().pincode_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "built inverted index"
        );
        self.gateway
            .save_state(self.store.snapshot(), self.index.snapshot())?;
        self.phase = Phase::Ready;
        Ok(())
    }

    fn install(&mut self, relation: Relation) -> IndexResult<()> {
        self.store = RelationStore::from_relation(relation);
        self.index = InvertedIndex::new();
        self.phase = Phase::Generated;
        self.build_and_persist()
    }

    fn load(&mut self, verify: bool) -> IndexResult<()> {
        let loaded = self.gateway.load_state()?;
        if verify {
            inverted::check_consistency(&loaded.relation, &loaded.inverted)?;
        }
        self.store = RelationStore::from_relation(loaded.relation);
        self.index = InvertedIndex::from_inverted(loaded.inverted);
        self.phase = Phase::Ready;
        Ok(())
    }

    fn stats(&self) -> IndexStats {
        IndexStats {
            merchants: self.store.snapshot().merchant_count(),
            pincodes: self.index.snapshot().pincode_count(),
            pairs: self.store.snapshot().pair_count(),
        }
    }
}

/// Owns the relation store, the inverted index and the persistence gateway.
///
/// Safe to share across threads (`Arc<IndexCoordinator>`): queries take a read lock,
/// inserts and activation take the write lock.
pub struct IndexCoordinator {
    config: IndexConfig,
    state: RwLock<State>,
}

impl IndexCoordinator {
    /// Coordinator over the filesystem directory `config.data_dir` (created if missing).
    pub fn new(config: IndexConfig) -> IndexResult<Self> {
        config.validate()?;
        let dir = FsDirectory::new(&config.data_dir)?;
        Self::with_directory(config, Arc::new(dir))
    }

    /// Coordinator over an arbitrary storage backend. `config.data_dir` is ignored.
    pub fn with_directory(config: IndexConfig, dir: Arc<dyn Directory>) -> IndexResult<Self> {
        config.validate()?;
        let gateway = PersistenceGateway::new(
            dir,
            config.storage_paths(),
            config.write_mode,
            config.persistence,
        )?;
        Ok(Self {
            config,
            state: RwLock::new(State {
                phase: Phase::Uninitialized,
                store: RelationStore::new(),
                index: InvertedIndex::new(),
                gateway,
            }),
        })
    }

    /// Configuration in use.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> IndexResult<Phase> {
        Ok(self.read()?.phase)
    }

    fn read(&self) -> IndexResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| IndexError::poisoned("index state"))
    }

    fn write(&self) -> IndexResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| IndexError::poisoned("index state"))
    }

    /// Bring the index to `Ready`, following the configured [`ActivationPolicy`].
    ///
    /// Already `Ready`: no-op. `Generated` (a previous persist failed): rebuild and persist
    /// the relation already in memory. Otherwise load the stored maps, or generate a fresh
    /// relation when the policy says so. Under `LoadOrGenerate` only a missing relation file
    /// leads to generation; a missing inverted file is rebuilt from the stored relation, and a
    /// corrupt file is returned as an error. Bad generation parameters surface here as a
    /// generation error, before anything is written.
    pub fn activate(&self) -> IndexResult<()> {
        let mut guard = self.write()?;
        let state = &mut *guard;
        match state.phase {
            Phase::Ready => return Ok(()),
            Phase::Generated => {
                tracing::info!("resuming activation of generated relation");
                return state.build_and_persist();
            }
            Phase::Uninitialized => {}
        }

        let policy = self.config.activation;
        if policy != ActivationPolicy::AlwaysGenerate {
            match state.load(self.config.verify_on_load) {
                Ok(()) => {
                    tracing::info!(?policy, "activated from storage");
                    return Ok(());
                }
                Err(e) if e.is_missing() && policy == ActivationPolicy::LoadOrGenerate => {
                    tracing::info!(error = %e, "no stored index; generating");
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to load stored index");
                    return Err(e);
                }
            }
        }

        let relation = RelationStore::generate(&self.config.generation)?;
        state.install(relation)?;
        tracing::info!(?policy, "activated from generated relation");
        Ok(())
    }

    /// Activate from a caller-supplied relation instead of generating one.
    ///
    /// The relation is trusted as-is (no validation) and overwrites stored data.
    /// Fails with `InvalidState` once the index is `Ready`.
    pub fn activate_with(&self, relation: Relation) -> IndexResult<()> {
        let mut guard = self.write()?;
        if guard.phase == Phase::Ready {
            return Err(IndexError::InvalidState("index is already active".into()));
        }
        guard.install(relation)
    }

    /// Validate and store one (merchant, pincode) pair.
    ///
    /// Malformed input yields `Ok` with `ok == false` and leaves everything untouched.
    /// Accepted pairs are appended to both maps and persisted before this returns; a storage
    /// failure is returned as `Err` and, under the snapshot policy, leaves memory ahead of
    /// storage until the next successful write.
    pub fn insert(&self, merchant: &str, pincode: &str) -> IndexResult<InsertOutcome> {
        if let Err(e) = validate_pair(merchant, pincode) {
            tracing::warn!(merchant, pincode, error = %e, "rejected insert");
            return Ok(InsertOutcome::rejected(e));
        }

        let mut guard = self.write()?;
        let state = &mut *guard;
        state.ensure_ready("insert")?;

        state.gateway.log_insert(
            merchant,
            pincode,
            state.store.snapshot(),
            state.index.snapshot(),
        )?;
        state.store.insert(merchant, pincode);
        state.index.insert(merchant, pincode);
        state
            .gateway
            .commit_insert(state.store.snapshot(), state.index.snapshot())?;

        tracing::debug!(merchant, pincode, "inserted pair");
        Ok(InsertOutcome::accepted())
    }

    /// Merchants serving `pincode`. Unknown or malformed pincodes are simply not serviceable.
    pub fn search(&self, pincode: &str) -> IndexResult<SearchResult> {
        let merchants = self.lookup(pincode)?.unwrap_or_default();
        Ok(SearchResult {
            serviceable: !merchants.is_empty(),
            merchants,
        })
    }

    /// Raw inverted-index lookup: `None` when the pincode has never been inserted.
    pub fn lookup(&self, pincode: &str) -> IndexResult<Option<Vec<Merchant>>> {
        let state = self.read()?;
        state.ensure_ready("lookup")?;
        Ok(state.index.lookup(pincode).map(<[Merchant]>::to_vec))
    }

    /// The first `n` entries of each map, in stored order.
    pub fn sample(&self, n: usize) -> IndexResult<Sample> {
        let state = self.read()?;
        state.ensure_ready("sample")?;
        Ok(Sample::take(state.store.snapshot(), state.index.snapshot(), n))
    }

    /// 0/1 matrix over the first `merchants` merchants and up to `max_pincodes` of their
    /// pincodes.
    pub fn sample_matrix(
        &self,
        merchants: usize,
        max_pincodes: usize,
    ) -> IndexResult<SparseMatrix> {
        let state = self.read()?;
        state.ensure_ready("sample_matrix")?;
        Ok(SparseMatrix::from_relation(
            state.store.snapshot(),
            merchants,
            max_pincodes,
        ))
    }

    /// Map sizes.
    pub fn stats(&self) -> IndexResult<IndexStats> {
        let state = self.read()?;
        state.ensure_ready("stats")?;
        Ok(state.stats())
    }

    /// Run `f` against both maps under one read lock.
    pub fn with_snapshot<T>(
        &self,
        f: impl FnOnce(&Relation, &InvertedRelation) -> T,
    ) -> IndexResult<T> {
        let state = self.read()?;
        state.ensure_ready("with_snapshot")?;
        Ok(f(state.store.snapshot(), state.index.snapshot()))
    }

    /// Verify that both maps hold exactly the same pairs.
    pub fn check_consistency(&self) -> IndexResult<()> {
        let state = self.read()?;
        state.ensure_ready("check_consistency")?;
        inverted::check_consistency(state.store.snapshot(), state.index.snapshot())
    }

    /// Rewrite both snapshots from memory (and compact the journal, if any).
    pub fn flush(&self) -> IndexResult<()> {
        let mut guard = self.write()?;
        let state = &mut *guard;
        state.ensure_ready("flush")?;
        state
            .gateway
            .save_state(state.store.snapshot(), state.index.snapshot())
    }

    /// Flush if active, then drop the coordinator.
    pub fn close(self) -> IndexResult<()> {
        let mut state = self
            .state
            .into_inner()
            .map_err(|_| IndexError::poisoned("index state"))?;
        if state.phase == Phase::Ready {
            let stats = state.stats();
            state
                .gateway
                .save_state(state.store.snapshot(), state.index.snapshot())?;
            tracing::info!(
                merchants = stats.merchants,
                pincodes = stats.pincodes,
                "closed index"
            );
        }
        Ok(())
    }
}
