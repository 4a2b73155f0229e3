//! Index configuration: file layout, persistence, activation and generation settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, IndexResult};
use crate::formats::{
    DEFAULT_DATA_DIR, DEFAULT_INVERTED_FILE, DEFAULT_JOURNAL_FILE, DEFAULT_RELATION_FILE,
};
use crate::generate::GenerationParams;
use crate::persist::{PersistPolicy, StoragePaths, WriteMode};

/// Environment variable overriding [`IndexConfig::data_dir`].
pub const ENV_DATA_DIR: &str = "SERVICEABILITY_DATA_DIR";
/// Environment variable overriding [`IndexConfig::relation_file`].
pub const ENV_RELATION_FILE: &str = "SERVICEABILITY_RELATION_FILE";
/// Environment variable overriding [`IndexConfig::inverted_file`].
pub const ENV_INVERTED_FILE: &str = "SERVICEABILITY_INVERTED_FILE";
/// Environment variable overriding [`IndexConfig::journal_file`].
pub const ENV_JOURNAL_FILE: &str = "SERVICEABILITY_JOURNAL_FILE";

/// What `activate` does when it finds (or does not find) stored data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationPolicy {
    /// Load the stored maps; generate only if the relation file is missing.
    #[default]
    LoadOrGenerate,
    /// Always generate, overwriting stored data.
    AlwaysGenerate,
    /// Load the stored maps; a missing relation file is an error.
    LoadOnly,
}

/// Configuration for an [`IndexCoordinator`](crate::IndexCoordinator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory holding the snapshot and journal files (default: `merchants`)
    pub data_dir: PathBuf,

    /// Forward relation file name (default: `merchant.json`)
    pub relation_file: String,

    /// Inverted relation file name (default: `inverted_index.json`)
    pub inverted_file: String,

    /// Insert journal file name (default: `inserts.journal`)
    pub journal_file: String,

    /// How snapshot files are written (default: direct overwrite)
    pub write_mode: WriteMode,

    /// Snapshot-per-mutation or journal + compaction (default: snapshot)
    pub persistence: PersistPolicy,

    /// Load vs. generate on activation (default: load, generate if missing)
    pub activation: ActivationPolicy,

    /// Re-check that both loaded maps hold the same pairs (default: true)
    pub verify_on_load: bool,

    /// Parameters for bulk generation
    pub generation: GenerationParams,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            relation_file: DEFAULT_RELATION_FILE.to_string(),
            inverted_file: DEFAULT_INVERTED_FILE.to_string(),
            journal_file: DEFAULT_JOURNAL_FILE.to_string(),
            write_mode: WriteMode::default(),
            persistence: PersistPolicy::default(),
            activation: ActivationPolicy::default(),
            verify_on_load: true,
            generation: GenerationParams::default(),
        }
    }
}

impl IndexConfig {
    /// Create a new config with the given data directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Defaults with path overrides taken from the environment
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Parse a JSON config document; absent fields keep their defaults
    pub fn from_json(text: &str) -> IndexResult<Self> {
        serde_json::from_str(text).map_err(|e| IndexError::InvalidConfig(e.to_string()))
    }

    /// Override paths from `SERVICEABILITY_*` variables that are set and non-empty
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, get: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| get(key).filter(|v| !v.is_empty());
        if let Some(v) = get(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_RELATION_FILE) {
            self.relation_file = v;
        }
        if let Some(v) = get(ENV_INVERTED_FILE) {
            self.inverted_file = v;
        }
        if let Some(v) = get(ENV_JOURNAL_FILE) {
            self.journal_file = v;
        }
    }

    /// Set the data directory
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Set the relation and inverted file names
    pub fn with_files(mut self, relation: impl Into<String>, inverted: impl Into<String>) -> Self {
        self.relation_file = relation.into();
        self.inverted_file = inverted.into();
        self
    }

    /// Set the write mode
    pub fn with_write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = mode;
        self
    }

    /// Set the persistence policy
    pub fn with_persistence(mut self, policy: PersistPolicy) -> Self {
        self.persistence = policy;
        self
    }

    /// Set the activation policy
    pub fn with_activation(mut self, activation: ActivationPolicy) -> Self {
        self.activation = activation;
        self
    }

    /// Set the generation parameters
    pub fn with_generation(mut self, generation: GenerationParams) -> Self {
        self.generation = generation;
        self
    }

    /// Enable or disable the consistency check after loading
    pub fn with_verify_on_load(mut self, verify: bool) -> Self {
        self.verify_on_load = verify;
        self
    }

    /// File names as gateway paths
    pub fn storage_paths(&self) -> StoragePaths {
        StoragePaths {
            relation: self.relation_file.clone(),
            inverted: self.inverted_file.clone(),
            journal: self.journal_file.clone(),
        }
    }

    /// Reject configurations that cannot work
    ///
    /// Generation parameters are not checked here; generation reports them when it runs
    pub fn validate(&self) -> IndexResult<()> {
        let names = [
            ("relation_file", &self.relation_file),
            ("inverted_file", &self.inverted_file),
            ("journal_file", &self.journal_file),
        ];
        for (field, name) in names {
            if name.trim().is_empty() {
                return Err(IndexError::InvalidConfig(format!("{field} is empty")));
            }
        }
        for (i, (a, x)) in names.iter().enumerate() {
            for (b, y) in &names[i + 1..] {
                if x == y {
                    return Err(IndexError::InvalidConfig(format!(
                        "{a} and {b} are both {x:?}"
                    )));
                }
            }
        }
        if let PersistPolicy::Journal { compact_every: 0 } = self.persistence {
            return Err(IndexError::InvalidConfig(
                "journal compaction interval must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_conventional_layout() {
        let c = IndexConfig::default();
        assert_eq!(c.data_dir, PathBuf::from("merchants"));
        assert_eq!(c.relation_file, "merchant.json");
        assert_eq!(c.inverted_file, "inverted_index.json");
        assert_eq!(c.persistence, PersistPolicy::Snapshot);
        assert_eq!(c.write_mode, WriteMode::Direct);
        assert_eq!(c.generation.num_merchants, 10_000_000);
        assert_eq!(c.generation.num_pincodes, 30_000);
        c.validate().unwrap();
    }

    #[test]
    fn env_overrides_paths_only_when_set() {
        let vars: HashMap<&str, &str> = [
            (ENV_DATA_DIR, "/var/lib/svc"),
            (ENV_RELATION_FILE, "rel.json"),
            (ENV_INVERTED_FILE, ""),
        ]
        .into_iter()
        .collect();

        let mut c = IndexConfig::default();
        c.apply_vars(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(c.data_dir, PathBuf::from("/var/lib/svc"));
        assert_eq!(c.relation_file, "rel.json");
        assert_eq!(c.inverted_file, "inverted_index.json");
        assert_eq!(c.journal_file, "inserts.journal");
    }

    #[test]
    fn json_config_fills_missing_fields() {
        let c = IndexConfig::from_json(
            r#"{
                "data_dir": "/tmp/pins",
                "persistence": { "journal": { "compact_every": 64 } },
                "write_mode": "atomic",
                "generation": { "num_merchants": 100, "seed": 9 }
            }"#,
        )
        .unwrap();
        assert_eq!(c.data_dir, PathBuf::from("/tmp/pins"));
        assert_eq!(c.persistence, PersistPolicy::Journal { compact_every: 64 });
        assert_eq!(c.write_mode, WriteMode::Atomic);
        assert_eq!(c.generation.num_merchants, 100);
        assert_eq!(c.generation.num_pincodes, 30_000);
        assert_eq!(c.generation.seed, Some(9));
        assert_eq!(c.relation_file, "merchant.json");

        assert!(matches!(
            IndexConfig::from_json("{ not json").unwrap_err(),
            IndexError::InvalidConfig(_)
        ));
    }

    #[test]
    fn validate_rejects_bad_setups() {
        let same = IndexConfig::default().with_files("m.json", "m.json");
        assert!(same.validate().is_err());

        let empty = IndexConfig::default().with_files("", "i.json");
        assert!(empty.validate().is_err());

        let journal = IndexConfig::default()
            .with_persistence(PersistPolicy::Journal { compact_every: 0 });
        assert!(journal.validate().is_err());

        // Generation parameters are left to generation itself.
        let too_many = IndexConfig::default()
            .with_generation(GenerationParams::new(1, 1_000_000, 1, 5));
        assert!(too_many.validate().is_ok());
    }
}
