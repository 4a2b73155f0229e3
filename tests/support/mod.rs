//! Shared helpers for integration tests.
#![allow(dead_code)]

mod faulty_directory;

pub use faulty_directory::{FaultConfig, FaultyDirectory};

use serviceability::{GenerationParams, IndexConfig};

/// Install a test-friendly subscriber once; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Config with a small, seeded generation so tests stay fast and repeatable.
pub fn small_config(seed: u64) -> IndexConfig {
    IndexConfig::default().with_generation(GenerationParams::new(40, 120, 1, 4).with_seed(seed))
}
