#![no_main]

use libfuzzer_sys::fuzz_target;
use serviceability::journal::{JournalReader, ReadMode};
use serviceability::storage::{Directory, MemoryDirectory};
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    let dir: Arc<dyn Directory> = Arc::new(MemoryDirectory::new());
    // Put arbitrary bytes under the journal path.
    dir.atomic_write("inserts.journal", data).ok();
    let r = JournalReader::new(dir, "inserts.journal");
    let strict = r.read(ReadMode::Strict);
    let best = r.read(ReadMode::BestEffort);
    // Anything strict accepts, best-effort must accept identically.
    if let Ok(Some(s)) = strict {
        assert_eq!(best.ok().flatten(), Some(s));
    }
});
