#![no_main]

use libfuzzer_sys::fuzz_target;
use serviceability::inverted::{check_consistency, InvertedIndex};
use serviceability::Relation;

fuzz_target!(|data: &[u8]| {
    let Ok(relation) = serde_json::from_slice::<Relation>(data) else {
        return;
    };
    // Whatever decodes must re-encode to something that decodes to the same value.
    let bytes = serde_json::to_vec(&relation).unwrap();
    let again: Relation = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(again, relation);

    let inverted = InvertedIndex::build_from(&relation).into_inverted();
    assert!(check_consistency(&relation, &inverted).is_ok());
});
