//! Inverted relation: pincode -> merchants serving it.
//!
//! Derived from [`Relation`]. A merchant appears in a pincode's list once per recorded
//! (merchant, pincode) pair, so the two maps carry exactly the same pair multiset.

use crate::error::{IndexError, IndexResult};
use crate::listmap::ListMap;
use crate::relation::{Merchant, Pincode, Relation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Pincode -> ordered list of merchants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvertedRelation(ListMap);

impl InvertedRelation {
    /// Empty inverted relation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `merchant` to `pincode`'s list.
    pub fn insert(&mut self, merchant: &str, pincode: &str) {
        self.0.push(pincode, merchant);
    }

    /// Merchants recorded for `pincode`.
    pub fn merchants(&self, pincode: &str) -> Option<&[Merchant]> {
        self.0.get(pincode)
    }

    /// Occurrences of `merchant` in `pincode`'s list.
    pub fn count(&self, pincode: &str, merchant: &str) -> usize {
        self.0.count(pincode, merchant)
    }

    /// Number of distinct pincodes.
    pub fn pincode_count(&self) -> usize {
        self.0.len()
    }

    /// Number of recorded pairs, counting repeats.
    pub fn pair_count(&self) -> usize {
        self.0.value_count()
    }

    /// True if no pincode is recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(pincode, merchants)` in stored order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Merchant])> + '_ {
        self.0.iter()
    }
}

impl FromIterator<(Pincode, Vec<Merchant>)> for InvertedRelation {
    fn from_iter<I: IntoIterator<Item = (Pincode, Vec<Merchant>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Owner of the inverted relation.
#[derive(Debug, Default)]
pub struct InvertedIndex {
    index: InvertedRelation,
}

impl InvertedIndex {
    /// Index with no pincodes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing inverted relation (e.g. loaded from storage).
    pub fn from_inverted(index: InvertedRelation) -> Self {
        Self { index }
    }

    /// Full rebuild: walk merchants in stored order and each merchant's pincodes in stored
    /// order, appending the merchant to each pincode's list.
    pub fn build_from(relation: &Relation) -> Self {
        let mut index = InvertedRelation::new();
        for (merchant, pincodes) in relation.iter() {
            for pincode in pincodes {
                index.insert(merchant, pincode);
            }
        }
        Self { index }
    }

    /// Incremental update for one forward insert.
    pub fn insert(&mut self, merchant: &str, pincode: &str) {
        self.index.insert(merchant, pincode);
    }

    /// Merchants serving `pincode`, or `None` if the pincode was never recorded.
    pub fn lookup(&self, pincode: &str) -> Option<&[Merchant]> {
        self.index.merchants(pincode)
    }

    /// Read-only view of the inverted relation.
    pub fn snapshot(&self) -> &InvertedRelation {
        &self.index
    }

    /// Give up ownership of the inverted relation.
    pub fn into_inverted(self) -> InvertedRelation {
        self.index
    }
}

/// Verify that `inverted` holds exactly the (merchant, pincode) pair multiset of `relation`.
///
/// Returns `InvalidState` naming the first differing pair.
pub fn check_consistency(relation: &Relation, inverted: &InvertedRelation) -> IndexResult<()> {
    let mut counts: HashMap<(&str, &str), i64> = HashMap::new();
    for (merchant, pincodes) in relation.iter() {
        for pincode in pincodes {
            *counts.entry((merchant, pincode.as_str())).or_insert(0) += 1;
        }
    }
    for (pincode, merchants) in inverted.iter() {
        for merchant in merchants {
            *counts.entry((merchant.as_str(), pincode)).or_insert(0) -= 1;
        }
    }
    match counts.into_iter().find(|(_, c)| *c != 0) {
        None => Ok(()),
        Some(((merchant, pincode), diff)) => Err(IndexError::InvalidState(format!(
            "relation and inverted index disagree on ({merchant}, {pincode}) by {diff}"
        ))),
    }
}

/// True if `a` and `b` hold the same merchants per pincode, ignoring list order.
pub fn same_multisets(a: &InvertedRelation, b: &InvertedRelation) -> bool {
    if a.pincode_count() != b.pincode_count() {
        return false;
    }
    a.iter().all(|(pincode, ms)| match b.merchants(pincode) {
        Some(other) => {
            let mut x: Vec<&String> = ms.iter().collect();
            let mut y: Vec<&String> = other.iter().collect();
            x.sort();
            y.sort();
            x == y
        }
        None => false,
    })
}
