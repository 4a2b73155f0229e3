//! Forward relation: merchant -> pincodes served.

use crate::error::IndexResult;
use crate::generate::{self, GenerationParams};
use crate::listmap::ListMap;
use serde::{Deserialize, Serialize};

/// Merchant identifier (`Merchant_<digits>`).
pub type Merchant = String;
/// Six-digit pincode.
pub type Pincode = String;

/// Merchant -> ordered, duplicate-tolerant list of pincodes.
///
/// Merchants keep the order in which they were first recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Relation(ListMap);

impl Relation {
    /// Empty relation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty relation with room for `merchants` merchants.
    pub fn with_capacity(merchants: usize) -> Self {
        Self(ListMap::with_capacity(merchants))
    }

    /// Append `pincode` to `merchant`'s list (creating it if absent). Never deduplicates.
    pub fn insert(&mut self, merchant: &str, pincode: &str) {
        self.0.push(merchant, pincode);
    }

    /// Record a merchant with its full list. Returns `false` if the merchant already exists.
    pub fn insert_merchant(&mut self, merchant: Merchant, pincodes: Vec<Pincode>) -> bool {
        self.0.insert_list(merchant, pincodes)
    }

    /// Pincodes served by `merchant`.
    pub fn pincodes(&self, merchant: &str) -> Option<&[Pincode]> {
        self.0.get(merchant)
    }

    /// Occurrences of `pincode` in `merchant`'s list.
    pub fn count(&self, merchant: &str, pincode: &str) -> usize {
        self.0.count(merchant, pincode)
    }

    /// Number of merchants.
    pub fn merchant_count(&self) -> usize {
        self.0.len()
    }

    /// Number of recorded (merchant, pincode) pairs, counting repeats.
    pub fn pair_count(&self) -> usize {
        self.0.value_count()
    }

    /// True if no merchant is recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(merchant, pincodes)` in stored order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Pincode])> + '_ {
        self.0.iter()
    }
}

impl FromIterator<(Merchant, Vec<Pincode>)> for Relation {
    fn from_iter<I: IntoIterator<Item = (Merchant, Vec<Pincode>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Owner of the forward relation.
///
/// Mutated only through [`RelationStore::insert`]; readers get a borrowed snapshot.
#[derive(Debug, Default)]
pub struct RelationStore {
    relation: Relation,
}

impl RelationStore {
    /// Store with no merchants.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of an existing relation (generated or loaded).
    pub fn from_relation(relation: Relation) -> Self {
        Self { relation }
    }

    /// Produce a synthetic relation. See [`generate::generate`].
    pub fn generate(params: &GenerationParams) -> IndexResult<Relation> {
        generate::generate(params)
    }

    /// Append `pincode` to `merchant`'s list, preserving insertion order.
    pub fn insert(&mut self, merchant: &str, pincode: &str) {
        self.relation.insert(merchant, pincode);
    }

    /// Read-only view of the current relation.
    pub fn snapshot(&self) -> &Relation {
        &self.relation
    }

    /// Give up ownership of the relation.
    pub fn into_relation(self) -> Relation {
        self.relation
    }
}
