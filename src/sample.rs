//! Read-only partial views for display.

use crate::inverted::InvertedRelation;
use crate::relation::{Merchant, Pincode, Relation};
use serde::Serialize;

/// The first entries of both maps, in stored order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Sample {
    /// Up to `n` merchants with their pincodes.
    pub relation: Vec<(Merchant, Vec<Pincode>)>,
    /// Up to `n` pincodes with their merchants.
    pub inverted: Vec<(Pincode, Vec<Merchant>)>,
}

impl Sample {
    /// Copy the first `n` entries of each map.
    pub fn take(relation: &Relation, inverted: &InvertedRelation, n: usize) -> Self {
        Self {
            relation: relation
                .iter()
                .take(n)
                .map(|(m, ps)| (m.to_string(), ps.to_vec()))
                .collect(),
            inverted: inverted
                .iter()
                .take(n)
                .map(|(p, ms)| (p.to_string(), ms.to_vec()))
                .collect(),
        }
    }
}

/// Dense 0/1 view of a corner of the merchant x pincode matrix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SparseMatrix {
    /// Row labels.
    pub merchants: Vec<Merchant>,
    /// Column labels (may repeat if a merchant lists a pincode twice).
    pub pincodes: Vec<Pincode>,
    /// `cells[row][col]` is true iff the row's merchant serves the column's pincode.
    pub cells: Vec<Vec<bool>>,
}

impl SparseMatrix {
    /// Rows are the first `merchants` merchants; columns are their pincode lists
    /// concatenated in order and cut to `max_pincodes`.
    pub fn from_relation(relation: &Relation, merchants: usize, max_pincodes: usize) -> Self {
        let rows: Vec<(&str, &[Pincode])> = relation.iter().take(merchants).collect();
        let pincodes: Vec<Pincode> = rows
            .iter()
            .flat_map(|(_, ps)| ps.iter().cloned())
            .take(max_pincodes)
            .collect();
        let cells = rows
            .iter()
            .map(|(_, served)| pincodes.iter().map(|p| served.contains(p)).collect())
            .collect();
        Self {
            merchants: rows.iter().map(|(m, _)| m.to_string()).collect(),
            pincodes,
            cells,
        }
    }

    /// Number of set cells.
    pub fn ones(&self) -> usize {
        self.cells.iter().flatten().filter(|c| **c).count()
    }
}
