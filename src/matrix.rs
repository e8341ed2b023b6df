//! Sparse triangular matrix of label-pair supports.
//!
//! Counts, per unordered vertex-label pair, how many transaction graphs
//! contain at least one edge joining the two labels. The driver uses the
//! counts to drop edges whose endpoint-label pair cannot reach the
//! minimum support.

use crate::dfs_code::Label;
use std::collections::BTreeMap;

/// Symmetric `(label, label) → count` store keyed under `(min, max)`.
#[derive(Debug, Clone, Default)]
pub struct SparseTriangularMatrix {
    rows: BTreeMap<Label, BTreeMap<Label, u64>>,
}

impl SparseTriangularMatrix {
    /// Creates an empty matrix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the count for the unordered pair `{a, b}`.
    pub fn increment(&mut self, a: Label, b: Label) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        *self.rows.entry(lo).or_default().entry(hi).or_default() += 1;
    }

    /// The count recorded for the unordered pair `{a, b}`.
    pub fn support(&self, a: Label, b: Label) -> u64 {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        self.rows
            .get(&lo)
            .and_then(|row| row.get(&hi))
            .copied()
            .unwrap_or(0)
    }

    /// Drops every entry below `min_sup`. Subsequent lookups of dropped
    /// pairs return zero.
    pub fn remove_infrequent(&mut self, min_sup: u64) {
        for row in self.rows.values_mut() {
            row.retain(|_, count| *count >= min_sup);
        }
        self.rows.retain(|_, row| !row.is_empty());
    }

    /// Number of pairs currently stored.
    pub fn len(&self) -> usize {
        self.rows.values().map(BTreeMap::len).sum()
    }

    /// Returns `true` if no pair is stored.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
