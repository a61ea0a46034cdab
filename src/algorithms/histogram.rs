//! Histogram reducers.

use crate::algorithm::Algorithm;
use crate::shuffle::Key;
use std::collections::BTreeMap;

/// A flat bin-count vector; both operands of [`ReduceHistogram`] must have
/// the same length.
pub type Histogram = Vec<u64>;

/// Element-wise sum of two equal-length histograms. A length mismatch is a
/// defect in the calling code, not a data error.
#[derive(Default)]
pub struct ReduceHistogram;

impl ReduceHistogram {
    pub fn new() -> Self {
        Self
    }
}

impl Algorithm<(Histogram, Histogram), Histogram> for ReduceHistogram {
    fn compute(&self, (mut lhs, rhs): (Histogram, Histogram)) -> Histogram {
        assert_eq!(
            lhs.len(),
            rhs.len(),
            "histogram operands must have the same length"
        );
        for (acc, v) in lhs.iter_mut().zip(rhs) {
            *acc += v;
        }
        lhs
    }

    fn name(&self) -> String {
        "reduce_histogram".to_string()
    }
}

/// Merges two key -> count mappings by per-key addition, the pairwise
/// reducer of the vertical map-reduce variant.
#[derive(Default)]
pub struct MergeCounts;

impl MergeCounts {
    pub fn new() -> Self {
        Self
    }
}

impl Algorithm<(BTreeMap<Key, u64>, BTreeMap<Key, u64>), BTreeMap<Key, u64>> for MergeCounts {
    fn compute(
        &self,
        (mut lhs, rhs): (BTreeMap<Key, u64>, BTreeMap<Key, u64>),
    ) -> BTreeMap<Key, u64> {
        for (key, count) in rhs {
            *lhs.entry(key).or_insert(0) += count;
        }
        lhs
    }

    fn name(&self) -> String {
        "merge_counts".to_string()
    }
}
