//! Cost model deciding between dense and sparse storage.

use serde::{Deserialize, Serialize};

/// Bytes used to record the position of one sparse exception.
pub const POSITION_BYTES: f64 = 4.0;

/// Default lower bound on the share of rows equal to the default value before a
/// sparse layout is considered.
pub const DEFAULT_MIN_SPARSITY: f64 = 0.625;

/// Occurrence statistics of the most frequent value of a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DensityEstimate {
    /// Number of values inspected.
    pub rows: usize,
    /// Number of values equal to the dominant one.
    pub default_count: usize,
}

impl DensityEstimate {
    pub fn new(rows: usize, default_count: usize) -> DensityEstimate {
        debug_assert!(default_count <= rows);
        DensityEstimate {
            rows,
            default_count,
        }
    }

    /// Share of rows equal to the dominant value.
    pub fn sparsity(&self) -> f64 {
        if self.rows == 0 {
            0.0
        } else {
            self.default_count as f64 / self.rows as f64
        }
    }

    pub fn exceptions(&self) -> usize {
        self.rows - self.default_count
    }

    /// Returns `true` when a sparse layout is both sparse enough (`min_sparsity`) and
    /// strictly smaller than the dense one for values costing `value_bytes` each.
    pub fn sparse_pays_off(&self, value_bytes: f64, min_sparsity: f64) -> bool {
        if self.rows == 0 || self.sparsity() < min_sparsity {
            return false;
        }
        let sparse_bytes = self.exceptions() as f64 * (POSITION_BYTES + value_bytes);
        let dense_bytes = self.rows as f64 * value_bytes;
        sparse_bytes < dense_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_pays_off() {
        let estimate = DensityEstimate::new(10_000, 9_000);
        assert!(estimate.sparse_pays_off(8.0, DEFAULT_MIN_SPARSITY));
        assert!(estimate.sparse_pays_off(2.0, DEFAULT_MIN_SPARSITY));
        // Exceptions cost 4.25 bytes against 0.25 bytes per dense 2-bit value.
        assert!(!estimate.sparse_pays_off(0.25, DEFAULT_MIN_SPARSITY));

        let estimate = DensityEstimate::new(10_000, 1_000);
        assert!(!estimate.sparse_pays_off(8.0, DEFAULT_MIN_SPARSITY));
        assert!(!DensityEstimate::new(0, 0).sparse_pays_off(8.0, 0.0));
    }

    #[test]
    fn test_min_sparsity_bound() {
        let estimate = DensityEstimate::new(100, 60);
        assert!(!estimate.sparse_pays_off(8.0, DEFAULT_MIN_SPARSITY));
        assert!(estimate.sparse_pays_off(8.0, 0.5));
    }
}
