use serde::{Deserialize, Serialize};
use tabula_column::density::DEFAULT_MIN_SPARSITY;

/// Layout a column writer produces when finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FinalizeMode {
    /// Sparse when the complete data makes a sparse layout smaller, dense otherwise.
    #[default]
    Auto,
    Dense,
    /// Sparse whenever the column type has a sparse encoding.
    Sparse,
}

/// Controls the online sparsity decision of column writers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparsityConfig {
    /// Number of rows after which a dense accumulation is inspected once for sparsity.
    pub check_rows: usize,

    /// Minimum share of rows equal to the dominant value for a sparse layout.
    pub min_sparsity: f64,

    /// Layout decision applied when a writer is finished.
    pub finalize: FinalizeMode,
}

impl SparsityConfig {
    pub const DEFAULT_CHECK_ROWS: usize = 1024;

    pub fn with_check_rows(&self, rows: usize) -> Self {
        let mut config = self.clone();
        config.check_rows = rows;
        config
    }

    pub fn with_min_sparsity(&self, sparsity: f64) -> Self {
        let mut config = self.clone();
        config.min_sparsity = sparsity;
        config
    }

    pub fn with_finalize(&self, mode: FinalizeMode) -> Self {
        let mut config = self.clone();
        config.finalize = mode;
        config
    }
}

impl Default for SparsityConfig {
    fn default() -> Self {
        SparsityConfig {
            check_rows: Self::DEFAULT_CHECK_ROWS,
            min_sparsity: DEFAULT_MIN_SPARSITY,
            finalize: FinalizeMode::Auto,
        }
    }
}

/// Options of a [`crate::RowWriter`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowWriterOptions {
    /// Expected number of rows, used to pre-size buffers. Writing more or fewer rows
    /// is fine.
    pub expected_rows: Option<usize>,

    pub sparsity: SparsityConfig,
}

impl RowWriterOptions {
    pub fn with_expected_rows(&self, rows: usize) -> Self {
        let mut options = self.clone();
        options.expected_rows = Some(rows);
        options
    }

    pub fn with_sparsity(&self, sparsity: SparsityConfig) -> Self {
        let mut options = self.clone();
        options.sparsity = sparsity;
        options
    }
}
