//! Row-oriented ingestion into tabula columns.
//!
//! [`RowWriter`] drives one [`ColumnWriter`] per column. Column writers accumulate
//! values in a [`sparsity::Accumulator`], which decides online whether a column is
//! better kept dense or sparse and re-decides from the complete data when the column
//! is finished.

pub mod column_writer;
pub mod config;
pub mod row_writer;
pub mod sparsity;

pub use column_writer::ColumnWriter;
pub use config::{FinalizeMode, RowWriterOptions, SparsityConfig};
pub use row_writer::{ColumnSet, RowWriter};
pub use sparsity::SparsityState;
