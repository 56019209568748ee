//! # Tabula: in-memory typed columns
//!
//! Tabula stores tables column by column. A column holds values of one logical type
//! and keeps them in one of three physical layouts:
//!
//! * **Dense**: one stored value per row.
//! * **Mapped**: a lazy view that reads another column's values through a row mapping.
//! * **Sparse**: a default value plus the rows that differ from it.
//!
//! Columns are immutable once built. Reordering, filtering and joining produce new
//! columns through [`column::Mapping`], and categorical columns share their
//! dictionaries instead of copying them.
//!
//! ## Module Organization
//!
//! * [`common`] - Error type and argument checks shared by every crate
//! * [`bits`] - Bit-packed category index buffers
//! * [`column`] - Column types, layouts, mappings and dictionaries
//! * [`writer`] - Row-by-row column construction with automatic sparsity detection
//!
//! ## Getting Started
//!
//! Columns are usually built with a [`writer::RowWriter`]: start a row with
//! `move_next`, stage cells with `set`, and call `create` once to obtain the finished
//! [`writer::ColumnSet`]. Each column picks a dense or sparse layout from the values
//! it actually received.

pub use tabula_bits as bits;
pub use tabula_column as column;
pub use tabula_common as common;
pub use tabula_writer as writer;
