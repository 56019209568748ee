//! Packed unsigned integer storage for categorical indices.
//!
//! - [`packed`]: the 2/4/8-bit read/write primitives. This is the only place where
//!   bit arithmetic on packed bytes happens.
//! - [`format`]: [`PackedFormat`], the set of widths a categorical index array may use.
//! - [`buffer`]: [`PackedBuffer`], a bounded, mutable index buffer that rejects values
//!   its format cannot hold.
//! - [`indices`]: [`PackedIndices`], the frozen, cheaply cloneable form of a buffer.

pub mod buffer;
pub mod format;
pub mod indices;
pub mod packed;

pub use buffer::PackedBuffer;
pub use format::PackedFormat;
pub use indices::PackedIndices;
