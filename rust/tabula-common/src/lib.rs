//! Core definitions shared by all tabula-* crates: the error taxonomy and the
//! argument verification helpers.

pub mod error;
pub mod result;

pub use result::Result;
