//! Immutable typed columns over compact storage.
//!
//! A [`Column`] is a fixed-size sequence of values of one [`ColumnTypeId`]. Its storage
//! is one of three layouts with identical logical content:
//!
//! - dense: values in row order (packed dictionary indices for NOMINAL columns),
//! - mapped: a [`Mapping`] over a shared backing, produced by [`Column::map`],
//! - sparse: a default value plus sorted exceptions.
//!
//! Chains of views can memoize their composed mappings in a caller-owned
//! [`MappingCache`] via [`Column::map_with_cache`].

pub mod backing;
pub mod column;
pub mod density;
pub mod dictionary;
pub mod layout;
pub mod mapping;
mod sort;
pub mod types;
pub mod value;

pub use column::{Column, ColumnData, NUMERIC_VIEW_MIN_COVERAGE_DIVISOR};
pub use dictionary::{CategoryDictionary, Dictionary, IndexTranslation};
pub use mapping::{Mapping, MappingCache};
pub use types::{Capabilities, Category, ColumnTypeId, LayoutKind, Order};
pub use value::{CustomValue, Instant, TextSet, TimeOfDay, Value};
