//! Online dense/sparse accumulation of column values.
//!
//! An [`Accumulator`] starts dense. When its row count first reaches
//! [`SparsityConfig::check_rows`] it inspects the buffered values once: if the
//! dominant value makes a sparse layout worthwhile the buffer is re-encoded as a
//! default value plus exceptions, and later rows only record deviations. Dense rows
//! live in the cell type's [`CellBuffer`], which for category indices is a packed
//! buffer widening with the dictionary. A sparse
//! accumulator whose exceptions grow past the dense break-even point reverts to a
//! dense buffer for good.
//!
//! None of this fixes the final layout: [`Accumulator::finish`] recomputes the
//! dominant value from the complete data.

use std::{collections::hash_map::Entry, hash::Hash};

use ahash::AHashMap;
use tabula_bits::{PackedBuffer, PackedFormat};
use tabula_column::{Instant, density::DensityEstimate};
use tabula_common::{Result, error::Error};

use crate::config::{FinalizeMode, SparsityConfig};

/// A value an [`Accumulator`] can hold.
pub trait Cell: Clone + Send + Sync + std::fmt::Debug + 'static {
    /// Equality key: two cells are the same value iff their keys are equal. Keys keep
    /// every bit that a read can observe, so `-0.0` and `0.0` differ.
    type Key: Copy + Eq + Hash;

    /// Dense row storage for this cell type.
    type Buffer: CellBuffer<Self>;

    fn key(&self) -> Self::Key;

    fn missing() -> Self;
}

impl Cell for f64 {
    type Key = u64;
    type Buffer = Vec<f64>;

    #[inline]
    fn key(&self) -> u64 {
        if self.is_nan() {
            f64::NAN.to_bits()
        } else {
            self.to_bits()
        }
    }

    fn missing() -> f64 {
        f64::NAN
    }
}

impl Cell for i64 {
    type Key = i64;
    type Buffer = Vec<i64>;

    #[inline]
    fn key(&self) -> i64 {
        *self
    }

    fn missing() -> i64 {
        tabula_column::TimeOfDay::MISSING_NANOS
    }
}

impl Cell for u32 {
    type Key = u32;
    type Buffer = PackedBuffer;

    #[inline]
    fn key(&self) -> u32 {
        *self
    }

    fn missing() -> u32 {
        0
    }
}

impl Cell for Option<Instant> {
    type Key = Option<Instant>;
    type Buffer = Vec<Option<Instant>>;

    #[inline]
    fn key(&self) -> Option<Instant> {
        *self
    }

    fn missing() -> Option<Instant> {
        None
    }
}

/// Growable dense storage of [`Cell`]s.
pub trait CellBuffer<V>: std::fmt::Debug + Send + Sync + Sized {
    fn with_capacity(capacity: usize) -> Self;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `row`, which must be below `len()`.
    fn get(&self, row: usize) -> V;

    fn push(&mut self, value: V) -> Result<()>;

    fn reserve(&mut self, additional: usize);

    fn cells(&self) -> impl Iterator<Item = V> + '_ {
        (0..self.len()).map(move |row| self.get(row))
    }
}

impl<V: Clone + Send + Sync + std::fmt::Debug> CellBuffer<V> for Vec<V> {
    fn with_capacity(capacity: usize) -> Self {
        Vec::with_capacity(capacity)
    }

    #[inline]
    fn len(&self) -> usize {
        Vec::len(self)
    }

    #[inline]
    fn get(&self, row: usize) -> V {
        self[row].clone()
    }

    #[inline]
    fn push(&mut self, value: V) -> Result<()> {
        Vec::push(self, value);
        Ok(())
    }

    fn reserve(&mut self, additional: usize) {
        Vec::reserve(self, additional)
    }
}

/// Category indices, starting at two bits and widening as larger indices arrive.
impl CellBuffer<u32> for PackedBuffer {
    fn with_capacity(capacity: usize) -> Self {
        PackedBuffer::with_capacity(PackedFormat::U2, capacity)
    }

    #[inline]
    fn len(&self) -> usize {
        PackedBuffer::len(self)
    }

    #[inline]
    fn get(&self, row: usize) -> u32 {
        PackedBuffer::get(self, row).unwrap_or(0)
    }

    fn push(&mut self, value: u32) -> Result<()> {
        if !self.format().fits(value) {
            let format = PackedFormat::narrowest_for(value).ok_or_else(|| {
                Error::format_overflow(
                    PackedFormat::I32.to_string(),
                    value as u64,
                    PackedFormat::I32.max_value() as u64,
                )
            })?;
            self.widen(format)?;
        }
        PackedBuffer::push(self, value)
    }

    fn reserve(&mut self, additional: usize) {
        PackedBuffer::reserve(self, additional)
    }
}

/// Storage strategy an accumulator currently uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SparsityState {
    /// Buffering every value; the one-time check has not converted it.
    Dense,
    /// Buffering a default value plus exceptions.
    Sparse,
    /// Dense again after the exceptions outgrew the sparse encoding.
    Reverted,
}

#[derive(Debug)]
enum Storage<V: Cell> {
    Dense(V::Buffer),
    Sparse(Deltas<V>),
    Reverted(V::Buffer),
}

#[derive(Debug)]
struct Deltas<V> {
    default: V,
    positions: Vec<u32>,
    values: Vec<V>,
}

impl<V: Cell> Deltas<V> {
    fn encode(default: V, values: impl Iterator<Item = V>) -> Deltas<V> {
        let key = default.key();
        let mut positions = Vec::new();
        let mut exceptions = Vec::new();
        for (row, value) in values.enumerate() {
            if value.key() != key {
                positions.push(row as u32);
                exceptions.push(value);
            }
        }
        Deltas {
            default,
            positions,
            values: exceptions,
        }
    }

    fn iter(&self, len: usize) -> impl Iterator<Item = V> + '_ {
        let mut next = 0;
        (0..len).map(move |row| {
            if next < self.positions.len() && self.positions[next] as usize == row {
                next += 1;
                self.values[next - 1].clone()
            } else {
                self.default.clone()
            }
        })
    }
}

/// Values accumulated by a finished writer.
#[derive(Debug)]
pub enum Finished<V: Cell> {
    Dense(V::Buffer),
    Sparse {
        default: V,
        len: usize,
        positions: Vec<u32>,
        values: Vec<V>,
    },
}

/// Growable column buffer switching between dense and sparse storage.
#[derive(Debug)]
pub struct Accumulator<V: Cell> {
    config: SparsityConfig,
    expected_rows: usize,
    len: usize,
    storage: Storage<V>,
}

impl<V: Cell> Accumulator<V> {
    pub fn new(config: SparsityConfig, expected_rows: Option<usize>) -> Accumulator<V> {
        let expected_rows = expected_rows.unwrap_or(0);
        let capacity = expected_rows.min(config.check_rows);
        Accumulator {
            config,
            expected_rows,
            len: 0,
            storage: Storage::Dense(V::Buffer::with_capacity(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn state(&self) -> SparsityState {
        match self.storage {
            Storage::Dense(_) => SparsityState::Dense,
            Storage::Sparse(_) => SparsityState::Sparse,
            Storage::Reverted(_) => SparsityState::Reverted,
        }
    }

    /// Appends a value. `value_bytes` is the current dense storage cost of one value.
    pub fn push(&mut self, value: V, value_bytes: f64) -> Result<()> {
        if self.len >= i32::MAX as usize {
            return Err(Error::out_of_bounds(self.len, i32::MAX as usize));
        }
        let row = self.len;
        match &mut self.storage {
            Storage::Dense(values) | Storage::Reverted(values) => values.push(value)?,
            Storage::Sparse(deltas) => {
                if value.key() != deltas.default.key() {
                    deltas.positions.push(row as u32);
                    deltas.values.push(value);
                }
            }
        }
        self.len += 1;

        match self.state() {
            SparsityState::Dense if self.len == self.config.check_rows.max(1) => {
                self.check(value_bytes)
            }
            SparsityState::Sparse if !self.sparse_still_pays(value_bytes) => self.revert()?,
            _ => (),
        }
        Ok(())
    }

    /// All accumulated values in row order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = V> + '_> {
        match &self.storage {
            Storage::Dense(values) | Storage::Reverted(values) => Box::new(values.cells()),
            Storage::Sparse(deltas) => Box::new(deltas.iter(self.len)),
        }
    }

    /// Produces the final values, dense or sparse as `mode` decides. `value_bytes` is
    /// the final dense storage cost of one value.
    pub fn finish(self, mode: FinalizeMode, value_bytes: f64) -> Result<Finished<V>> {
        let default = match mode {
            FinalizeMode::Dense => None,
            FinalizeMode::Sparse => {
                Some(dominant(self.iter()).map_or_else(V::missing, |(default, _)| default))
            }
            FinalizeMode::Auto => dominant(self.iter()).and_then(|(default, count)| {
                DensityEstimate::new(self.len, count)
                    .sparse_pays_off(value_bytes, self.config.min_sparsity)
                    .then_some(default)
            }),
        };
        log::debug!(
            "finishing {} rows in state {:?} as {}",
            self.len,
            self.state(),
            if default.is_some() { "sparse" } else { "dense" }
        );

        let len = self.len;
        Ok(match (default, self.storage) {
            (None, Storage::Dense(values) | Storage::Reverted(values)) => {
                Finished::Dense(values)
            }
            (None, Storage::Sparse(deltas)) => Finished::Dense(buffer_of(deltas.iter(len), len)?),
            (Some(default), Storage::Sparse(deltas))
                if default.key() == deltas.default.key() =>
            {
                Finished::sparse(deltas, len)
            }
            (Some(default), Storage::Sparse(deltas)) => {
                let encoded = Deltas::encode(default, deltas.iter(len));
                Finished::sparse(encoded, len)
            }
            (Some(default), Storage::Dense(values) | Storage::Reverted(values)) => {
                let encoded = Deltas::encode(default, values.cells());
                Finished::sparse(encoded, len)
            }
        })
    }

    fn check(&mut self, value_bytes: f64) {
        let Storage::Dense(values) = &mut self.storage else {
            return;
        };
        let Some((default, count)) = dominant(values.cells()) else {
            return;
        };
        let rows = values.len();
        let estimate = DensityEstimate::new(rows, count);
        if estimate.sparse_pays_off(value_bytes, self.config.min_sparsity) {
            log::debug!(
                "switching to sparse after {rows} rows (sparsity {:.3})",
                estimate.sparsity()
            );
            let deltas = Deltas::encode(default, values.cells());
            self.storage = Storage::Sparse(deltas);
        } else {
            log::debug!(
                "staying dense after {rows} rows (sparsity {:.3})",
                estimate.sparsity()
            );
            values.reserve(self.expected_rows.saturating_sub(rows));
        }
    }

    fn sparse_still_pays(&self, value_bytes: f64) -> bool {
        let Storage::Sparse(deltas) = &self.storage else {
            return false;
        };
        DensityEstimate::new(self.len, self.len - deltas.positions.len())
            .sparse_pays_off(value_bytes, 0.0)
    }

    fn revert(&mut self) -> Result<()> {
        let Storage::Sparse(deltas) = &self.storage else {
            return Ok(());
        };
        log::debug!(
            "reverting to dense at {} rows with {} exceptions",
            self.len,
            deltas.positions.len()
        );
        let values = buffer_of(deltas.iter(self.len), self.len.max(self.expected_rows))?;
        self.storage = Storage::Reverted(values);
        Ok(())
    }
}

fn buffer_of<V: Cell>(values: impl Iterator<Item = V>, capacity: usize) -> Result<V::Buffer> {
    let mut buffer = V::Buffer::with_capacity(capacity);
    for value in values {
        buffer.push(value)?;
    }
    Ok(buffer)
}

impl<V: Cell> Finished<V> {
    fn sparse(deltas: Deltas<V>, len: usize) -> Finished<V> {
        Finished::Sparse {
            default: deltas.default,
            len,
            positions: deltas.positions,
            values: deltas.values,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Finished::Dense(values) => values.len(),
            Finished::Sparse { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The most frequent value and its count; ties go to the value seen first.
pub fn dominant<V: Cell>(values: impl Iterator<Item = V>) -> Option<(V, usize)> {
    let mut slots: AHashMap<V::Key, usize> = AHashMap::new();
    let mut firsts: Vec<V> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();
    for value in values {
        match slots.entry(value.key()) {
            Entry::Occupied(slot) => counts[*slot.get()] += 1,
            Entry::Vacant(slot) => {
                slot.insert(firsts.len());
                firsts.push(value);
                counts.push(1);
            }
        }
    }
    let (slot, count) = counts
        .iter()
        .enumerate()
        .fold(None, |best, (slot, &count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((slot, count)),
        })?;
    Some((firsts.swap_remove(slot), count))
}
