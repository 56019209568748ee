//! The dense, mapped and sparse arrangements of a column's values, and the view
//! engine deriving new arrangements from them.
//!
//! Every layout reads the same way: [`Layout::get`] and the fill routines return
//! the logical value at a row, no matter how it is stored. Deriving a column through
//! a [`Mapping`] never mutates the source layout:
//!
//! - a dense layout either becomes a view over the same backing or is gathered into
//!   a new dense backing,
//! - a mapped layout composes its mapping with the argument (optionally through a
//!   [`MappingCache`]) and stays a view, or is gathered,
//! - a sparse layout is re-derived as a sparse layout when the result stays sparse,
//!   and materialized densely otherwise.

use std::sync::Arc;

use tabula_common::{Result, error::Error, verify_arg};

use crate::{
    backing::Backing,
    density::{DEFAULT_MIN_SPARSITY, DensityEstimate},
    mapping::{Mapping, MappingCache, resolve},
    types::LayoutKind,
};

#[derive(Debug, Clone)]
pub enum Layout<B: Backing> {
    Dense(B),
    Mapped(MappedView<B>),
    Sparse(SparseStore<B>),
}

/// A view reading `backing[mapping[i]]` for logical position `i`.
#[derive(Debug, Clone)]
pub struct MappedView<B> {
    backing: B,
    mapping: Mapping,
}

impl<B: Backing> MappedView<B> {
    pub fn new(backing: B, mapping: Mapping) -> MappedView<B> {
        MappedView { backing, mapping }
    }

    pub fn backing(&self) -> &B {
        &self.backing
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    #[inline]
    fn get(&self, row: usize) -> B::Value {
        match self.mapping.resolve(row, self.backing.len()) {
            Some(position) => self.backing.get(position),
            None => self.backing.missing(),
        }
    }
}

/// A default value plus the sorted positions and values of the rows deviating from it.
#[derive(Debug, Clone)]
pub struct SparseStore<B: Backing> {
    default: B::Value,
    len: usize,
    positions: Arc<[u32]>,
    exceptions: B,
}

impl<B: Backing> SparseStore<B> {
    /// Wraps pre-computed exceptions.
    ///
    /// `positions` must be strictly increasing, below `len`, and as long as
    /// `exceptions`.
    pub fn new(
        default: B::Value,
        len: usize,
        positions: Vec<u32>,
        exceptions: B,
    ) -> Result<SparseStore<B>> {
        verify_arg!(len, len <= u32::MAX as usize);
        verify_arg!(exceptions, exceptions.len() == positions.len());
        verify_arg!(
            positions,
            positions.windows(2).all(|pair| pair[0] < pair[1])
        );
        if let Some(&last) = positions.last() {
            if last as usize >= len {
                return Err(Error::out_of_bounds(last as usize, len));
            }
        }
        Ok(SparseStore {
            default,
            len,
            positions: positions.into(),
            exceptions,
        })
    }

    /// Encodes `values` against `default`, using `prototype` to build the exception
    /// store.
    pub fn from_values(
        prototype: &B,
        default: B::Value,
        len: usize,
        values: impl Iterator<Item = B::Value>,
    ) -> Result<SparseStore<B>> {
        let mut positions = Vec::new();
        let mut exceptions = Vec::new();
        for (row, value) in values.take(len).enumerate() {
            if !B::same(&value, &default) {
                positions.push(row as u32);
                exceptions.push(value);
            }
        }
        let exceptions = prototype.collect(exceptions.len(), exceptions.into_iter())?;
        SparseStore::new(default, len, positions, exceptions)
    }

    pub fn default_value(&self) -> &B::Value {
        &self.default
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn positions(&self) -> &[u32] {
        &self.positions
    }

    pub fn exceptions(&self) -> &B {
        &self.exceptions
    }

    pub fn exception_count(&self) -> usize {
        self.positions.len()
    }

    pub fn estimate(&self) -> DensityEstimate {
        DensityEstimate::new(self.len, self.len - self.positions.len())
    }

    #[inline]
    fn get(&self, row: usize) -> B::Value {
        match self.positions.binary_search(&(row as u32)) {
            Ok(exception) => self.exceptions.get(exception),
            Err(_) => self.default.clone(),
        }
    }

    /// Iterates over all `len` logical values.
    fn expand(&self) -> impl Iterator<Item = B::Value> + '_ {
        let mut next = 0;
        (0..self.len).map(move |row| {
            if next < self.positions.len() && self.positions[next] as usize == row {
                next += 1;
                self.exceptions.get(next - 1)
            } else {
                self.default.clone()
            }
        })
    }

    fn map(&self, mapping: &Mapping) -> Result<Layout<B>> {
        let mut positions = Vec::new();
        let mut values = Vec::new();
        for (row, &index) in mapping.iter().enumerate() {
            let value = match resolve(index, self.len) {
                Some(source) => match self.positions.binary_search(&(source as u32)) {
                    Ok(exception) => self.exceptions.get(exception),
                    Err(_) => continue,
                },
                None => self.exceptions.missing(),
            };
            if !B::same(&value, &self.default) {
                positions.push(row as u32);
                values.push(value);
            }
        }

        let estimate = DensityEstimate::new(mapping.len(), mapping.len() - positions.len());
        if estimate.sparse_pays_off(self.exceptions.value_bytes(), DEFAULT_MIN_SPARSITY) {
            let exceptions = self.exceptions.collect(values.len(), values.into_iter())?;
            return Ok(Layout::Sparse(SparseStore::new(
                self.default.clone(),
                mapping.len(),
                positions,
                exceptions,
            )?));
        }

        let derived = SparseStore {
            default: self.default.clone(),
            len: mapping.len(),
            positions: positions.into(),
            exceptions: self.exceptions.collect(values.len(), values.into_iter())?,
        };
        let dense = self.exceptions.collect(derived.len, derived.expand())?;
        Ok(Layout::Dense(dense))
    }
}

/// Number of rows a (possibly strided) fill writes.
///
/// Row `start_row + k` lands at `offset + k * step`; the fill stops at the end of the
/// column or the first destination index outside the buffer.
#[inline]
pub(crate) fn fill_count(
    len: usize,
    start_row: usize,
    buffer_len: usize,
    offset: usize,
    step: usize,
) -> usize {
    if start_row >= len || offset >= buffer_len {
        return 0;
    }
    let fitting = (buffer_len - offset - 1) / step + 1;
    fitting.min(len - start_row)
}

impl<B: Backing> Layout<B> {
    pub fn len(&self) -> usize {
        match self {
            Layout::Dense(backing) => backing.len(),
            Layout::Mapped(view) => view.mapping.len(),
            Layout::Sparse(sparse) => sparse.len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> LayoutKind {
        match self {
            Layout::Dense(_) => LayoutKind::Dense,
            Layout::Mapped(_) => LayoutKind::Mapped,
            Layout::Sparse(_) => LayoutKind::Sparse,
        }
    }

    /// A backing of the kind this layout stores, used to build derived stores.
    pub fn prototype(&self) -> &B {
        match self {
            Layout::Dense(backing) => backing,
            Layout::Mapped(view) => &view.backing,
            Layout::Sparse(sparse) => &sparse.exceptions,
        }
    }

    /// Logical value at `row`.
    ///
    /// # Panics
    ///
    /// Panics if `row >= len()`.
    #[inline]
    pub fn get(&self, row: usize) -> B::Value {
        assert!(row < self.len(), "row {row} >= {}", self.len());
        match self {
            Layout::Dense(backing) => backing.get(row),
            Layout::Mapped(view) => view.get(row),
            Layout::Sparse(sparse) => sparse.get(row),
        }
    }

    /// Writes values of rows `start_row..` to `buffer[offset + k * step]`, converting
    /// each with `convert`. See [`fill_count`] for the number of rows written.
    pub(crate) fn fill_with<T>(
        &self,
        buffer: &mut [T],
        start_row: usize,
        offset: usize,
        step: usize,
        convert: impl Fn(B::Value) -> T,
    ) {
        debug_assert!(step > 0);
        let count = fill_count(self.len(), start_row, buffer.len(), offset, step);
        match self {
            Layout::Dense(backing) => {
                for k in 0..count {
                    buffer[offset + k * step] = convert(backing.get(start_row + k));
                }
            }
            Layout::Mapped(view) => {
                let source_len = view.backing.len();
                for k in 0..count {
                    let value = match view.mapping.resolve(start_row + k, source_len) {
                        Some(position) => view.backing.get(position),
                        None => view.backing.missing(),
                    };
                    buffer[offset + k * step] = convert(value);
                }
            }
            Layout::Sparse(sparse) => {
                for k in 0..count {
                    buffer[offset + k * step] = convert(sparse.default.clone());
                }
                let end_row = start_row + count;
                let first = sparse
                    .positions
                    .partition_point(|&position| (position as usize) < start_row);
                for (exception, &position) in sparse.positions.iter().enumerate().skip(first) {
                    let row = position as usize;
                    if row >= end_row {
                        break;
                    }
                    buffer[offset + (row - start_row) * step] =
                        convert(sparse.exceptions.get(exception));
                }
            }
        }
    }

    /// All logical values in row order.
    pub fn to_vec(&self) -> Vec<B::Value> {
        let mut values = vec![self.prototype().missing(); self.len()];
        self.fill_with(&mut values, 0, 0, 1, |value| value);
        values
    }

    /// A dense backing holding this layout's logical values.
    pub fn materialize(&self) -> Result<B> {
        match self {
            Layout::Dense(backing) => Ok(backing.clone()),
            Layout::Mapped(view) => Ok(view.backing.gather(&view.mapping)),
            Layout::Sparse(sparse) => sparse.exceptions.collect(sparse.len, sparse.expand()),
        }
    }

    /// Derives the layout whose row `i` holds this layout's value at `mapping[i]`.
    ///
    /// With `view` set, dense and mapped layouts return a view sharing the backing;
    /// otherwise the result is materialized. Sparse layouts ignore `view`.
    pub fn map(&self, mapping: &Mapping, view: bool) -> Result<Layout<B>> {
        match self {
            Layout::Dense(backing) => Ok(if view {
                Layout::Mapped(MappedView::new(backing.clone(), mapping.clone()))
            } else {
                Layout::Dense(backing.gather(mapping))
            }),
            Layout::Mapped(current) => {
                let composed = current.mapping.compose(mapping);
                Ok(Self::mapped_or_gathered(current, composed, view))
            }
            Layout::Sparse(sparse) => sparse.map(mapping),
        }
    }

    /// Same as [`Layout::map`], but mapped layouts take their composed mapping from
    /// `cache`.
    pub fn map_with_cache(
        &self,
        mapping: &Mapping,
        view: bool,
        cache: &mut MappingCache,
    ) -> Result<Layout<B>> {
        match self {
            Layout::Mapped(current) => {
                let composed = cache.compose(&current.mapping, mapping);
                Ok(Self::mapped_or_gathered(current, composed, view))
            }
            _ => self.map(mapping, view),
        }
    }

    fn mapped_or_gathered(current: &MappedView<B>, composed: Mapping, view: bool) -> Layout<B> {
        if view {
            Layout::Mapped(MappedView::new(current.backing.clone(), composed))
        } else {
            Layout::Dense(current.backing.gather(&composed))
        }
    }

    /// An empty dense layout of the same kind.
    pub fn stripped(&self) -> Result<Layout<B>> {
        Ok(Layout::Dense(
            self.prototype().collect(0, std::iter::empty())?,
        ))
    }

    /// Rebuilds the layout with every backing passed through `backing` and the sparse
    /// default through `value`, keeping mappings and exception positions.
    pub fn try_map_backing(
        &self,
        backing: impl Fn(&B) -> Result<B>,
        value: impl Fn(&B::Value) -> Result<B::Value>,
    ) -> Result<Layout<B>> {
        Ok(match self {
            Layout::Dense(dense) => Layout::Dense(backing(dense)?),
            Layout::Mapped(view) => {
                Layout::Mapped(MappedView::new(backing(&view.backing)?, view.mapping.clone()))
            }
            Layout::Sparse(sparse) => Layout::Sparse(SparseStore {
                default: value(&sparse.default)?,
                len: sparse.len,
                positions: Arc::clone(&sparse.positions),
                exceptions: backing(&sparse.exceptions)?,
            }),
        })
    }
}
