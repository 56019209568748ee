//! Index arrays describing views, and the composition cache shared across views.

use std::{ops::Deref, sync::Arc};

use ahash::AHashMap;
use tabula_common::{Result, verify_arg};

/// An immutable logical-to-physical index array.
///
/// Entry `i` names the source position read for logical position `i`. Negative
/// entries and entries past the end of the source read as missing.
///
/// Cloning shares the array; [`Mapping::is_same`] tells whether two mappings are the
/// same array rather than equal contents. The composition cache keys on that
/// identity.
#[derive(Debug, Clone)]
pub struct Mapping(Arc<[i32]>);

impl Mapping {
    pub fn new(indices: Vec<i32>) -> Mapping {
        Mapping(indices.into())
    }

    /// The mapping `[0, 1, .., len - 1]`. Positions must fit an `i32`.
    pub fn identity(len: usize) -> Result<Mapping> {
        verify_arg!(len, len <= i32::MAX as usize);
        Ok(Mapping::new((0..len as i32).collect()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[i32] {
        &self.0
    }

    /// Source position for logical position `row`, or `None` when the entry is negative
    /// or not below `source_len`.
    #[inline]
    pub fn resolve(&self, row: usize, source_len: usize) -> Option<usize> {
        resolve(self.0[row], source_len)
    }

    /// Returns `true` if both mappings share the same array.
    #[inline]
    pub fn is_same(&self, other: &Mapping) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    #[inline]
    fn identity_key(&self) -> usize {
        Arc::as_ptr(&self.0) as *const i32 as usize
    }

    /// Composes two mappings so that viewing through `self` and then through `next`
    /// equals viewing through the result: `result[i] = self[next[i]]`.
    ///
    /// Entries of `next` outside `self` become `-1`.
    pub fn compose(&self, next: &Mapping) -> Mapping {
        let source_len = self.len();
        Mapping::new(
            next.iter()
                .map(|&index| match resolve(index, source_len) {
                    Some(position) => self.0[position],
                    None => -1,
                })
                .collect(),
        )
    }
}

#[inline]
pub(crate) fn resolve(index: i32, source_len: usize) -> Option<usize> {
    if index >= 0 && (index as usize) < source_len {
        Some(index as usize)
    } else {
        None
    }
}

impl Deref for Mapping {
    type Target = [i32];

    fn deref(&self) -> &[i32] {
        &self.0
    }
}

impl From<Vec<i32>> for Mapping {
    fn from(indices: Vec<i32>) -> Self {
        Mapping::new(indices)
    }
}

impl From<&[i32]> for Mapping {
    fn from(indices: &[i32]) -> Self {
        Mapping(indices.into())
    }
}

impl PartialEq for Mapping {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Mapping {}

/// Memoizes mapping compositions by array identity.
///
/// Deriving many views through the same mapping (for instance every column of a table
/// being reordered by one sort permutation) composes each distinct
/// `(view mapping, argument mapping)` pair once; later requests for the same pair
/// return the stored composition in O(1).
///
/// Entries hold on to both key arrays, so an address can never be reused by another
/// array while its entry is alive. Returned compositions are shared, immutable
/// [`Mapping`]s: callers cannot alter a cached entry through them.
///
/// The cache takes `&mut self`; callers that compose from several threads must wrap
/// it in a lock of their choosing.
#[derive(Debug, Default)]
pub struct MappingCache {
    entries: AHashMap<(usize, usize), CacheEntry>,
    hits: usize,
}

#[derive(Debug)]
struct CacheEntry {
    _base: Mapping,
    _next: Mapping,
    composed: Mapping,
}

impl MappingCache {
    pub fn new() -> MappingCache {
        MappingCache::default()
    }

    /// Number of stored compositions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of requests answered from the cache.
    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns `base.compose(next)`, computing it only on the first request for this
    /// pair of arrays.
    pub fn compose(&mut self, base: &Mapping, next: &Mapping) -> Mapping {
        let key = (base.identity_key(), next.identity_key());
        if let Some(entry) = self.entries.get(&key) {
            self.hits += 1;
            log::trace!("mapping cache hit for {} rows", next.len());
            return entry.composed.clone();
        }
        log::trace!("mapping cache miss for {} rows", next.len());
        let composed = base.compose(next);
        self.entries.insert(
            key,
            CacheEntry {
                _base: base.clone(),
                _next: next.clone(),
                composed: composed.clone(),
            },
        );
        composed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_out_of_range() {
        let base = Mapping::new(vec![4, 3, -1, 0]);
        let next = Mapping::new(vec![3, 0, 7, -2, 2]);
        assert_eq!(base.compose(&next).as_slice(), [0, 4, -1, -1, -1]);
    }

    #[test]
    fn test_compose_is_associative() {
        let a = Mapping::new(vec![2, 0, 1, 3]);
        let b = Mapping::new(vec![3, 3, 1, -1, 0]);
        let c = Mapping::new(vec![4, 1, 0, 9]);
        assert_eq!(a.compose(&b).compose(&c), a.compose(&b.compose(&c)));
    }

    #[test]
    fn test_identity_bounds() {
        assert_eq!(Mapping::identity(3).unwrap().as_slice(), [0, 1, 2]);
        assert!(Mapping::identity(0).unwrap().is_empty());
        let err = Mapping::identity(i32::MAX as usize + 1).unwrap_err();
        assert!(err.is_invalid_arg());
    }

    #[test]
    fn test_identity_vs_content() {
        let a = Mapping::new(vec![1, 2]);
        let b = Mapping::new(vec![1, 2]);
        assert_eq!(a, b);
        assert!(!a.is_same(&b));
        assert!(a.is_same(&a.clone()));
    }

    #[test]
    fn test_cache_reuses_by_identity() {
        let base = Mapping::new(vec![2, 1, 0]);
        let next = Mapping::new(vec![0, 0, 2]);
        let mut cache = MappingCache::new();

        let first = cache.compose(&base, &next);
        assert_eq!(cache.len(), 1);
        let second = cache.compose(&base, &next);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.hits(), 1);
        assert!(first.is_same(&second));

        // Equal contents, different array: a separate entry.
        let copy = Mapping::new(next.to_vec());
        let third = cache.compose(&base, &copy);
        assert_eq!(cache.len(), 2);
        assert_eq!(third, first);
        assert!(!third.is_same(&first));
    }
}
