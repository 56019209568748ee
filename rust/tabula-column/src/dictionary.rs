//! Ordered, deduplicated value lookup for categorical columns.
//!
//! Index `0` is reserved for the missing value in every dictionary: [`Dictionary::get`]
//! returns `None` for it and no user value is ever stored there. A dictionary with `n`
//! distinct values therefore has [`Dictionary::size`] `n + 1`.
//!
//! Reconciling two dictionaries produces an [`IndexTranslation`]: a table mapping every
//! index of the source dictionary to an index of the target one. Applying the table to
//! a column's index array (see `Column::with_dictionary`) rewrites the column against
//! the new dictionary without touching the logical values.

use std::{hash::Hash, sync::Arc};

use ahash::AHashMap;
use tabula_bits::PackedFormat;
use tabula_common::{Result, error::Error, verify_arg};

/// Categorical dictionary used by nominal columns.
pub type CategoryDictionary = Dictionary<Arc<str>>;

#[derive(Debug, Clone)]
pub struct Dictionary<T> {
    /// Values of indices `1..size()`.
    values: Vec<T>,
    lookup: AHashMap<T, u32>,
}

impl<T> Dictionary<T>
where
    T: Clone + Eq + Hash,
{
    /// Creates a dictionary holding only the missing sentinel.
    pub fn empty() -> Dictionary<T> {
        Dictionary {
            values: Vec::new(),
            lookup: AHashMap::new(),
        }
    }

    /// Creates a dictionary assigning indices `1..=values.len()` in order.
    ///
    /// Duplicate values are an argument error.
    pub fn new(values: Vec<T>) -> Result<Dictionary<T>> {
        verify_arg!(values, values.len() < i32::MAX as usize);
        let mut lookup = AHashMap::with_capacity(values.len());
        for (position, value) in values.iter().enumerate() {
            if lookup.insert(value.clone(), position as u32 + 1).is_some() {
                return Err(Error::invalid_arg(
                    "values",
                    format!("duplicate dictionary value at index {}", position + 1),
                ));
            }
        }
        Ok(Dictionary { values, lookup })
    }

    /// Number of entries, the missing sentinel included.
    #[inline]
    pub fn size(&self) -> usize {
        self.values.len() + 1
    }

    /// Largest valid index.
    #[inline]
    pub fn max_index(&self) -> u32 {
        self.values.len() as u32
    }

    /// Value at `index`, `None` for the sentinel and for indices past the end.
    #[inline]
    pub fn get(&self, index: u32) -> Option<&T> {
        if index == 0 {
            None
        } else {
            self.values.get(index as usize - 1)
        }
    }

    pub fn index_of(&self, value: &T) -> Option<u32> {
        self.lookup.get(value).copied()
    }

    /// Index of `value`, appending it as a new entry when absent.
    ///
    /// Fails with a format-overflow error once the next index would not fit a 32-bit
    /// packed format.
    pub fn intern(&mut self, value: T) -> Result<u32> {
        if let Some(index) = self.index_of(&value) {
            return Ok(index);
        }
        let index = self.values.len() as u64 + 1;
        let max = PackedFormat::I32.max_value();
        if index > max as u64 {
            return Err(Error::format_overflow(
                PackedFormat::I32.to_string(),
                index,
                max as u64,
            ));
        }
        self.values.push(value.clone());
        self.lookup.insert(value, index as u32);
        Ok(index as u32)
    }

    /// Values in index order, without the sentinel.
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Reorders the dictionary by `permutation`: the value at old index `i` moves to
    /// `permutation[i]`.
    ///
    /// `permutation` must cover every index, keep `0` fixed and be a bijection. The
    /// returned translation is the permutation itself.
    pub fn remap(&self, permutation: &[u32]) -> Result<(Dictionary<T>, IndexTranslation)> {
        verify_arg!(permutation, permutation.len() == self.size());
        verify_arg!(permutation, permutation[0] == 0);
        let mut slots: Vec<Option<T>> = vec![None; self.values.len()];
        for (old_index, &new_index) in permutation.iter().enumerate().skip(1) {
            if new_index == 0 || new_index as usize > self.values.len() {
                return Err(Error::invalid_arg(
                    "permutation",
                    format!("index {old_index} mapped to invalid position {new_index}"),
                ));
            }
            let slot = &mut slots[new_index as usize - 1];
            if slot.is_some() {
                return Err(Error::invalid_arg(
                    "permutation",
                    format!("position {new_index} assigned twice"),
                ));
            }
            *slot = Some(self.values[old_index - 1].clone());
        }
        // A bijection on 1..size fills every slot.
        let values = slots.into_iter().flatten().collect::<Vec<_>>();
        let dictionary = Dictionary::new(values)?;
        Ok((dictionary, IndexTranslation::new(permutation.to_vec())))
    }

    /// Unites this dictionary with `other`.
    ///
    /// Entries of `self` keep their indices; values only present in `other` are
    /// appended in their original relative order. The returned translation maps
    /// indices of `other` to indices of the merged dictionary.
    pub fn merge(&self, other: &Dictionary<T>) -> (Dictionary<T>, IndexTranslation) {
        let mut values = self.values.clone();
        let mut lookup = self.lookup.clone();
        let mut translation = Vec::with_capacity(other.size());
        translation.push(0);
        for value in &other.values {
            let index = match lookup.get(value) {
                Some(&index) => index,
                None => {
                    values.push(value.clone());
                    let index = values.len() as u32;
                    lookup.insert(value.clone(), index);
                    index
                }
            };
            translation.push(index);
        }
        (
            Dictionary { values, lookup },
            IndexTranslation::new(translation),
        )
    }

    /// Drops entries whose `usage` count is zero.
    ///
    /// `usage[i]` is the number of occurrences of index `i`. When every entry is used
    /// the same `Arc` is returned together with an identity translation, so callers
    /// can skip rewriting their data by checking `Arc::ptr_eq`. Dropped entries
    /// translate to `0`.
    pub fn compact(
        self: &Arc<Self>,
        usage: &[usize],
    ) -> Result<(Arc<Dictionary<T>>, IndexTranslation)> {
        verify_arg!(usage, usage.len() == self.size());
        if usage[1..].iter().all(|&count| count > 0) {
            return Ok((Arc::clone(self), IndexTranslation::identity(self.size())));
        }
        let mut values = Vec::new();
        let mut translation = vec![0u32; self.size()];
        for (position, value) in self.values.iter().enumerate() {
            if usage[position + 1] > 0 {
                values.push(value.clone());
                translation[position + 1] = values.len() as u32;
            }
        }
        log::debug!(
            "compacted dictionary from {} to {} entries",
            self.size(),
            values.len() + 1
        );
        Ok((
            Arc::new(Dictionary::new(values)?),
            IndexTranslation::new(translation),
        ))
    }
}

impl<T> Default for Dictionary<T>
where
    T: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: PartialEq> PartialEq for Dictionary<T> {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

/// A table rewriting dictionary indices: index `i` becomes `translation[i]`.
///
/// Entry `0` always maps to `0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTranslation(Arc<[u32]>);

impl IndexTranslation {
    fn new(table: Vec<u32>) -> IndexTranslation {
        IndexTranslation(table.into())
    }

    pub fn identity(size: usize) -> IndexTranslation {
        IndexTranslation::new((0..size as u32).collect())
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
    pub fn get(&self, index: u32) -> Option<u32> {
        self.0.get(index as usize).copied()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn is_identity(&self) -> bool {
        self.0.iter().enumerate().all(|(i, &t)| i as u32 == t)
    }

    /// Largest target index.
    pub fn max_target(&self) -> u32 {
        self.0.iter().copied().max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(values: &[&str]) -> Dictionary<Arc<str>> {
        Dictionary::new(values.iter().map(|&v| Arc::from(v)).collect()).unwrap()
    }

    fn names(dictionary: &Dictionary<Arc<str>>) -> Vec<&str> {
        dictionary.values().iter().map(|v| v.as_ref()).collect()
    }

    #[test]
    fn test_sentinel_and_lookup() {
        let d = dict(&["a", "b"]);
        assert_eq!(d.size(), 3);
        assert_eq!(d.get(0), None);
        assert_eq!(d.get(2).map(|v| v.as_ref()), Some("b"));
        assert_eq!(d.get(3), None);
        assert_eq!(d.index_of(&Arc::from("a")), Some(1));
        assert_eq!(d.index_of(&Arc::from("z")), None);
    }

    #[test]
    fn test_intern_appends_once() {
        let mut d = Dictionary::<Arc<str>>::empty();
        assert_eq!(d.intern(Arc::from("b")).unwrap(), 1);
        assert_eq!(d.intern(Arc::from("a")).unwrap(), 2);
        assert_eq!(d.intern(Arc::from("b")).unwrap(), 1);
        assert_eq!(names(&d), ["b", "a"]);
        assert_eq!(d.index_of(&Arc::from("a")), Some(2));
    }

    #[test]
    fn test_duplicates_rejected() {
        let result = Dictionary::new(vec![Arc::<str>::from("a"), Arc::from("a")]);
        assert!(result.unwrap_err().is_invalid_arg());
    }

    #[test]
    fn test_remap() {
        let d = dict(&["a", "b", "c"]);
        let (remapped, translation) = d.remap(&[0, 3, 1, 2]).unwrap();
        assert_eq!(names(&remapped), ["b", "c", "a"]);
        assert_eq!(translation.as_slice(), [0, 3, 1, 2]);
        for old in 1..4 {
            assert_eq!(remapped.get(translation.get(old).unwrap()), d.get(old));
        }
    }

    #[test]
    fn test_remap_rejects_bad_permutations() {
        let d = dict(&["a", "b"]);
        assert!(d.remap(&[1, 0, 2]).is_err());
        assert!(d.remap(&[0, 1]).is_err());
        assert!(d.remap(&[0, 1, 1]).is_err());
        assert!(d.remap(&[0, 1, 3]).is_err());
    }

    #[test]
    fn test_merge() {
        let left = dict(&["a", "b"]);
        let right = dict(&["c", "b", "d"]);
        let (merged, translation) = left.merge(&right);
        assert_eq!(names(&merged), ["a", "b", "c", "d"]);
        assert_eq!(translation.as_slice(), [0, 3, 2, 4]);
        assert_eq!(merged.index_of(&Arc::from("d")), Some(4));
    }

    #[test]
    fn test_compact() {
        let d = Arc::new(dict(&["a", "b", "c"]));
        let (same, translation) = d.compact(&[5, 1, 1, 1]).unwrap();
        assert!(Arc::ptr_eq(&same, &d));
        assert!(translation.is_identity());

        let (compacted, translation) = d.compact(&[0, 2, 0, 1]).unwrap();
        assert!(!Arc::ptr_eq(&compacted, &d));
        assert_eq!(names(&compacted), ["a", "c"]);
        assert_eq!(translation.as_slice(), [0, 1, 0, 2]);

        assert!(d.compact(&[1, 1]).is_err());
    }
}
