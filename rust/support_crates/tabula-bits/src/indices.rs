use std::sync::Arc;

use tabula_common::{Result, error::Error, verify_arg};

use crate::{
    buffer::PackedBuffer,
    format::PackedFormat,
    packed::{read_u2, read_u4},
};

/// An immutable categorical index array in one [`PackedFormat`].
///
/// Cloning is cheap: the storage is reference counted and never mutated after
/// construction. Index `0` denotes a missing value.
#[derive(Debug, Clone)]
pub struct PackedIndices {
    format: PackedFormat,
    len: usize,
    data: IndexData,
}

#[derive(Debug, Clone)]
pub(crate) enum IndexData {
    Bytes(Arc<[u8]>),
    Shorts(Arc<[u16]>),
    Ints(Arc<[i32]>),
}

impl PackedIndices {
    pub(crate) fn from_parts(format: PackedFormat, len: usize, data: IndexData) -> PackedIndices {
        PackedIndices { format, len, data }
    }

    pub fn empty(format: PackedFormat) -> PackedIndices {
        PackedBuffer::new(format, 0).freeze()
    }

    /// Wraps `len` 2-bit indices packed four per byte.
    pub fn from_u2_bytes(bytes: Vec<u8>, len: usize) -> Result<PackedIndices> {
        verify_arg!(bytes, bytes.len() == PackedFormat::U2.byte_len(len));
        Ok(Self::from_parts(
            PackedFormat::U2,
            len,
            IndexData::Bytes(bytes.into()),
        ))
    }

    /// Wraps `len` 4-bit indices packed two per byte.
    pub fn from_u4_bytes(bytes: Vec<u8>, len: usize) -> Result<PackedIndices> {
        verify_arg!(bytes, bytes.len() == PackedFormat::U4.byte_len(len));
        Ok(Self::from_parts(
            PackedFormat::U4,
            len,
            IndexData::Bytes(bytes.into()),
        ))
    }

    pub fn from_u8(values: Vec<u8>) -> PackedIndices {
        let len = values.len();
        Self::from_parts(PackedFormat::U8, len, IndexData::Bytes(values.into()))
    }

    pub fn from_u16(values: Vec<u16>) -> PackedIndices {
        let len = values.len();
        Self::from_parts(PackedFormat::U16, len, IndexData::Shorts(values.into()))
    }

    /// Wraps native 32-bit indices. Negative entries are rejected.
    pub fn from_i32(values: Vec<i32>) -> Result<PackedIndices> {
        if let Some(&negative) = values.iter().find(|&&v| v < 0) {
            return Err(Error::invalid_arg(
                "values",
                format!("negative category index {negative}"),
            ));
        }
        let len = values.len();
        Ok(Self::from_parts(
            PackedFormat::I32,
            len,
            IndexData::Ints(values.into()),
        ))
    }

    /// Packs `values` into `format`, rejecting indices the format cannot hold.
    pub fn from_values(format: PackedFormat, values: &[u32]) -> Result<PackedIndices> {
        Ok(PackedBuffer::from_values(format, values)?.freeze())
    }

    #[inline]
    pub fn format(&self) -> PackedFormat {
        self.format
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reads the index at `position`.
    ///
    /// # Panics
    ///
    /// Panics if `position >= len()`.
    #[inline]
    pub fn get(&self, position: usize) -> u32 {
        assert!(position < self.len, "position {position} >= {}", self.len);
        match (&self.data, self.format) {
            (IndexData::Bytes(bytes), PackedFormat::U2) => read_u2(bytes, position) as u32,
            (IndexData::Bytes(bytes), PackedFormat::U4) => read_u4(bytes, position) as u32,
            (IndexData::Bytes(bytes), _) => bytes[position] as u32,
            (IndexData::Shorts(shorts), _) => shorts[position] as u32,
            (IndexData::Ints(ints), _) => ints[position] as u32,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.len).map(move |position| self.get(position))
    }

    /// Largest index present, `0` for an empty array.
    pub fn max_index(&self) -> u32 {
        match &self.data {
            IndexData::Shorts(shorts) => shorts.iter().copied().max().unwrap_or(0) as u32,
            IndexData::Ints(ints) => ints.iter().copied().max().unwrap_or(0) as u32,
            IndexData::Bytes(_) => self.iter().max().unwrap_or(0),
        }
    }

    /// Size of the backing storage in bytes.
    pub fn byte_size(&self) -> usize {
        self.format.byte_len(self.len)
    }

    /// Materializes `result[i] = self[mapping[i]]`, with out-of-range or negative
    /// mapping entries reading as `0`.
    pub fn gather(&self, mapping: &[i32]) -> PackedIndices {
        let mut buffer = PackedBuffer::new(self.format, mapping.len());
        for (target, &source) in mapping.iter().enumerate() {
            if source >= 0 && (source as usize) < self.len {
                buffer.set_unchecked(target, self.get(source as usize));
            }
        }
        buffer.freeze()
    }

    /// Builds a new index array of `format` from `values`, rejecting indices that
    /// do not fit.
    pub fn collect(
        format: PackedFormat,
        len: usize,
        values: impl Iterator<Item = u32>,
    ) -> Result<PackedIndices> {
        let mut buffer = PackedBuffer::new(format, len);
        for (position, value) in values.enumerate() {
            buffer.set(position, value)?;
        }
        Ok(buffer.freeze())
    }

    /// Rewrites every index `i` to `translation[i]`, storing the result in `format`.
    ///
    /// Indices outside the translation table are an argument error: the table must
    /// cover the whole dictionary the indices refer to.
    pub fn translate(&self, translation: &[u32], format: PackedFormat) -> Result<PackedIndices> {
        let mut buffer = PackedBuffer::new(format, self.len);
        for position in 0..self.len {
            let index = self.get(position) as usize;
            let Some(&translated) = translation.get(index) else {
                return Err(Error::invalid_arg(
                    "translation",
                    format!("no entry for category index {index}"),
                ));
            };
            buffer.set(position, translated)?;
        }
        Ok(buffer.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_constructors() {
        let u2 = PackedIndices::from_u2_bytes(vec![0b11_10_01_00, 0b01], 5).unwrap();
        assert_eq!(u2.iter().collect::<Vec<_>>(), [0, 1, 2, 3, 1]);
        assert!(PackedIndices::from_u2_bytes(vec![0, 0], 9).is_err());

        let u4 = PackedIndices::from_u4_bytes(vec![0x21, 0x0F], 3).unwrap();
        assert_eq!(u4.iter().collect::<Vec<_>>(), [1, 2, 15]);

        let u16 = PackedIndices::from_u16(vec![300, 0, 7]);
        assert_eq!(u16.max_index(), 300);

        assert!(PackedIndices::from_i32(vec![1, -1]).unwrap_err().is_invalid_arg());
    }

    #[test]
    fn test_gather_with_missing_positions() {
        let indices = PackedIndices::from_values(PackedFormat::U4, &[5, 6, 7]).unwrap();
        let gathered = indices.gather(&[2, -1, 0, 3, 1]);
        assert_eq!(gathered.format(), PackedFormat::U4);
        assert_eq!(gathered.iter().collect::<Vec<_>>(), [7, 0, 5, 0, 6]);
    }

    #[test]
    fn test_translate_widens_format() {
        let indices = PackedIndices::from_values(PackedFormat::U2, &[1, 2, 3, 0]).unwrap();
        let table = [0, 10, 20, 300];
        assert!(
            indices
                .translate(&table, PackedFormat::U8)
                .unwrap_err()
                .is_format_overflow()
        );
        let widened = indices.translate(&table, PackedFormat::U16).unwrap();
        assert_eq!(widened.iter().collect::<Vec<_>>(), [10, 20, 300, 0]);
        assert!(
            indices
                .translate(&[0, 1], PackedFormat::U2)
                .unwrap_err()
                .is_invalid_arg()
        );
    }

    #[test]
    fn test_random_values_round_trip() {
        fastrand::seed(90210);
        for format in PackedFormat::ALL {
            let max = format.max_value().min(100_000);
            let values = (0..257).map(|_| fastrand::u32(0..=max)).collect::<Vec<_>>();
            let packed = PackedIndices::from_values(format, &values).unwrap();
            assert_eq!(packed.iter().collect::<Vec<_>>(), values);
            assert_eq!(packed.max_index(), values.iter().copied().max().unwrap());
        }
    }
}
