use tabula_common::{Result, error::Error, verify_arg};

use crate::{
    format::PackedFormat,
    indices::{IndexData, PackedIndices},
    packed::{read_u2, read_u4, write_u2, write_u4},
};

/// A mutable buffer of categorical indices in one [`PackedFormat`].
///
/// The buffer is bounded: [`PackedBuffer::set`] and [`PackedBuffer::push`] reject
/// indices its format cannot represent instead of truncating them. A freshly created
/// buffer holds only zeros, i.e. every position reads as missing. Writers that do not
/// know their dictionary size up front start narrow, append with `push` and call
/// [`PackedBuffer::widen`] when the dictionary outgrows the format.
#[derive(Debug, Clone)]
pub struct PackedBuffer {
    format: PackedFormat,
    len: usize,
    data: BufferData,
}

#[derive(Debug, Clone)]
enum BufferData {
    Bytes(Vec<u8>),
    Shorts(Vec<u16>),
    Ints(Vec<i32>),
}

impl PackedBuffer {
    pub fn new(format: PackedFormat, len: usize) -> PackedBuffer {
        let data = match format {
            PackedFormat::U2 | PackedFormat::U4 | PackedFormat::U8 => {
                BufferData::Bytes(vec![0; format.byte_len(len)])
            }
            PackedFormat::U16 => BufferData::Shorts(vec![0; len]),
            PackedFormat::I32 => BufferData::Ints(vec![0; len]),
        };
        PackedBuffer { format, len, data }
    }

    /// An empty buffer with room for `capacity` indices.
    pub fn with_capacity(format: PackedFormat, capacity: usize) -> PackedBuffer {
        let data = match format {
            PackedFormat::U2 | PackedFormat::U4 | PackedFormat::U8 => {
                BufferData::Bytes(Vec::with_capacity(format.byte_len(capacity)))
            }
            PackedFormat::U16 => BufferData::Shorts(Vec::with_capacity(capacity)),
            PackedFormat::I32 => BufferData::Ints(Vec::with_capacity(capacity)),
        };
        PackedBuffer {
            format,
            len: 0,
            data,
        }
    }

    /// Builds a buffer holding `values`, failing on the first index that does not fit.
    pub fn from_values(format: PackedFormat, values: &[u32]) -> Result<PackedBuffer> {
        let mut buffer = PackedBuffer::new(format, values.len());
        for (index, &value) in values.iter().enumerate() {
            buffer.set(index, value)?;
        }
        Ok(buffer)
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

    /// Stores `value` at `index`.
    ///
    /// Fails with an out-of-bounds error when `index >= len()` and with a format
    /// overflow error when `value` exceeds [`PackedFormat::max_value`].
    pub fn set(&mut self, index: usize, value: u32) -> Result<()> {
        if index >= self.len {
            return Err(Error::out_of_bounds(index, self.len));
        }
        if !self.format.fits(value) {
            return Err(Error::format_overflow(
                self.format.to_string(),
                value as u64,
                self.format.max_value() as u64,
            ));
        }
        self.set_unchecked(index, value);
        Ok(())
    }

    /// Appends `value`, failing with a format overflow error when it does not fit.
    pub fn push(&mut self, value: u32) -> Result<()> {
        if !self.format.fits(value) {
            return Err(Error::format_overflow(
                self.format.to_string(),
                value as u64,
                self.format.max_value() as u64,
            ));
        }
        let index = self.len;
        match &mut self.data {
            BufferData::Bytes(bytes) => bytes.resize(self.format.byte_len(index + 1), 0),
            BufferData::Shorts(shorts) => shorts.push(0),
            BufferData::Ints(ints) => ints.push(0),
        }
        self.len += 1;
        self.set_unchecked(index, value);
        Ok(())
    }

    /// Reserves room for `additional` more indices.
    pub fn reserve(&mut self, additional: usize) {
        match &mut self.data {
            BufferData::Bytes(bytes) => {
                let target = self.format.byte_len(self.len + additional);
                bytes.reserve(target.saturating_sub(bytes.len()));
            }
            BufferData::Shorts(shorts) => shorts.reserve(additional),
            BufferData::Ints(ints) => ints.reserve(additional),
        }
    }

    /// Re-encodes the buffer in `format`, which must be at least as wide as the
    /// current one.
    pub fn widen(&mut self, format: PackedFormat) -> Result<()> {
        verify_arg!(format, format.bits() >= self.format.bits());
        if format == self.format {
            return Ok(());
        }
        let mut widened = PackedBuffer::new(format, self.len);
        for index in 0..self.len {
            widened.set_unchecked(index, self.read(index));
        }
        *self = widened;
        Ok(())
    }

    /// Stores `value` at `index` without validating that the value fits the format.
    ///
    /// Only the low bits of `value` are stored. `index` must be in bounds.
    #[inline]
    pub(crate) fn set_unchecked(&mut self, index: usize, value: u32) {
        match (&mut self.data, self.format) {
            (BufferData::Bytes(bytes), PackedFormat::U2) => write_u2(bytes, index, value as u8),
            (BufferData::Bytes(bytes), PackedFormat::U4) => write_u4(bytes, index, value as u8),
            (BufferData::Bytes(bytes), _) => bytes[index] = value as u8,
            (BufferData::Shorts(shorts), _) => shorts[index] = value as u16,
            (BufferData::Ints(ints), _) => ints[index] = value as i32,
        }
    }

    pub fn get(&self, index: usize) -> Option<u32> {
        (index < self.len).then(|| self.read(index))
    }

    #[inline]
    fn read(&self, index: usize) -> u32 {
        match (&self.data, self.format) {
            (BufferData::Bytes(bytes), PackedFormat::U2) => read_u2(bytes, index) as u32,
            (BufferData::Bytes(bytes), PackedFormat::U4) => read_u4(bytes, index) as u32,
            (BufferData::Bytes(bytes), _) => bytes[index] as u32,
            (BufferData::Shorts(shorts), _) => shorts[index] as u32,
            (BufferData::Ints(ints), _) => ints[index] as u32,
        }
    }

    /// Converts the buffer into its immutable, shareable form.
    pub fn freeze(self) -> PackedIndices {
        let data = match self.data {
            BufferData::Bytes(bytes) => IndexData::Bytes(bytes.into()),
            BufferData::Shorts(shorts) => IndexData::Shorts(shorts.into()),
            BufferData::Ints(ints) => IndexData::Ints(ints.into()),
        };
        PackedIndices::from_parts(self.format, self.len, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_all_formats() {
        for format in PackedFormat::ALL {
            let max = format.max_value().min(1000);
            let mut buffer = PackedBuffer::new(format, 11);
            for i in 0..11 {
                buffer.set(i, (i as u32 * 7) % (max + 1)).unwrap();
            }
            for i in 0..11 {
                assert_eq!(buffer.get(i), Some((i as u32 * 7) % (max + 1)), "{format}");
            }
            assert_eq!(buffer.get(11), None);
        }
    }

    #[test]
    fn test_overflow_is_rejected() {
        let mut buffer = PackedBuffer::new(PackedFormat::U2, 4);
        buffer.set(1, 3).unwrap();
        let err = buffer.set(2, 4).unwrap_err();
        assert!(err.is_format_overflow());
        // The rejected write must not have touched the buffer.
        assert_eq!(buffer.get(2), Some(0));
        assert_eq!(buffer.get(1), Some(3));

        let mut buffer = PackedBuffer::new(PackedFormat::U16, 2);
        assert!(buffer.set(0, 65536).unwrap_err().is_format_overflow());
    }

    #[test]
    fn test_out_of_bounds_is_rejected() {
        let mut buffer = PackedBuffer::new(PackedFormat::U8, 3);
        assert!(buffer.set(3, 1).unwrap_err().is_out_of_bounds());
    }

    #[test]
    fn test_push_and_widen() {
        fastrand::seed(5021);
        let values: Vec<u32> = (0..301).map(|_| fastrand::u32(0..4)).collect();
        let mut buffer = PackedBuffer::with_capacity(PackedFormat::U2, 8);
        for &value in &values {
            buffer.push(value).unwrap();
        }
        assert_eq!(buffer.len(), 301);
        assert!(buffer.push(4).unwrap_err().is_format_overflow());
        assert_eq!(buffer.len(), 301);

        buffer.widen(PackedFormat::U16).unwrap();
        buffer.push(40_000).unwrap();
        assert_eq!(buffer.format(), PackedFormat::U16);
        assert!(buffer.widen(PackedFormat::U4).unwrap_err().is_invalid_arg());

        let frozen = buffer.freeze();
        assert_eq!(frozen.len(), 302);
        assert_eq!(frozen.iter().take(301).collect::<Vec<_>>(), values);
        assert_eq!(frozen.get(301), 40_000);
    }

    #[test]
    fn test_from_values() {
        let buffer = PackedBuffer::from_values(PackedFormat::U4, &[1, 15, 0, 9]).unwrap();
        let frozen = buffer.freeze();
        assert_eq!(frozen.iter().collect::<Vec<_>>(), [1, 15, 0, 9]);
        assert!(PackedBuffer::from_values(PackedFormat::U4, &[1, 16]).is_err());
    }
}
