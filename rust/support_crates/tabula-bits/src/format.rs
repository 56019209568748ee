use serde::{Deserialize, Serialize};

/// Physical width of a categorical index array.
///
/// `U2` and `U4` pack four and two values per byte, `U8` and `U16` use native byte
/// and short arrays, `I32` uses a native signed int array whose values must be
/// non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PackedFormat {
    U2,
    U4,
    U8,
    U16,
    I32,
}

impl PackedFormat {
    pub const ALL: [PackedFormat; 5] = [
        PackedFormat::U2,
        PackedFormat::U4,
        PackedFormat::U8,
        PackedFormat::U16,
        PackedFormat::I32,
    ];

    #[inline]
    pub fn bits(self) -> usize {
        match self {
            PackedFormat::U2 => 2,
            PackedFormat::U4 => 4,
            PackedFormat::U8 => 8,
            PackedFormat::U16 => 16,
            PackedFormat::I32 => 32,
        }
    }

    /// Largest index the format can store.
    #[inline]
    pub fn max_value(self) -> u32 {
        match self {
            PackedFormat::U2 => 0b11,
            PackedFormat::U4 => 0b1111,
            PackedFormat::U8 => u8::MAX as u32,
            PackedFormat::U16 => u16::MAX as u32,
            PackedFormat::I32 => i32::MAX as u32,
        }
    }

    /// The narrowest format that can store every index up to and including `max_index`.
    ///
    /// Returns `None` when `max_index` exceeds even the 32-bit signed range.
    pub fn narrowest_for(max_index: u32) -> Option<PackedFormat> {
        Self::ALL
            .into_iter()
            .find(|format| max_index <= format.max_value())
    }

    /// The narrowest format for a dictionary of `dictionary_size` entries, sentinel
    /// included.
    pub fn for_dictionary_size(dictionary_size: usize) -> Option<PackedFormat> {
        let max_index = u32::try_from(dictionary_size.saturating_sub(1)).ok()?;
        Self::narrowest_for(max_index)
    }

    /// Average storage cost of one value, in bytes.
    #[inline]
    pub fn value_bytes(self) -> f64 {
        self.bits() as f64 / 8.0
    }

    /// Bytes needed to hold `len` values.
    #[inline]
    pub fn byte_len(self, len: usize) -> usize {
        crate::packed::packed_len(len, self.bits())
    }

    #[inline]
    pub fn fits(self, value: u32) -> bool {
        value <= self.max_value()
    }
}

impl std::fmt::Display for PackedFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PackedFormat::U2 => "UINT2",
            PackedFormat::U4 => "UINT4",
            PackedFormat::U8 => "UINT8",
            PackedFormat::U16 => "UINT16",
            PackedFormat::I32 => "INT32",
        };
        f.write_str(name)
    }
}
