//! Bit-level read/write of unsigned 2, 4 and 8-bit values packed into byte arrays.
//!
//! A buffer holding `n` values of width `K` is `ceil(n * K / 8)` bytes long. Values are
//! packed LSB-first: position `0` occupies the lowest bits of byte `0`.
//!
//! ```rust
//! use tabula_bits::packed::{read_u2, write_u2};
//!
//! let mut data = vec![0u8; 1];
//! for (position, value) in [0u8, 1, 2, 3].into_iter().enumerate() {
//!     write_u2(&mut data, position, value);
//! }
//! assert_eq!(data[0], 0b11_10_01_00);
//! assert_eq!(read_u2(&data, 2), 2);
//! ```
//!
//! None of the functions check `value < 2^K`; only the low `K` bits of `value` are
//! stored. Positions past the end of `data` panic like any slice index.

/// Number of bytes needed to hold `len` values of `bits` width.
#[inline]
pub fn packed_len(len: usize, bits: usize) -> usize {
    (len * bits).div_ceil(8)
}

/// Writes the 2-bit `value` at `position`, leaving neighbouring values untouched.
#[inline]
pub fn write_u2(data: &mut [u8], position: usize, value: u8) {
    let index = position >> 2;
    let shift = (position & 3) << 1;
    data[index] = (data[index] & !(0b11 << shift)) | ((value & 0b11) << shift);
}

#[inline]
pub fn read_u2(data: &[u8], position: usize) -> u8 {
    (data[position >> 2] >> ((position & 3) << 1)) & 0b11
}

/// Writes the 4-bit `value` at `position`, leaving the other nibble untouched.
#[inline]
pub fn write_u4(data: &mut [u8], position: usize, value: u8) {
    let index = position >> 1;
    let shift = (position & 1) << 2;
    data[index] = (data[index] & !(0b1111 << shift)) | ((value & 0b1111) << shift);
}

#[inline]
pub fn read_u4(data: &[u8], position: usize) -> u8 {
    (data[position >> 1] >> ((position & 1) << 2)) & 0b1111
}

#[inline]
pub fn write_u8(data: &mut [u8], position: usize, value: u8) {
    data[position] = value;
}

#[inline]
pub fn read_u8(data: &[u8], position: usize) -> u8 {
    data[position]
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: usize = 37;

    fn check_exhaustive(
        bits: usize,
        write: fn(&mut [u8], usize, u8),
        read: fn(&[u8], usize) -> u8,
    ) {
        let max = 1u16 << bits;
        fastrand::seed(7341);
        let background = (0..SIZE)
            .map(|_| fastrand::u16(0..max) as u8)
            .collect::<Vec<_>>();
        let mut data = vec![0u8; packed_len(SIZE, bits)];
        for (position, &value) in background.iter().enumerate() {
            write(&mut data, position, value);
        }

        for position in 0..SIZE {
            for value in 0..max {
                let mut written = data.clone();
                write(&mut written, position, value as u8);
                assert_eq!(read(&written, position), value as u8);
                for other in (0..SIZE).filter(|&p| p != position) {
                    assert_eq!(read(&written, other), background[other], "neighbour {other}");
                }
            }
        }
    }

    #[test]
    fn test_u2_exhaustive() {
        check_exhaustive(2, write_u2, read_u2);
    }

    #[test]
    fn test_u4_exhaustive() {
        check_exhaustive(4, write_u4, read_u4);
    }

    #[test]
    fn test_u8_exhaustive() {
        check_exhaustive(8, write_u8, read_u8);
    }

    #[test]
    fn test_u2_single_byte_sequence() {
        let mut data = vec![0u8; 1];
        for position in 0..4 {
            write_u2(&mut data, position, position as u8);
        }
        let read_back = (0..4).map(|p| read_u2(&data, p)).collect::<Vec<_>>();
        assert_eq!(read_back, [0, 1, 2, 3]);
    }

    #[test]
    fn test_overwrite_clears_previous_bits() {
        let mut data = vec![0xFFu8; 2];
        write_u4(&mut data, 1, 0);
        assert_eq!(data[0], 0x0F);
        write_u2(&mut data, 5, 1);
        assert_eq!(data[1], 0b1111_0111);
    }

    #[test]
    fn test_packed_len() {
        assert_eq!(packed_len(0, 2), 0);
        assert_eq!(packed_len(1, 2), 1);
        assert_eq!(packed_len(4, 2), 1);
        assert_eq!(packed_len(5, 2), 2);
        assert_eq!(packed_len(3, 4), 2);
        assert_eq!(packed_len(3, 8), 3);
    }
}
