//! Little-endian primitive decoding for PE structures.
//!
//! Every multi-byte field in the PE/COFF format and in the ECMA-335 metadata headers is stored
//! little-endian. This module provides the [`PeIO`] trait that abstracts over the fixed-width
//! integer types, and the two free functions [`read_le`] and [`read_le_at`] that perform a
//! bounds-checked read out of a byte slice.
//!
//! Most callers go through [`crate::Parser`], which keeps its own cursor and forwards to
//! [`read_le_at`].

use crate::Result;

/// Trait for fixed-width integer types that can be decoded from little-endian bytes.
///
/// Implemented for `u8`, `i8`, `u16`, `i16`, `u32`, `i32`, `u64` and `i64`.
pub trait PeIO: Sized {
    /// The byte array matching the width of `Self`
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]>;

    /// Decode `Self` from little-endian bytes
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_pe_io {
    ($($ty:ty),* $(,)?) => {
        $(
            impl PeIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_pe_io!(u8, i8, u16, i16, u32, i32, u64, i64);

/// Safely reads a value of type `T` in little-endian byte order from the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::TruncatedInput`] if `data` is shorter than `T`.
///
/// # Examples
///
/// ```rust
/// use pescope::file::io::read_le;
///
/// let data = [0x4D, 0x5A, 0x90, 0x00];
/// let signature: u16 = read_le(&data)?;
/// assert_eq!(signature, 0x5A4D);
/// # Ok::<(), pescope::Error>(())
/// ```
pub fn read_le<T: PeIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Safely reads a value of type `T` in little-endian byte order at `offset`, advancing
/// `offset` by the size of `T` on success.
///
/// # Errors
/// Returns [`crate::Error::TruncatedInput`] if fewer than `size_of::<T>()` bytes remain after
/// `offset`. The offset is left unchanged in that case.
pub fn read_le_at<T: PeIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(truncated_error!(*offset, type_len));
    };

    if end > data.len() {
        return Err(truncated_error!(*offset, type_len));
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(truncated_error!(*offset, type_len));
    };

    *offset = end;

    Ok(T::from_le_bytes(read))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    const TEST_BUFFER: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

    #[test]
    fn read_le_u8() {
        let result = read_le::<u8>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x01);
    }

    #[test]
    fn read_le_u16() {
        let result = read_le::<u16>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0201);
    }

    #[test]
    fn read_le_u32() {
        let result = read_le::<u32>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x04030201);
    }

    #[test]
    fn read_le_u64() {
        let result = read_le::<u64>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0807060504030201);
    }

    #[test]
    fn read_le_i16_negative() {
        let result = read_le::<i16>(&[0xFE, 0xFF]).unwrap();
        assert_eq!(result, -2);
    }

    #[test]
    fn read_le_at_advances() {
        let mut offset = 2;
        let value = read_le_at::<u32>(&TEST_BUFFER, &mut offset).unwrap();
        assert_eq!(value, 0x06050403);
        assert_eq!(offset, 6);
    }

    #[test]
    fn read_le_at_truncated_keeps_offset() {
        let mut offset = 6;
        let result = read_le_at::<u32>(&TEST_BUFFER, &mut offset);
        assert!(matches!(
            result,
            Err(Error::TruncatedInput {
                offset: 6,
                needed: 4
            })
        ));
        assert_eq!(offset, 6);
    }

    #[test]
    fn read_le_at_overflowing_offset() {
        let mut offset = usize::MAX;
        assert!(read_le_at::<u16>(&TEST_BUFFER, &mut offset).is_err());
    }
}
