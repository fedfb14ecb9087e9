//! Endian-aware primitive reads and writes shared by all codecs.

use crate::{Error::OutOfBounds, Result};

/// Types readable/writable as little-endian fixed-width fields.
pub trait LeField: Sized {
    /// The byte representation.
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]> + AsRef<[u8]>;

    /// Decode from little-endian bytes.
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
    /// Encode to little-endian bytes.
    fn to_le_bytes(self) -> Self::Bytes;
}

macro_rules! le_field {
    ($($ty:ty => $n:expr),* $(,)?) => {
        $(
            impl LeField for $ty {
                type Bytes = [u8; $n];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }
            }
        )*
    };
}

le_field!(u8 => 1, u16 => 2, u32 => 4, u64 => 8, i32 => 4, f32 => 4);

/// Read a `T` at `*offset`, advancing the offset.
///
/// # Errors
/// Returns [`OutOfBounds`] if fewer than `size_of::<T>()` bytes remain.
pub fn read_le_at<T: LeField>(data: &[u8], offset: &mut usize) -> Result<T> {
    let size = std::mem::size_of::<T>();
    let end = offset.checked_add(size).ok_or(OutOfBounds)?;
    if end > data.len() {
        return Err(OutOfBounds);
    }
    let bytes = T::Bytes::try_from(&data[*offset..end]).map_err(|_| OutOfBounds)?;
    *offset = end;
    Ok(T::from_le_bytes(bytes))
}

/// Append a `T` in little-endian form.
pub fn write_le<T: LeField>(out: &mut Vec<u8>, value: T) {
    out.extend_from_slice(value.to_le_bytes().as_ref());
}

/// Append a length-prefixed UTF-8 string (`u32` length + bytes).
pub fn write_str(out: &mut Vec<u8>, s: &str) {
    write_le(out, s.len() as u32);
    out.extend_from_slice(s.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_fields() {
        let mut out = Vec::new();
        write_le(&mut out, 0xadu8);
        write_le(&mut out, 0xbeefu16);
        write_le(&mut out, 0xdead_beefu32);

        let mut offset = 0;
        assert_eq!(read_le_at::<u8>(&out, &mut offset).unwrap(), 0xad);
        assert_eq!(read_le_at::<u16>(&out, &mut offset).unwrap(), 0xbeef);
        assert_eq!(read_le_at::<u32>(&out, &mut offset).unwrap(), 0xdead_beef);
        assert!(read_le_at::<u8>(&out, &mut offset).is_err());
    }
}
