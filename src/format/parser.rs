//! Bounds-checked cursor over compiled input bytes.
//!
//! [`Parser`] is the shared decoding primitive for the table, XML and
//! container codecs: sequential little-endian reads, length-prefixed strings,
//! sub-slices and seeking, every operation bounds-checked so truncated or
//! corrupt inputs surface as errors instead of panics.

use crate::format::bytes::{read_le_at, LeField};
use crate::{Error::OutOfBounds, Result};

/// A cursor over a byte slice with bounds-checked reads.
pub struct Parser<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a parser over `data`, positioned at the start.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Total length of the underlying data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the underlying data is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current cursor position.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// True while at least one byte remains.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Move the cursor to `pos`.
    ///
    /// # Errors
    /// Returns [`OutOfBounds`] if `pos` is past the end of the data.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(OutOfBounds);
        }
        self.position = pos;
        Ok(())
    }

    /// Read a little-endian `T` at the cursor.
    ///
    /// # Errors
    /// Returns [`OutOfBounds`] if not enough bytes remain.
    pub fn read_le<T: LeField>(&mut self) -> Result<T> {
        read_le_at(self.data, &mut self.position)
    }

    /// Read `len` raw bytes at the cursor.
    ///
    /// # Errors
    /// Returns [`OutOfBounds`] if not enough bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.position.checked_add(len).ok_or(OutOfBounds)?;
        if end > self.data.len() {
            return Err(OutOfBounds);
        }
        let slice = &self.data[self.position..end];
        self.position = end;
        Ok(slice)
    }

    /// Read a `u32`-length-prefixed UTF-8 string at the cursor.
    ///
    /// # Errors
    /// Returns [`OutOfBounds`] on truncation or [`crate::Error::Malformed`]
    /// on invalid UTF-8.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_le::<u32>()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| malformed_error!("invalid UTF-8 in string at offset {}", self.position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::bytes::{write_le, write_str};

    #[test]
    fn sequential_reads() {
        let mut data = Vec::new();
        write_le(&mut data, 7u32);
        write_str(&mut data, "drawable");

        let mut parser = Parser::new(&data);
        assert_eq!(parser.read_le::<u32>().unwrap(), 7);
        assert_eq!(parser.read_string().unwrap(), "drawable");
        assert!(!parser.has_more_data());
    }

    #[test]
    fn truncation_is_an_error() {
        let data = [0x01, 0x02];
        let mut parser = Parser::new(&data);
        assert!(parser.read_le::<u32>().is_err());
        // Position is unchanged after a failed read.
        assert_eq!(parser.position(), 0);
        assert!(parser.seek(3).is_err());
    }
}
