//! Low-level byte stream cursor for PE and metadata decoding.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a cursor-based binary data
//! parser that every structure in this crate is decoded through. It offers bounds-checked,
//! little-endian access to an immutable byte slice, absolute seeking, and the two cursor
//! disciplines the table walkers rely on.
//!
//! # Cursor Discipline
//!
//! The PE format is full of indirections: an import directory entry names its module through an
//! RVA, an import lookup table slot points at a hint/name pair, an export name table holds RVAs
//! to strings. Resolving those requires a *side read* at a computed offset in the middle of a
//! sequential walk. Such reads must leave the walker's position untouched:
//!
//! - [`crate::file::parser::Parser::detour`] - seek, run a closure, and **always** restore
//! - [`crate::file::parser::Parser::transactional`] - run a closure and restore **only on error**
//!
//! # Usage Examples
//!
//! ```rust
//! use pescope::Parser;
//!
//! let data = [0x4D, 0x5A, 0x00, 0x00, b'h', b'i', 0x00, 0x07];
//! let mut parser = Parser::new(&data);
//!
//! let signature = parser.read_le::<u16>()?;
//! assert_eq!(signature, 0x5A4D);
//!
//! // The side read does not move the cursor
//! let name = parser.detour(4, |p| p.read_string_ascii(16))?;
//! assert_eq!(name, "hi");
//! assert_eq!(parser.pos(), 2);
//! # Ok::<(), pescope::Error>(())
//! ```

use crate::{
    file::io::{read_le_at, PeIO},
    Result,
};

/// A cursor over a byte slice with bounds-checked little-endian reads.
///
/// `Parser` maintains an internal position and never reads outside the slice it was created
/// from. A failed read leaves the position unchanged.
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::parser::Parser`] from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there are more bytes to read after the current position.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Move the cursor to an absolute position.
    ///
    /// Seeking to exactly the end of the data is allowed; any read from there fails.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedInput`] if `pos` lies beyond the end of the data.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(truncated_error!(pos, 0));
        }

        self.position = pos;
        Ok(())
    }

    /// Move the cursor forward by `step` bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedInput`] if the new position would lie beyond the data.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        match self.position.checked_add(step) {
            Some(end) if end <= self.data.len() => {
                self.position = end;
                Ok(())
            }
            _ => Err(truncated_error!(self.position, step)),
        }
    }

    /// Returns the current position.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Returns the full underlying data slice.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Returns the number of bytes left after the current position.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Read a value of type `T` in little-endian order and advance past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedInput`] if not enough data remains.
    pub fn read_le<T: PeIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Read `length` raw bytes and advance past them.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedInput`] if not enough data remains.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let end = match self.position.checked_add(length) {
            Some(end) if end <= self.data.len() => end,
            _ => return Err(truncated_error!(self.position, length)),
        };

        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    /// Read a NUL-terminated single-byte string, mapping every byte to the `char` of the same
    /// value, and advance past the terminator.
    ///
    /// # Arguments
    /// * `max_len` - Maximum number of characters accepted before the terminator
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedInput`] if the data ends before a terminator, or
    /// [`crate::Error::LimitExceeded`] if no terminator is found within `max_len` bytes.
    pub fn read_string_ascii(&mut self, max_len: usize) -> Result<String> {
        let start = self.position;
        let mut end = start;

        loop {
            if end >= self.data.len() {
                return Err(truncated_error!(end, 1));
            }
            if self.data[end] == 0 {
                break;
            }
            if end - start >= max_len {
                return Err(crate::Error::LimitExceeded {
                    what: "string length",
                    limit: max_len,
                });
            }
            end += 1;
        }

        let value = self.data[start..end].iter().copied().map(char::from).collect();
        self.position = end + 1;
        Ok(value)
    }

    /// Perform a side read at `offset` and restore the current position afterwards, whether
    /// the closure succeeded or not.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedInput`] if `offset` lies beyond the data, or whatever
    /// error the closure returns.
    pub fn detour<T, F>(&mut self, offset: usize, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let saved_position = self.position;
        self.seek(offset)?;
        let result = f(self);
        self.position = saved_position;
        result
    }

    /// Run the closure and roll the position back if it fails.
    ///
    /// # Errors
    /// Returns the error of the closure.
    pub fn transactional<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let saved_position = self.position;
        let result = f(self);
        if result.is_err() {
            self.position = saved_position;
        }
        result
    }
}
