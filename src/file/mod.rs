//! Input handling for PE images.
//!
//! This module abstracts over where the bytes of an image come from and provides the cursor
//! every decoder in this crate reads through.
//!
//! # Key Components
//!
//! - [`crate::file::File`] - Owns the input bytes behind a [`crate::file::Backend`]
//! - [`crate::file::parser::Parser`] - Bounds-checked little-endian cursor
//! - [`crate::file::io`] - Primitive little-endian decoding helpers
//!
//! # Backends
//!
//! - **Memory** - an owned `Vec<u8>`, used by [`crate::file::File::from_mem`]
//! - **Physical** - a read-only memory map, used by [`crate::file::File::from_file`]
//!
//! Both backends are read-only; nothing in this crate mutates the scanned bytes.

pub mod io;
pub mod parser;

mod memory;
mod physical;

use std::path::Path;

use crate::{Error::Empty, Result};
use memory::Memory;
use physical::Physical;

/// Source of the raw bytes of an image.
pub trait Backend: Send + Sync {
    /// Returns a bounds-checked slice of `len` bytes starting at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedInput`] if the range extends past the data.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let data = self.data();
        match offset.checked_add(len) {
            Some(end) if end <= data.len() => Ok(&data[offset..end]),
            _ => Err(truncated_error!(offset, len)),
        }
    }

    /// Returns all bytes.
    fn data(&self) -> &[u8];

    /// Returns the number of bytes.
    fn len(&self) -> usize {
        self.data().len()
    }
}

/// The raw input of an image, independent of its origin.
pub struct File {
    data: Box<dyn Backend>,
}

impl File {
    /// Memory-map the file at `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file can not be mapped, or
    /// [`crate::Error::Empty`] if it has no content.
    pub fn from_file(path: &Path) -> Result<File> {
        let input = Physical::new(path)?;

        Self::load(input)
    }

    /// Wrap an owned buffer.
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] if `data` is empty.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        let input = Memory::new(data);

        Self::load(input)
    }

    fn load<T: Backend + 'static>(data: T) -> Result<File> {
        if data.len() == 0 {
            return Err(Empty);
        }

        Ok(File {
            data: Box::new(data),
        })
    }

    /// Returns the size of the input in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the input has no bytes. A loaded `File` is never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns all bytes of the input.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.data()
    }

    /// Returns `len` bytes starting at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedInput`] if the range extends past the input.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.data.data_slice(offset, len)
    }
}
