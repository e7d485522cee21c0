//! Metadata stream headers.
//!
//! Each entry of the stream directory is an `(offset, size)` pair relative to the metadata root,
//! followed by a NUL-terminated ASCII name padded with zeros to the next 4-byte boundary.

use crate::{
    file::parser::Parser,
    image::region::{impl_has_region, Region},
    Result,
};

/// Longest stream name allowed, excluding the terminator
pub const MAX_STREAM_NAME_LENGTH: usize = 32;

/// A stream header of the metadata root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHeader {
    /// The bytes of this header, padding included
    pub region: Region,
    /// Offset of the stream, relative to the metadata root
    pub offset: u32,
    /// Size of the stream in bytes
    pub size: u32,
    /// Name of the stream, e.g. `#~` or `#Strings`
    pub name: String,
}

impl StreamHeader {
    /// Decode a stream header at the current position and advance past its padding.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedInput`] if the header is cut short, or
    /// [`crate::Error::LimitExceeded`] if the name is longer than 32 characters.
    pub fn read(parser: &mut Parser) -> Result<StreamHeader> {
        let start = parser.pos();

        let offset = parser.read_le::<u32>()?;
        let size = parser.read_le::<u32>()?;
        let name = parser.read_string_ascii(MAX_STREAM_NAME_LENGTH)?;

        let name_aligned = (name.len() + 1 + 3) & !3;
        parser.seek(start + 8 + name_aligned)?;

        Ok(StreamHeader {
            region: Region::from_bounds(start, parser.pos()),
            offset,
            size,
            name,
        })
    }

    /// First byte after the stream, relative to the metadata root.
    #[must_use]
    pub fn end(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.size)
    }
}

impl_has_region!(StreamHeader);
