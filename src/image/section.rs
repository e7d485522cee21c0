//! Section table and address translation.
//!
//! The section table is an array of 40-byte [`SectionHeader`] records that maps the virtual
//! layout of an image onto file offsets. It starts right after the optional header, at the
//! offset the COFF header declares, not at the end of whatever optional header was decoded.
//!
//! Address translation only considers the raw (on-disk) size of a section. An RVA that falls in
//! the zero-filled tail between `size_of_raw_data` and `virtual_size` has no file backing and is
//! reported as [`crate::Error::InvalidRva`].

use std::fmt;

use bitflags::bitflags;

use crate::{
    file::parser::Parser,
    image::region::{impl_has_region, Region},
    Error, Result,
};

/// Size of one section header in bytes
pub const SECTION_HEADER_SIZE: usize = 40;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Section characteristics
    pub struct SectionCharacteristics : u32 {
        /// Should not be padded to the next boundary (object files only)
        const TYPE_NO_PAD = 0x0000_0008;
        /// Contains executable code
        const CNT_CODE = 0x0000_0020;
        /// Contains initialized data
        const CNT_INITIALIZED_DATA = 0x0000_0040;
        /// Contains uninitialized data
        const CNT_UNINITIALIZED_DATA = 0x0000_0080;
        /// Contains comments or other information (object files only)
        const LNK_INFO = 0x0000_0200;
        /// Will not become part of the image (object files only)
        const LNK_REMOVE = 0x0000_0800;
        /// Contains COMDAT data (object files only)
        const LNK_COMDAT = 0x0000_1000;
        /// Contains data referenced through the global pointer
        const GPREL = 0x0000_8000;
        /// Contains extended relocations
        const LNK_NRELOC_OVFL = 0x0100_0000;
        /// Can be discarded as needed
        const MEM_DISCARDABLE = 0x0200_0000;
        /// Can not be cached
        const MEM_NOT_CACHED = 0x0400_0000;
        /// Is not pageable
        const MEM_NOT_PAGED = 0x0800_0000;
        /// Can be shared in memory
        const MEM_SHARED = 0x1000_0000;
        /// Can be executed as code
        const MEM_EXECUTE = 0x2000_0000;
        /// Can be read
        const MEM_READ = 0x4000_0000;
        /// Can be written to
        const MEM_WRITE = 0x8000_0000;
    }
}

/// A single entry of the section table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    /// The 40 bytes of this header
    pub region: Region,
    /// Name up to the first NUL byte
    pub name: String,
    /// The raw 8 name bytes
    pub raw_name: [u8; 8],
    /// Size of the section when loaded into memory
    pub virtual_size: u32,
    /// RVA of the first byte of the section
    pub virtual_address: u32,
    /// Size of the initialized data on disk
    pub size_of_raw_data: u32,
    /// File offset of the section data
    pub pointer_to_raw_data: u32,
    /// File offset of the COFF relocations, zero for images
    pub pointer_to_relocations: u32,
    /// File offset of the COFF line numbers, zero for images
    pub pointer_to_linenumbers: u32,
    /// Number of COFF relocations
    pub number_of_relocations: u16,
    /// Number of COFF line numbers
    pub number_of_linenumbers: u16,
    /// Raw characteristics bits
    pub characteristics: u32,
}

impl SectionHeader {
    /// Decode a section header at the current position.
    ///
    /// # Errors
    /// Returns [`Error::TruncatedInput`] if fewer than 40 bytes remain.
    pub fn read(parser: &mut Parser) -> Result<SectionHeader> {
        let start = parser.pos();

        let mut raw_name = [0u8; 8];
        raw_name.copy_from_slice(parser.read_bytes(8)?);
        let name = raw_name
            .iter()
            .take_while(|byte| **byte != 0)
            .map(|byte| char::from(*byte))
            .collect();

        Ok(SectionHeader {
            region: Region::new(start as u64, SECTION_HEADER_SIZE as u64),
            name,
            raw_name,
            virtual_size: parser.read_le::<u32>()?,
            virtual_address: parser.read_le::<u32>()?,
            size_of_raw_data: parser.read_le::<u32>()?,
            pointer_to_raw_data: parser.read_le::<u32>()?,
            pointer_to_relocations: parser.read_le::<u32>()?,
            pointer_to_linenumbers: parser.read_le::<u32>()?,
            number_of_relocations: parser.read_le::<u16>()?,
            number_of_linenumbers: parser.read_le::<u16>()?,
            characteristics: parser.read_le::<u32>()?,
        })
    }

    /// The decoded characteristics, keeping unknown bits.
    #[must_use]
    pub fn flags(&self) -> SectionCharacteristics {
        SectionCharacteristics::from_bits_retain(self.characteristics)
    }

    /// Returns `true` if `rva` is backed by this section's raw data.
    #[must_use]
    pub fn contains_rva(&self, rva: u32) -> bool {
        let start = u64::from(self.virtual_address);
        let end = start + u64::from(self.size_of_raw_data);
        (start..end).contains(&u64::from(rva))
    }

    /// Returns `true` if the file `offset` lies in this section's raw data.
    #[must_use]
    pub fn contains_offset(&self, offset: u32) -> bool {
        let start = u64::from(self.pointer_to_raw_data);
        let end = start + u64::from(self.size_of_raw_data);
        (start..end).contains(&u64::from(offset))
    }

    /// File range of the raw section data.
    #[must_use]
    pub fn data_region(&self) -> Region {
        Region::new(
            u64::from(self.pointer_to_raw_data),
            u64::from(self.size_of_raw_data),
        )
    }
}

impl fmt::Display for SectionHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} raw data at offsets {{{:08X} - {:08X}}}",
            self.region,
            self.name,
            self.pointer_to_raw_data,
            u64::from(self.pointer_to_raw_data) + u64::from(self.size_of_raw_data)
        )
    }
}

impl_has_region!(SectionHeader);

/// Translate an RVA to a file offset through the first section whose raw data covers it.
///
/// # Errors
/// Returns [`Error::InvalidRva`] if no section covers `rva`.
pub fn rva_to_offset(sections: &[SectionHeader], rva: u32) -> Result<u32> {
    sections
        .iter()
        .find(|section| section.contains_rva(rva))
        .and_then(|section| {
            section
                .pointer_to_raw_data
                .checked_add(rva - section.virtual_address)
        })
        .ok_or(Error::InvalidRva(rva))
}

/// Translate a file offset back to an RVA, `None` if no section's raw data covers it.
#[must_use]
pub fn offset_to_rva(sections: &[SectionHeader], offset: u32) -> Option<u32> {
    sections
        .iter()
        .find(|section| section.contains_offset(offset))
        .and_then(|section| {
            section
                .virtual_address
                .checked_add(offset - section.pointer_to_raw_data)
        })
}
