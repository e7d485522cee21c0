//! PE/COFF image headers.
//!
//! This module decodes the fixed part of a Portable Executable image: everything from the DOS
//! stub through the section table. The result, [`crate::image::ImageHeaders`], is the foundation
//! every later stage builds on, because it owns the section table that RVA translation needs.
//!
//! # Parse Order
//!
//! ```text
//! DosStub ─► seek e_lfanew ─► "PE\0\0" ─► CoffHeader ─► OptionalHeader
//!                                              │
//!            seek coff_end + size_of_optional_header ─► SectionHeader × number_of_sections
//! ```
//!
//! # Key Components
//!
//! - [`crate::image::dos::DosStub`] - `MZ` check and PE header pointer
//! - [`crate::image::coff::CoffHeader`] - machine type, section count, optional header size
//! - [`crate::image::optional::OptionalHeader`] - PE32 / PE32+ / ROM layouts
//! - [`crate::image::datadirectory::DataDirectory`] - `(rva, size)` table pointers
//! - [`crate::image::section::SectionHeader`] - section table and address translation
//! - [`crate::image::region::Region`] - byte range of every decoded structure
//!
//! # Examples
//!
//! ```rust,no_run
//! use pescope::{image::ImageHeaders, Parser};
//!
//! let data = std::fs::read("sample.exe")?;
//! let mut parser = Parser::new(&data);
//! let headers = ImageHeaders::read(&mut parser)?;
//!
//! println!("{} image, {} sections", headers.kind(), headers.sections.len());
//! let entry = headers.rva_to_offset(headers.optional.address_of_entry_point())?;
//! println!("entry point at file offset {entry:#x}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod coff;
pub mod datadirectory;
pub mod dos;
pub mod optional;
pub mod region;
pub mod section;

use log::debug;

use crate::{file::parser::Parser, Error, Result};
use coff::{CoffHeader, COFF_HEADER_SIZE};
use datadirectory::{DataDirectory, DataDirectoryType};
use dos::DosStub;
use optional::{OptionalHeader, PEKind};
use region::Region;
use section::{SectionHeader, SECTION_HEADER_SIZE};

/// `PE\0\0`, read as a little-endian u32
pub const PE_SIGNATURE: u32 = 0x0000_4550;

/// All headers of a PE image, from the DOS stub through the section table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHeaders {
    /// The legacy DOS stub
    pub dos: DosStub,
    /// The 4 bytes of the `PE\0\0` signature
    pub signature_region: Region,
    /// The COFF file header
    pub coff: CoffHeader,
    /// The optional header
    pub optional: OptionalHeader,
    /// The section table, in file order
    pub sections: Vec<SectionHeader>,
}

impl ImageHeaders {
    /// Decode all headers. The parser may be anywhere; decoding always starts at offset 0.
    ///
    /// # Errors
    /// - [`Error::BadDosSignature`] if the file does not start with `MZ`
    /// - [`Error::NotAPortableExecutable`] if the PE signature is missing or the optional
    ///   header magic is unknown
    /// - [`Error::UnsupportedArchitecture`] for machine types other than I386/AMD64/IA64
    /// - [`Error::TooFewDataDirectories`] if fewer than 16 directories are declared
    /// - [`Error::TruncatedInput`] if any header is cut short
    pub fn read(parser: &mut Parser) -> Result<ImageHeaders> {
        parser.seek(0)?;
        let dos = DosStub::read(parser)?;

        let pe_offset = dos.pe_header_offset as usize;
        if pe_offset > parser.len() {
            return Err(Error::NotAPortableExecutable(format!(
                "PE header offset {pe_offset:#x} lies beyond the end of the file"
            )));
        }
        parser.seek(pe_offset)?;

        let signature = parser.read_le::<u32>()?;
        if signature != PE_SIGNATURE {
            return Err(Error::NotAPortableExecutable(format!(
                "expected PE signature at {pe_offset:#x}, found {signature:#010x}"
            )));
        }
        let signature_region = Region::new(pe_offset as u64, 4);

        let coff = CoffHeader::read(parser)?;
        let coff_end = parser.pos();
        let optional = OptionalHeader::read(parser)?;

        let section_table = coff_end + usize::from(coff.size_of_optional_header);
        debug!(
            "{} image for {}, {} sections at {section_table:#x}",
            optional.kind(),
            coff.machine_type(),
            coff.number_of_sections
        );
        parser.seek(section_table)?;

        let count = usize::from(coff.number_of_sections);
        let mut sections = Vec::with_capacity(count.min(parser.remaining() / SECTION_HEADER_SIZE));
        for _ in 0..count {
            sections.push(SectionHeader::read(parser)?);
        }

        Ok(ImageHeaders {
            dos,
            signature_region,
            coff,
            optional,
            sections,
        })
    }

    /// The image kind.
    #[must_use]
    pub fn kind(&self) -> PEKind {
        self.optional.kind()
    }

    /// Returns `true` for PE32+ images.
    #[must_use]
    pub fn is_64bit(&self) -> bool {
        self.optional.is_64bit()
    }

    /// Translate an RVA to a file offset.
    ///
    /// # Errors
    /// Returns [`Error::InvalidRva`] if no section covers `rva`.
    pub fn rva_to_offset(&self, rva: u32) -> Result<u32> {
        section::rva_to_offset(&self.sections, rva)
    }

    /// Translate a file offset to an RVA.
    #[must_use]
    pub fn offset_to_rva(&self, offset: u32) -> Option<u32> {
        section::offset_to_rva(&self.sections, offset)
    }

    /// The data directory of the given kind.
    #[must_use]
    pub fn data_directory(&self, kind: DataDirectoryType) -> Option<&DataDirectory> {
        self.optional.data_directory(kind)
    }

    /// The first section with the given name.
    #[must_use]
    pub fn section_by_name(&self, name: &str) -> Option<&SectionHeader> {
        self.sections.iter().find(|section| section.name == name)
    }

    /// The first section whose raw data covers `rva`.
    #[must_use]
    pub fn section_for_rva(&self, rva: u32) -> Option<&SectionHeader> {
        self.sections.iter().find(|section| section.contains_rva(rva))
    }

    /// File offset of the first byte after the section table.
    #[must_use]
    pub fn headers_end(&self) -> u64 {
        self.sections.last().map_or_else(
            || {
                self.coff.region.start
                    + COFF_HEADER_SIZE as u64
                    + u64::from(self.coff.size_of_optional_header)
            },
            |section| section.region.end(),
        )
    }
}
