//! The legacy MS-DOS stub at the start of every PE image.
//!
//! Only two fields matter to a PE reader: the `MZ` signature at offset 0 and the 32-bit
//! `e_lfanew` value at offset `0x3C`, which holds the file offset of the `PE\0\0` signature.

use crate::{
    file::parser::Parser,
    image::region::{impl_has_region, Region},
    Error, Result,
};

/// `MZ`, read as a little-endian u16
pub const DOS_SIGNATURE: u16 = 0x5A4D;
/// Offset of the `e_lfanew` field
pub const PE_POINTER_OFFSET: usize = 0x3C;
/// Size of the classic DOS header
pub const DOS_HEADER_SIZE: u64 = 64;

/// The DOS stub, reduced to the pointer to the PE header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DosStub {
    /// Always bytes `[0, 64)`
    pub region: Region,
    /// File offset of the `PE\0\0` signature
    pub pe_header_offset: u32,
}

impl DosStub {
    /// Decode the DOS stub. The parser must be positioned at the start of the file and is left
    /// directly after the `e_lfanew` field.
    ///
    /// # Errors
    /// Returns [`Error::BadDosSignature`] if the first word is not `MZ`, or
    /// [`Error::TruncatedInput`] if the file is shorter than the `e_lfanew` field.
    pub fn read(parser: &mut Parser) -> Result<DosStub> {
        let signature = parser.read_le::<u16>()?;
        if signature != DOS_SIGNATURE {
            return Err(Error::BadDosSignature(signature));
        }

        parser.seek(PE_POINTER_OFFSET)?;
        let pe_header_offset = parser.read_le::<u32>()?;

        Ok(DosStub {
            region: Region::new(0, DOS_HEADER_SIZE),
            pe_header_offset,
        })
    }
}

impl_has_region!(DosStub);
