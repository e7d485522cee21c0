//! COFF file header.
//!
//! The 20-byte header directly following the `PE\0\0` signature. It names the target machine,
//! the number of section headers and the size of the optional header that sits between this
//! header and the section table.
//!
//! # Reference
//! - [PE Format - COFF File Header](https://learn.microsoft.com/en-us/windows/win32/debug/pe-format#coff-file-header-object-and-image)

use bitflags::bitflags;
use strum::{Display, EnumCount, EnumIter, FromRepr};

use crate::{
    file::parser::Parser,
    image::region::{impl_has_region, Region},
    Error, Result,
};

/// Size of the COFF file header in bytes
pub const COFF_HEADER_SIZE: usize = 20;

/// The architecture type of the computer an image was built for.
///
/// Only [`MachineType::I386`], [`MachineType::Amd64`] and [`MachineType::Ia64`] are accepted by
/// [`CoffHeader::read`]; the remaining values are recognised for display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr, EnumIter, EnumCount)]
#[repr(u16)]
#[allow(missing_docs)]
pub enum MachineType {
    #[strum(to_string = "Unknown")]
    Unknown = 0x0,
    #[strum(to_string = "AM33")]
    Am33 = 0x1D3,
    #[strum(to_string = "AMD64")]
    Amd64 = 0x8664,
    #[strum(to_string = "ARM")]
    Arm = 0x1C0,
    #[strum(to_string = "ARM64")]
    Arm64 = 0xAA64,
    #[strum(to_string = "ARMNT")]
    ArmNt = 0x1C4,
    #[strum(to_string = "EBC")]
    Ebc = 0xEBC,
    #[strum(to_string = "I386")]
    I386 = 0x14C,
    #[strum(to_string = "IA64")]
    Ia64 = 0x200,
    #[strum(to_string = "M32R")]
    M32R = 0x9041,
    #[strum(to_string = "MIPS16")]
    Mips16 = 0x266,
    #[strum(to_string = "MIPSFPU")]
    MipsFpu = 0x366,
    #[strum(to_string = "MIPSFPU16")]
    MipsFpu16 = 0x466,
    #[strum(to_string = "POWERPC")]
    PowerPc = 0x1F0,
    #[strum(to_string = "POWERPCFP")]
    PowerPcFp = 0x1F1,
    #[strum(to_string = "R4000")]
    R4000 = 0x166,
    #[strum(to_string = "SH3")]
    Sh3 = 0x1A2,
    #[strum(to_string = "SH3DSP")]
    Sh3Dsp = 0x1A3,
    #[strum(to_string = "SH4")]
    Sh4 = 0x1A6,
    #[strum(to_string = "SH5")]
    Sh5 = 0x1A8,
    #[strum(to_string = "THUMB")]
    Thumb = 0x1C2,
    #[strum(to_string = "WCEMIPSV2")]
    WceMipsV2 = 0x169,
}

impl MachineType {
    /// Returns `true` for the architectures this reader accepts.
    #[must_use]
    pub fn is_supported(self) -> bool {
        matches!(self, MachineType::I386 | MachineType::Amd64 | MachineType::Ia64)
    }

    /// Human readable name, or `"Unsupported architecture"` for anything this reader rejects.
    #[must_use]
    pub fn description(self) -> String {
        if self.is_supported() {
            self.to_string()
        } else {
            "Unsupported architecture".to_string()
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// COFF file header characteristics
    pub struct FileCharacteristics : u16 {
        /// The image has no base relocations and must load at its preferred base
        const RELOCS_STRIPPED = 0x0001;
        /// The image is valid and can be run
        const EXECUTABLE_IMAGE = 0x0002;
        /// COFF line numbers have been removed (deprecated)
        const LINE_NUMS_STRIPPED = 0x0004;
        /// COFF local symbols have been removed (deprecated)
        const LOCAL_SYMS_STRIPPED = 0x0008;
        /// Aggressively trim working set (obsolete)
        const AGGRESSIVE_WS_TRIM = 0x0010;
        /// The application can handle addresses above 2 GB
        const LARGE_ADDRESS_AWARE = 0x0020;
        /// Little endian (deprecated)
        const BYTES_REVERSED_LO = 0x0080;
        /// 32-bit word architecture
        const MACHINE_32BIT = 0x0100;
        /// Debugging information was removed
        const DEBUG_STRIPPED = 0x0200;
        /// Copy to swap if on removable media
        const REMOVABLE_RUN_FROM_SWAP = 0x0400;
        /// Copy to swap if on network media
        const NET_RUN_FROM_SWAP = 0x0800;
        /// The image is a system file
        const SYSTEM = 0x1000;
        /// The image is a DLL
        const DLL = 0x2000;
        /// Run only on a uniprocessor machine
        const UP_SYSTEM_ONLY = 0x4000;
        /// Big endian (deprecated)
        const BYTES_REVERSED_HI = 0x8000;
    }
}

/// The COFF file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoffHeader {
    /// Always 20 bytes, starting right after the PE signature
    pub region: Region,
    /// Raw machine type code
    pub machine: u16,
    /// Number of entries in the section table
    pub number_of_sections: u16,
    /// Seconds since 1970-01-01 when the image was linked
    pub time_date_stamp: u32,
    /// File offset of the COFF symbol table, zero if absent
    pub pointer_to_symbol_table: u32,
    /// Number of COFF symbols
    pub number_of_symbols: u32,
    /// Declared size of the optional header; authoritative for locating the section table
    pub size_of_optional_header: u16,
    /// Raw characteristics bits
    pub characteristics: u16,
}

impl CoffHeader {
    /// Decode a COFF header at the current position.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedArchitecture`] if the machine type is not I386, AMD64 or
    /// IA64, or [`Error::TruncatedInput`] if the header is cut short.
    pub fn read(parser: &mut Parser) -> Result<CoffHeader> {
        let start = parser.pos();

        let machine = parser.read_le::<u16>()?;
        if !MachineType::from_repr(machine).is_some_and(MachineType::is_supported) {
            return Err(Error::UnsupportedArchitecture(machine));
        }

        Ok(CoffHeader {
            region: Region::new(start as u64, COFF_HEADER_SIZE as u64),
            machine,
            number_of_sections: parser.read_le::<u16>()?,
            time_date_stamp: parser.read_le::<u32>()?,
            pointer_to_symbol_table: parser.read_le::<u32>()?,
            number_of_symbols: parser.read_le::<u32>()?,
            size_of_optional_header: parser.read_le::<u16>()?,
            characteristics: parser.read_le::<u16>()?,
        })
    }

    /// The decoded machine type, [`MachineType::Unknown`] for unlisted codes.
    #[must_use]
    pub fn machine_type(&self) -> MachineType {
        MachineType::from_repr(self.machine).unwrap_or(MachineType::Unknown)
    }

    /// The decoded characteristics, keeping unknown bits.
    #[must_use]
    pub fn flags(&self) -> FileCharacteristics {
        FileCharacteristics::from_bits_retain(self.characteristics)
    }

    /// Offset of the first byte after this header, where the optional header starts.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.region.end()
    }
}

impl_has_region!(CoffHeader);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let header_bytes = [
            0x4C, 0x01,             // machine = I386
            0x03, 0x00,             // number_of_sections = 3
            0x78, 0x56, 0x34, 0x12, // time_date_stamp
            0x00, 0x00, 0x00, 0x00, // pointer_to_symbol_table
            0x00, 0x00, 0x00, 0x00, // number_of_symbols
            0xE0, 0x00,             // size_of_optional_header = 224
            0x02, 0x21,             // characteristics = EXECUTABLE_IMAGE | MACHINE_32BIT | DLL
        ];

        let mut parser = Parser::new(&header_bytes);
        let header = CoffHeader::read(&mut parser).unwrap();

        assert_eq!(header.machine_type(), MachineType::I386);
        assert_eq!(header.number_of_sections, 3);
        assert_eq!(header.time_date_stamp, 0x12345678);
        assert_eq!(header.size_of_optional_header, 0xE0);
        assert!(header.flags().contains(FileCharacteristics::DLL));
        assert!(header.flags().contains(FileCharacteristics::EXECUTABLE_IMAGE));
        assert_eq!(header.region, Region::new(0, 20));
        assert_eq!(header.end(), 20);
        assert_eq!(parser.pos(), 20);
    }

    #[test]
    fn unsupported_machine() {
        #[rustfmt::skip]
        let header_bytes = [
            0x64, 0xAA,             // machine = ARM64
            0x01, 0x00,
        ];

        let mut parser = Parser::new(&header_bytes);
        assert!(matches!(
            CoffHeader::read(&mut parser),
            Err(Error::UnsupportedArchitecture(0xAA64))
        ));
    }

    #[test]
    fn unknown_machine() {
        let mut parser = Parser::new(&[0x34, 0x12]);
        assert!(matches!(
            CoffHeader::read(&mut parser),
            Err(Error::UnsupportedArchitecture(0x1234))
        ));
    }

    #[test]
    fn machine_descriptions() {
        assert_eq!(MachineType::I386.description(), "I386");
        assert_eq!(MachineType::Amd64.description(), "AMD64");
        assert_eq!(MachineType::Ia64.description(), "IA64");
        assert_eq!(MachineType::Arm.description(), "Unsupported architecture");
        assert_eq!(MachineType::from_repr(0x8664), Some(MachineType::Amd64));
    }
}
