//! Optional header data directories.
//!
//! A data directory is an `(rva, size)` pair pointing at one of the well-known tables of an
//! image. The first 16 slots have fixed meanings; anything past them is labelled
//! [`DataDirectoryType::Unknown`].

use std::fmt;

use strum::{Display, EnumCount, EnumIter, FromRepr, IntoStaticStr};

use crate::{
    file::parser::Parser,
    image::region::{impl_has_region, Region},
    Result,
};

/// Number of canonical data directory slots
pub const CANONICAL_DIRECTORY_COUNT: usize = 16;
/// Size of one `(rva, size)` entry
pub const DATA_DIRECTORY_SIZE: u64 = 8;

/// The meaning of a data directory slot, by index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr, EnumIter, EnumCount, IntoStaticStr,
)]
#[repr(u8)]
pub enum DataDirectoryType {
    /// Export directory table
    #[strum(to_string = "Export Table")]
    Export = 0,
    /// Import directory table
    #[strum(to_string = "Import Table")]
    Import = 1,
    /// Resource directory
    #[strum(to_string = "Resource Table")]
    Resource = 2,
    /// Exception (pdata) table
    #[strum(to_string = "Exception Table")]
    Exception = 3,
    /// Attribute certificate table; its `rva` is a file offset
    #[strum(to_string = "Certificate Table")]
    Certificate = 4,
    /// Base relocation table
    #[strum(to_string = "Base Relocation Table")]
    BaseRelocation = 5,
    /// Debug directory
    #[strum(to_string = "Debug")]
    Debug = 6,
    /// Reserved, must be zero
    #[strum(to_string = "Architecture")]
    Architecture = 7,
    /// Global pointer register value
    #[strum(to_string = "Global Ptr")]
    GlobalPtr = 8,
    /// Thread local storage table
    #[strum(to_string = "TLS Table")]
    Tls = 9,
    /// Load configuration directory
    #[strum(to_string = "Load Config Table")]
    LoadConfig = 10,
    /// Bound import table
    #[strum(to_string = "Bound Import")]
    BoundImport = 11,
    /// Import address table
    #[strum(to_string = "IAT")]
    Iat = 12,
    /// Delay import descriptor
    #[strum(to_string = "Delay Import Descriptor")]
    DelayImport = 13,
    /// CLI (Cor20) header of managed images
    #[strum(to_string = "CLI Header")]
    ClrHeader = 14,
    /// Reserved, must be zero
    #[strum(to_string = "Reserved")]
    Reserved = 15,
    /// Any slot past the 16 canonical ones
    #[strum(to_string = "Unknown")]
    Unknown = 16,
}

impl DataDirectoryType {
    /// The type of the slot at `index`.
    #[must_use]
    pub fn from_index(index: usize) -> DataDirectoryType {
        u8::try_from(index)
            .ok()
            .filter(|index| (*index as usize) < CANONICAL_DIRECTORY_COUNT)
            .and_then(DataDirectoryType::from_repr)
            .unwrap_or(DataDirectoryType::Unknown)
    }
}

/// A single data directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDirectory {
    /// The 8 bytes of this entry
    pub region: Region,
    /// Slot meaning, derived from the index
    pub kind: DataDirectoryType,
    /// RVA of the table, zero if absent
    pub rva: u32,
    /// Size of the table in bytes
    pub size: u32,
}

impl DataDirectory {
    /// Decode the entry for slot `index` at the current position.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedInput`] if fewer than 8 bytes remain.
    pub fn read(parser: &mut Parser, index: usize) -> Result<DataDirectory> {
        let start = parser.pos();

        Ok(DataDirectory {
            region: Region::new(start as u64, DATA_DIRECTORY_SIZE),
            kind: DataDirectoryType::from_index(index),
            rva: parser.read_le::<u32>()?,
            size: parser.read_le::<u32>()?,
        })
    }

    /// Display name of the slot.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.kind.into()
    }

    /// Returns `true` if the directory points at something.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.rva != 0
    }
}

impl fmt::Display for DataDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} points to {{{:08X} - {:08X}}}",
            self.region,
            self.name(),
            self.rva,
            self.rva.wrapping_add(self.size)
        )
    }
}

impl_has_region!(DataDirectory);
