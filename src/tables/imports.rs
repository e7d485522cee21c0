//! Import directory.
//!
//! The import directory is an array of 20-byte descriptors, one per imported module, ended by
//! a descriptor whose name RVA is zero. Each descriptor points at two parallel zero-terminated
//! slot arrays: the import lookup table (what to import) and the import address table (where
//! the loader writes the resolved addresses). On disk both usually hold the same values.
//!
//! Slots are 32 bits wide in PE32 images and 64 bits wide in PE32+ images. The top bit of a
//! slot selects import by ordinal; otherwise the low 31 bits are the RVA of a hint/name entry.
//!
//! # Reference
//! - [PE Format - The .idata Section](https://learn.microsoft.com/en-us/windows/win32/debug/pe-format#the-idata-section)

use std::fmt;

use log::{trace, warn};

use crate::{
    config::LoadConfig,
    file::parser::Parser,
    image::{
        datadirectory::DataDirectory,
        region::{impl_has_region, Region},
        ImageHeaders,
    },
    tables::{offset_of, string_at_rva, Partial},
    Result,
};

/// Size of one import directory entry
pub const IMPORT_DESCRIPTOR_SIZE: usize = 20;

const ORDINAL_FLAG_32: u64 = 0x8000_0000;
const ORDINAL_FLAG_64: u64 = 0x8000_0000_0000_0000;
const RVA_MASK: u64 = 0x7FFF_FFFF;

/// One resolved import lookup table slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportAddress {
    /// Imported by ordinal
    ByOrdinal(u32),
    /// Imported by name, with the loader's export name table index hint
    ByName {
        /// Index into the exporter's name pointer table to try first
        hint: u16,
        /// Name of the imported symbol
        name: String,
    },
}

impl fmt::Display for ImportAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportAddress::ByOrdinal(ordinal) => write!(f, "By Ordinal: {ordinal}"),
            ImportAddress::ByName { name, .. } => write!(f, "By Name: {name}"),
        }
    }
}

/// One import directory entry, describing everything imported from a single module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDirectoryEntry {
    /// The 20 bytes of this descriptor
    pub region: Region,
    /// RVA of the import lookup table
    pub import_lookup_table_rva: u32,
    /// Zero until bound
    pub time_date_stamp: u32,
    /// Index of the first forwarder reference
    pub forwarder_chain: u32,
    /// RVA of the module name
    pub name_rva: u32,
    /// RVA of the import address table
    pub import_address_table_rva: u32,
    /// Name of the imported module
    pub module_name: String,
    /// Resolved import lookup table
    pub import_lookup_table: Partial<ImportAddress>,
    /// Raw import address table slots, widened to 64 bits
    pub import_address_table: Partial<u64>,
}

impl ImportDirectoryEntry {
    /// Returns `true` if either slot table was truncated.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.import_lookup_table.truncated || self.import_address_table.truncated
    }

    /// Names of the symbols imported by name.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.import_lookup_table
            .iter()
            .filter_map(|import| match import {
                ImportAddress::ByName { name, .. } => Some(name.as_str()),
                ImportAddress::ByOrdinal(_) => None,
            })
    }
}

impl_has_region!(ImportDirectoryEntry);

/// The decoded import directory.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImportTable {
    /// The bytes covered by the import data directory
    pub region: Region,
    /// One entry per imported module, in directory order
    pub entries: Partial<ImportDirectoryEntry>,
}

impl ImportTable {
    /// Walk the import directory described by `directory`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidRva`] if the directory is not mapped by any section.
    /// Failures after that point truncate the walk instead.
    pub fn read(
        parser: &mut Parser,
        headers: &ImageHeaders,
        directory: &DataDirectory,
        config: &LoadConfig,
    ) -> Result<ImportTable> {
        let start = offset_of(headers, directory.rva)?;
        let end = start.saturating_add(directory.size as usize);
        parser.seek(start)?;

        let is_64bit = headers.is_64bit();
        let mut entries = Vec::new();
        let mut truncated = false;

        while parser.pos() < end {
            if entries.len() >= config.max_import_descriptors {
                warn!(
                    "Import directory exceeds {} descriptors, stopping",
                    config.max_import_descriptors
                );
                truncated = true;
                break;
            }

            let entry_start = parser.pos();
            let Ok(fields) = parser.transactional(read_descriptor) else {
                warn!("Import descriptor at {entry_start:#x} is cut short");
                truncated = true;
                break;
            };

            let [lookup_rva, time_date_stamp, forwarder_chain, name_rva, address_rva] = fields;
            if name_rva == 0 {
                break;
            }

            let module_name =
                match string_at_rva(parser, headers, name_rva, config.max_name_length) {
                    Ok(name) => name,
                    Err(error) => {
                        warn!("Import module name at rva {name_rva:#x} unreadable: {error}");
                        truncated = true;
                        break;
                    }
                };

            let import_lookup_table = if lookup_rva == 0 {
                Partial::default()
            } else {
                read_lookup_table(parser, headers, lookup_rva, is_64bit, config)
            };
            let import_address_table = if address_rva == 0 {
                Partial::default()
            } else {
                read_slots(parser, headers, address_rva, is_64bit, config)
            };

            trace!(
                "Import {module_name}: {} lookup slots, {} address slots",
                import_lookup_table.len(),
                import_address_table.len()
            );

            entries.push(ImportDirectoryEntry {
                region: Region::from_bounds(entry_start, parser.pos()),
                import_lookup_table_rva: lookup_rva,
                time_date_stamp,
                forwarder_chain,
                name_rva,
                import_address_table_rva: address_rva,
                module_name,
                import_lookup_table,
                import_address_table,
            });
        }

        Ok(ImportTable {
            region: Region::new(start as u64, u64::from(directory.size)),
            entries: Partial { entries, truncated },
        })
    }

    /// The entry importing from `module`, compared case-insensitively.
    #[must_use]
    pub fn module(&self, module: &str) -> Option<&ImportDirectoryEntry> {
        self.entries
            .iter()
            .find(|entry| entry.module_name.eq_ignore_ascii_case(module))
    }

    /// Returns `true` if the directory walk or any slot table was truncated.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.entries.truncated || self.entries.iter().any(ImportDirectoryEntry::is_truncated)
    }
}

fn read_descriptor(parser: &mut Parser) -> Result<[u32; 5]> {
    Ok([
        parser.read_le::<u32>()?,
        parser.read_le::<u32>()?,
        parser.read_le::<u32>()?,
        parser.read_le::<u32>()?,
        parser.read_le::<u32>()?,
    ])
}

/// Read a zero-terminated slot array at `rva` without moving the cursor.
fn read_slots(
    parser: &mut Parser,
    headers: &ImageHeaders,
    rva: u32,
    is_64bit: bool,
    config: &LoadConfig,
) -> Partial<u64> {
    let Ok(offset) = offset_of(headers, rva) else {
        warn!("Import slot table at rva {rva:#x} is not mapped");
        return Partial::truncated(Vec::new());
    };

    let walk = parser.detour(offset, |p| {
        let mut slots = Vec::new();
        loop {
            if slots.len() >= config.max_thunks_per_table {
                warn!(
                    "Import slot table at rva {rva:#x} exceeds {} slots",
                    config.max_thunks_per_table
                );
                return Ok(Partial::truncated(slots));
            }

            let slot = if is_64bit {
                p.read_le::<u64>()
            } else {
                p.read_le::<u32>().map(u64::from)
            };

            match slot {
                Ok(0) => return Ok(Partial::complete(slots)),
                Ok(value) => slots.push(value),
                Err(_) => return Ok(Partial::truncated(slots)),
            }
        }
    });

    walk.unwrap_or_else(|_| Partial::truncated(Vec::new()))
}

/// Read and resolve an import lookup table at `rva`.
fn read_lookup_table(
    parser: &mut Parser,
    headers: &ImageHeaders,
    rva: u32,
    is_64bit: bool,
    config: &LoadConfig,
) -> Partial<ImportAddress> {
    let slots = read_slots(parser, headers, rva, is_64bit, config);
    let ordinal_flag = if is_64bit {
        ORDINAL_FLAG_64
    } else {
        ORDINAL_FLAG_32
    };

    let mut imports = Vec::with_capacity(slots.len());
    for slot in &slots {
        // Both masks keep at most 31 bits
        let low = (slot & RVA_MASK) as u32;

        if slot & ordinal_flag != 0 {
            imports.push(ImportAddress::ByOrdinal(low));
            continue;
        }

        match read_hint_name(parser, headers, low, config.max_name_length) {
            Ok((hint, name)) => imports.push(ImportAddress::ByName { hint, name }),
            Err(error) => {
                warn!("Hint/name entry at rva {low:#x} unreadable: {error}");
                return Partial::truncated(imports);
            }
        }
    }

    Partial {
        entries: imports,
        truncated: slots.truncated,
    }
}

fn read_hint_name(
    parser: &mut Parser,
    headers: &ImageHeaders,
    rva: u32,
    max_len: usize,
) -> Result<(u16, String)> {
    let offset = offset_of(headers, rva)?;
    parser.detour(offset, |p| {
        let hint = p.read_le::<u16>()?;
        let name = p.read_string_ascii(max_len)?;
        Ok((hint, name))
    })
}
