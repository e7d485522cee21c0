//! Export directory.
//!
//! The 40-byte export directory table points at three parallel arrays:
//!
//! - the export address table, `address_table_entries` RVAs indexed by `ordinal - base`
//! - the name pointer table, `number_of_name_pointers` RVAs of NUL-terminated names
//! - the ordinal table, one 16-bit index into the address table per name
//!
//! [`ExportTable::records`] zips the three arrays by index and stops at the shorter of the
//! address table and the name table. That merge is lossy when names and addresses are not in
//! the same order; [`ExportTable::address_of`] resolves a name through the ordinal table
//! instead, the way the loader does.

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
    tables::{array_at_rva, offset_of, string_at_rva, Partial},
    Result,
};

/// Size of the export directory table
pub const EXPORT_DIRECTORY_SIZE: usize = 40;

/// The fixed export directory table.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct ExportDirectoryTable {
    /// The 40 bytes of the table
    pub region: Region,
    /// Reserved, must be zero
    pub export_flags: u32,
    pub time_date_stamp: u32,
    pub major_version: u16,
    pub minor_version: u16,
    /// RVA of the DLL name
    pub name_rva: u32,
    /// Ordinal of the first address table entry
    pub ordinal_base: u32,
    pub address_table_entries: u32,
    pub number_of_name_pointers: u32,
    pub export_address_table_rva: u32,
    pub name_pointer_rva: u32,
    pub ordinal_table_rva: u32,
}

impl ExportDirectoryTable {
    /// Decode the table at the current position.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedInput`] if fewer than 40 bytes remain.
    pub fn read(parser: &mut Parser) -> Result<ExportDirectoryTable> {
        let start = parser.pos();

        Ok(ExportDirectoryTable {
            region: Region::new(start as u64, EXPORT_DIRECTORY_SIZE as u64),
            export_flags: parser.read_le::<u32>()?,
            time_date_stamp: parser.read_le::<u32>()?,
            major_version: parser.read_le::<u16>()?,
            minor_version: parser.read_le::<u16>()?,
            name_rva: parser.read_le::<u32>()?,
            ordinal_base: parser.read_le::<u32>()?,
            address_table_entries: parser.read_le::<u32>()?,
            number_of_name_pointers: parser.read_le::<u32>()?,
            export_address_table_rva: parser.read_le::<u32>()?,
            name_pointer_rva: parser.read_le::<u32>()?,
            ordinal_table_rva: parser.read_le::<u32>()?,
        })
    }
}

impl_has_region!(ExportDirectoryTable);

/// One export, merged index-wise from the three arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRecord {
    /// Raw ordinal table value, not biased by the ordinal base
    pub ordinal: u32,
    /// Address table RVA
    pub address: u32,
    /// Exported name
    pub name: String,
}

impl fmt::Display for ExportRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: Ordinal {}, Addr {:08X}",
            self.name, self.ordinal, self.address
        )
    }
}

/// The decoded export directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTable {
    /// The fixed directory table
    pub directory: ExportDirectoryTable,
    /// The DLL name, `None` if it could not be read
    pub name: Option<String>,
    /// Export address table
    pub addresses: Partial<u32>,
    /// Ordinal table
    pub ordinals: Partial<u16>,
    /// Names resolved from the name pointer table
    pub names: Partial<String>,
    /// Index-wise merge of the three arrays
    pub records: Partial<ExportRecord>,
}

impl ExportTable {
    /// Decode the export directory described by `directory`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidRva`] if the directory is not mapped by any section, or
    /// [`crate::Error::TruncatedInput`] if the fixed table is cut short. Failures in the arrays
    /// truncate them instead.
    pub fn read(
        parser: &mut Parser,
        headers: &ImageHeaders,
        directory: &DataDirectory,
        config: &LoadConfig,
    ) -> Result<ExportTable> {
        let start = offset_of(headers, directory.rva)?;
        parser.seek(start)?;
        let table = ExportDirectoryTable::read(parser)?;

        let name = match string_at_rva(parser, headers, table.name_rva, config.max_name_length) {
            Ok(name) => Some(name),
            Err(error) => {
                warn!("Export DLL name at rva {:#x} unreadable: {error}", table.name_rva);
                None
            }
        };

        let limit = config.max_export_entries;
        let addresses = array_at_rva(
            parser,
            headers,
            table.export_address_table_rva,
            table.address_table_entries as usize,
            limit,
            |p| p.read_le::<u32>(),
        );
        let ordinals = array_at_rva(
            parser,
            headers,
            table.ordinal_table_rva,
            table.number_of_name_pointers as usize,
            limit,
            |p| p.read_le::<u16>(),
        );
        let name_pointers = array_at_rva(
            parser,
            headers,
            table.name_pointer_rva,
            table.number_of_name_pointers as usize,
            limit,
            |p| p.read_le::<u32>(),
        );

        let mut names = Vec::with_capacity(name_pointers.len());
        let mut names_truncated = name_pointers.truncated;
        for rva in &name_pointers {
            match string_at_rva(parser, headers, *rva, config.max_name_length) {
                Ok(name) => names.push(name),
                Err(error) => {
                    warn!("Export name at rva {rva:#x} unreadable: {error}");
                    names_truncated = true;
                    break;
                }
            }
        }
        let names = Partial {
            entries: names,
            truncated: names_truncated,
        };

        let records = merge(&addresses, &ordinals, &names);
        if records.truncated {
            warn!(
                "Export table truncated: {} of {} records",
                records.len(),
                table.address_table_entries.min(table.number_of_name_pointers)
            );
        }
        for record in &records {
            trace!("Export {record}");
        }

        Ok(ExportTable {
            directory: table,
            name,
            addresses,
            ordinals,
            names,
            records,
        })
    }

    /// Resolve an exported name to its address through the ordinal table.
    #[must_use]
    pub fn address_of(&self, name: &str) -> Option<u32> {
        let index = self.names.iter().position(|candidate| candidate == name)?;
        let ordinal = *self.ordinals.get(index)?;
        self.addresses.get(usize::from(ordinal)).copied()
    }

    /// Resolve a biased ordinal, as used by import-by-ordinal, to its address.
    #[must_use]
    pub fn address_of_ordinal(&self, ordinal: u32) -> Option<u32> {
        let index = ordinal.checked_sub(self.directory.ordinal_base)?;
        self.addresses.get(index as usize).copied()
    }

    /// Returns `true` if any array or the record merge is truncated.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.addresses.truncated
            || self.ordinals.truncated
            || self.names.truncated
            || self.records.truncated
    }

    /// Region of the fixed directory table.
    #[must_use]
    pub fn region(&self) -> Region {
        self.directory.region
    }
}

fn merge(
    addresses: &Partial<u32>,
    ordinals: &Partial<u16>,
    names: &Partial<String>,
) -> Partial<ExportRecord> {
    let entries: Vec<ExportRecord> = addresses
        .iter()
        .zip(ordinals.iter())
        .zip(names.iter())
        .map(|((address, ordinal), name)| ExportRecord {
            ordinal: u32::from(*ordinal),
            address: *address,
            name: name.clone(),
        })
        .collect();

    // A short array only loses records if it was cut below the length of the other arrays
    let truncated = [
        (addresses.truncated, addresses.len()),
        (ordinals.truncated, ordinals.len()),
        (names.truncated, names.len()),
    ]
    .iter()
    .any(|(truncated, len)| *truncated && *len == entries.len());

    Partial { entries, truncated }
}
