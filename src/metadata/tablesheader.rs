//! Header of the `#~` tables stream.
//!
//! The tables header declares which of the 64 possible metadata tables are present (`valid`),
//! which are sorted, and how many rows each present table has. The table rows themselves start
//! directly after it; [`TablesHeader::end`] is the offset handed to a table decoder.
//!
//! ```text
//! ┌──────────┬───────┬───────┬───────────┬──────────┬───────┬────────┬──────────────┬─────────┐
//! │ reserved │ major │ minor │ heap_sizes│ reserved │ valid │ sorted │ rows × valid │ [extra] │
//! │   u32    │  u8   │  u8   │    u8     │    u8    │  u64  │  u64   │     u32      │   u32   │
//! └──────────┴───────┴───────┴───────────┴──────────┴───────┴────────┴──────────────┴─────────┘
//! ```

use crate::{
    file::parser::Parser,
    image::region::{impl_has_region, Region},
    Result,
};

/// Heap size flag: `#Strings` indexes are 4 bytes wide
pub const HEAP_LARGE_STRINGS: u8 = 0x01;
/// Heap size flag: `#GUID` indexes are 4 bytes wide
pub const HEAP_LARGE_GUID: u8 = 0x02;
/// Heap size flag: `#Blob` indexes are 4 bytes wide
pub const HEAP_LARGE_BLOB: u8 = 0x04;
/// Heap size flag: an extra 4-byte field follows the row counts
pub const HEAP_EXTRA_DATA: u8 = 0x40;

/// Row count of one present table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSummary {
    /// Table number, 0 to 63
    pub table_id: u8,
    /// Number of rows
    pub row_count: u32,
}

/// The header of the tables stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablesHeader {
    /// From the first reserved field through the row counts and extra field
    pub region: Region,
    /// Reserved, always 0
    pub reserved: u32,
    /// Major version of the table schema
    pub major_version: u8,
    /// Minor version of the table schema
    pub minor_version: u8,
    /// Heap index width flags
    pub heap_sizes: u8,
    /// Reserved, always 1
    pub reserved2: u8,
    /// Bit vector of present tables
    pub valid: u64,
    /// Bit vector of sorted tables
    pub sorted: u64,
    /// Row counts of present tables, in ascending table order
    pub row_counts: Vec<u32>,
    /// The extra field present when [`HEAP_EXTRA_DATA`] is set
    pub extra_data: Option<u32>,
}

impl TablesHeader {
    /// Decode a tables header at the current position.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedInput`] if the header is cut short.
    pub fn read(parser: &mut Parser) -> Result<TablesHeader> {
        let start = parser.pos();

        let reserved = parser.read_le::<u32>()?;
        let major_version = parser.read_le::<u8>()?;
        let minor_version = parser.read_le::<u8>()?;
        let heap_sizes = parser.read_le::<u8>()?;
        let reserved2 = parser.read_le::<u8>()?;
        let valid = parser.read_le::<u64>()?;
        let sorted = parser.read_le::<u64>()?;

        let mut row_counts = Vec::with_capacity(valid.count_ones() as usize);
        for _ in 0..valid.count_ones() {
            row_counts.push(parser.read_le::<u32>()?);
        }

        let extra_data = if heap_sizes & HEAP_EXTRA_DATA != 0 {
            Some(parser.read_le::<u32>()?)
        } else {
            None
        };

        Ok(TablesHeader {
            region: Region::from_bounds(start, parser.pos()),
            reserved,
            major_version,
            minor_version,
            heap_sizes,
            reserved2,
            valid,
            sorted,
            row_counts,
            extra_data,
        })
    }

    /// Get the table count
    #[must_use]
    pub fn table_count(&self) -> u32 {
        self.valid.count_ones()
    }

    /// Check if a table is present by its numeric ID
    #[must_use]
    pub fn has_table(&self, table_id: u8) -> bool {
        if table_id > 63 {
            return false;
        }
        (self.valid & (1u64 << table_id)) != 0
    }

    /// Check if a present table is flagged as sorted
    #[must_use]
    pub fn is_sorted(&self, table_id: u8) -> bool {
        self.has_table(table_id) && (self.sorted & (1u64 << table_id)) != 0
    }

    /// Get an iterator over the numeric IDs of all present tables
    pub fn present_tables(&self) -> impl Iterator<Item = u8> + '_ {
        (0..64u8).filter(|&table_id| self.has_table(table_id))
    }

    /// Get the row count for a specific table, 0 if it is not present
    #[must_use]
    pub fn row_count(&self, table_id: u8) -> u32 {
        if !self.has_table(table_id) {
            return 0;
        }

        let below = self.valid & ((1u64 << table_id) - 1);
        self.row_counts
            .get(below.count_ones() as usize)
            .copied()
            .unwrap_or(0)
    }

    /// Get a summary of all present tables with their row counts
    #[must_use]
    pub fn table_summary(&self) -> Vec<TableSummary> {
        self.present_tables()
            .map(|table_id| TableSummary {
                table_id,
                row_count: self.row_count(table_id),
            })
            .collect()
    }

    /// Returns `true` if `#Strings` indexes are 4 bytes wide.
    #[must_use]
    pub fn large_strings(&self) -> bool {
        self.heap_sizes & HEAP_LARGE_STRINGS != 0
    }

    /// Returns `true` if `#GUID` indexes are 4 bytes wide.
    #[must_use]
    pub fn large_guid(&self) -> bool {
        self.heap_sizes & HEAP_LARGE_GUID != 0
    }

    /// Returns `true` if `#Blob` indexes are 4 bytes wide.
    #[must_use]
    pub fn large_blob(&self) -> bool {
        self.heap_sizes & HEAP_LARGE_BLOB != 0
    }

    /// Absolute file offset of the first table row.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.region.end()
    }
}

impl_has_region!(TablesHeader);
