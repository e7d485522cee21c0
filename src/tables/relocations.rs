//! Base relocation table.
//!
//! The table is a sequence of blocks, each covering one 4 KiB page. A block starts with the page
//! RVA and the total block size in bytes (including its own 8-byte header), followed by 16-bit
//! entries that pack a 4-bit type and a 12-bit offset into the page.
//!
//! ```text
//!  15    12 11                    0
//! ┌────────┬───────────────────────┐
//! │  type  │     page offset       │
//! └────────┴───────────────────────┘
//! ```

use std::fmt;

use log::{trace, warn};
use strum::Display;

use crate::{
    config::LoadConfig,
    file::parser::Parser,
    image::{
        datadirectory::DataDirectory,
        region::{impl_has_region, Region},
        ImageHeaders,
    },
    tables::{offset_of, Partial},
    Result,
};

/// Size of a block header
pub const BLOCK_HEADER_SIZE: u32 = 8;

/// Relocation type, from the top 4 bits of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum RelocationType {
    /// Padding, skipped by the loader
    #[strum(to_string = "Absolute")]
    Absolute,
    /// High 16 bits of the delta
    #[strum(to_string = "High")]
    High,
    /// Low 16 bits of the delta
    #[strum(to_string = "Low")]
    Low,
    /// Full 32-bit delta
    #[strum(to_string = "HighLow")]
    HighLow,
    /// High 16 bits, adjusted by the next entry
    #[strum(to_string = "HighAdj")]
    HighAdj,
    /// MIPS jump instruction
    #[strum(to_string = "Mips Jump")]
    MipsJumpAddr,
    /// Reserved
    #[strum(to_string = "Section")]
    Section,
    /// Reserved
    #[strum(to_string = "Rel32")]
    Rel32,
    /// MIPS16 jump instruction
    #[strum(to_string = "Mips Jump 16")]
    MipsJumpAddr16,
    /// Full 64-bit delta
    #[strum(to_string = "Dir64")]
    Dir64,
    /// High 32 bits of a 48-bit delta
    #[strum(to_string = "High32Adj")]
    High32Adj,
    /// Any other type code
    #[strum(to_string = "Unknown")]
    Unknown(u8),
}

impl RelocationType {
    /// Decode a 4-bit type code.
    #[must_use]
    pub fn from_code(code: u8) -> RelocationType {
        match code {
            0 => RelocationType::Absolute,
            1 => RelocationType::High,
            2 => RelocationType::Low,
            3 => RelocationType::HighLow,
            4 => RelocationType::HighAdj,
            5 => RelocationType::MipsJumpAddr,
            6 => RelocationType::Section,
            7 => RelocationType::Rel32,
            9 => RelocationType::MipsJumpAddr16,
            10 => RelocationType::Dir64,
            11 => RelocationType::High32Adj,
            other => RelocationType::Unknown(other),
        }
    }
}

/// A single relocation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    /// The raw 16-bit entry
    pub value: u16,
    /// Type from the top 4 bits
    pub kind: RelocationType,
    /// Page offset from the bottom 12 bits
    pub offset: u16,
}

impl Relocation {
    /// Unpack a raw entry.
    #[must_use]
    pub fn from_value(value: u16) -> Relocation {
        Relocation {
            value,
            kind: RelocationType::from_code((value >> 12) as u8),
            offset: value & 0x0FFF,
        }
    }
}

impl fmt::Display for Relocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X} {}", self.offset, self.kind)
    }
}

/// One page worth of relocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationBlock {
    /// Header and entries of this block
    pub region: Region,
    /// RVA of the page the entries apply to
    pub page_rva: u32,
    /// Declared size of the block, header included
    pub block_size: u32,
    /// The `block_size / 2 - 4` entries
    pub entries: Vec<Relocation>,
}

impl RelocationBlock {
    /// Decode a block at the current position.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the block size is smaller than its header, or
    /// [`crate::Error::TruncatedInput`] if the block is cut short.
    pub fn read(parser: &mut Parser) -> Result<RelocationBlock> {
        Self::read_limited(parser, usize::MAX)
    }

    /// Decode a block at the current position, keeping at most `limit` entries.
    ///
    /// Entries past `limit` are never read; [`RelocationBlock::is_partial`] reports the cut.
    ///
    /// # Errors
    /// Same as [`RelocationBlock::read`], for the entries that are read.
    pub fn read_limited(parser: &mut Parser, limit: usize) -> Result<RelocationBlock> {
        let start = parser.pos();

        let page_rva = parser.read_le::<u32>()?;
        let block_size = parser.read_le::<u32>()?;
        if block_size < BLOCK_HEADER_SIZE {
            return Err(malformed_error!(
                "Relocation block at {:#x} declares size {} below its header",
                start,
                block_size
            ));
        }

        let count = ((block_size / 2 - 4) as usize).min(limit);
        let mut entries = Vec::with_capacity(count.min(parser.remaining() / 2));
        for _ in 0..count {
            entries.push(Relocation::from_value(parser.read_le::<u16>()?));
        }

        Ok(RelocationBlock {
            region: Region::from_bounds(start, parser.pos()),
            page_rva,
            block_size,
            entries,
        })
    }

    /// Number of entries the block size declares.
    #[must_use]
    pub fn declared_entries(&self) -> usize {
        (self.block_size / 2).saturating_sub(4) as usize
    }

    /// Returns `true` if fewer entries were kept than the block declares.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.entries.len() < self.declared_entries()
    }

    /// RVA patched by `relocation`.
    #[must_use]
    pub fn target(&self, relocation: &Relocation) -> u32 {
        self.page_rva.wrapping_add(u32::from(relocation.offset))
    }
}

impl_has_region!(RelocationBlock);

/// The decoded base relocation directory.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RelocationTable {
    /// The bytes covered by the data directory
    pub region: Region,
    /// Blocks in file order
    pub blocks: Partial<RelocationBlock>,
}

impl RelocationTable {
    /// Walk the relocation blocks described by `directory`. A directory with RVA zero yields an
    /// empty table.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidRva`] if the directory is not mapped by any section.
    /// Failures after that point truncate the walk instead.
    pub fn read(
        parser: &mut Parser,
        headers: &ImageHeaders,
        directory: &DataDirectory,
        config: &LoadConfig,
    ) -> Result<RelocationTable> {
        if !directory.is_present() {
            return Ok(RelocationTable::default());
        }

        let start = offset_of(headers, directory.rva)?;
        let end = start.saturating_add(directory.size as usize);
        parser.seek(start)?;

        let mut blocks = Vec::new();
        let mut total_entries = 0usize;
        let mut truncated = false;

        while parser.pos() < end {
            if blocks.len() >= config.max_relocation_blocks {
                warn!(
                    "Relocation table exceeds {} blocks, stopping",
                    config.max_relocation_blocks
                );
                truncated = true;
                break;
            }

            let block_start = parser.pos();
            let budget = config.max_relocation_entries.saturating_sub(total_entries);
            match parser.transactional(|p| RelocationBlock::read_limited(p, budget)) {
                Ok(block) => {
                    total_entries += block.entries.len();
                    trace!(
                        "Relocation block for page {:#x}: {} entries",
                        block.page_rva,
                        block.entries.len()
                    );

                    let partial = block.is_partial();
                    blocks.push(block);
                    if partial {
                        warn!(
                            "Relocation table exceeds {} entries, stopping",
                            config.max_relocation_entries
                        );
                        truncated = true;
                        break;
                    }
                }
                Err(error) => {
                    warn!("Relocation block at {block_start:#x} unreadable: {error}");
                    truncated = true;
                    break;
                }
            }
        }

        Ok(RelocationTable {
            region: Region::new(start as u64, u64::from(directory.size)),
            blocks: Partial { entries: blocks, truncated },
        })
    }

    /// Every relocation with the RVA it patches, in table order.
    pub fn targets(&self) -> impl Iterator<Item = (u32, &Relocation)> {
        self.blocks.iter().flat_map(|block| {
            block
                .entries
                .iter()
                .map(move |relocation| (block.target(relocation), relocation))
        })
    }

    /// Returns `true` if the walk stopped early.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.blocks.truncated
    }
}
