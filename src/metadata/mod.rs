//! Managed metadata headers.
//!
//! For images that carry a CLI header, this module decodes everything needed to hand the
//! metadata tables to a table decoder: the Cor20 header, the metadata root with its stream
//! directory, the `#~` tables header, and the absolute locations of the heaps.
//!
//! # Architecture
//!
//! ```text
//! CLI header directory ─► Cor20Header ─► meta_data_rva ─► MetadataRoot
//!                                                            │
//!                      ┌─────────────────────────────────────┤ stream directory
//!                      ▼                                     ▼
//!                 TablesHeader (#~)          MetadataHeaps (#Strings, #Blob, #GUID, #US)
//!                      │
//!                      └─► end() ─► TableDecoder
//! ```
//!
//! Decoding the rows of the metadata tables needs their full schema, which this crate leaves to
//! its consumers. [`crate::metadata::TableDecoder`] is the seam: it receives a cursor at the
//! first row and a [`crate::metadata::TableContext`] with everything decoded so far.
//!
//! # References
//!
//! - [ECMA-335 II.24](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

pub mod cor20header;
pub mod root;
pub mod streamheader;
pub mod tablesheader;

use log::debug;

use crate::{
    config::LoadConfig,
    file::parser::Parser,
    image::{datadirectory::DataDirectory, region::Region, ImageHeaders},
    Result,
};
use cor20header::Cor20Header;
use root::MetadataRoot;
use streamheader::StreamHeader;
use tablesheader::TablesHeader;

/// Names under which the tables stream may appear
pub const TABLES_STREAM_NAMES: [&str; 2] = ["#~", "#-"];

/// The CLI header, metadata root and tables header of a managed image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataHeaders {
    /// The CLI header
    pub cor20: Cor20Header,
    /// The metadata root and stream directory
    pub root: MetadataRoot,
    /// The header of the tables stream
    pub tables_header: TablesHeader,
}

impl MetadataHeaders {
    /// Decode the metadata headers reachable from the CLI header `directory`.
    ///
    /// # Errors
    /// - [`crate::Error::InvalidRva`] if the CLI header or the metadata root is not mapped
    /// - [`crate::Error::Malformed`] if a stream leaves the declared metadata size, or there is
    ///   no tables stream
    /// - any error of [`Cor20Header::read`], [`MetadataRoot::read`] or [`TablesHeader::read`]
    pub fn read(
        parser: &mut Parser,
        headers: &ImageHeaders,
        directory: &DataDirectory,
        config: &LoadConfig,
    ) -> Result<MetadataHeaders> {
        parser.seek(headers.rva_to_offset(directory.rva)? as usize)?;
        let cor20 = Cor20Header::read(parser)?;

        let root_offset = headers.rva_to_offset(cor20.meta_data_rva)? as usize;
        debug!(
            "Metadata root at rva {:#x} (offset {root_offset:#x}), {:#x} bytes",
            cor20.meta_data_rva, cor20.meta_data_size
        );
        parser.seek(root_offset)?;
        let root = MetadataRoot::read(parser, config)?;

        for stream in &root.stream_headers {
            if stream.end() > u64::from(cor20.meta_data_size) {
                return Err(malformed_error!(
                    "Stream {} [{:#x} + {:#x}] exceeds the metadata size {:#x}",
                    stream.name,
                    stream.offset,
                    stream.size,
                    cor20.meta_data_size
                ));
            }
        }

        let Some(tables) = TABLES_STREAM_NAMES
            .iter()
            .find_map(|name| root.stream(name))
        else {
            return Err(malformed_error!("Metadata has no tables stream"));
        };

        parser.seek(root_offset + tables.offset as usize)?;
        let tables_header = TablesHeader::read(parser)?;
        debug!(
            "Tables header declares {} tables, rows start at {:#x}",
            tables_header.table_count(),
            tables_header.end()
        );

        Ok(MetadataHeaders {
            cor20,
            root,
            tables_header,
        })
    }

    /// Absolute file offset of the metadata root.
    #[must_use]
    pub fn root_offset(&self) -> u64 {
        self.root.region.start
    }

    /// Absolute file range of a stream of this root.
    #[must_use]
    pub fn stream_region(&self, stream: &StreamHeader) -> Region {
        Region::new(
            self.root_offset() + u64::from(stream.offset),
            u64::from(stream.size),
        )
    }
}

/// One metadata heap located in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapStream {
    /// Stream name
    pub name: String,
    /// Absolute file range of the heap
    pub region: Region,
}

impl HeapStream {
    /// The bytes of this heap.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedInput`] if the heap extends past `data`.
    pub fn data<'a>(&self, data: &'a [u8]) -> Result<&'a [u8]> {
        let start = self.region.start as usize;
        let length = self.region.length as usize;

        match start.checked_add(length) {
            Some(end) if end <= data.len() => Ok(&data[start..end]),
            _ => Err(truncated_error!(start, length)),
        }
    }
}

/// The heaps of a managed image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataHeaps {
    /// `#Strings`, identifier strings
    pub strings: HeapStream,
    /// `#Blob`, signatures and other binary values
    pub blob: HeapStream,
    /// `#GUID`, 16-byte GUIDs
    pub guid: HeapStream,
    /// `#US`, user strings, absent in some images
    pub user_strings: Option<HeapStream>,
}

impl MetadataHeaps {
    /// Locate the heaps named in the stream directory of `metadata`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `#Strings`, `#Blob` or `#GUID` is missing, or
    /// [`crate::Error::TruncatedInput`] if a heap extends past the end of the file.
    pub fn locate(metadata: &MetadataHeaders, file_len: usize) -> Result<MetadataHeaps> {
        let find = |name: &str| -> Result<Option<HeapStream>> {
            let Some(stream) = metadata.root.stream(name) else {
                return Ok(None);
            };

            let region = metadata.stream_region(stream);
            if region.end() > file_len as u64 {
                return Err(truncated_error!(region.start as usize, region.length as usize));
            }

            Ok(Some(HeapStream {
                name: stream.name.clone(),
                region,
            }))
        };
        let require = |name: &str| -> Result<HeapStream> {
            find(name)?.ok_or_else(|| malformed_error!("Required heap {} is missing", name))
        };

        Ok(MetadataHeaps {
            strings: require("#Strings")?,
            blob: require("#Blob")?,
            guid: require("#GUID")?,
            user_strings: find("#US")?,
        })
    }

    /// The heap with the given stream name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&HeapStream> {
        [&self.strings, &self.blob, &self.guid]
            .into_iter()
            .chain(self.user_strings.as_ref())
            .find(|heap| heap.name == name)
    }
}

/// Everything a table decoder may need besides the cursor.
pub struct TableContext<'a> {
    /// The image headers, for RVA translation
    pub headers: &'a ImageHeaders,
    /// The metadata headers, including the tables header
    pub metadata: &'a MetadataHeaders,
    /// The located heaps
    pub heaps: &'a MetadataHeaps,
    /// The whole input
    pub data: &'a [u8],
}

impl<'a> TableContext<'a> {
    /// The tables header whose rows the decoder reads.
    #[must_use]
    pub fn tables_header(&self) -> &'a TablesHeader {
        &self.metadata.tables_header
    }

    /// The bytes of `heap`.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedInput`] if the heap extends past the input.
    pub fn heap_data(&self, heap: &HeapStream) -> Result<&'a [u8]> {
        heap.data(self.data)
    }
}

/// Decoder for the rows of the metadata tables.
///
/// [`crate::Module::decode_tables`] positions the cursor at [`TablesHeader::end`] and calls
/// [`TableDecoder::decode`]; where the cursor ends up afterwards does not matter.
///
/// # Examples
///
/// ```rust,no_run
/// use pescope::{metadata::{TableContext, TableDecoder}, Module, Parser, Result};
///
/// /// Reads the generation of the single `Module` row.
/// struct ModuleGeneration;
///
/// impl TableDecoder for ModuleGeneration {
///     type Output = u16;
///
///     fn decode(&self, parser: &mut Parser<'_>, _context: &TableContext<'_>) -> Result<u16> {
///         parser.read_le::<u16>()
///     }
/// }
///
/// let module = Module::from_file("managed.dll".as_ref())?;
/// let generation = module.decode_tables(&ModuleGeneration)?;
/// # Ok::<(), pescope::Error>(())
/// ```
pub trait TableDecoder {
    /// What the decoder produces
    type Output;

    /// Decode the tables starting at the current cursor position.
    ///
    /// # Errors
    /// Any error the decoder encounters.
    fn decode(&self, parser: &mut Parser<'_>, context: &TableContext<'_>) -> Result<Self::Output>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        image::datadirectory::DataDirectoryType,
        test::{managed_image, put_u32, text_offset, METADATA_RVA},
        Error,
    };

    fn read_metadata(image: &[u8]) -> Result<MetadataHeaders> {
        let mut parser = Parser::new(image);
        let headers = ImageHeaders::read(&mut parser).unwrap();
        let directory = headers
            .data_directory(DataDirectoryType::ClrHeader)
            .unwrap()
            .clone();

        MetadataHeaders::read(&mut parser, &headers, &directory, &LoadConfig::default())
    }

    #[test]
    fn headers() {
        let image = managed_image();
        let metadata = read_metadata(&image).unwrap();

        assert_eq!(metadata.cor20.meta_data_rva, METADATA_RVA);
        assert_eq!(metadata.root.version, "v4.0.30319");
        assert_eq!(metadata.root.stream_headers.len(), 5);
        assert_eq!(metadata.root_offset(), 0xD00);
        assert_eq!(metadata.tables_header.region, Region::new(0xD6C, 32));
        assert_eq!(metadata.tables_header.end(), 0xD8C);
        assert_eq!(metadata.tables_header.row_count(2), 3);

        let strings = metadata.root.stream("#Strings").unwrap();
        assert_eq!(metadata.stream_region(strings), Region::new(0xDAC, 0x10));
    }

    #[test]
    fn heaps() {
        let image = managed_image();
        let metadata = read_metadata(&image).unwrap();
        let heaps = MetadataHeaps::locate(&metadata, image.len()).unwrap();

        assert_eq!(heaps.strings.region, Region::new(0xDAC, 0x10));
        assert_eq!(heaps.guid.region, Region::new(0xDC4, 0x10));
        assert_eq!(heaps.blob.region, Region::new(0xDD4, 0x08));
        assert_eq!(heaps.user_strings.as_ref().unwrap().region, Region::new(0xDBC, 0x08));
        assert_eq!(&heaps.strings.data(&image).unwrap()[..10], b"\0<Module>\0");
        assert_eq!(heaps.guid.data(&image).unwrap(), &[0x11; 16]);
        assert_eq!(heaps.by_name("#Blob").unwrap().region.length, 8);
        assert!(heaps.by_name("#~").is_none());
    }

    #[test]
    fn stream_beyond_metadata_size() {
        let mut image = managed_image();
        // #Blob size
        put_u32(&mut image, text_offset(METADATA_RVA) + 0x60, 0x1000);

        assert!(matches!(read_metadata(&image), Err(Error::Malformed { .. })));
    }

    #[test]
    fn missing_tables_stream() {
        let mut image = managed_image();
        let name = text_offset(METADATA_RVA) + 0x28;
        image[name..name + 2].copy_from_slice(b"#X");

        assert!(matches!(read_metadata(&image), Err(Error::Malformed { .. })));
    }

    #[test]
    fn missing_required_heap() {
        let mut image = managed_image();
        let name = text_offset(METADATA_RVA) + 0x64;
        image[name..name + 5].copy_from_slice(b"#Blub");

        let metadata = read_metadata(&image).unwrap();
        assert!(matches!(
            MetadataHeaps::locate(&metadata, image.len()),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn unmapped_metadata_root() {
        let mut image = managed_image();
        // Cor20 meta_data_rva
        put_u32(&mut image, text_offset(crate::test::CLR_RVA) + 8, 0x8000);

        assert!(matches!(read_metadata(&image), Err(Error::InvalidRva(0x8000))));
    }
}
