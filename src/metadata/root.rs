//! Metadata root header and stream directory.
//!
//! The metadata root is the entry point into managed metadata. It carries the runtime version
//! string and the directory of streams (`#~`, `#Strings`, `#US`, `#GUID`, `#Blob`) whose offsets
//! are relative to the root itself.
//!
//! # References
//!
//! - [ECMA-335 II.24.2.1: Metadata root](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use log::trace;

use crate::{
    config::LoadConfig,
    file::parser::Parser,
    image::region::{impl_has_region, Region},
    metadata::streamheader::StreamHeader,
    Error, Result,
};

/// `BSJB`, read as a little-endian u32
pub const CIL_HEADER_MAGIC: u32 = 0x424A_5342;

/// Longest padded version string allowed by ECMA-335
pub const MAX_VERSION_LENGTH: u32 = 256;

/// The metadata root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRoot {
    /// From the signature through the last stream header
    pub region: Region,
    /// Magic signature, always `BSJB`
    pub signature: u32,
    /// Major version, ignored on read
    pub major_version: u16,
    /// Minor version, ignored on read
    pub minor_version: u16,
    /// Reserved, always 0
    pub reserved: u32,
    /// Declared length of the padded version string
    pub length: u32,
    /// Runtime version string, up to the first NUL
    pub version: String,
    /// Reserved, always 0
    pub flags: u16,
    /// Number of stream headers
    pub stream_number: u16,
    /// The stream directory
    pub stream_headers: Vec<StreamHeader>,
}

impl MetadataRoot {
    /// Decode the metadata root at the current position.
    ///
    /// # Errors
    /// - [`Error::Malformed`] if the signature is not `BSJB` or the version string is too long
    /// - [`Error::LimitExceeded`] if more stream headers are declared than the configuration
    ///   allows
    /// - [`Error::TruncatedInput`] if the root is cut short
    pub fn read(parser: &mut Parser, config: &LoadConfig) -> Result<MetadataRoot> {
        let start = parser.pos();

        let signature = parser.read_le::<u32>()?;
        if signature != CIL_HEADER_MAGIC {
            return Err(malformed_error!(
                "CIL_HEADER_MAGIC does not match - {:#010x}",
                signature
            ));
        }

        let major_version = parser.read_le::<u16>()?;
        let minor_version = parser.read_le::<u16>()?;
        let reserved = parser.read_le::<u32>()?;

        let length = parser.read_le::<u32>()?;
        if length > MAX_VERSION_LENGTH {
            return Err(malformed_error!(
                "Version string length {} exceeds {}",
                length,
                MAX_VERSION_LENGTH
            ));
        }
        let version = parser
            .read_bytes(length as usize)?
            .iter()
            .take_while(|byte| **byte != 0)
            .map(|byte| char::from(*byte))
            .collect();

        let flags = parser.read_le::<u16>()?;
        let stream_number = parser.read_le::<u16>()?;
        if usize::from(stream_number) > config.max_stream_headers {
            return Err(Error::LimitExceeded {
                what: "metadata stream headers",
                limit: config.max_stream_headers,
            });
        }

        let mut stream_headers = Vec::with_capacity(usize::from(stream_number));
        for _ in 0..stream_number {
            let header = StreamHeader::read(parser)?;
            trace!(
                "Stream {} at +{:#x}, {:#x} bytes",
                header.name,
                header.offset,
                header.size
            );
            stream_headers.push(header);
        }

        Ok(MetadataRoot {
            region: Region::from_bounds(start, parser.pos()),
            signature,
            major_version,
            minor_version,
            reserved,
            length,
            version,
            flags,
            stream_number,
            stream_headers,
        })
    }

    /// The first stream header with the given name.
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&StreamHeader> {
        self.stream_headers.iter().find(|header| header.name == name)
    }
}

impl_has_region!(MetadataRoot);
