//! Data-directory tables: imports, exports and base relocations.
//!
//! Each table is located through its data directory and the section table of the already
//! decoded [`crate::image::ImageHeaders`]. Walks over these tables are best effort: once the
//! directory has been located, any failure inside the walk stops it, keeps what was decoded and
//! marks the result as truncated in a [`crate::tables::Partial`].
//!
//! # Key Components
//!
//! - [`crate::tables::imports::ImportTable`] - import directory, lookup and address tables
//! - [`crate::tables::exports::ExportTable`] - export directory and its three parallel arrays
//! - [`crate::tables::relocations::RelocationTable`] - base relocation blocks
//! - [`crate::tables::ImportExportTables`] - both import and export tables, loaded as one stage
//!
//! # Failure Policy
//!
//! | Situation                                   | Result                               |
//! |---------------------------------------------|--------------------------------------|
//! | Directory RVA zero                          | empty table                          |
//! | Directory RVA not mapped by any section     | `Err`; imports and exports keep it   |
//! | Read error or bound hit in the middle       | `Partial { truncated: true, .. }`    |

pub mod exports;
pub mod imports;
pub mod relocations;

use std::{ops::Deref, slice};

use log::{debug, warn};

use crate::{
    config::LoadConfig,
    file::parser::Parser,
    image::{datadirectory::DataDirectoryType, ImageHeaders},
    Error, Result,
};
use exports::ExportTable;
use imports::ImportTable;

/// The entries of a best-effort walk, and whether the walk stopped early.
///
/// A truncated partial never contains wrong values, only fewer of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partial<T> {
    /// Every entry decoded before the walk ended
    pub entries: Vec<T>,
    /// `true` if the walk stopped on an error or a configured bound
    pub truncated: bool,
}

impl<T> Partial<T> {
    /// A walk that reached its natural end.
    #[must_use]
    pub fn complete(entries: Vec<T>) -> Self {
        Partial {
            entries,
            truncated: false,
        }
    }

    /// A walk that stopped early.
    #[must_use]
    pub fn truncated(entries: Vec<T>) -> Self {
        Partial {
            entries,
            truncated: true,
        }
    }

    /// Returns `true` if the walk reached its natural end.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.truncated
    }
}

impl<T> Default for Partial<T> {
    fn default() -> Self {
        Partial::complete(Vec::new())
    }
}

impl<T> Deref for Partial<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.entries
    }
}

impl<'a, T> IntoIterator for &'a Partial<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// The import and export tables of an image, decoded as a single stage.
///
/// The two tables are siblings: a directory that can not be decoded leaves its own table empty
/// and keeps the error, without affecting the other one.
#[derive(Debug, Default)]
pub struct ImportExportTables {
    /// Decoded import directory, empty if the image imports nothing or it failed to decode
    pub imports: ImportTable,
    /// Why the import directory could not be decoded
    pub import_error: Option<Error>,
    /// Decoded export directory, `None` if the image exports nothing or it failed to decode
    pub exports: Option<ExportTable>,
    /// Why the export directory could not be decoded
    pub export_error: Option<Error>,
}

impl ImportExportTables {
    /// Decode both tables. A directory that is not mapped by any section, or an export
    /// directory record that can not be read, is kept in `import_error` / `export_error`.
    #[must_use]
    pub fn read(
        parser: &mut Parser,
        headers: &ImageHeaders,
        config: &LoadConfig,
    ) -> ImportExportTables {
        let mut tables = ImportExportTables::default();

        if let Some(directory) = headers.data_directory(DataDirectoryType::Import) {
            if directory.is_present() {
                debug!(
                    "Import directory at rva {:#x}, {} bytes",
                    directory.rva, directory.size
                );
                match ImportTable::read(parser, headers, directory, config) {
                    Ok(imports) => tables.imports = imports,
                    Err(error) => {
                        warn!("Import directory unreadable: {error}");
                        tables.import_error = Some(error);
                    }
                }
            }
        }

        if let Some(directory) = headers.data_directory(DataDirectoryType::Export) {
            if directory.is_present() {
                debug!(
                    "Export directory at rva {:#x}, {} bytes",
                    directory.rva, directory.size
                );
                match ExportTable::read(parser, headers, directory, config) {
                    Ok(exports) => tables.exports = Some(exports),
                    Err(error) => {
                        warn!("Export directory unreadable: {error}");
                        tables.export_error = Some(error);
                    }
                }
            }
        }

        tables
    }

    /// Returns `true` if any list in either table is truncated.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.imports.is_truncated() || self.exports.as_ref().is_some_and(ExportTable::is_truncated)
    }

    /// Returns `true` if either table is truncated or failed to decode.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.is_truncated() || self.import_error.is_some() || self.export_error.is_some()
    }
}

/// File offset of `rva` as a `usize`.
pub(crate) fn offset_of(headers: &ImageHeaders, rva: u32) -> Result<usize> {
    Ok(headers.rva_to_offset(rva)? as usize)
}

/// Read a NUL-terminated string at `rva` without moving the cursor.
pub(crate) fn string_at_rva(
    parser: &mut Parser,
    headers: &ImageHeaders,
    rva: u32,
    max_len: usize,
) -> Result<String> {
    let offset = offset_of(headers, rva)?;
    parser.detour(offset, |p| p.read_string_ascii(max_len))
}

/// Read `count` little-endian values at `rva` without moving the cursor, reading at most
/// `limit` of them.
pub(crate) fn array_at_rva<T, F>(
    parser: &mut Parser,
    headers: &ImageHeaders,
    rva: u32,
    count: usize,
    limit: usize,
    mut read: F,
) -> Partial<T>
where
    F: FnMut(&mut Parser) -> Result<T>,
{
    if count == 0 {
        return Partial::default();
    }

    let Ok(offset) = offset_of(headers, rva) else {
        return Partial::truncated(Vec::new());
    };

    let wanted = count.min(limit);
    let walk = parser.detour(offset, |p| {
        let mut entries = Vec::with_capacity(wanted.min(p.remaining()));
        for _ in 0..wanted {
            match read(p) {
                Ok(value) => entries.push(value),
                Err(_) => return Ok(Partial::truncated(entries)),
            }
        }
        Ok(Partial {
            entries,
            truncated: wanted < count,
        })
    });

    walk.unwrap_or_else(|_| Partial::truncated(Vec::new()))
}
