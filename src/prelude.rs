//! # pescope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types from the pescope
//! library. Import this module to get quick access to the essential types for image analysis.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all pescope operations
pub use crate::Error;

/// The result type used throughout pescope
pub use crate::Result;

/// Stage toggles and iteration bounds for loading
pub use crate::LoadConfig;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Main entry point for image analysis
pub use crate::{LoadStage, Module, StageFailure};

/// Low-level file parsing utilities
pub use crate::{File, Parser};

// ================================================================================================
// Image Headers
// ================================================================================================

/// Header structures of the PE/COFF image
pub use crate::image::{
    coff::{CoffHeader, FileCharacteristics, MachineType},
    datadirectory::{DataDirectory, DataDirectoryType},
    dos::DosStub,
    optional::{DllCharacteristics, OptionalHeader, PEKind, Subsystem},
    region::{HasRegion, Region},
    section::{SectionCharacteristics, SectionHeader},
    ImageHeaders,
};

// ================================================================================================
// Directory Tables
// ================================================================================================

/// Import, export and relocation tables
pub use crate::tables::{
    exports::{ExportRecord, ExportTable},
    imports::{ImportAddress, ImportDirectoryEntry, ImportTable},
    relocations::{Relocation, RelocationBlock, RelocationTable, RelocationType},
    ImportExportTables, Partial,
};

// ================================================================================================
// Managed Metadata
// ================================================================================================

/// Metadata headers, heaps and the table decoder seam
pub use crate::metadata::{
    cor20header::{Cor20Header, CorFlags},
    root::MetadataRoot,
    streamheader::StreamHeader,
    tablesheader::TablesHeader,
    HeapStream, MetadataHeaders, MetadataHeaps, TableContext, TableDecoder,
};
