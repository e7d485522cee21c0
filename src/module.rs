//! Staged loading of a PE image.
//!
//! [`Module`] owns the input and everything decoded from it. Loading runs a fixed sequence of
//! stages:
//!
//! ```text
//! Headers ─► ImportExport ─► Relocations ─► Metadata ─► Heaps ─► (TableDecoder)
//! ```
//!
//! A failure while decoding the image headers is returned to the caller, as nothing else can be
//! located without them. A failure in a later stage is recorded as a [`StageFailure`]; that
//! stage and every stage after it stay unset, while the stages before it remain available.
//! Stages switched off in [`crate::LoadConfig`] are skipped without halting the ones after them.
//! The import and export directories never fail their stage; each keeps its own error in
//! [`ImportExportTables`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use pescope::{LoadConfig, Module};
//! use std::path::Path;
//!
//! let module = Module::from_file(Path::new("sample.dll"))?;
//! for failure in module.failures() {
//!     eprintln!("{failure}");
//! }
//!
//! if let Some(imports) = module.imports() {
//!     for entry in &imports.entries {
//!         println!("{}: {} symbols", entry.module_name, entry.import_lookup_table.len());
//!     }
//! }
//!
//! let headers_only = Module::from_file_with_config(Path::new("sample.dll"), LoadConfig::minimal())?;
//! assert!(headers_only.import_export().is_none());
//! # Ok::<(), pescope::Error>(())
//! ```

use std::{fmt, path::Path, sync::Arc};

use log::{debug, warn};
use strum::Display;

use crate::{
    config::LoadConfig,
    file::{parser::Parser, File},
    image::{datadirectory::DataDirectoryType, ImageHeaders},
    metadata::{MetadataHeaders, MetadataHeaps, TableContext, TableDecoder},
    tables::{
        exports::ExportTable, imports::ImportTable, relocations::RelocationTable,
        string_at_rva, ImportExportTables,
    },
    Error, Result,
};

/// The stages of loading a module, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum LoadStage {
    /// DOS stub, COFF header, optional header and section table
    #[strum(serialize = "image headers")]
    Headers,
    /// Import and export directories
    #[strum(serialize = "import/export tables")]
    ImportExport,
    /// Base relocation directory
    #[strum(serialize = "relocations")]
    Relocations,
    /// CLI header, metadata root and tables header
    #[strum(serialize = "metadata")]
    Metadata,
    /// Metadata heap locations
    #[strum(serialize = "metadata heaps")]
    Heaps,
}

/// A stage that failed, and why.
#[derive(Debug)]
pub struct StageFailure {
    /// The stage that failed
    pub stage: LoadStage,
    /// The error that stopped it
    pub error: Error,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.error)
    }
}

/// A loaded PE image with its decoded stages.
pub struct Module {
    file: Arc<File>,
    config: LoadConfig,
    headers: ImageHeaders,
    import_export: Option<ImportExportTables>,
    relocations: Option<RelocationTable>,
    metadata: Option<MetadataHeaders>,
    heaps: Option<MetadataHeaps>,
    failures: Vec<StageFailure>,
}

impl Module {
    /// Load the image at `path` with the default configuration.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file can not be mapped, or the error that
    /// stopped the image headers from decoding.
    pub fn from_file(path: &Path) -> Result<Module> {
        Self::from_file_with_config(path, LoadConfig::default())
    }

    /// Load the image at `path`.
    ///
    /// # Errors
    /// See [`Module::from_file`].
    pub fn from_file_with_config(path: &Path, config: LoadConfig) -> Result<Module> {
        let input = Arc::new(File::from_file(path)?);
        Self::load(input, config)
    }

    /// Load an image from a buffer with the default configuration.
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] for an empty buffer, or the error that stopped the image
    /// headers from decoding.
    pub fn from_mem(data: Vec<u8>) -> Result<Module> {
        Self::from_mem_with_config(data, LoadConfig::default())
    }

    /// Load an image from a buffer.
    ///
    /// # Errors
    /// See [`Module::from_mem`].
    pub fn from_mem_with_config(data: Vec<u8>, config: LoadConfig) -> Result<Module> {
        let input = Arc::new(File::from_mem(data)?);
        Self::load(input, config)
    }

    fn load(file: Arc<File>, config: LoadConfig) -> Result<Module> {
        let data = file.data();
        let mut parser = Parser::new(data);

        let headers = ImageHeaders::read(&mut parser)?;
        debug!(
            "Loaded {} headers: {} sections",
            headers.kind(),
            headers.sections.len()
        );

        let mut failures = Vec::new();

        let import_export = run_stage(
            &mut failures,
            LoadStage::ImportExport,
            config.load_imports_exports,
            || Ok(Some(ImportExportTables::read(&mut parser, &headers, &config))),
        );

        let relocations = run_stage(
            &mut failures,
            LoadStage::Relocations,
            config.load_relocations,
            || match headers.data_directory(DataDirectoryType::BaseRelocation) {
                Some(directory) => {
                    RelocationTable::read(&mut parser, &headers, directory, &config).map(Some)
                }
                None => Ok(None),
            },
        );

        let metadata = run_stage(
            &mut failures,
            LoadStage::Metadata,
            config.load_metadata,
            || match headers.data_directory(DataDirectoryType::ClrHeader) {
                Some(directory) if directory.is_present() => {
                    MetadataHeaders::read(&mut parser, &headers, directory, &config).map(Some)
                }
                _ => Ok(None),
            },
        );

        let heaps = run_stage(
            &mut failures,
            LoadStage::Heaps,
            config.load_metadata,
            || match &metadata {
                Some(metadata) => MetadataHeaps::locate(metadata, data.len()).map(Some),
                None => Ok(None),
            },
        );

        Ok(Module {
            file,
            config,
            headers,
            import_export,
            relocations,
            metadata,
            heaps,
            failures,
        })
    }

    /// The underlying input.
    #[must_use]
    pub fn file(&self) -> &Arc<File> {
        &self.file
    }

    /// All bytes of the input.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.file.data()
    }

    /// The configuration this module was loaded with.
    #[must_use]
    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    /// The image headers, always available.
    #[must_use]
    pub fn headers(&self) -> &ImageHeaders {
        &self.headers
    }

    /// The import and export tables, `None` if the stage was skipped or failed.
    #[must_use]
    pub fn import_export(&self) -> Option<&ImportExportTables> {
        self.import_export.as_ref()
    }

    /// The import table, `None` if the stage was skipped or failed.
    #[must_use]
    pub fn imports(&self) -> Option<&ImportTable> {
        self.import_export.as_ref().map(|tables| &tables.imports)
    }

    /// The export table, `None` if the image exports nothing or the stage did not load.
    #[must_use]
    pub fn exports(&self) -> Option<&ExportTable> {
        self.import_export
            .as_ref()
            .and_then(|tables| tables.exports.as_ref())
    }

    /// The base relocations, `None` if the stage was skipped or failed, or the image has no
    /// data directories.
    #[must_use]
    pub fn relocations(&self) -> Option<&RelocationTable> {
        self.relocations.as_ref()
    }

    /// The metadata headers, `None` for native images or if the stage did not load.
    #[must_use]
    pub fn metadata(&self) -> Option<&MetadataHeaders> {
        self.metadata.as_ref()
    }

    /// The metadata heaps, `None` for native images or if the stage did not load.
    #[must_use]
    pub fn heaps(&self) -> Option<&MetadataHeaps> {
        self.heaps.as_ref()
    }

    /// Returns `true` if the image carries managed metadata that loaded.
    #[must_use]
    pub fn is_managed(&self) -> bool {
        self.metadata.is_some()
    }

    /// Every stage that failed. At most one stage fails, as a failure halts the rest.
    #[must_use]
    pub fn failures(&self) -> &[StageFailure] {
        &self.failures
    }

    /// Returns `true` if a stage failed, an import or export directory failed, or any loaded
    /// table walk was truncated.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
            || self
                .import_export
                .as_ref()
                .is_some_and(ImportExportTables::is_degraded)
            || self
                .relocations
                .as_ref()
                .is_some_and(RelocationTable::is_truncated)
    }

    /// Read the NUL-terminated ASCII string at `rva`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidRva`] if `rva` is not mapped, or an error if the string
    /// is unterminated or longer than [`LoadConfig::max_name_length`].
    pub fn string_at_rva(&self, rva: u32) -> Result<String> {
        let mut parser = Parser::new(self.data());
        string_at_rva(&mut parser, &self.headers, rva, self.config.max_name_length)
    }

    /// The bytes of the metadata heap with the given stream name, `None` if the image has no
    /// such heap.
    ///
    /// # Errors
    /// Returns [`crate::Error::StageUnavailable`] if the heaps did not load.
    pub fn heap_data(&self, name: &str) -> Result<Option<&[u8]>> {
        let heaps = self
            .heaps
            .as_ref()
            .ok_or(Error::StageUnavailable(LoadStage::Heaps))?;

        heaps
            .by_name(name)
            .map(|heap| heap.data(self.data()))
            .transpose()
    }

    /// Run `decoder` with a cursor positioned at the first row of the metadata tables.
    ///
    /// # Errors
    /// Returns [`crate::Error::StageUnavailable`] if the metadata or heaps did not load, or
    /// any error of the decoder.
    pub fn decode_tables<D: TableDecoder>(&self, decoder: &D) -> Result<D::Output> {
        let metadata = self
            .metadata
            .as_ref()
            .ok_or(Error::StageUnavailable(LoadStage::Metadata))?;
        let heaps = self
            .heaps
            .as_ref()
            .ok_or(Error::StageUnavailable(LoadStage::Heaps))?;

        let mut parser = Parser::new(self.data());
        parser.seek(metadata.tables_header.end() as usize)?;

        let context = TableContext {
            headers: &self.headers,
            metadata,
            heaps,
            data: self.data(),
        };
        decoder.decode(&mut parser, &context)
    }
}

fn run_stage<T, F>(
    failures: &mut Vec<StageFailure>,
    stage: LoadStage,
    enabled: bool,
    load: F,
) -> Option<T>
where
    F: FnOnce() -> Result<Option<T>>,
{
    if !enabled {
        debug!("Skipping {stage}, disabled");
        return None;
    }
    if let Some(failure) = failures.first() {
        debug!("Skipping {stage}, {} failed", failure.stage);
        return None;
    }

    match load() {
        Ok(loaded) => {
            debug!("Loaded {stage}");
            loaded
        }
        Err(error) => {
            warn!("Loading {stage} failed: {error}");
            failures.push(StageFailure { stage, error });
            None
        }
    }
}
