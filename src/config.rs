//! Load configuration for PE modules
//!
//! This module controls which stages [`crate::Module`] runs after the image headers and the
//! hard iteration bounds every table walk respects. The bounds exist so that a walk over an
//! adversarial image always terminates with bounded memory, whatever its declared counts say.

/// Configuration for staged module loading
///
/// Image headers are always decoded. Each later stage can be switched off; a disabled stage is
/// simply not loaded and does not prevent the stages after it from running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct LoadConfig {
    /// Decode the import and export directories
    pub load_imports_exports: bool,

    /// Decode the base relocation directory
    pub load_relocations: bool,

    /// Decode the CLI header, metadata root, tables header and heaps of managed images
    pub load_metadata: bool,

    /// Maximum number of import directory entries read from one image (default: 4096)
    pub max_import_descriptors: usize,

    /// Maximum number of slots read from one import lookup or address table (default: 65536)
    pub max_thunks_per_table: usize,

    /// Maximum number of elements read from each export array (default: 65536)
    pub max_export_entries: usize,

    /// Maximum number of relocation blocks (default: 65536)
    pub max_relocation_blocks: usize,

    /// Maximum number of relocation entries across all blocks (default: 1048576)
    pub max_relocation_entries: usize,

    /// Maximum number of metadata stream headers (default: 16)
    pub max_stream_headers: usize,

    /// Maximum length of a NUL-terminated name read at a computed offset (default: 1024)
    pub max_name_length: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            load_imports_exports: true,
            load_relocations: true,
            load_metadata: true,
            max_import_descriptors: 4096,
            max_thunks_per_table: 65536,
            max_export_entries: 65536,
            max_relocation_blocks: 65536,
            max_relocation_entries: 1 << 20,
            max_stream_headers: 16,
            max_name_length: 1024,
        }
    }
}

impl LoadConfig {
    /// Creates a configuration that decodes the image headers only
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            load_imports_exports: false,
            load_relocations: false,
            load_metadata: false,
            ..Self::default()
        }
    }

    /// Creates a configuration with all stages and tight bounds, for triaging untrusted input
    #[must_use]
    pub fn strict() -> Self {
        Self {
            max_import_descriptors: 256,
            max_thunks_per_table: 4096,
            max_export_entries: 4096,
            max_relocation_blocks: 4096,
            max_relocation_entries: 65536,
            max_stream_headers: 8,
            max_name_length: 256,
            ..Self::default()
        }
    }

    /// Creates a configuration with all stages and very large bounds
    ///
    /// **Warning**: a crafted image can make a permissive load allocate and iterate a lot.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            max_import_descriptors: 1 << 20,
            max_thunks_per_table: 1 << 24,
            max_export_entries: 1 << 24,
            max_relocation_blocks: 1 << 24,
            max_relocation_entries: 1 << 28,
            max_stream_headers: 256,
            max_name_length: 1 << 16,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_presets() {
        let minimal = LoadConfig::minimal();
        assert!(!minimal.load_imports_exports);
        assert!(!minimal.load_relocations);
        assert!(!minimal.load_metadata);
        assert_eq!(minimal.max_name_length, LoadConfig::default().max_name_length);

        let strict = LoadConfig::strict();
        assert!(strict.load_imports_exports);
        assert!(strict.load_relocations);
        assert!(strict.load_metadata);
        assert!(strict.max_thunks_per_table < LoadConfig::default().max_thunks_per_table);

        let permissive = LoadConfig::permissive();
        assert!(permissive.max_relocation_entries > LoadConfig::default().max_relocation_entries);
        assert!(permissive.max_stream_headers > strict.max_stream_headers);
    }

    #[test]
    fn test_default_config() {
        let default = LoadConfig::default();
        assert!(default.load_imports_exports);
        assert!(default.load_relocations);
        assert!(default.load_metadata);
        assert_eq!(default.max_stream_headers, 16);
    }
}
