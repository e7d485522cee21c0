use thiserror::Error;

use crate::module::LoadStage;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! truncated_error {
    ($offset:expr, $needed:expr) => {
        crate::Error::TruncatedInput {
            offset: $offset,
            needed: $needed,
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The first group of variants mirrors the structural invariants of the PE/COFF format. Each one
/// names the invariant that was violated and carries the offending value, so a caller can tell
/// *where* an image stopped making sense without re-reading the bytes.
///
/// # Error Categories
///
/// ## Header Errors (terminal for the whole parse)
/// - [`Error::BadDosSignature`] - The file does not start with `MZ`
/// - [`Error::NotAPortableExecutable`] - Missing `PE\0\0` signature or unknown optional header magic
/// - [`Error::UnsupportedArchitecture`] - COFF machine type outside I386 / AMD64 / IA64
/// - [`Error::TooFewDataDirectories`] - Declared data directory count below 16
///
/// ## Navigation Errors
/// - [`Error::InvalidRva`] - An RVA is not covered by any section
/// - [`Error::TruncatedInput`] - The input ended in the middle of a structure
/// - [`Error::Malformed`] - A structure is present but internally inconsistent
/// - [`Error::LimitExceeded`] - A declared count exceeds the configured hard bound
///
/// ## Loading Errors
/// - [`Error::Empty`] - Zero-length input
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::StageUnavailable`] - Data was requested from a stage that did not load
///
/// # Examples
///
/// ```rust,no_run
/// use pescope::{Error, Module};
/// use std::path::Path;
///
/// match Module::from_file(Path::new("sample.dll")) {
///     Ok(module) => println!("{} sections", module.headers().sections.len()),
///     Err(Error::BadDosSignature(found)) => eprintln!("not an executable: {found:#06x}"),
///     Err(Error::UnsupportedArchitecture(machine)) => eprintln!("machine {machine:#06x}"),
///     Err(e) => eprintln!("other error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The first two bytes of the input are not the legacy `MZ` marker.
    ///
    /// The associated value is the 16-bit word that was found instead.
    #[error("Invalid DOS signature - expected 0x5A4D, found {0:#06x}")]
    BadDosSignature(u16),

    /// The input is not a portable executable.
    ///
    /// Raised when the `PE\0\0` signature is missing at the offset announced by the DOS stub,
    /// or when the optional header magic is not one of PE32, PE32+ or ROM.
    #[error("Not a portable executable - {0}")]
    NotAPortableExecutable(String),

    /// The COFF machine type is not one of I386, AMD64 or IA64.
    #[error("Unsupported architecture - machine type {0:#06x}")]
    UnsupportedArchitecture(u16),

    /// The optional header declares fewer than the 16 canonical data directories.
    #[error("Too few data directories - expected at least 16, found {0}")]
    TooFewDataDirectories(u32),

    /// A relative virtual address is not contained in any section's virtual range.
    #[error("Invalid RVA - {0:#010x} is not covered by any section")]
    InvalidRva(u32),

    /// The input ended before a fixed-size structure could be fully read.
    ///
    /// # Fields
    ///
    /// * `offset` - Absolute offset at which the read was attempted
    /// * `needed` - Number of bytes the read required
    #[error("Truncated input - {needed} bytes required at offset {offset:#x}")]
    TruncatedInput {
        /// Absolute offset of the failed read
        offset: usize,
        /// Number of bytes that were required
        needed: usize,
    },

    /// The file is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected for
    /// debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A count read from the file exceeds the hard bound configured in
    /// [`crate::LoadConfig`].
    #[error("Limit exceeded - {what} is capped at {limit}")]
    LimitExceeded {
        /// What was being counted
        what: &'static str,
        /// The configured bound
        limit: usize,
    },

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// The requested data belongs to a load stage that was skipped or failed.
    #[error("Load stage '{0}' is not available")]
    StageUnavailable(LoadStage),
}
