// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # pescope
//!
//! A defensive, region-aware reader for Windows PE/PE32+ images and the .NET metadata headers
//! embedded in managed images. Built in pure Rust, `pescope` decodes the DOS stub, COFF and
//! optional headers, section table, import / export / base relocation directories, and for
//! managed images the CLI header, metadata root, tables header and heap locations.
//!
//! ## Features
//!
//! - **Region-aware** - every decoded structure knows the file range it came from
//! - **Bounded walks** - every table walk is capped by [`LoadConfig`], so adversarial images
//!   terminate with bounded memory
//! - **Graceful degradation** - table walks keep what they decoded and flag the rest as
//!   truncated, failed stages are recorded instead of aborting the load
//! - **Memory-mapped input** - large images are never copied
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pescope::prelude::*;
//!
//! let module = Module::from_file("sample.dll".as_ref())?;
//! println!("{} image, {} sections", module.headers().kind(), module.headers().sections.len());
//!
//! if let Some(exports) = module.exports() {
//!     for record in &exports.records {
//!         println!("{record}");
//!     }
//! }
//! # Ok::<(), pescope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`file`] - input backends and the bounds-checked [`Parser`] cursor
//! - [`image`] - DOS stub, COFF header, optional header, data directories and sections
//! - [`tables`] - import, export and base relocation tables
//! - [`metadata`] - CLI header, metadata root, tables header and heaps of managed images
//! - [`module`] - staged loading into a [`Module`]
//! - [`config`] - stage toggles and iteration bounds
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result):
//!
//! ```rust,no_run
//! use pescope::{Error, Module};
//!
//! match Module::from_file(std::path::Path::new("sample.exe")) {
//!     Ok(module) if module.is_degraded() => println!("Loaded with {} failures", module.failures().len()),
//!     Ok(_) => println!("Loaded"),
//!     Err(Error::BadDosSignature(found)) => println!("Not an executable: {found:#06x}"),
//!     Err(Error::Malformed { message, .. }) => println!("Malformed file: {message}"),
//!     Err(e) => println!("Other error: {e}"),
//! }
//! ```
//!
//! ## Fuzzing
//!
//! ```bash
//! cargo +nightly fuzz run module --release
//! ```
//!
//! ## References
//!
//! - [PE Format](https://learn.microsoft.com/en-us/windows/win32/debug/pe-format)
//! - [ECMA-335 Standard](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust,no_run
/// use pescope::prelude::*;
///
/// let module = Module::from_file("sample.dll".as_ref())?;
/// let kind: PEKind = module.headers().kind();
/// # Ok::<(), pescope::Error>(())
/// ```
pub mod prelude;

/// Input handling: file backends, the [`Parser`] cursor and little-endian decoding.
pub mod file;

/// PE/COFF image headers.
///
/// # Key Components
///
/// - [`image::ImageHeaders`] - all headers of an image, decoded in file order
/// - [`image::optional::OptionalHeader`] - PE32, PE32+ or ROM optional header
/// - [`image::section::rva_to_offset`] - RVA to file offset translation
pub mod image;

/// Import, export and base relocation tables.
pub mod tables;

/// .NET metadata headers of managed images, and the seam to a metadata table decoder.
pub mod metadata;

/// Load configuration: stage toggles and hard iteration bounds.
pub mod config;

/// Staged loading of an image into a [`Module`].
pub mod module;

/// `pescope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
///
/// # Examples
///
/// ```rust,no_run
/// use pescope::{Module, Result};
///
/// fn load(path: &str) -> Result<Module> {
///     Module::from_file(std::path::Path::new(path))
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `pescope` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;

/// Main entry point for loading an image.
///
/// # Example
///
/// ```rust,no_run
/// use pescope::Module;
/// let module = Module::from_file(std::path::Path::new("sample.dll"))?;
/// println!("{} relocation blocks", module.relocations().map_or(0, |r| r.blocks.len()));
/// # Ok::<(), pescope::Error>(())
/// ```
pub use module::{LoadStage, Module, StageFailure};

/// Load configuration.
pub use config::LoadConfig;

/// The result of a best-effort table walk.
pub use tables::Partial;

/// Low-level input and cursor types.
///
/// # Example
///
/// ```rust
/// use pescope::Parser;
/// let bytes = [0x4D, 0x5A];
/// let mut parser = Parser::new(&bytes);
/// assert_eq!(parser.read_le::<u16>()?, 0x5A4D);
/// # Ok::<(), pescope::Error>(())
/// ```
pub use file::{parser::Parser, File};
