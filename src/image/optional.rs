//! PE optional header (PE32, PE32+ and ROM).
//!
//! The optional header follows the COFF header and is the first structure whose layout depends
//! on a runtime value: its 16-bit magic selects between three physically different layouts.
//! Rather than reading into one struct with width flags, each layout is its own type and
//! [`OptionalHeader`] is the tagged union over them. Accessors that only make sense for some
//! layouts return zero (or an empty slice) for the others, mirroring "field does not apply".
//!
//! # Layouts
//!
//! | Magic   | Kind     | Image base | Reserve / commit | Data directories |
//! |---------|----------|------------|------------------|------------------|
//! | `0x10B` | PE32     | 32-bit     | 32-bit           | yes (≥ 16)       |
//! | `0x20B` | PE32+    | 64-bit     | 64-bit           | yes (≥ 16)       |
//! | `0x107` | ROM      | -          | -                | no               |
//!
//! # Reference
//! - [PE Format - Optional Header](https://learn.microsoft.com/en-us/windows/win32/debug/pe-format#optional-header-image-only)

use bitflags::bitflags;
use strum::{Display, EnumIter, FromRepr};

use crate::{
    file::parser::Parser,
    image::{
        datadirectory::{DataDirectory, DataDirectoryType, CANONICAL_DIRECTORY_COUNT},
        region::{HasRegion, Region},
    },
    Error, Result,
};

/// Magic of a PE32 optional header
pub const PE32_MAGIC: u16 = 0x10B;
/// Magic of a PE32+ optional header
pub const PE32_PLUS_MAGIC: u16 = 0x20B;
/// Magic of a ROM optional header
pub const ROM_MAGIC: u16 = 0x107;

/// The kind of image, determined solely by the optional header magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum PEKind {
    /// Magic not recognised
    #[strum(to_string = "Unknown")]
    Unknown,
    /// 32-bit executable image
    #[strum(to_string = "PE")]
    Pe32,
    /// 64-bit executable image
    #[strum(to_string = "PE32+")]
    Pe32Plus,
    /// ROM image
    #[strum(to_string = "ROM")]
    Rom,
}

impl PEKind {
    /// Classify an optional header magic.
    #[must_use]
    pub fn from_magic(magic: u16) -> PEKind {
        match magic {
            PE32_MAGIC => PEKind::Pe32,
            PE32_PLUS_MAGIC => PEKind::Pe32Plus,
            ROM_MAGIC => PEKind::Rom,
            _ => PEKind::Unknown,
        }
    }
}

/// Windows subsystem required to run an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr)]
#[repr(u16)]
#[allow(missing_docs)]
pub enum Subsystem {
    Unknown = 0,
    Native = 1,
    #[strum(to_string = "Windows GUI")]
    WindowsGui = 2,
    #[strum(to_string = "Windows CUI")]
    WindowsCui = 3,
    #[strum(to_string = "OS/2 CUI")]
    Os2Cui = 5,
    #[strum(to_string = "POSIX CUI")]
    PosixCui = 7,
    #[strum(to_string = "Native Windows")]
    NativeWindows = 8,
    #[strum(to_string = "Windows CE GUI")]
    WindowsCeGui = 9,
    #[strum(to_string = "EFI Application")]
    EfiApplication = 10,
    #[strum(to_string = "EFI Boot Service Driver")]
    EfiBootServiceDriver = 11,
    #[strum(to_string = "EFI Runtime Driver")]
    EfiRuntimeDriver = 12,
    #[strum(to_string = "EFI ROM")]
    EfiRom = 13,
    Xbox = 14,
    #[strum(to_string = "Windows Boot Application")]
    WindowsBootApplication = 16,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// DLL characteristics of the Windows-specific optional header fields
    pub struct DllCharacteristics : u16 {
        /// Can handle a high entropy 64-bit virtual address space
        const HIGH_ENTROPY_VA = 0x0020;
        /// Can be relocated at load time
        const DYNAMIC_BASE = 0x0040;
        /// Code integrity checks are enforced
        const FORCE_INTEGRITY = 0x0080;
        /// Compatible with data execution prevention
        const NX_COMPAT = 0x0100;
        /// Isolation aware, but do not isolate the image
        const NO_ISOLATION = 0x0200;
        /// Does not use structured exception handling
        const NO_SEH = 0x0400;
        /// Do not bind the image
        const NO_BIND = 0x0800;
        /// Must execute in an AppContainer
        const APPCONTAINER = 0x1000;
        /// A WDM driver
        const WDM_DRIVER = 0x2000;
        /// Supports Control Flow Guard
        const GUARD_CF = 0x4000;
        /// Terminal Server aware
        const TERMINAL_SERVER_AWARE = 0x8000;
    }
}

/// Fields shared by every optional header layout, directly after the magic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StandardFields {
    /// Linker major version
    pub major_linker_version: u8,
    /// Linker minor version
    pub minor_linker_version: u8,
    /// Size of all code sections
    pub size_of_code: u32,
    /// Size of all initialized data sections
    pub size_of_initialized_data: u32,
    /// Size of all uninitialized data sections
    pub size_of_uninitialized_data: u32,
    /// RVA of the entry point, zero if none
    pub address_of_entry_point: u32,
    /// RVA of the start of the code section
    pub base_of_code: u32,
}

impl StandardFields {
    fn read(parser: &mut Parser) -> Result<StandardFields> {
        Ok(StandardFields {
            major_linker_version: parser.read_le::<u8>()?,
            minor_linker_version: parser.read_le::<u8>()?,
            size_of_code: parser.read_le::<u32>()?,
            size_of_initialized_data: parser.read_le::<u32>()?,
            size_of_uninitialized_data: parser.read_le::<u32>()?,
            address_of_entry_point: parser.read_le::<u32>()?,
            base_of_code: parser.read_le::<u32>()?,
        })
    }
}

/// Windows-specific fields shared by PE32 and PE32+, between the image base and the stack and
/// heap sizes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct WindowsFields {
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub major_operating_system_version: u16,
    pub minor_operating_system_version: u16,
    pub major_image_version: u16,
    pub minor_image_version: u16,
    pub major_subsystem_version: u16,
    pub minor_subsystem_version: u16,
    /// Reserved, must be zero
    pub win32_version_value: u32,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub check_sum: u32,
    pub subsystem: u16,
    pub dll_characteristics: u16,
}

impl WindowsFields {
    fn read(parser: &mut Parser) -> Result<WindowsFields> {
        Ok(WindowsFields {
            section_alignment: parser.read_le::<u32>()?,
            file_alignment: parser.read_le::<u32>()?,
            major_operating_system_version: parser.read_le::<u16>()?,
            minor_operating_system_version: parser.read_le::<u16>()?,
            major_image_version: parser.read_le::<u16>()?,
            minor_image_version: parser.read_le::<u16>()?,
            major_subsystem_version: parser.read_le::<u16>()?,
            minor_subsystem_version: parser.read_le::<u16>()?,
            win32_version_value: parser.read_le::<u32>()?,
            size_of_image: parser.read_le::<u32>()?,
            size_of_headers: parser.read_le::<u32>()?,
            check_sum: parser.read_le::<u32>()?,
            subsystem: parser.read_le::<u16>()?,
            dll_characteristics: parser.read_le::<u16>()?,
        })
    }

    /// The decoded subsystem, `None` for unlisted values.
    #[must_use]
    pub fn subsystem(&self) -> Option<Subsystem> {
        Subsystem::from_repr(self.subsystem)
    }

    /// The decoded DLL characteristics, keeping unknown bits.
    #[must_use]
    pub fn dll_flags(&self) -> DllCharacteristics {
        DllCharacteristics::from_bits_retain(self.dll_characteristics)
    }
}

/// Stack and heap reserve/commit sizes, 32 or 64 bits wide depending on the layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct ReserveCommit<T> {
    pub stack_reserve: T,
    pub stack_commit: T,
    pub heap_reserve: T,
    pub heap_commit: T,
}

impl ReserveCommit<u32> {
    fn read(parser: &mut Parser) -> Result<Self> {
        Ok(ReserveCommit {
            stack_reserve: parser.read_le::<u32>()?,
            stack_commit: parser.read_le::<u32>()?,
            heap_reserve: parser.read_le::<u32>()?,
            heap_commit: parser.read_le::<u32>()?,
        })
    }

    fn widen(self) -> ReserveCommit<u64> {
        ReserveCommit {
            stack_reserve: u64::from(self.stack_reserve),
            stack_commit: u64::from(self.stack_commit),
            heap_reserve: u64::from(self.heap_reserve),
            heap_commit: u64::from(self.heap_commit),
        }
    }
}

impl ReserveCommit<u64> {
    fn read(parser: &mut Parser) -> Result<Self> {
        Ok(ReserveCommit {
            stack_reserve: parser.read_le::<u64>()?,
            stack_commit: parser.read_le::<u64>()?,
            heap_reserve: parser.read_le::<u64>()?,
            heap_commit: parser.read_le::<u64>()?,
        })
    }
}

/// PE32 optional header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionalHeader32 {
    /// From the magic through the last data directory
    pub region: Region,
    /// Common standard fields
    pub standard: StandardFields,
    /// RVA of the start of the data section
    pub base_of_data: u32,
    /// Preferred load address
    pub image_base: u32,
    /// Common Windows-specific fields
    pub windows: WindowsFields,
    /// Stack and heap sizes
    pub sizes: ReserveCommit<u32>,
    /// Reserved, must be zero
    pub loader_flags: u32,
    /// Declared number of data directories
    pub number_of_rva_and_sizes: u32,
    /// The data directories, `number_of_rva_and_sizes` of them
    pub data_directories: Vec<DataDirectory>,
}

/// PE32+ optional header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionalHeader64 {
    /// From the magic through the last data directory
    pub region: Region,
    /// Common standard fields
    pub standard: StandardFields,
    /// Preferred load address
    pub image_base: u64,
    /// Common Windows-specific fields
    pub windows: WindowsFields,
    /// Stack and heap sizes
    pub sizes: ReserveCommit<u64>,
    /// Reserved, must be zero
    pub loader_flags: u32,
    /// Declared number of data directories
    pub number_of_rva_and_sizes: u32,
    /// The data directories, `number_of_rva_and_sizes` of them
    pub data_directories: Vec<DataDirectory>,
}

/// ROM optional header. ROM images carry no Windows-specific fields and no data directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionalHeaderRom {
    /// The 56 bytes of the header
    pub region: Region,
    /// Common standard fields
    pub standard: StandardFields,
    /// RVA of the start of the data section
    pub base_of_data: u32,
    /// RVA of the start of the uninitialized data
    pub base_of_bss: u32,
    /// General purpose register mask
    pub gpr_mask: u32,
    /// Coprocessor register masks
    pub cpr_mask: [u32; 4],
    /// Global pointer value
    pub gp_value: u32,
}

/// The optional header, one variant per layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionalHeader {
    /// Magic `0x10B`
    Pe32(OptionalHeader32),
    /// Magic `0x20B`
    Pe64(OptionalHeader64),
    /// Magic `0x107`
    Rom(OptionalHeaderRom),
}

impl OptionalHeader {
    /// Decode the optional header at the current position.
    ///
    /// # Errors
    /// - [`Error::NotAPortableExecutable`] if the magic is not PE32, PE32+ or ROM
    /// - [`Error::TooFewDataDirectories`] if a PE32/PE32+ header declares fewer than 16
    ///   directories
    /// - [`Error::TruncatedInput`] if the header is cut short
    pub fn read(parser: &mut Parser) -> Result<OptionalHeader> {
        let start = parser.pos();
        let magic = parser.read_le::<u16>()?;

        match PEKind::from_magic(magic) {
            PEKind::Pe32 => {
                let standard = StandardFields::read(parser)?;
                let base_of_data = parser.read_le::<u32>()?;
                let image_base = parser.read_le::<u32>()?;
                let windows = WindowsFields::read(parser)?;
                let sizes = ReserveCommit::<u32>::read(parser)?;
                let loader_flags = parser.read_le::<u32>()?;
                let (number_of_rva_and_sizes, data_directories) = read_directories(parser)?;

                Ok(OptionalHeader::Pe32(OptionalHeader32 {
                    region: Region::from_bounds(start, parser.pos()),
                    standard,
                    base_of_data,
                    image_base,
                    windows,
                    sizes,
                    loader_flags,
                    number_of_rva_and_sizes,
                    data_directories,
                }))
            }
            PEKind::Pe32Plus => {
                let standard = StandardFields::read(parser)?;
                let image_base = parser.read_le::<u64>()?;
                let windows = WindowsFields::read(parser)?;
                let sizes = ReserveCommit::<u64>::read(parser)?;
                let loader_flags = parser.read_le::<u32>()?;
                let (number_of_rva_and_sizes, data_directories) = read_directories(parser)?;

                Ok(OptionalHeader::Pe64(OptionalHeader64 {
                    region: Region::from_bounds(start, parser.pos()),
                    standard,
                    image_base,
                    windows,
                    sizes,
                    loader_flags,
                    number_of_rva_and_sizes,
                    data_directories,
                }))
            }
            PEKind::Rom => {
                let standard = StandardFields::read(parser)?;
                let base_of_data = parser.read_le::<u32>()?;
                let base_of_bss = parser.read_le::<u32>()?;
                let gpr_mask = parser.read_le::<u32>()?;
                let mut cpr_mask = [0u32; 4];
                for mask in &mut cpr_mask {
                    *mask = parser.read_le::<u32>()?;
                }
                let gp_value = parser.read_le::<u32>()?;

                Ok(OptionalHeader::Rom(OptionalHeaderRom {
                    region: Region::from_bounds(start, parser.pos()),
                    standard,
                    base_of_data,
                    base_of_bss,
                    gpr_mask,
                    cpr_mask,
                    gp_value,
                }))
            }
            PEKind::Unknown => Err(Error::NotAPortableExecutable(format!(
                "optional header magic {magic:#06x} is not a recognized PE / PE+ layout"
            ))),
        }
    }

    /// The image kind of this header.
    #[must_use]
    pub fn kind(&self) -> PEKind {
        match self {
            OptionalHeader::Pe32(_) => PEKind::Pe32,
            OptionalHeader::Pe64(_) => PEKind::Pe32Plus,
            OptionalHeader::Rom(_) => PEKind::Rom,
        }
    }

    /// The raw magic value.
    #[must_use]
    pub fn magic(&self) -> u16 {
        match self {
            OptionalHeader::Pe32(_) => PE32_MAGIC,
            OptionalHeader::Pe64(_) => PE32_PLUS_MAGIC,
            OptionalHeader::Rom(_) => ROM_MAGIC,
        }
    }

    /// Returns `true` for PE32+ images, whose lookup table slots are 64 bits wide.
    #[must_use]
    pub fn is_64bit(&self) -> bool {
        matches!(self, OptionalHeader::Pe64(_))
    }

    /// Standard fields common to every layout.
    #[must_use]
    pub fn standard(&self) -> &StandardFields {
        match self {
            OptionalHeader::Pe32(header) => &header.standard,
            OptionalHeader::Pe64(header) => &header.standard,
            OptionalHeader::Rom(header) => &header.standard,
        }
    }

    /// Windows-specific fields, `None` for ROM images.
    #[must_use]
    pub fn windows(&self) -> Option<&WindowsFields> {
        match self {
            OptionalHeader::Pe32(header) => Some(&header.windows),
            OptionalHeader::Pe64(header) => Some(&header.windows),
            OptionalHeader::Rom(_) => None,
        }
    }

    /// RVA of the entry point.
    #[must_use]
    pub fn address_of_entry_point(&self) -> u32 {
        self.standard().address_of_entry_point
    }

    /// Preferred load address for either width, zero for ROM images.
    #[must_use]
    pub fn image_base(&self) -> u64 {
        match self {
            OptionalHeader::Pe32(header) => u64::from(header.image_base),
            OptionalHeader::Pe64(header) => header.image_base,
            OptionalHeader::Rom(_) => 0,
        }
    }

    /// The 32-bit image base, zero unless this is a PE32 image.
    #[must_use]
    pub fn image_base32(&self) -> u32 {
        match self {
            OptionalHeader::Pe32(header) => header.image_base,
            _ => 0,
        }
    }

    /// The 64-bit image base, zero unless this is a PE32+ image.
    #[must_use]
    pub fn image_base64(&self) -> u64 {
        match self {
            OptionalHeader::Pe64(header) => header.image_base,
            _ => 0,
        }
    }

    /// Stack and heap sizes for either width, all zero for ROM images.
    #[must_use]
    pub fn sizes(&self) -> ReserveCommit<u64> {
        match self {
            OptionalHeader::Pe32(header) => header.sizes.widen(),
            OptionalHeader::Pe64(header) => header.sizes,
            OptionalHeader::Rom(_) => ReserveCommit::default(),
        }
    }

    /// The 32-bit stack and heap sizes, all zero unless this is a PE32 image.
    #[must_use]
    pub fn sizes32(&self) -> ReserveCommit<u32> {
        match self {
            OptionalHeader::Pe32(header) => header.sizes,
            _ => ReserveCommit::default(),
        }
    }

    /// The 64-bit stack and heap sizes, all zero unless this is a PE32+ image.
    #[must_use]
    pub fn sizes64(&self) -> ReserveCommit<u64> {
        match self {
            OptionalHeader::Pe64(header) => header.sizes,
            _ => ReserveCommit::default(),
        }
    }

    /// Stack reserve size for either width.
    #[must_use]
    pub fn size_of_stack_reserve(&self) -> u64 {
        self.sizes().stack_reserve
    }

    /// Stack commit size for either width.
    #[must_use]
    pub fn size_of_stack_commit(&self) -> u64 {
        self.sizes().stack_commit
    }

    /// Heap reserve size for either width.
    #[must_use]
    pub fn size_of_heap_reserve(&self) -> u64 {
        self.sizes().heap_reserve
    }

    /// Heap commit size for either width.
    #[must_use]
    pub fn size_of_heap_commit(&self) -> u64 {
        self.sizes().heap_commit
    }

    /// All data directories, empty for ROM images.
    #[must_use]
    pub fn data_directories(&self) -> &[DataDirectory] {
        match self {
            OptionalHeader::Pe32(header) => &header.data_directories,
            OptionalHeader::Pe64(header) => &header.data_directories,
            OptionalHeader::Rom(_) => &[],
        }
    }

    /// The canonical data directory of the given kind, if the header has that slot.
    #[must_use]
    pub fn data_directory(&self, kind: DataDirectoryType) -> Option<&DataDirectory> {
        if kind == DataDirectoryType::Unknown {
            return None;
        }

        self.data_directories().get(kind as usize)
    }
}

impl HasRegion for OptionalHeader {
    fn region(&self) -> Region {
        match self {
            OptionalHeader::Pe32(header) => header.region,
            OptionalHeader::Pe64(header) => header.region,
            OptionalHeader::Rom(header) => header.region,
        }
    }
}

fn read_directories(parser: &mut Parser) -> Result<(u32, Vec<DataDirectory>)> {
    let count = parser.read_le::<u32>()?;
    if (count as usize) < CANONICAL_DIRECTORY_COUNT {
        return Err(Error::TooFewDataDirectories(count));
    }

    // Each entry consumes 8 bytes, so the file size bounds the allocation
    let mut directories = Vec::with_capacity((count as usize).min(parser.remaining() / 8));
    for index in 0..count as usize {
        directories.push(DataDirectory::read(parser, index)?);
    }

    Ok((count, directories))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pe32_header(directory_count: u32) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&PE32_MAGIC.to_le_bytes());
        data.extend_from_slice(&[14, 0]); // linker version
        data.extend_from_slice(&0x200_u32.to_le_bytes()); // size_of_code
        data.extend_from_slice(&0x400_u32.to_le_bytes()); // size_of_initialized_data
        data.extend_from_slice(&0_u32.to_le_bytes()); // size_of_uninitialized_data
        data.extend_from_slice(&0x1234_u32.to_le_bytes()); // address_of_entry_point
        data.extend_from_slice(&0x1000_u32.to_le_bytes()); // base_of_code
        data.extend_from_slice(&0x2000_u32.to_le_bytes()); // base_of_data
        data.extend_from_slice(&0x0040_0000_u32.to_le_bytes()); // image_base
        data.extend_from_slice(&0x1000_u32.to_le_bytes()); // section_alignment
        data.extend_from_slice(&0x200_u32.to_le_bytes()); // file_alignment
        data.extend_from_slice(&[4, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0]); // versions
        data.extend_from_slice(&0_u32.to_le_bytes()); // win32_version_value
        data.extend_from_slice(&0x3000_u32.to_le_bytes()); // size_of_image
        data.extend_from_slice(&0x200_u32.to_le_bytes()); // size_of_headers
        data.extend_from_slice(&0_u32.to_le_bytes()); // check_sum
        data.extend_from_slice(&3_u16.to_le_bytes()); // subsystem = Windows CUI
        data.extend_from_slice(&0x8540_u16.to_le_bytes()); // dll_characteristics
        data.extend_from_slice(&0x0010_0000_u32.to_le_bytes()); // stack_reserve
        data.extend_from_slice(&0x1000_u32.to_le_bytes()); // stack_commit
        data.extend_from_slice(&0x0010_0000_u32.to_le_bytes()); // heap_reserve
        data.extend_from_slice(&0x1000_u32.to_le_bytes()); // heap_commit
        data.extend_from_slice(&0_u32.to_le_bytes()); // loader_flags
        data.extend_from_slice(&directory_count.to_le_bytes());
        for index in 0..directory_count {
            data.extend_from_slice(&(index * 0x100).to_le_bytes());
            data.extend_from_slice(&index.to_le_bytes());
        }
        data
    }

    #[test]
    fn pe32() {
        let data = pe32_header(16);
        assert_eq!(data.len(), 224);

        let mut parser = Parser::new(&data);
        let header = OptionalHeader::read(&mut parser).unwrap();

        assert_eq!(header.kind(), PEKind::Pe32);
        assert_eq!(header.kind().to_string(), "PE");
        assert_eq!(header.magic(), PE32_MAGIC);
        assert!(!header.is_64bit());
        assert_eq!(header.address_of_entry_point(), 0x1234);
        assert_eq!(header.image_base(), 0x0040_0000);
        assert_eq!(header.image_base32(), 0x0040_0000);
        assert_eq!(header.image_base64(), 0);
        assert_eq!(header.size_of_stack_reserve(), 0x0010_0000);
        assert_eq!(header.size_of_heap_commit(), 0x1000);
        assert_eq!(header.sizes32().stack_commit, 0x1000);
        assert_eq!(header.sizes64(), ReserveCommit::default());

        let windows = header.windows().unwrap();
        assert_eq!(windows.section_alignment, 0x1000);
        assert_eq!(windows.file_alignment, 0x200);
        assert_eq!(windows.subsystem(), Some(Subsystem::WindowsCui));
        assert!(windows.dll_flags().contains(DllCharacteristics::NX_COMPAT));
        assert!(windows.dll_flags().contains(DllCharacteristics::DYNAMIC_BASE));

        assert_eq!(header.data_directories().len(), 16);
        let import = header.data_directory(DataDirectoryType::Import).unwrap();
        assert_eq!(import.rva, 0x100);
        assert_eq!(import.size, 1);
        assert_eq!(import.region, Region::new(96 + 8, 8));
        assert!(header.data_directory(DataDirectoryType::Unknown).is_none());

        assert_eq!(header.region(), Region::new(0, 224));
        assert_eq!(parser.pos(), 224);
    }

    #[test]
    fn pe32_extra_directories_are_unknown() {
        let data = pe32_header(18);
        let mut parser = Parser::new(&data);
        let header = OptionalHeader::read(&mut parser).unwrap();

        let directories = header.data_directories();
        assert_eq!(directories.len(), 18);
        assert_eq!(directories[15].kind, DataDirectoryType::Reserved);
        assert_eq!(directories[16].name(), "Unknown");
        assert_eq!(directories[17].name(), "Unknown");
    }

    #[test]
    fn too_few_directories() {
        let data = pe32_header(15);
        let mut parser = Parser::new(&data);
        assert!(matches!(
            OptionalHeader::read(&mut parser),
            Err(Error::TooFewDataDirectories(15))
        ));
    }

    #[test]
    fn huge_directory_count_is_truncated() {
        let mut data = pe32_header(16);
        let count_offset = 92;
        data[count_offset..count_offset + 4].copy_from_slice(&u32::MAX.to_le_bytes());

        let mut parser = Parser::new(&data);
        assert!(matches!(
            OptionalHeader::read(&mut parser),
            Err(Error::TruncatedInput { .. })
        ));
    }

    #[test]
    fn pe32_plus() {
        let mut data = Vec::new();
        data.extend_from_slice(&PE32_PLUS_MAGIC.to_le_bytes());
        data.extend_from_slice(&[14, 30]);
        data.extend_from_slice(&[0u8; 20]); // code/data sizes, entry point, base_of_code
        data.extend_from_slice(&0x0000_0001_8000_0000_u64.to_le_bytes()); // image_base
        data.extend_from_slice(&0x1000_u32.to_le_bytes());
        data.extend_from_slice(&0x200_u32.to_le_bytes());
        data.extend_from_slice(&[0u8; 32]); // versions .. dll_characteristics
        data.extend_from_slice(&0x0040_0000_u64.to_le_bytes()); // stack_reserve
        data.extend_from_slice(&0x4000_u64.to_le_bytes()); // stack_commit
        data.extend_from_slice(&0x0020_0000_u64.to_le_bytes()); // heap_reserve
        data.extend_from_slice(&0x2000_u64.to_le_bytes()); // heap_commit
        data.extend_from_slice(&0_u32.to_le_bytes());
        data.extend_from_slice(&16_u32.to_le_bytes());
        data.extend_from_slice(&[0u8; 128]);
        assert_eq!(data.len(), 240);

        let mut parser = Parser::new(&data);
        let header = OptionalHeader::read(&mut parser).unwrap();

        assert_eq!(header.kind(), PEKind::Pe32Plus);
        assert_eq!(header.kind().to_string(), "PE32+");
        assert!(header.is_64bit());
        assert_eq!(header.standard().minor_linker_version, 30);
        assert_eq!(header.image_base(), 0x1_8000_0000);
        assert_eq!(header.image_base64(), 0x1_8000_0000);
        assert_eq!(header.image_base32(), 0);
        assert_eq!(header.size_of_stack_reserve(), 0x0040_0000);
        assert_eq!(header.size_of_stack_commit(), 0x4000);
        assert_eq!(header.size_of_heap_reserve(), 0x0020_0000);
        assert_eq!(header.sizes32(), ReserveCommit::default());
        assert_eq!(header.data_directories().len(), 16);
        assert_eq!(header.region(), Region::new(0, 240));
    }

    #[test]
    fn rom() {
        let mut data = Vec::new();
        data.extend_from_slice(&ROM_MAGIC.to_le_bytes());
        data.extend_from_slice(&[1, 2]);
        data.extend_from_slice(&[0u8; 20]);
        data.extend_from_slice(&0x10_u32.to_le_bytes()); // base_of_data
        data.extend_from_slice(&0x20_u32.to_le_bytes()); // base_of_bss
        data.extend_from_slice(&0xFF_u32.to_le_bytes()); // gpr_mask
        data.extend_from_slice(&[0u8; 16]); // cpr_mask
        data.extend_from_slice(&0x40_u32.to_le_bytes()); // gp_value

        let mut parser = Parser::new(&data);
        let header = OptionalHeader::read(&mut parser).unwrap();

        assert_eq!(header.kind().to_string(), "ROM");
        assert_eq!(header.image_base(), 0);
        assert_eq!(header.size_of_stack_reserve(), 0);
        assert!(header.windows().is_none());
        assert!(header.data_directories().is_empty());
        assert_eq!(header.region(), Region::new(0, 56));

        let OptionalHeader::Rom(rom) = header else {
            panic!("Expected a ROM header");
        };
        assert_eq!(rom.gpr_mask, 0xFF);
        assert_eq!(rom.gp_value, 0x40);
    }

    #[test]
    fn unknown_magic() {
        let mut parser = Parser::new(&[0x0B, 0x03, 0x00, 0x00]);
        assert!(matches!(
            OptionalHeader::read(&mut parser),
            Err(Error::NotAPortableExecutable(_))
        ));
    }

    #[test]
    fn kind_display() {
        assert_eq!(PEKind::from_magic(0x10B).to_string(), "PE");
        assert_eq!(PEKind::from_magic(0x20B).to_string(), "PE32+");
        assert_eq!(PEKind::from_magic(0x107).to_string(), "ROM");
        assert_eq!(PEKind::from_magic(0x999).to_string(), "Unknown");
    }
}
