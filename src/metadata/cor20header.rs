//! CLR 2.0 (Cor20) header of managed images.
//!
//! This module defines the [`Cor20Header`] struct, the 72-byte header found at the CLI header
//! data directory of managed images. Its main job here is to locate the metadata root.
//!
//! # Reference
//! - [ECMA-335 II.25.3.3](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use bitflags::bitflags;

use crate::{
    file::parser::Parser,
    image::region::{impl_has_region, Region},
    Result,
};

/// Size of the CLI header in bytes
pub const COR20_HEADER_SIZE: u32 = 72;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Runtime flags of the CLI header
    pub struct CorFlags : u32 {
        /// The image contains IL code only
        const ILONLY = 0x0000_0001;
        /// The image can only be loaded into a 32-bit process
        const BIT32_REQUIRED = 0x0000_0002;
        /// The image is an IL library
        const IL_LIBRARY = 0x0000_0004;
        /// The image has a strong name signature
        const STRONG_NAME_SIGNED = 0x0000_0008;
        /// The entry point token is an RVA to native code
        const NATIVE_ENTRYPOINT = 0x0000_0010;
        /// The loader and JIT track debug information
        const TRACK_DEBUG_DATA = 0x0001_0000;
        /// Prefer a 32-bit process when possible
        const BIT32_PREFERRED = 0x0002_0000;
    }
}

/// The main header of managed code, located at the CLI header data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cor20Header {
    /// The 72 bytes of this header
    pub region: Region,
    /// Declared header size, at least 72
    pub cb: u32,
    /// Major runtime version the image targets
    pub major_runtime_version: u16,
    /// Minor runtime version
    pub minor_runtime_version: u16,
    /// RVA of the metadata root
    pub meta_data_rva: u32,
    /// Size of the metadata, root and streams included
    pub meta_data_size: u32,
    /// Raw runtime flags, see [`CorFlags`]
    pub flags: u32,
    /// Entry point `MethodDef` or `File` token, or an RVA with `NATIVE_ENTRYPOINT`
    pub entry_point_token: u32,
    /// RVA of the managed resources
    pub resource_rva: u32,
    /// Size of the managed resources
    pub resource_size: u32,
    /// RVA of the strong name signature
    pub strong_name_signature_rva: u32,
    /// Size of the strong name signature
    pub strong_name_signature_size: u32,
    /// Reserved, must be zero
    pub code_manager_table_rva: u32,
    /// Reserved, must be zero
    pub code_manager_table_size: u32,
    /// RVA of the vtable fixup table
    pub vtable_fixups_rva: u32,
    /// Size of the vtable fixup table
    pub vtable_fixups_size: u32,
    /// Reserved, must be zero
    pub export_address_table_jmp_rva: u32,
    /// Reserved, must be zero
    pub export_address_table_jmp_size: u32,
    /// Reserved, must be zero
    pub managed_native_header_rva: u32,
    /// Reserved, must be zero
    pub managed_native_header_size: u32,
}

impl Cor20Header {
    /// Decode a CLI header at the current position.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedInput`] if fewer than 72 bytes remain, or
    /// [`crate::Error::Malformed`] if the declared size is below 72 or no metadata is
    /// referenced.
    pub fn read(parser: &mut Parser) -> Result<Cor20Header> {
        let start = parser.pos();

        let cb = parser.read_le::<u32>()?;
        if cb < COR20_HEADER_SIZE {
            return Err(malformed_error!(
                "Invalid CLR header size: expected at least 72, got {}",
                cb
            ));
        }

        let major_runtime_version = parser.read_le::<u16>()?;
        let minor_runtime_version = parser.read_le::<u16>()?;

        let meta_data_rva = parser.read_le::<u32>()?;
        let meta_data_size = parser.read_le::<u32>()?;
        if meta_data_rva == 0 || meta_data_size == 0 {
            return Err(malformed_error!(
                "CLR header references no metadata - rva {:#x}, size {:#x}",
                meta_data_rva,
                meta_data_size
            ));
        }

        Ok(Cor20Header {
            region: Region::new(start as u64, u64::from(COR20_HEADER_SIZE)),
            cb,
            major_runtime_version,
            minor_runtime_version,
            meta_data_rva,
            meta_data_size,
            flags: parser.read_le::<u32>()?,
            entry_point_token: parser.read_le::<u32>()?,
            resource_rva: parser.read_le::<u32>()?,
            resource_size: parser.read_le::<u32>()?,
            strong_name_signature_rva: parser.read_le::<u32>()?,
            strong_name_signature_size: parser.read_le::<u32>()?,
            code_manager_table_rva: parser.read_le::<u32>()?,
            code_manager_table_size: parser.read_le::<u32>()?,
            vtable_fixups_rva: parser.read_le::<u32>()?,
            vtable_fixups_size: parser.read_le::<u32>()?,
            export_address_table_jmp_rva: parser.read_le::<u32>()?,
            export_address_table_jmp_size: parser.read_le::<u32>()?,
            managed_native_header_rva: parser.read_le::<u32>()?,
            managed_native_header_size: parser.read_le::<u32>()?,
        })
    }

    /// The decoded runtime flags, keeping unknown bits.
    #[must_use]
    pub fn cor_flags(&self) -> CorFlags {
        CorFlags::from_bits_retain(self.flags)
    }
}

impl_has_region!(Cor20Header);
