//! Synthetic PE images for unit tests.
//!
//! [`ImageBuilder`] lays out a minimal, valid image with a fixed geometry:
//!
//! | Structure       | File offset | RVA              |
//! |-----------------|-------------|------------------|
//! | DOS stub        | `0x00`      |                  |
//! | `PE\0\0`        | `0x80`      |                  |
//! | COFF header     | `0x84`      |                  |
//! | Optional header | `0x98`      |                  |
//! | `.text` data    | `0x400`     | `0x1000..0x2000` |
//!
//! Table contents are written with [`ImageBuilder::patch`], addressed by RVA.
//! [`managed_image`] builds the shared fixture with every table this crate decodes.

use crate::image::datadirectory::DataDirectoryType;

pub const TEXT_RVA: u32 = 0x1000;
pub const TEXT_OFFSET: u32 = 0x400;
pub const TEXT_SIZE: u32 = 0x1000;

pub struct ImageBuilder {
    pe32_plus: bool,
    machine: u16,
    optional_padding: u16,
    directory_count: u32,
    directories: Vec<(u32, u32)>,
    patches: Vec<(u32, Vec<u8>)>,
}

impl ImageBuilder {
    pub fn pe32() -> Self {
        ImageBuilder {
            pe32_plus: false,
            machine: 0x014C,
            optional_padding: 0,
            directory_count: 16,
            directories: vec![(0, 0); 16],
            patches: Vec::new(),
        }
    }

    pub fn pe32_plus() -> Self {
        ImageBuilder {
            pe32_plus: true,
            machine: 0x8664,
            ..Self::pe32()
        }
    }

    pub fn machine(mut self, machine: u16) -> Self {
        self.machine = machine;
        self
    }

    pub fn optional_header_padding(mut self, padding: u16) -> Self {
        self.optional_padding = padding;
        self
    }

    pub fn directory_count(mut self, count: u32) -> Self {
        self.directory_count = count;
        self.directories.resize(count as usize, (0, 0));
        self
    }

    pub fn directory(mut self, kind: DataDirectoryType, rva: u32, size: u32) -> Self {
        self.directories[kind as usize] = (rva, size);
        self
    }

    pub fn patch(mut self, rva: u32, bytes: &[u8]) -> Self {
        self.patches.push((rva, bytes.to_vec()));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut image = vec![0u8; (TEXT_OFFSET + TEXT_SIZE) as usize];

        image[0..2].copy_from_slice(b"MZ");
        put_u32(&mut image, 0x3C, 0x80);
        image[0x80..0x84].copy_from_slice(b"PE\0\0");

        let directory_bytes = self.directories.len() as u16 * 8;
        let fixed_size: u16 = if self.pe32_plus { 112 } else { 96 };
        let optional_size = fixed_size + directory_bytes;

        // COFF header
        put_u16(&mut image, 0x84, self.machine);
        put_u16(&mut image, 0x86, 1);
        put_u16(&mut image, 0x94, optional_size + self.optional_padding);
        put_u16(
            &mut image,
            0x96,
            if self.pe32_plus { 0x0022 } else { 0x0102 },
        );

        // Optional header
        let mut at = 0x98;
        at = put_u16(&mut image, at, if self.pe32_plus { 0x20B } else { 0x10B });
        at = put_u16(&mut image, at, 0x000E); // linker version
        at = put_u32(&mut image, at, TEXT_SIZE); // size_of_code
        at = put_u32(&mut image, at, 0); // size_of_initialized_data
        at = put_u32(&mut image, at, 0); // size_of_uninitialized_data
        at = put_u32(&mut image, at, TEXT_RVA); // address_of_entry_point
        at = put_u32(&mut image, at, TEXT_RVA); // base_of_code
        if self.pe32_plus {
            at = put_u64(&mut image, at, 0x1_4000_0000);
        } else {
            at = put_u32(&mut image, at, 0); // base_of_data
            at = put_u32(&mut image, at, 0x0040_0000);
        }
        at = put_u32(&mut image, at, 0x1000); // section_alignment
        at = put_u32(&mut image, at, 0x200); // file_alignment
        at = put_u16(&mut image, at, 4); // major_operating_system_version
        at += 6;
        at = put_u16(&mut image, at, 4); // major_subsystem_version
        at += 2;
        at += 4; // win32_version_value
        at = put_u32(&mut image, at, TEXT_RVA + TEXT_SIZE); // size_of_image
        at = put_u32(&mut image, at, TEXT_OFFSET); // size_of_headers
        at += 4; // check_sum
        at = put_u16(&mut image, at, 3); // subsystem
        at = put_u16(&mut image, at, 0x8540); // dll_characteristics
        if self.pe32_plus {
            at = put_u64(&mut image, at, 0x0010_0000);
            at = put_u64(&mut image, at, 0x1000);
            at = put_u64(&mut image, at, 0x0010_0000);
            at = put_u64(&mut image, at, 0x1000);
        } else {
            at = put_u32(&mut image, at, 0x0010_0000);
            at = put_u32(&mut image, at, 0x1000);
            at = put_u32(&mut image, at, 0x0010_0000);
            at = put_u32(&mut image, at, 0x1000);
        }
        at += 4; // loader_flags
        at = put_u32(&mut image, at, self.directory_count);
        for (rva, size) in &self.directories {
            at = put_u32(&mut image, at, *rva);
            at = put_u32(&mut image, at, *size);
        }

        // Section table
        let mut at = at + usize::from(self.optional_padding);
        image[at..at + 5].copy_from_slice(b".text");
        at += 8;
        at = put_u32(&mut image, at, TEXT_SIZE); // virtual_size
        at = put_u32(&mut image, at, TEXT_RVA);
        at = put_u32(&mut image, at, TEXT_SIZE); // size_of_raw_data
        at = put_u32(&mut image, at, TEXT_OFFSET);
        put_u32(&mut image, at + 12, 0x6000_0020);

        for (rva, bytes) in self.patches {
            let offset = (TEXT_OFFSET + rva - TEXT_RVA) as usize;
            image[offset..offset + bytes.len()].copy_from_slice(&bytes);
        }

        image
    }
}

/// File offset of an RVA inside `.text`.
pub fn text_offset(rva: u32) -> usize {
    (TEXT_OFFSET + rva - TEXT_RVA) as usize
}

pub fn put_u16(image: &mut [u8], at: usize, value: u16) -> usize {
    image[at..at + 2].copy_from_slice(&value.to_le_bytes());
    at + 2
}

pub fn put_u32(image: &mut [u8], at: usize, value: u32) -> usize {
    image[at..at + 4].copy_from_slice(&value.to_le_bytes());
    at + 4
}

pub fn put_u64(image: &mut [u8], at: usize, value: u64) -> usize {
    image[at..at + 8].copy_from_slice(&value.to_le_bytes());
    at + 8
}

pub fn le32(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}

pub fn le16(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}

pub const IMPORT_RVA: u32 = 0x1100;
pub const EXPORT_RVA: u32 = 0x1500;
pub const RELOC_RVA: u32 = 0x1700;
pub const CLR_RVA: u32 = 0x1800;
pub const METADATA_RVA: u32 = 0x1900;
pub const METADATA_SIZE: u32 = 0x200;

/// One import entry for `KERNEL32.dll` importing `ExitProcess` by name and ordinal 5.
pub fn with_imports(builder: ImageBuilder) -> ImageBuilder {
    #[rustfmt::skip]
    let directory = le32(&[
        0x1200, 0, 0, 0x1300, 0x1250, // KERNEL32.dll
        0, 0, 0, 0, 0,                // sentinel
    ]);

    let mut hint_name = le16(&[1]);
    hint_name.extend_from_slice(b"ExitProcess\0");

    builder
        .directory(DataDirectoryType::Import, IMPORT_RVA, 40)
        .patch(IMPORT_RVA, &directory)
        .patch(0x1200, &le32(&[0x1400, 0x8000_0005, 0]))
        .patch(0x1250, &le32(&[0x1400, 0x8000_0005, 0]))
        .patch(0x1300, b"KERNEL32.dll\0")
        .patch(0x1400, &hint_name)
}

/// `test.dll` with three addresses and two names, `Alpha` (ordinal 0) and `Beta` (ordinal 2).
pub fn with_exports(builder: ImageBuilder) -> ImageBuilder {
    let mut directory = le32(&[0, 0]);
    directory.extend_from_slice(&le16(&[0, 0]));
    directory.extend_from_slice(&le32(&[0x1600, 1, 3, 2, 0x1640, 0x1660, 0x1670]));

    builder
        .directory(DataDirectoryType::Export, EXPORT_RVA, directory.len() as u32)
        .patch(EXPORT_RVA, &directory)
        .patch(0x1600, b"test.dll\0")
        .patch(0x1640, &le32(&[0x1010, 0x1020, 0x1030]))
        .patch(0x1660, &le32(&[0x1680, 0x1690]))
        .patch(0x1670, &le16(&[0, 2]))
        .patch(0x1680, b"Alpha\0")
        .patch(0x1690, b"Beta\0")
}

/// Two blocks: page `0x1000` with two entries, page `0x2000` with none.
pub fn with_relocations(builder: ImageBuilder) -> ImageBuilder {
    let mut blocks = le32(&[0x1000, 12]);
    blocks.extend_from_slice(&le16(&[0x3010, 0xA234]));
    blocks.extend_from_slice(&le32(&[0x2000, 8]));

    builder
        .directory(DataDirectoryType::BaseRelocation, RELOC_RVA, 20)
        .patch(RELOC_RVA, &blocks)
}

/// The 72-byte CLI header pointing at the metadata root.
pub fn cor20_bytes() -> Vec<u8> {
    let mut header = le32(&[72]);
    header.extend_from_slice(&le16(&[2, 5]));
    header.extend_from_slice(&le32(&[METADATA_RVA, METADATA_SIZE, 0x0000_0001, 0x0600_0001]));
    header.extend_from_slice(&[0u8; 48]);
    header
}

/// Metadata root with five streams, a tables header declaring `Module` (1 row) and
/// `TypeDef` (3 rows), and small heaps.
pub fn metadata_bytes() -> Vec<u8> {
    let mut root = le32(&[0x424A_5342]);
    root.extend_from_slice(&le16(&[1, 1]));
    root.extend_from_slice(&le32(&[0, 12]));
    root.extend_from_slice(b"v4.0.30319\0\0");
    root.extend_from_slice(&le16(&[0, 5]));

    for (offset, size, name) in [
        (0x6C_u32, 0x40_u32, &b"#~\0\0"[..]),
        (0xAC, 0x10, &b"#Strings\0\0\0\0"[..]),
        (0xBC, 0x08, &b"#US\0"[..]),
        (0xC4, 0x10, &b"#GUID\0\0\0"[..]),
        (0xD4, 0x08, &b"#Blob\0\0\0"[..]),
    ] {
        root.extend_from_slice(&le32(&[offset, size]));
        root.extend_from_slice(name);
    }
    assert_eq!(root.len(), 0x6C);

    // Tables header
    root.extend_from_slice(&le32(&[0]));
    root.extend_from_slice(&[2, 0, 0, 1]);
    root.extend_from_slice(&5_u64.to_le_bytes());
    root.extend_from_slice(&0_u64.to_le_bytes());
    root.extend_from_slice(&le32(&[1, 3]));
    // Module row: generation, name index
    root.extend_from_slice(&le16(&[0, 1]));
    root.resize(0xAC, 0);

    root.extend_from_slice(b"\0<Module>\0");
    root.resize(0xC4, 0);
    root.extend_from_slice(&[0x11; 16]);
    root.extend_from_slice(&[0, 3, 1, 2, 3, 0, 0, 0]);
    root
}

pub fn with_metadata(builder: ImageBuilder) -> ImageBuilder {
    builder
        .directory(DataDirectoryType::ClrHeader, CLR_RVA, 72)
        .patch(CLR_RVA, &cor20_bytes())
        .patch(METADATA_RVA, &metadata_bytes())
}

/// A PE32 image with imports, exports, relocations and managed metadata.
pub fn managed_image() -> Vec<u8> {
    let builder = with_imports(ImageBuilder::pe32());
    let builder = with_exports(builder);
    let builder = with_relocations(builder);
    with_metadata(builder).build()
}
