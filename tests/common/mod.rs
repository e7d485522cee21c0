//! Synthetic images shared by the integration tests.
//!
//! Both images are AMD64 PE32+ DLLs with two sections:
//!
//! | Section  | RVA               | File offset      |
//! |----------|-------------------|------------------|
//! | `.text`  | `0x1000..0x2000`  | `0x400..0x800`   |
//! | `.rdata` | `0x2000..0x3000`  | `0x800..0xC00`   |
//!
//! `.rdata` carries two import descriptors, an export directory with two names and one
//! relocation block. The managed variant adds a CLI header and metadata root to `.text`.

#![allow(dead_code)]

pub const IMAGE_SIZE: usize = 0xC00;

pub const IMPORT_RVA: u32 = 0x2000;
pub const EXPORT_RVA: u32 = 0x2300;
pub const RELOC_RVA: u32 = 0x23C0;
pub const CLR_RVA: u32 = 0x1100;
pub const METADATA_RVA: u32 = 0x1200;

const EXPORT: usize = 0;
const IMPORT: usize = 1;
const BASERELOC: usize = 5;
const CLR: usize = 14;

struct Image(Vec<u8>);

impl Image {
    fn u16(&mut self, at: usize, value: u16) -> &mut Self {
        self.0[at..at + 2].copy_from_slice(&value.to_le_bytes());
        self
    }

    fn u32(&mut self, at: usize, value: u32) -> &mut Self {
        self.0[at..at + 4].copy_from_slice(&value.to_le_bytes());
        self
    }

    fn u64(&mut self, at: usize, value: u64) -> &mut Self {
        self.0[at..at + 8].copy_from_slice(&value.to_le_bytes());
        self
    }

    fn bytes(&mut self, at: usize, value: &[u8]) -> &mut Self {
        self.0[at..at + value.len()].copy_from_slice(value);
        self
    }

    fn directory(&mut self, index: usize, rva: u32, size: u32) -> &mut Self {
        let at = 0x98 + 112 + index * 8;
        self.u32(at, rva).u32(at + 4, size)
    }

    fn section(
        &mut self,
        index: usize,
        name: &[u8],
        rva: u32,
        offset: u32,
        characteristics: u32,
    ) -> &mut Self {
        let at = 0x188 + index * 40;
        self.bytes(at, name)
            .u32(at + 8, 0x1000)
            .u32(at + 12, rva)
            .u32(at + 16, 0x400)
            .u32(at + 20, offset)
            .u32(at + 36, characteristics)
    }
}

/// File offset of an RVA in either section.
pub fn offset(rva: u32) -> usize {
    if rva >= 0x2000 {
        (rva - 0x2000 + 0x800) as usize
    } else {
        (rva - 0x1000 + 0x400) as usize
    }
}

/// A native PE32+ DLL with imports, exports and relocations.
pub fn native_dll() -> Vec<u8> {
    let mut image = Image(vec![0u8; IMAGE_SIZE]);

    image.bytes(0, b"MZ").u32(0x3C, 0x80).bytes(0x80, b"PE\0\0");

    // COFF header
    image
        .u16(0x84, 0x8664)
        .u16(0x86, 2)
        .u16(0x94, 240)
        .u16(0x96, 0x2022);

    // Optional header
    image
        .u16(0x98, 0x20B)
        .u32(0x98 + 16, 0x1000)
        .u32(0x98 + 20, 0x1000)
        .u64(0x98 + 24, 0x1_8000_0000)
        .u32(0x98 + 32, 0x1000)
        .u32(0x98 + 36, 0x200)
        .u32(0x98 + 56, 0x3000)
        .u32(0x98 + 60, 0x400)
        .u16(0x98 + 68, 2)
        .u16(0x98 + 70, 0x0160)
        .u32(0x98 + 108, 16);

    image
        .section(0, b".text", 0x1000, 0x400, 0x6000_0020)
        .section(1, b".rdata", 0x2000, 0x800, 0x4000_0040);

    // Imports: KERNEL32.dll (Sleep, ordinal 12) and USER32.dll (MessageBoxA)
    image.directory(IMPORT, IMPORT_RVA, 60);
    let at = offset(IMPORT_RVA);
    image
        .u32(at, 0x2100)
        .u32(at + 12, 0x2200)
        .u32(at + 16, 0x2180)
        .u32(at + 20, 0x2120)
        .u32(at + 32, 0x2210)
        .u32(at + 36, 0x21A0);
    for table in [0x2100, 0x2180] {
        image
            .u64(offset(table), 0x2240)
            .u64(offset(table) + 8, 0x8000_0000_0000_000C);
    }
    for table in [0x2120, 0x21A0] {
        image.u64(offset(table), 0x2250);
    }
    image
        .bytes(offset(0x2200), b"KERNEL32.dll\0")
        .bytes(offset(0x2210), b"USER32.dll\0")
        .u16(offset(0x2240), 0x10)
        .bytes(offset(0x2242), b"Sleep\0")
        .u16(offset(0x2250), 0x20)
        .bytes(offset(0x2252), b"MessageBoxA\0");

    // Exports: "Close" and "Open", names sorted, ordinals pointing the other way
    image.directory(EXPORT, EXPORT_RVA, 40);
    let at = offset(EXPORT_RVA);
    image
        .u32(at + 12, 0x2340)
        .u32(at + 16, 1)
        .u32(at + 20, 2)
        .u32(at + 24, 2)
        .u32(at + 28, 0x2360)
        .u32(at + 32, 0x2370)
        .u32(at + 36, 0x2380)
        .bytes(offset(0x2340), b"pescope_test.dll\0")
        .u32(offset(0x2360), 0x1010)
        .u32(offset(0x2364), 0x1020)
        .u32(offset(0x2370), 0x2390)
        .u32(offset(0x2374), 0x23A0)
        .u16(offset(0x2380), 1)
        .u16(offset(0x2382), 0)
        .bytes(offset(0x2390), b"Close\0")
        .bytes(offset(0x23A0), b"Open\0");

    // Relocations: page 0x1000 with two Dir64 entries and one Absolute pad
    image.directory(BASERELOC, RELOC_RVA, 14);
    let at = offset(RELOC_RVA);
    image
        .u32(at, 0x1000)
        .u32(at + 4, 14)
        .u16(at + 8, 0xA008)
        .u16(at + 10, 0xA010)
        .u16(at + 12, 0x0000);

    image.0
}

/// [`native_dll`] with a CLI header and a metadata root declaring one `Module` row.
pub fn managed_dll() -> Vec<u8> {
    let mut image = Image(native_dll());

    image.directory(CLR, CLR_RVA, 72);
    let at = offset(CLR_RVA);
    image
        .u32(at, 72)
        .u16(at + 4, 2)
        .u16(at + 6, 5)
        .u32(at + 8, METADATA_RVA)
        .u32(at + 12, 0x100)
        .u32(at + 16, 0x0000_0001);

    let root = offset(METADATA_RVA);
    image
        .bytes(root, b"BSJB")
        .u16(root + 4, 1)
        .u16(root + 6, 1)
        .u32(root + 12, 12)
        .bytes(root + 16, b"v4.0.30319\0\0")
        .u16(root + 30, 4);

    // Stream headers
    image
        .u32(root + 0x20, 0x60)
        .u32(root + 0x24, 0x28)
        .bytes(root + 0x28, b"#~\0\0")
        .u32(root + 0x2C, 0x88)
        .u32(root + 0x30, 0x10)
        .bytes(root + 0x34, b"#Strings\0\0\0\0")
        .u32(root + 0x40, 0x98)
        .u32(root + 0x44, 0x10)
        .bytes(root + 0x48, b"#GUID\0\0\0")
        .u32(root + 0x50, 0xA8)
        .u32(root + 0x54, 0x08)
        .bytes(root + 0x58, b"#Blob\0\0\0");

    // Tables header: Module only, one row, then the row itself
    let tables = root + 0x60;
    image
        .bytes(tables + 4, &[2, 0, 0, 1])
        .u64(tables + 8, 1)
        .u32(tables + 24, 1)
        .u16(tables + 28, 0)
        .u16(tables + 30, 1)
        .u16(tables + 32, 1);

    image
        .bytes(root + 0x88, b"\0pescope.dll\0")
        .bytes(root + 0x98, &[0xAB; 16])
        .bytes(root + 0xA8, &[0, 2, 0xCA, 0xFE]);

    image.0
}
