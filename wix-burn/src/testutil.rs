// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fixtures for exercising Burn containers in tests.

use {
    crate::pe::{
        write_u16_le, write_u32_le, IMAGE_DOS_HEADER_OFFSET_NTHEADER, IMAGE_NT_HEADER_SIZE,
        IMAGE_SECTION_HEADER_SIZE,
    },
    std::{io::Write, path::Path},
};

/// File offset of the NT header in generated stubs.
pub const NT_HEADER_OFFSET: u32 = 0x80;

/// Size of the (all zero) optional header in generated stubs.
pub const OPTIONAL_HEADER_SIZE: u16 = 0xe0;

/// Where section raw data starts in generated stubs.
pub const FIRST_RAW_OFFSET: u32 = 0x200;

/// Raw data offset of `.wixburn` in [burn_stub].
pub const WIXBURN_RAW_OFFSET: u32 = 0x400;

/// Produce a minimal PE image with the given `(name, raw size)` sections.
///
/// Raw data for sections is laid out back to back starting at
/// [FIRST_RAW_OFFSET]. Nothing beyond the headers the Burn code inspects is
/// meaningful.
pub fn pe_stub(sections: &[([u8; 8], u32)]) -> Vec<u8> {
    let raw_total = sections.iter().map(|(_, size)| *size as usize).sum::<usize>();
    let mut data = vec![0u8; FIRST_RAW_OFFSET as usize + raw_total];

    data[0] = b'M';
    data[1] = b'Z';
    write_u32_le(&mut data, IMAGE_DOS_HEADER_OFFSET_NTHEADER, NT_HEADER_OFFSET);

    let nt = NT_HEADER_OFFSET as usize;
    data[nt..nt + 4].copy_from_slice(b"PE\0\0");
    write_u16_le(&mut data, nt + 4, 0x014c);
    write_u16_le(&mut data, nt + 6, sections.len() as u16);
    write_u16_le(&mut data, nt + 20, OPTIONAL_HEADER_SIZE);
    write_u16_le(&mut data, nt + IMAGE_NT_HEADER_SIZE, 0x010b);

    let mut header_offset = nt + IMAGE_NT_HEADER_SIZE + OPTIONAL_HEADER_SIZE as usize;
    let mut raw_offset = FIRST_RAW_OFFSET;

    for (name, size) in sections {
        data[header_offset..header_offset + 8].copy_from_slice(name);
        write_u32_le(&mut data, header_offset + 8, *size);
        write_u32_le(&mut data, header_offset + 16, *size);
        write_u32_le(&mut data, header_offset + 20, raw_offset);

        header_offset += IMAGE_SECTION_HEADER_SIZE;
        raw_offset += size;
    }

    data
}

/// A stub with `.text` and a 512 byte `.wixburn` section at [WIXBURN_RAW_OFFSET].
pub fn burn_stub() -> Vec<u8> {
    let mut data = pe_stub(&[(*b".text\0\0\0", 0x200), (*b".wixburn", 0x200)]);

    for b in &mut data[FIRST_RAW_OFFSET as usize..WIXBURN_RAW_OFFSET as usize] {
        *b = 0xcc;
    }

    data
}

/// Write an uncompressed cabinet holding `files` to `path`.
pub fn write_cabinet(path: &Path, files: &[(&str, &[u8])]) -> std::io::Result<()> {
    let mut builder = cab::CabinetBuilder::new();
    {
        let folder = builder.add_folder(cab::CompressionType::None);
        for (name, _) in files {
            folder.add_file(name.to_string());
        }
    }

    let mut writer = builder.build(std::fs::File::create(path)?)?;
    while let Some(mut entry) = writer.next_file()? {
        let content = files
            .iter()
            .find(|(name, _)| *name == entry.file_name())
            .map(|(_, content)| *content)
            .unwrap_or_default();
        entry.write_all(content)?;
    }
    writer.finish()?;

    Ok(())
}
