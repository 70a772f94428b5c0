// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Minimal PE image inspection.

Only the landmarks needed to find a named section are parsed: the DOS header,
the NT file header and the section table. Everything else in the image is
opaque. Integer reads and writes are composed byte by byte so they make no
assumption about host endianness or alignment.
*/

use {
    crate::{
        format::{BurnSectionHeader, BURN_SECTION_SIZE},
        BurnError, BurnResult,
    },
    log::debug,
    std::{
        io::{Read, Seek, SeekFrom, Write},
        path::Path,
    },
};

/// `MZ`.
pub const IMAGE_DOS_SIGNATURE: u16 = 0x5A4D;

/// `PE\0\0`.
pub const IMAGE_NT_SIGNATURE: u32 = 0x0000_4550;

pub const IMAGE_DOS_HEADER_SIZE: usize = 64;

/// Offset of `e_lfanew` within the DOS header.
pub const IMAGE_DOS_HEADER_OFFSET_NTHEADER: usize = 60;

/// Signature plus `IMAGE_FILE_HEADER`.
pub const IMAGE_NT_HEADER_SIZE: usize = 24;
pub const IMAGE_NT_HEADER_OFFSET_NUMBEROFSECTIONS: usize = 6;
pub const IMAGE_NT_HEADER_OFFSET_SIZEOFOPTIONALHEADER: usize = 20;

pub const IMAGE_SECTION_HEADER_SIZE: usize = 40;
pub const IMAGE_SECTION_HEADER_OFFSET_NAME: usize = 0;
pub const IMAGE_SECTION_HEADER_OFFSET_VIRTUALSIZE: usize = 8;
pub const IMAGE_SECTION_HEADER_OFFSET_SIZEOFRAWDATA: usize = 16;
pub const IMAGE_SECTION_HEADER_OFFSET_POINTERTORAWDATA: usize = 20;

/// `.wixburn` read as a little-endian u64.
pub const WIXBURN_SECTION_NAME: u64 = 0x6E72_7562_7869_772E;

pub fn read_u16_le(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset.checked_add(2)?)?;

    Some(u16::from(bytes[0]) | u16::from(bytes[1]) << 8)
}

pub fn read_u32_le(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;

    Some(
        bytes
            .iter()
            .rev()
            .fold(0u32, |acc, b| acc << 8 | u32::from(*b)),
    )
}

pub fn read_u64_le(data: &[u8], offset: usize) -> Option<u64> {
    let bytes = data.get(offset..offset.checked_add(8)?)?;

    Some(
        bytes
            .iter()
            .rev()
            .fold(0u64, |acc, b| acc << 8 | u64::from(*b)),
    )
}

/// Store `value` at `offset`. Returns `false` if the slice is too short.
pub fn write_u16_le(data: &mut [u8], offset: usize, value: u16) -> bool {
    write_le(data, offset, u64::from(value), 2)
}

pub fn write_u32_le(data: &mut [u8], offset: usize, value: u32) -> bool {
    write_le(data, offset, u64::from(value), 4)
}

pub fn write_u64_le(data: &mut [u8], offset: usize, value: u64) -> bool {
    write_le(data, offset, value, 8)
}

fn write_le(data: &mut [u8], offset: usize, value: u64, width: usize) -> bool {
    let end = match offset.checked_add(width) {
        Some(end) if end <= data.len() => end,
        _ => return false,
    };

    for (i, b) in data[offset..end].iter_mut().enumerate() {
        *b = (value >> (8 * i)) as u8;
    }

    true
}

/// Location of the NT header and the section table.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PeLayout {
    pub nt_header_offset: u32,
    pub sections: u16,
    pub first_section_offset: u32,
}

/// Fields of interest from a section header.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SectionHeader {
    pub name: u64,
    pub virtual_size: u32,
    pub raw_data_size: u32,
    pub raw_data_offset: u32,
    /// File offset of the section header itself.
    pub header_offset: u64,
}

impl SectionHeader {
    /// Parse a 40 byte section header record.
    pub fn parse(data: &[u8], header_offset: u64) -> Option<Self> {
        Some(Self {
            name: read_u64_le(data, IMAGE_SECTION_HEADER_OFFSET_NAME)?,
            virtual_size: read_u32_le(data, IMAGE_SECTION_HEADER_OFFSET_VIRTUALSIZE)?,
            raw_data_size: read_u32_le(data, IMAGE_SECTION_HEADER_OFFSET_SIZEOFRAWDATA)?,
            raw_data_offset: read_u32_le(data, IMAGE_SECTION_HEADER_OFFSET_POINTERTORAWDATA)?,
            header_offset,
        })
    }

    /// The section name with trailing NULs removed.
    pub fn name_string(&self) -> String {
        let bytes = self.name.to_le_bytes();
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());

        String::from_utf8_lossy(&bytes[0..end]).to_string()
    }
}

fn read_at<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    length: usize,
    path: &Path,
) -> BurnResult<Vec<u8>> {
    reader.seek(SeekFrom::Start(offset))?;

    let mut buffer = vec![0u8; length];
    match reader.read_exact(&mut buffer) {
        Ok(()) => Ok(buffer),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(BurnError::InvalidStubExe(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Verify the DOS header and return the offset of the NT header.
pub fn ensure_dos_header<R: Read + Seek>(reader: &mut R, path: &Path) -> BurnResult<u32> {
    let header = read_at(reader, 0, IMAGE_DOS_HEADER_SIZE, path)?;

    if read_u16_le(&header, 0) != Some(IMAGE_DOS_SIGNATURE) {
        return Err(BurnError::InvalidStubExe(path.to_path_buf()));
    }

    read_u32_le(&header, IMAGE_DOS_HEADER_OFFSET_NTHEADER)
        .ok_or_else(|| BurnError::InvalidStubExe(path.to_path_buf()))
}

/// Verify the NT header and locate the section table.
pub fn ensure_nt_header<R: Read + Seek>(
    reader: &mut R,
    nt_header_offset: u32,
    path: &Path,
) -> BurnResult<PeLayout> {
    let header = read_at(
        reader,
        nt_header_offset as u64,
        IMAGE_NT_HEADER_SIZE,
        path,
    )?;

    if read_u32_le(&header, 0) != Some(IMAGE_NT_SIGNATURE) {
        return Err(BurnError::InvalidStubExe(path.to_path_buf()));
    }

    let invalid = || BurnError::InvalidStubExe(path.to_path_buf());

    let sections = read_u16_le(&header, IMAGE_NT_HEADER_OFFSET_NUMBEROFSECTIONS).ok_or_else(invalid)?;
    let optional_header_size =
        read_u16_le(&header, IMAGE_NT_HEADER_OFFSET_SIZEOFOPTIONALHEADER).ok_or_else(invalid)?;

    let first_section_offset = nt_header_offset
        .checked_add(IMAGE_NT_HEADER_SIZE as u32 + optional_header_size as u32)
        .ok_or_else(invalid)?;

    Ok(PeLayout {
        nt_header_offset,
        sections,
        first_section_offset,
    })
}

/// Parse the DOS and NT headers.
pub fn read_layout<R: Read + Seek>(reader: &mut R, path: &Path) -> BurnResult<PeLayout> {
    let nt_header_offset = ensure_dos_header(reader, path)?;

    ensure_nt_header(reader, nt_header_offset, path)
}

/// Read every section header in the image.
pub fn read_sections<R: Read + Seek>(reader: &mut R, path: &Path) -> BurnResult<Vec<SectionHeader>> {
    let layout = read_layout(reader, path)?;

    let table_size = layout.sections as usize * IMAGE_SECTION_HEADER_SIZE;
    let table = read_at(reader, layout.first_section_offset as u64, table_size, path)?;

    table
        .chunks_exact(IMAGE_SECTION_HEADER_SIZE)
        .enumerate()
        .map(|(i, record)| {
            let header_offset =
                layout.first_section_offset as u64 + (i * IMAGE_SECTION_HEADER_SIZE) as u64;

            SectionHeader::parse(record, header_offset)
                .ok_or_else(|| BurnError::InvalidStubExe(path.to_path_buf()))
        })
        .collect()
}

/// Find a section by its 8 byte name, returning `(raw data offset, raw data size)`.
pub fn read_section<R: Read + Seek>(
    reader: &mut R,
    path: &Path,
    name: u64,
) -> BurnResult<Option<(u32, u32)>> {
    Ok(read_sections(reader, path)?
        .into_iter()
        .find(|section| section.name == name)
        .map(|section| (section.raw_data_offset, section.raw_data_size)))
}

/// Locate the `.wixburn` section and verify it can hold a descriptor.
///
/// Returns the file offset of the section's raw data, which is where the
/// descriptor lives.
pub fn find_wixburn_section<R: Read + Seek>(reader: &mut R, path: &Path) -> BurnResult<u64> {
    let (offset, size) = read_section(reader, path, WIXBURN_SECTION_NAME)?
        .ok_or_else(|| BurnError::StubMissingWixburnSection(path.to_path_buf()))?;

    if (size as usize) < BURN_SECTION_SIZE {
        return Err(BurnError::StubWixburnSectionTooSmall {
            path: path.to_path_buf(),
            size,
            minimum: BURN_SECTION_SIZE,
        });
    }

    debug!(
        "found .wixburn section in {} at offset {} ({} bytes)",
        path.display(),
        offset,
        size
    );

    Ok(offset as u64)
}

/// Read the descriptor stored at `data_offset`.
pub fn read_descriptor<R: Read + Seek>(
    reader: &mut R,
    data_offset: u64,
    path: &Path,
) -> BurnResult<BurnSectionHeader> {
    let data = read_at(reader, data_offset, BURN_SECTION_SIZE, path)?;

    Ok(BurnSectionHeader::from_bytes(&data)?)
}

/// Overwrite the descriptor stored at `data_offset`.
pub fn patch_descriptor<W: Write + Seek>(
    writer: &mut W,
    data_offset: u64,
    header: &BurnSectionHeader,
) -> BurnResult<()> {
    writer.seek(SeekFrom::Start(data_offset))?;
    writer.write_all(&header.to_bytes()?)?;

    Ok(())
}

/// Append everything from `reader` to the end of `writer` in fixed size chunks.
///
/// Returns `(offset the data was written at, number of bytes written)`.
pub fn append_bytes<R: Read, W: Write + Seek>(
    reader: &mut R,
    writer: &mut W,
) -> BurnResult<(u64, u64)> {
    let offset = writer.seek(SeekFrom::End(0))?;

    let mut buffer = vec![0u8; 65536];
    let mut written = 0u64;

    loop {
        let count = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(count) => count,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };

        writer.write_all(&buffer[0..count])?;
        written += count as u64;
    }

    Ok((offset, written))
}
