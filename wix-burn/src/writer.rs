// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Writing Burn containers into bundle executables.

use {
    crate::{
        format::{BurnSectionHeader, ContainerKind},
        pe, BurnError, BurnResult,
    },
    log::{info, warn},
    std::{
        fs::File,
        io::{Read, Write},
        path::{Path, PathBuf},
    },
    uuid::Uuid,
};

/// Makes a stub executable bundle capable.
///
/// Opening a writer locates the `.wixburn` section and overwrites its
/// descriptor with an empty one for the given bundle GUID. Containers are
/// then appended to the end of the file, each at most once.
///
/// A failed append leaves the executable in an indeterminate state. There is
/// no rollback.
#[derive(Debug)]
pub struct BurnWriter {
    path: PathBuf,
    fh: File,
    data_offset: u64,
    header: BurnSectionHeader,
}

impl BurnWriter {
    /// Open an executable for writing and reset its descriptor.
    pub fn open(path: impl AsRef<Path>, bundle_guid: Uuid) -> BurnResult<Self> {
        let path = path.as_ref();
        let mut fh = File::options().read(true).write(true).open(path)?;

        let data_offset = pe::find_wixburn_section(&mut fh, path)?;

        let header = BurnSectionHeader::new(bundle_guid);
        pe::patch_descriptor(&mut fh, data_offset, &header)?;
        fh.flush()?;

        info!(
            "initialized burn section in {} for bundle {}",
            path.display(),
            bundle_guid
        );

        Ok(Self {
            path: path.to_path_buf(),
            fh,
            data_offset,
            header,
        })
    }

    /// Path of the executable being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File offset of the descriptor.
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    /// The descriptor as last written.
    pub fn header(&self) -> &BurnSectionHeader {
        &self.header
    }

    /// Append the content of a file as a container.
    pub fn append_container(
        &mut self,
        container_path: impl AsRef<Path>,
        kind: ContainerKind,
    ) -> BurnResult<()> {
        let container_path = container_path.as_ref();

        info!(
            "appending {} container from {} to {}",
            kind,
            container_path.display(),
            self.path.display()
        );

        let mut fh = File::open(container_path)?;
        self.append_container_from_reader(&mut fh, kind)
    }

    /// Append everything readable from `reader` as a container.
    pub fn append_container_from_reader(
        &mut self,
        reader: &mut impl Read,
        kind: ContainerKind,
    ) -> BurnResult<()> {
        let (offset, size) = self.header.container(kind);
        if offset != 0 || size != 0 {
            warn!(
                "refusing to append a second {} container to {}",
                kind,
                self.path.display()
            );
            return Err(BurnError::ContainerAlreadyAppended(kind));
        }

        let (offset, size) = pe::append_bytes(reader, &mut self.fh)?;

        self.header.set_container(kind, offset, size);
        pe::patch_descriptor(&mut self.fh, self.data_offset, &self.header)?;
        self.fh.flush()?;

        info!(
            "wrote {} container ({} bytes) at offset {}",
            kind, size, offset
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::testutil, std::io::Cursor};

    fn stub_file(dir: &Path, data: &[u8]) -> BurnResult<PathBuf> {
        let path = dir.join("bundle.exe");
        std::fs::write(&path, data)?;

        Ok(path)
    }

    fn descriptor(path: &Path) -> BurnResult<BurnSectionHeader> {
        let data = std::fs::read(path)?;
        let offset = testutil::WIXBURN_RAW_OFFSET as usize;

        Ok(BurnSectionHeader::from_bytes(&data[offset..offset + 64])?)
    }

    #[test]
    fn open_zeroes_descriptor() -> BurnResult<()> {
        let td = tempfile::Builder::new().prefix("wix-burn-test").tempdir()?;

        let mut stub = testutil::burn_stub();
        let offset = testutil::WIXBURN_RAW_OFFSET as usize;
        for b in &mut stub[offset..offset + 64] {
            *b = 0x5a;
        }
        let path = stub_file(td.path(), &stub)?;

        let guid = Uuid::new_v4();
        let writer = BurnWriter::open(&path, guid)?;
        assert_eq!(writer.data_offset(), offset as u64);
        drop(writer);

        let header = descriptor(&path)?;
        assert_eq!(header, BurnSectionHeader::new(guid));
        assert_eq!(header.container_count, 0);
        assert_eq!(header.format, 1);

        Ok(())
    }

    #[test]
    fn reopening_resets_containers() -> BurnResult<()> {
        let td = tempfile::Builder::new().prefix("wix-burn-test").tempdir()?;
        let path = stub_file(td.path(), &testutil::burn_stub())?;

        let mut writer = BurnWriter::open(&path, Uuid::new_v4())?;
        writer.append_container_from_reader(&mut Cursor::new(b"ux data"), ContainerKind::Ux)?;
        drop(writer);
        assert_eq!(descriptor(&path)?.container_count, 1);

        let guid = Uuid::new_v4();
        BurnWriter::open(&path, guid)?;

        let header = descriptor(&path)?;
        assert_eq!(header.container_count, 0);
        assert_eq!(header.container(ContainerKind::Ux), (0, 0));
        assert_eq!(header.container(ContainerKind::Attached), (0, 0));
        assert_eq!(header.bundle_guid(), guid);

        Ok(())
    }

    #[test]
    fn append_records_location() -> BurnResult<()> {
        let td = tempfile::Builder::new().prefix("wix-burn-test").tempdir()?;
        let stub = testutil::burn_stub();
        let path = stub_file(td.path(), &stub)?;

        let container = td.path().join("ux.cab");
        std::fs::write(&container, vec![7u8; 100_000])?;

        let mut writer = BurnWriter::open(&path, Uuid::new_v4())?;
        writer.append_container(&container, ContainerKind::Ux)?;
        writer.append_container_from_reader(&mut Cursor::new(b"attached"), ContainerKind::Attached)?;
        drop(writer);

        let data = std::fs::read(&path)?;
        let header = descriptor(&path)?;

        assert_eq!(header.container_count, 2);
        assert_eq!(header.container(ContainerKind::Ux), (stub.len() as u64, 100_000));
        assert_eq!(
            header.container(ContainerKind::Attached),
            (stub.len() as u64 + 100_000, 8)
        );
        assert_eq!(&data[stub.len()..stub.len() + 100_000], vec![7u8; 100_000].as_slice());
        assert_eq!(&data[data.len() - 8..], b"attached");

        Ok(())
    }

    #[test]
    fn double_append_rejected() -> BurnResult<()> {
        let td = tempfile::Builder::new().prefix("wix-burn-test").tempdir()?;
        let path = stub_file(td.path(), &testutil::burn_stub())?;

        let mut writer = BurnWriter::open(&path, Uuid::new_v4())?;
        writer.append_container_from_reader(&mut Cursor::new(b"one"), ContainerKind::Attached)?;
        let len = std::fs::metadata(&path)?.len();

        let res = writer.append_container_from_reader(&mut Cursor::new(b"two"), ContainerKind::Attached);
        assert!(matches!(
            res,
            Err(BurnError::ContainerAlreadyAppended(ContainerKind::Attached))
        ));
        assert_eq!(std::fs::metadata(&path)?.len(), len);

        Ok(())
    }

    #[test]
    fn stub_without_section() -> BurnResult<()> {
        let td = tempfile::Builder::new().prefix("wix-burn-test").tempdir()?;
        let path = stub_file(td.path(), &testutil::pe_stub(&[(*b".text\0\0\0", 0x200)]))?;

        let res = BurnWriter::open(&path, Uuid::new_v4());
        assert!(matches!(res, Err(BurnError::StubMissingWixburnSection(_))));

        Ok(())
    }
}
