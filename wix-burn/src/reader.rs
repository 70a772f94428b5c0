// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Extracting Burn containers from bundle executables.

use {
    crate::{
        cabinet::{resolve_relative, CabinetService, MsCabinet},
        format::{BurnSectionHeader, ContainerKind},
        manifest::{
            BurnManifest, ManifestPayload, BURN_MANIFEST_CABINET_NAME, BURN_MANIFEST_FILE_NAME,
        },
        pe, BurnError, BurnResult,
    },
    log::{error, info, warn},
    std::{
        cmp::min,
        fs::File,
        io::{BufReader, Read, Seek, SeekFrom, Write},
        path::{Path, PathBuf},
    },
};

/// Where the reader is in the two phase extraction protocol.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ExtractionPhase {
    /// Nothing extracted yet.
    Initial,
    /// The UX container was extracted and attached payload renames are known.
    UxExtracted,
    /// The attached container was extracted.
    AttachedExtracted,
}

/// Result of [BurnReader::extract_bundle].
#[derive(Clone, Debug, Default)]
pub struct ExtractedBundle {
    /// Path to the extracted Burn manifest, if there was a UX container.
    pub manifest_path: Option<PathBuf>,
    /// Final paths of the UX payloads.
    pub ux_payloads: Vec<PathBuf>,
    /// Final paths of the attached payloads.
    pub attached_payloads: Vec<PathBuf>,
}

/// Read-only interface to the containers of a bundle executable.
///
/// The descriptor is parsed once when the reader is opened. A descriptor
/// with a bad magic or an unsupported version marks the reader invalid and
/// every extraction becomes a no-op returning `Ok(false)`.
pub struct BurnReader {
    path: PathBuf,
    fh: File,
    header: BurnSectionHeader,
    valid: bool,
    phase: ExtractionPhase,
    attached_renames: Vec<ManifestPayload>,
    cabinet_service: Box<dyn CabinetService>,
}

impl std::fmt::Debug for BurnReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BurnReader")
            .field("path", &self.path)
            .field("header", &self.header)
            .field("valid", &self.valid)
            .field("phase", &self.phase)
            .finish()
    }
}

impl BurnReader {
    /// Open a bundle executable.
    ///
    /// Structural problems with the PE image are errors. Problems with the
    /// descriptor itself are logged and leave the reader invalid.
    pub fn open(path: impl AsRef<Path>) -> BurnResult<Self> {
        let path = path.as_ref();
        let mut fh = File::open(path)?;

        let data_offset = pe::find_wixburn_section(&mut fh, path)?;
        let header = pe::read_descriptor(&mut fh, data_offset, path)?;

        let valid = if !header.has_valid_magic() {
            error!("{}", BurnError::BadBurnMagic(path.to_path_buf()));
            false
        } else if !header.is_supported_version() {
            error!(
                "{}",
                BurnError::BundleTooNew {
                    path: path.to_path_buf(),
                    version: header.version,
                }
            );
            false
        } else {
            true
        };

        Ok(Self {
            path: path.to_path_buf(),
            fh,
            header,
            valid,
            phase: ExtractionPhase::Initial,
            attached_renames: vec![],
            cabinet_service: Box::new(MsCabinet::default()),
        })
    }

    /// Set the cabinet implementation used for extraction.
    pub fn set_cabinet_service(&mut self, service: Box<dyn CabinetService>) {
        self.cabinet_service = service;
    }

    /// The parsed descriptor.
    pub fn header(&self) -> &BurnSectionHeader {
        &self.header
    }

    /// Whether the descriptor was recognized.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Attached payload renames recorded by UX extraction.
    pub fn pending_attached_renames(&self) -> &[ManifestPayload] {
        &self.attached_renames
    }

    /// Copy a byte range of the executable into `writer`.
    fn copy_range(&mut self, offset: u64, size: u64, writer: &mut impl Write) -> BurnResult<()> {
        self.fh.seek(SeekFrom::Start(offset))?;

        let mut remaining = size;
        let mut buffer = vec![0u8; 65536];

        while remaining > 0 {
            let count = min(remaining, buffer.len() as u64) as usize;
            self.fh.read_exact(&mut buffer[0..count])?;
            writer.write_all(&buffer[0..count])?;
            remaining -= count as u64;
        }

        Ok(())
    }

    /// Copy a container to a temporary cabinet and extract it to `out_dir`.
    fn extract_container(
        &mut self,
        kind: ContainerKind,
        out_dir: &Path,
        temp_dir: &Path,
    ) -> BurnResult<()> {
        let (offset, size) = self.header.container(kind);

        let mut cabinet = tempfile::Builder::new()
            .prefix("burn-container")
            .suffix(".cab")
            .tempfile_in(temp_dir)?;
        self.copy_range(offset, size, cabinet.as_file_mut())?;
        cabinet.as_file_mut().flush()?;

        info!(
            "extracting {} container ({} bytes at offset {}) from {} to {}",
            kind,
            size,
            offset,
            self.path.display(),
            out_dir.display()
        );

        self.cabinet_service
            .extract_cabinet(cabinet.path(), out_dir)?;

        Ok(())
    }

    /// Extract the UX container into `out_dir`.
    ///
    /// The manifest is renamed to `manifest.xml` and UX payloads are moved to
    /// their declared paths. Attached payload mappings are recorded for
    /// [Self::extract_attached_container].
    ///
    /// Returns `Ok(false)` without touching the filesystem if the reader is
    /// invalid or the bundle has no UX container.
    pub fn extract_ux_container(
        &mut self,
        out_dir: impl AsRef<Path>,
        temp_dir: impl AsRef<Path>,
    ) -> BurnResult<bool> {
        if !self.valid || !self.header.has_container(ContainerKind::Ux) {
            return Ok(false);
        }

        let out_dir = out_dir.as_ref();
        self.extract_container(ContainerKind::Ux, out_dir, temp_dir.as_ref())?;

        let manifest_path = out_dir.join(BURN_MANIFEST_FILE_NAME);
        std::fs::rename(out_dir.join(BURN_MANIFEST_CABINET_NAME), &manifest_path)?;

        let manifest = BurnManifest::from_reader(BufReader::new(File::open(&manifest_path)?))?;

        for payload in &manifest.ux_payloads {
            move_payload(out_dir, payload)?;
        }

        self.attached_renames = manifest.payloads;
        self.phase = ExtractionPhase::UxExtracted;

        Ok(true)
    }

    /// Extract the attached container into `out_dir`.
    ///
    /// Payloads are moved to the paths recorded by UX extraction, which must
    /// therefore run first when the bundle has a UX container.
    ///
    /// Returns `Ok(false)` without touching the filesystem if the reader is
    /// invalid or the bundle has no attached container.
    pub fn extract_attached_container(
        &mut self,
        out_dir: impl AsRef<Path>,
        temp_dir: impl AsRef<Path>,
    ) -> BurnResult<bool> {
        if !self.valid || !self.header.has_container(ContainerKind::Attached) {
            return Ok(false);
        }

        if self.phase == ExtractionPhase::Initial && self.header.has_container(ContainerKind::Ux) {
            return Err(BurnError::UxContainerNotExtracted);
        }

        if self.phase == ExtractionPhase::AttachedExtracted {
            warn!("attached container of {} extracted again", self.path.display());
        }

        let out_dir = out_dir.as_ref();
        self.extract_container(ContainerKind::Attached, out_dir, temp_dir.as_ref())?;

        for payload in &self.attached_renames {
            move_payload(out_dir, payload)?;
        }

        self.phase = ExtractionPhase::AttachedExtracted;

        Ok(true)
    }

    /// Extract both containers in protocol order.
    pub fn extract_bundle(
        &mut self,
        ux_dir: impl AsRef<Path>,
        attached_dir: impl AsRef<Path>,
        temp_dir: impl AsRef<Path>,
    ) -> BurnResult<ExtractedBundle> {
        let ux_dir = ux_dir.as_ref();
        let attached_dir = attached_dir.as_ref();
        let temp_dir = temp_dir.as_ref();

        let mut result = ExtractedBundle::default();

        if self.extract_ux_container(ux_dir, temp_dir)? {
            result.manifest_path = Some(ux_dir.join(BURN_MANIFEST_FILE_NAME));

            let manifest = BurnManifest::from_reader(BufReader::new(File::open(
                ux_dir.join(BURN_MANIFEST_FILE_NAME),
            )?))?;
            result.ux_payloads = manifest
                .ux_payloads
                .iter()
                .map(|p| resolve_relative(ux_dir, &p.file_path))
                .collect::<BurnResult<Vec<_>>>()?;
        }

        if self.extract_attached_container(attached_dir, temp_dir)? {
            result.attached_payloads = self
                .attached_renames
                .iter()
                .map(|p| resolve_relative(attached_dir, &p.file_path))
                .collect::<BurnResult<Vec<_>>>()?;
        }

        Ok(result)
    }
}

/// Rename an extracted payload from its cabinet name to its declared path.
fn move_payload(root: &Path, payload: &ManifestPayload) -> BurnResult<()> {
    let source = resolve_relative(root, &payload.source_path)?;
    let dest = resolve_relative(root, &payload.file_path)?;

    if source == dest {
        return Ok(());
    }

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if dest.exists() {
        std::fs::remove_file(&dest)?;
    }

    std::fs::rename(&source, &dest)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{testutil, writer::BurnWriter},
        uuid::Uuid,
    };

    struct Fixture {
        td: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> BurnResult<Self> {
            Ok(Self {
                td: tempfile::Builder::new().prefix("wix-burn-test").tempdir()?,
            })
        }

        fn path(&self, name: &str) -> PathBuf {
            self.td.path().join(name)
        }

        fn dir(&self, name: &str) -> BurnResult<PathBuf> {
            let p = self.path(name);
            std::fs::create_dir_all(&p)?;
            Ok(p)
        }

        fn stub(&self) -> BurnResult<PathBuf> {
            let p = self.path("bundle.exe");
            std::fs::write(&p, testutil::burn_stub())?;
            Ok(p)
        }

        fn ux_cabinet(&self, manifest: &BurnManifest, files: &[(&str, &[u8])]) -> BurnResult<PathBuf> {
            let manifest_data = manifest.to_xml_bytes()?;
            let mut entries = vec![(BURN_MANIFEST_CABINET_NAME, manifest_data.as_slice())];
            entries.extend_from_slice(files);

            let p = self.path("ux.cab");
            testutil::write_cabinet(&p, &entries)?;
            Ok(p)
        }
    }

    fn dir_is_empty(path: &Path) -> BurnResult<bool> {
        Ok(std::fs::read_dir(path)?.next().is_none())
    }

    #[test]
    fn round_trip() -> BurnResult<()> {
        let fixture = Fixture::new()?;
        let exe = fixture.stub()?;

        let manifest = BurnManifest {
            ux_payloads: vec![ManifestPayload::new("u0", "ba\\bootstrapper.dll")],
            payloads: vec![ManifestPayload::new("a0", "packages\\product.msi")],
        };
        let ux_cab = fixture.ux_cabinet(&manifest, &[("u0", &b"bootstrapper"[..])])?;
        let attached_cab = fixture.path("attached.cab");
        testutil::write_cabinet(&attached_cab, &[("a0", &b"msi content"[..])])?;

        let guid = Uuid::new_v4();
        let mut writer = BurnWriter::open(&exe, guid)?;
        writer.append_container(&ux_cab, ContainerKind::Ux)?;
        writer.append_container(&attached_cab, ContainerKind::Attached)?;
        drop(writer);

        let mut reader = BurnReader::open(&exe)?;
        assert!(reader.is_valid());
        assert_eq!(reader.header().bundle_guid(), guid);
        assert_eq!(
            reader.header().container(ContainerKind::Ux).1,
            std::fs::metadata(&ux_cab)?.len()
        );

        let ux_dir = fixture.dir("ux")?;
        let attached_dir = fixture.dir("attached")?;
        let temp_dir = fixture.dir("temp")?;

        let extracted = reader.extract_bundle(&ux_dir, &attached_dir, &temp_dir)?;

        assert_eq!(extracted.manifest_path, Some(ux_dir.join("manifest.xml")));
        assert_eq!(
            std::fs::read(ux_dir.join("ba").join("bootstrapper.dll"))?,
            b"bootstrapper"
        );
        assert_eq!(
            std::fs::read(attached_dir.join("packages").join("product.msi"))?,
            b"msi content"
        );
        assert_eq!(
            BurnManifest::from_reader(File::open(ux_dir.join("manifest.xml"))?)?,
            manifest
        );
        assert_eq!(extracted.attached_payloads.len(), 1);
        assert!(!ux_dir.join("u0").exists());
        assert!(!attached_dir.join("a0").exists());
        assert!(dir_is_empty(&temp_dir)?);

        Ok(())
    }

    #[test]
    fn ux_only_bundle() -> BurnResult<()> {
        let fixture = Fixture::new()?;

        // Container at offset 1024 with a size of 2048 bytes.
        let ux_cab = fixture.ux_cabinet(&BurnManifest::default(), &[])?;
        let mut cab_data = std::fs::read(&ux_cab)?;
        assert!(cab_data.len() < 2048);
        cab_data.resize(2048, 0);

        // .text at 0x200 and .wixburn at 0x300, ending at 1024.
        let mut exe_data = testutil::pe_stub(&[(*b".text\0\0\0", 0x100), (*b".wixburn", 0x100)]);
        assert_eq!(exe_data.len(), 1024);
        exe_data.extend_from_slice(&cab_data);

        let mut header = BurnSectionHeader::new(Uuid::new_v4());
        header.set_container(ContainerKind::Ux, 1024, 2048);
        let offset = 0x300;
        exe_data[offset..offset + 64].copy_from_slice(&header.to_bytes()?);

        let exe = fixture.path("ux-only.exe");
        std::fs::write(&exe, &exe_data)?;

        let mut reader = BurnReader::open(&exe)?;
        assert_eq!(reader.header().container_count, 1);

        let ux_dir = fixture.dir("ux")?;
        let attached_dir = fixture.dir("attached")?;
        let temp_dir = fixture.dir("temp")?;

        assert!(reader.extract_ux_container(&ux_dir, &temp_dir)?);
        assert!(ux_dir.join("manifest.xml").exists());
        assert!(!reader.extract_attached_container(&attached_dir, &temp_dir)?);
        assert!(dir_is_empty(&attached_dir)?);

        Ok(())
    }

    #[test]
    fn bad_magic_is_noop() -> BurnResult<()> {
        let fixture = Fixture::new()?;

        let mut exe_data = testutil::burn_stub();
        exe_data.extend_from_slice(&[1u8; 4096]);
        let mut header = BurnSectionHeader::new(Uuid::nil());
        header.magic = 0;
        header.set_container(ContainerKind::Ux, 0x600, 2048);
        header.set_container(ContainerKind::Attached, 0x600 + 2048, 2048);
        let offset = testutil::WIXBURN_RAW_OFFSET as usize;
        exe_data[offset..offset + 64].copy_from_slice(&header.to_bytes()?);

        let exe = fixture.path("bad.exe");
        std::fs::write(&exe, &exe_data)?;

        let out = fixture.dir("out")?;
        let temp_dir = fixture.dir("temp")?;

        let mut reader = BurnReader::open(&exe)?;
        assert!(!reader.is_valid());
        assert!(!reader.extract_ux_container(&out, &temp_dir)?);
        assert!(!reader.extract_attached_container(&out, &temp_dir)?);
        assert!(dir_is_empty(&out)?);
        assert!(dir_is_empty(&temp_dir)?);

        Ok(())
    }

    #[test]
    fn newer_version_is_noop() -> BurnResult<()> {
        let fixture = Fixture::new()?;

        let mut exe_data = testutil::burn_stub();
        let mut header = BurnSectionHeader::new(Uuid::nil());
        header.version = 2;
        let offset = testutil::WIXBURN_RAW_OFFSET as usize;
        exe_data[offset..offset + 64].copy_from_slice(&header.to_bytes()?);

        let exe = fixture.path("new.exe");
        std::fs::write(&exe, &exe_data)?;

        let reader = BurnReader::open(&exe)?;
        assert!(!reader.is_valid());

        Ok(())
    }

    #[test]
    fn attached_before_ux_rejected() -> BurnResult<()> {
        let fixture = Fixture::new()?;
        let exe = fixture.stub()?;

        let ux_cab = fixture.ux_cabinet(&BurnManifest::default(), &[])?;
        let attached_cab = fixture.path("attached.cab");
        testutil::write_cabinet(&attached_cab, &[("a0", &b"x"[..])])?;

        let mut writer = BurnWriter::open(&exe, Uuid::new_v4())?;
        writer.append_container(&ux_cab, ContainerKind::Ux)?;
        writer.append_container(&attached_cab, ContainerKind::Attached)?;
        drop(writer);

        let out = fixture.dir("out")?;
        let temp_dir = fixture.dir("temp")?;

        let mut reader = BurnReader::open(&exe)?;
        let res = reader.extract_attached_container(&out, &temp_dir);
        assert!(matches!(res, Err(BurnError::UxContainerNotExtracted)));
        assert!(dir_is_empty(&out)?);

        Ok(())
    }
}
