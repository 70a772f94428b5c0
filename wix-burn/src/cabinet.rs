// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cabinet creation and extraction.

use {
    crate::{BurnError, BurnResult},
    log::debug,
    std::{
        fs::File,
        io::{BufWriter, Write},
        path::{Component, Path, PathBuf},
    },
};

/// A file to place in a cabinet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CabinetFile {
    /// Name of the entry inside the cabinet.
    pub name: String,
    /// Filesystem path holding the content.
    pub source: PathBuf,
}

impl CabinetFile {
    pub fn new(name: impl ToString, source: impl AsRef<Path>) -> Self {
        Self {
            name: name.to_string(),
            source: source.as_ref().to_path_buf(),
        }
    }
}

/// Compression applied to cabinet folders.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Compression {
    None,
    MsZip,
}

/// Interface to a cabinet implementation.
pub trait CabinetService {
    /// Create a cabinet at `destination` containing `files`, in order.
    fn create_cabinet(
        &self,
        files: &[CabinetFile],
        destination: &Path,
        compression: Compression,
    ) -> BurnResult<()>;

    /// Extract every file in `cabinet` into `destination`.
    ///
    /// Returns the names of extracted entries.
    fn extract_cabinet(&self, cabinet: &Path, destination: &Path) -> BurnResult<Vec<String>>;
}

/// Join a relative, possibly backslash separated, path onto `root`.
///
/// Absolute paths and paths climbing out of `root` are rejected.
pub fn resolve_relative(root: &Path, relative: &str) -> BurnResult<PathBuf> {
    let normalized = relative.replace('\\', "/");
    let relative_path = Path::new(&normalized);

    if normalized.is_empty()
        || relative_path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(BurnError::PayloadPathOutsideRoot(relative.to_string()));
    }

    Ok(root.join(relative_path))
}

/// [CabinetService] backed by the pure Rust `cab` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct MsCabinet {}

impl CabinetService for MsCabinet {
    fn create_cabinet(
        &self,
        files: &[CabinetFile],
        destination: &Path,
        compression: Compression,
    ) -> BurnResult<()> {
        let mut builder = cab::CabinetBuilder::new();
        {
            let folder = builder.add_folder(match compression {
                Compression::None => cab::CompressionType::None,
                Compression::MsZip => cab::CompressionType::MsZip,
            });
            for file in files {
                folder.add_file(file.name.clone());
            }
        }

        let mut writer = builder.build(File::create(destination)?)?;
        let mut index = 0;
        while let Some(mut entry) = writer.next_file()? {
            let file = &files[index];
            let mut source = File::open(&file.source)?;
            std::io::copy(&mut source, &mut entry)?;
            index += 1;
        }
        writer.finish()?.flush()?;

        debug!(
            "created cabinet {} with {} files",
            destination.display(),
            files.len()
        );

        Ok(())
    }

    fn extract_cabinet(&self, cabinet: &Path, destination: &Path) -> BurnResult<Vec<String>> {
        let mut archive = cab::Cabinet::new(File::open(cabinet)?).map_err(|e| {
            BurnError::Cabinet(format!("unable to open {}: {}", cabinet.display(), e))
        })?;

        let names = archive
            .folder_entries()
            .flat_map(|folder| folder.file_entries())
            .map(|entry| entry.name().to_string())
            .collect::<Vec<_>>();

        std::fs::create_dir_all(destination)?;

        for name in &names {
            let dest_path = resolve_relative(destination, name)?;
            if let Some(parent) = dest_path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let mut reader = archive.read_file(name)?;
            let mut writer = BufWriter::new(File::create(&dest_path)?);
            std::io::copy(&mut reader, &mut writer)?;
            writer.flush()?;
        }

        debug!(
            "extracted {} files from {} to {}",
            names.len(),
            cabinet.display(),
            destination.display()
        );

        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_resolution() -> BurnResult<()> {
        let root = Path::new("/out");

        assert_eq!(
            resolve_relative(root, "sub\\dir\\file.dll")?,
            PathBuf::from("/out/sub/dir/file.dll")
        );
        assert!(resolve_relative(root, "..\\evil.exe").is_err());
        assert!(resolve_relative(root, "/etc/passwd").is_err());
        assert!(resolve_relative(root, "").is_err());

        Ok(())
    }

    #[test]
    fn create_and_extract() -> BurnResult<()> {
        let td = tempfile::Builder::new().prefix("wix-burn-test").tempdir()?;

        let a = td.path().join("a.txt");
        let b = td.path().join("b.bin");
        std::fs::write(&a, b"hello")?;
        std::fs::write(&b, vec![42u8; 100_000])?;

        let cabinet = td.path().join("test.cab");
        MsCabinet::default().create_cabinet(
            &[CabinetFile::new("a0", &a), CabinetFile::new("a1", &b)],
            &cabinet,
            Compression::MsZip,
        )?;

        let out = td.path().join("out");
        let names = MsCabinet::default().extract_cabinet(&cabinet, &out)?;

        assert_eq!(names, vec!["a0".to_string(), "a1".to_string()]);
        assert_eq!(std::fs::read(out.join("a0"))?, b"hello");
        assert_eq!(std::fs::read(out.join("a1"))?, vec![42u8; 100_000]);

        Ok(())
    }
}
