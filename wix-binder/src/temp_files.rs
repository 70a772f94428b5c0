// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scratch files created while binding.

use {
    crate::messaging::{Diagnostic, Messaging},
    log::{debug, warn},
    once_cell::unsync::OnceCell,
    std::{
        cell::Cell,
        io::ErrorKind,
        path::{Path, PathBuf},
        time::Duration,
    },
};

const DELETE_ATTEMPTS: u32 = 3;
const DELETE_BACKOFF: Duration = Duration::from_millis(100);

/// A directory of temporary files removed as a unit.
///
/// The directory is removed by [Self::delete] or, failing that, on drop.
#[derive(Debug)]
pub struct TempFileCollection {
    root: PathBuf,
    counter: Cell<u32>,
    empty_file: OnceCell<PathBuf>,
    deleted: bool,
}

impl TempFileCollection {
    /// Create a collection in a new directory under the system temp directory.
    pub fn new() -> std::io::Result<Self> {
        let root = tempfile::Builder::new()
            .prefix("wix-binder-")
            .tempdir()?
            .into_path();

        Ok(Self::from_root(root))
    }

    /// Create a collection in a new directory under `parent`.
    pub fn new_in(parent: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = tempfile::Builder::new()
            .prefix("wix-binder-")
            .tempdir_in(parent)?
            .into_path();

        Ok(Self::from_root(root))
    }

    fn from_root(root: PathBuf) -> Self {
        debug!("using temporary directory {}", root.display());

        Self {
            root,
            counter: Cell::new(0),
            empty_file: OnceCell::new(),
            deleted: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Reserve a unique file name with the given extension.
    ///
    /// The file itself is not created.
    pub fn add_extension(&self, extension: &str) -> PathBuf {
        let index = self.counter.get();
        self.counter.set(index + 1);

        self.root.join(format!("{:08x}.{}", index, extension))
    }

    /// Create a unique subdirectory.
    pub fn add_directory(&self, name: &str) -> std::io::Result<PathBuf> {
        let path = self.add_extension(name);
        std::fs::create_dir_all(&path)?;

        Ok(path)
    }

    /// A zero length file, created on first use.
    pub fn empty_file(&self) -> std::io::Result<&Path> {
        let path = self.empty_file.get_or_try_init(|| {
            let path = self.add_extension("empty");
            std::fs::write(&path, b"")?;
            Ok::<_, std::io::Error>(path)
        })?;

        Ok(path.as_path())
    }

    /// Remove the directory and everything in it.
    ///
    /// Failure after retrying is reported as a warning and `false` returned.
    pub fn delete(&mut self, messaging: &mut Messaging) -> bool {
        match remove_with_retry(&self.root) {
            Ok(()) => {
                self.deleted = true;
                true
            }
            Err(e) => {
                messaging.emit(Diagnostic::TempCleanupFailed {
                    path: self.root.display().to_string(),
                    message: e.to_string(),
                });
                false
            }
        }
    }
}

impl Drop for TempFileCollection {
    fn drop(&mut self) {
        if self.deleted {
            return;
        }

        if let Err(e) = remove_with_retry(&self.root) {
            warn!(
                "unable to delete temporary directory {}: {}",
                self.root.display(),
                e
            );
        }
    }
}

fn clear_readonly(path: &Path) -> std::io::Result<()> {
    let metadata = std::fs::symlink_metadata(path)?;

    if metadata.is_dir() {
        for entry in std::fs::read_dir(path)? {
            clear_readonly(&entry?.path())?;
        }
    }

    let mut permissions = metadata.permissions();
    if permissions.readonly() {
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
        std::fs::set_permissions(path, permissions)?;
    }

    Ok(())
}

fn remove_with_retry(path: &Path) -> std::io::Result<()> {
    let mut cleared_readonly = false;
    let mut attempt = 0;

    loop {
        let err = match std::fs::remove_dir_all(path) {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => e,
        };

        attempt += 1;
        if attempt >= DELETE_ATTEMPTS {
            return Err(err);
        }

        if err.kind() == ErrorKind::PermissionDenied && !cleared_readonly {
            cleared_readonly = true;
            if let Err(e) = clear_readonly(path) {
                debug!("unable to clear read-only flags in {}: {}", path.display(), e);
            }
        }

        std::thread::sleep(DELETE_BACKOFF * attempt);
    }
}
