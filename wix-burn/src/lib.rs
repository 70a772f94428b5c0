// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Burn containers embedded in bundle executables.

A Burn bundle is a stub executable carrying a `.wixburn` PE section. That
section holds a fixed 64 byte descriptor recording where the UX container
and the attached container (both cabinets) live in the file. The containers
themselves are appended to the end of the executable.

[writer::BurnWriter] stamps the descriptor and appends containers.
[reader::BurnReader] reverses the process, extracting cabinet content to disk
and moving payloads to the paths declared by the Burn manifest.
*/

pub mod cabinet;
pub mod format;
pub mod manifest;
pub mod pe;
pub mod reader;
pub mod testutil;
pub mod writer;

pub use {
    cabinet::{CabinetFile, CabinetService, Compression, MsCabinet},
    format::{BurnSectionHeader, ContainerKind},
    manifest::{BurnManifest, ManifestPayload},
    reader::{BurnReader, ExtractedBundle},
    writer::BurnWriter,
};

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum BurnError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("(de)serialization error: {0}")]
    Scroll(#[from] scroll::Error),

    #[error("XML error: {0}")]
    XmlRead(#[from] xml::reader::Error),

    #[error("XML write error: {0}")]
    XmlWrite(#[from] xml::writer::Error),

    #[error("{} is not a valid executable", .0.display())]
    InvalidStubExe(PathBuf),

    #[error("stub executable {} does not contain a .wixburn section", .0.display())]
    StubMissingWixburnSection(PathBuf),

    #[error(".wixburn section in {path:?} is {size} bytes but at least {minimum} bytes are required")]
    StubWixburnSectionTooSmall {
        path: PathBuf,
        size: u32,
        minimum: usize,
    },

    #[error("bundle {} has an unrecognized burn section magic", .0.display())]
    BadBurnMagic(PathBuf),

    #[error("bundle {path:?} is too new (burn section version {version})")]
    BundleTooNew { path: PathBuf, version: u32 },

    #[error("{0} container has already been appended")]
    ContainerAlreadyAppended(ContainerKind),

    #[error("the UX container must be extracted before the attached container")]
    UxContainerNotExtracted,

    #[error("cabinet error: {0}")]
    Cabinet(String),

    #[error("burn manifest is malformed: {0}")]
    ManifestMalformed(&'static str),

    #[error("payload path escapes the extraction directory: {0}")]
    PayloadPathOutsideRoot(String),
}

pub type BurnResult<T> = std::result::Result<T, BurnError>;
