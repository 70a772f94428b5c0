// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Binder configuration.

use {
    crate::{transform::TransformFlags, BinderError, BinderResult},
    std::{
        fmt::{Display, Formatter},
        path::{Path, PathBuf},
    },
    wix_burn::Compression,
};

/// Cabinet compression level.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompressionLevel {
    None,
    Low,
    Medium,
    High,
    Mszip,
}

impl CompressionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Mszip => "mszip",
        }
    }

    /// The folder compression used when writing cabinets.
    ///
    /// Only MSZIP is available for writing, so every level other than
    /// [Self::None] maps to it.
    pub fn cabinet_compression(&self) -> Compression {
        match self {
            Self::None => Compression::None,
            _ => Compression::MsZip,
        }
    }
}

impl Display for CompressionLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for CompressionLevel {
    type Error = BinderError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "mszip" => Ok(Self::Mszip),
            _ => Err(BinderError::UnknownCompressionLevel(s.to_string())),
        }
    }
}

/// Settings that influence diffing and binding.
#[derive(Clone, Debug)]
pub struct BinderSettings {
    show_pedantic_messages: bool,
    suppress_keeping_special_rows: bool,
    preserve_unchanged_rows: bool,
    validation_flags: TransformFlags,
    compression_level: CompressionLevel,
    reuse_cabinets: bool,
    cabinet_cache_path: Option<PathBuf>,
    cabinet_threads: usize,
    warnings_as_errors: bool,
}

impl Default for BinderSettings {
    fn default() -> Self {
        Self {
            show_pedantic_messages: false,
            suppress_keeping_special_rows: false,
            preserve_unchanged_rows: false,
            validation_flags: TransformFlags::empty(),
            compression_level: CompressionLevel::Mszip,
            reuse_cabinets: false,
            cabinet_cache_path: None,
            cabinet_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            warnings_as_errors: false,
        }
    }
}

impl BinderSettings {
    /// Whether to emit pedantic warnings such as duplicate key reports.
    pub fn show_pedantic_messages(&self) -> bool {
        self.show_pedantic_messages
    }

    pub fn set_show_pedantic_messages(&mut self, value: bool) {
        self.show_pedantic_messages = value;
    }

    /// Whether to skip synthesizing summary information into transforms.
    pub fn suppress_keeping_special_rows(&self) -> bool {
        self.suppress_keeping_special_rows
    }

    pub fn set_suppress_keeping_special_rows(&mut self, value: bool) {
        self.suppress_keeping_special_rows = value;
    }

    /// Whether rows without differences are kept in diffs.
    pub fn preserve_unchanged_rows(&self) -> bool {
        self.preserve_unchanged_rows
    }

    pub fn set_preserve_unchanged_rows(&mut self, value: bool) {
        self.preserve_unchanged_rows = value;
    }

    /// Flags recorded in generated transforms.
    pub fn validation_flags(&self) -> TransformFlags {
        self.validation_flags
    }

    pub fn set_validation_flags(&mut self, flags: TransformFlags) {
        self.validation_flags = flags;
    }

    pub fn compression_level(&self) -> CompressionLevel {
        self.compression_level
    }

    pub fn set_compression_level(&mut self, level: CompressionLevel) {
        self.compression_level = level;
    }

    /// Set the compression level from its name.
    pub fn set_compression_level_from_str(&mut self, value: &str) -> BinderResult<()> {
        self.compression_level = CompressionLevel::try_from(value)?;

        Ok(())
    }

    pub fn reuse_cabinets(&self) -> bool {
        self.reuse_cabinets
    }

    pub fn set_reuse_cabinets(&mut self, value: bool) {
        self.reuse_cabinets = value;
    }

    /// Directory where built cabinets are cached.
    pub fn cabinet_cache_path(&self) -> Option<&Path> {
        self.cabinet_cache_path.as_deref()
    }

    pub fn set_cabinet_cache_path(&mut self, path: impl AsRef<Path>) {
        self.cabinet_cache_path = Some(path.as_ref().to_path_buf());
    }

    /// Number of threads used to build cabinets. Always at least 1.
    pub fn cabinet_threads(&self) -> usize {
        self.cabinet_threads
    }

    pub fn set_cabinet_threads(&mut self, value: usize) -> BinderResult<()> {
        if value == 0 {
            return Err(BinderError::IllegalCabbingThreadCount(value.to_string()));
        }

        self.cabinet_threads = value;

        Ok(())
    }

    /// Set the cabinet thread count from a command line style value.
    pub fn set_cabinet_threads_from_str(&mut self, value: &str) -> BinderResult<()> {
        let count = value
            .trim()
            .parse::<i64>()
            .map_err(|_| BinderError::IllegalCabbingThreadCount(value.to_string()))?;

        if count <= 0 {
            return Err(BinderError::IllegalCabbingThreadCount(value.to_string()));
        }

        self.set_cabinet_threads(
            usize::try_from(count)
                .map_err(|_| BinderError::IllegalCabbingThreadCount(value.to_string()))?,
        )
    }

    pub fn warnings_as_errors(&self) -> bool {
        self.warnings_as_errors
    }

    pub fn set_warnings_as_errors(&mut self, value: bool) {
        self.warnings_as_errors = value;
    }
}
