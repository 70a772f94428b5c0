// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `.wixburn` section descriptor.

use {
    scroll::{IOread, IOwrite, Pread, Pwrite, SizeWith},
    std::fmt::{Display, Formatter},
    uuid::Uuid,
};

/// Magic value at the start of the descriptor.
pub const BURN_SECTION_MAGIC: u32 = 0x00F1_4300;

/// The only descriptor version understood by this crate.
pub const BURN_SECTION_VERSION: u32 = 0x0000_0001;

/// Size in bytes of the serialized descriptor.
pub const BURN_SECTION_SIZE: usize = 64;

/// Container format value meaning "cabinet".
pub const BURN_SECTION_FORMAT_CAB: u32 = 1;

/// The container slots a bundle has.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ContainerKind {
    /// Holds the bootstrapper application and the Burn manifest.
    Ux,
    /// Holds the chained packages.
    Attached,
}

impl ContainerKind {
    /// Value written to the descriptor's container count when this kind is appended.
    pub fn section_count(&self) -> u32 {
        match self {
            Self::Ux => 1,
            Self::Attached => 2,
        }
    }
}

impl Display for ContainerKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ux => f.write_str("UX"),
            Self::Attached => f.write_str("attached"),
        }
    }
}

/// The 64 byte record stored at the start of the `.wixburn` section's raw data.
///
/// All integers are little-endian.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, IOread, IOwrite, Pread, Pwrite, SizeWith)]
pub struct BurnSectionHeader {
    /// `0x00F14300`.
    pub magic: u32,

    /// Descriptor version.
    pub version: u32,

    /// Number of containers (0, 1 or 2).
    pub container_count: u32,

    /// Container format. 1 is cabinet.
    pub format: u32,

    /// File offset of the UX container.
    pub ux_container_offset: u64,

    /// Size in bytes of the UX container.
    pub ux_container_size: u64,

    /// File offset of the attached container.
    pub attached_container_offset: u64,

    /// Size in bytes of the attached container.
    pub attached_container_size: u64,

    /// Bundle GUID in Windows byte order.
    pub bundle_guid: [u8; 16],
}

impl BurnSectionHeader {
    /// A descriptor with no containers for the given bundle.
    pub fn new(bundle_guid: Uuid) -> Self {
        Self {
            magic: BURN_SECTION_MAGIC,
            version: BURN_SECTION_VERSION,
            container_count: 0,
            format: BURN_SECTION_FORMAT_CAB,
            bundle_guid: bundle_guid.to_bytes_le(),
            ..Default::default()
        }
    }

    /// Parse a descriptor from raw section bytes.
    pub fn from_bytes(data: &[u8]) -> scroll::Result<Self> {
        data.pread_with(0, scroll::LE)
    }

    /// Serialize to the on-disk representation.
    pub fn to_bytes(&self) -> scroll::Result<[u8; BURN_SECTION_SIZE]> {
        let mut data = [0u8; BURN_SECTION_SIZE];
        data[..].pwrite_with(*self, 0, scroll::LE)?;

        Ok(data)
    }

    /// The bundle GUID.
    pub fn bundle_guid(&self) -> Uuid {
        Uuid::from_bytes_le(self.bundle_guid)
    }

    /// Whether the magic matches.
    pub fn has_valid_magic(&self) -> bool {
        self.magic == BURN_SECTION_MAGIC
    }

    /// Whether this version of the format is understood.
    pub fn is_supported_version(&self) -> bool {
        self.version == BURN_SECTION_VERSION
    }

    /// The `(offset, size)` pair recorded for a container.
    pub fn container(&self, kind: ContainerKind) -> (u64, u64) {
        match kind {
            ContainerKind::Ux => (self.ux_container_offset, self.ux_container_size),
            ContainerKind::Attached => (
                self.attached_container_offset,
                self.attached_container_size,
            ),
        }
    }

    /// Whether a container has a non-empty location recorded.
    pub fn has_container(&self, kind: ContainerKind) -> bool {
        let (offset, size) = self.container(kind);

        offset != 0 && size != 0
    }

    /// Record the location of a container.
    pub fn set_container(&mut self, kind: ContainerKind, offset: u64, size: u64) {
        self.container_count = kind.section_count();

        match kind {
            ContainerKind::Ux => {
                self.ux_container_offset = offset;
                self.ux_container_size = size;
            }
            ContainerKind::Attached => {
                self.attached_container_offset = offset;
                self.attached_container_size = size;
            }
        }
    }
}
