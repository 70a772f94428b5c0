// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Binding bundle executables.

A bundle is the Burn stub executable with a UX container and, when the bundle
carries payloads, an attached container appended to it. The UX container holds
the manifest as entry `0` followed by the bootstrapper application payloads
`u0`, `u1`, ... The attached container holds the remaining payloads `a0`,
`a1`, ...
*/

use {
    crate::{
        cabinet::{cabinet_cache_name, CabinetBatch, CabinetWorkItem},
        messaging::Messaging,
        settings::BinderSettings,
        temp_files::TempFileCollection,
        BinderResult,
    },
    log::info,
    std::{
        fs::File,
        io::{BufWriter, Write},
        path::{Path, PathBuf},
    },
    uuid::Uuid,
    wix_burn::{
        manifest::BURN_MANIFEST_CABINET_NAME, BurnManifest, BurnWriter, CabinetFile,
        CabinetService, ContainerKind, ManifestPayload,
    },
};

/// A file shipped in a bundle.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BundlePayload {
    /// Path relative to the extraction directory, backslash or slash separated.
    pub file_path: String,
    /// Where the content is read from.
    pub source: PathBuf,
}

impl BundlePayload {
    pub fn new(file_path: impl ToString, source: impl AsRef<Path>) -> Self {
        Self {
            file_path: file_path.to_string(),
            source: source.as_ref().to_path_buf(),
        }
    }
}

/// Build the manifest and container entries for a set of payloads.
fn payload_entries(prefix: &str, payloads: &[BundlePayload]) -> (Vec<ManifestPayload>, Vec<CabinetFile>) {
    payloads
        .iter()
        .enumerate()
        .map(|(i, payload)| {
            let name = format!("{}{}", prefix, i);
            (
                ManifestPayload::new(&name, &payload.file_path),
                CabinetFile::new(&name, &payload.source),
            )
        })
        .unzip()
}

/// Writes bundle executables.
pub struct BundleBinder<'a> {
    settings: &'a BinderSettings,
    temp_files: &'a TempFileCollection,
    service: &'a (dyn CabinetService + Sync),
}

impl<'a> BundleBinder<'a> {
    pub fn new(
        settings: &'a BinderSettings,
        temp_files: &'a TempFileCollection,
        service: &'a (dyn CabinetService + Sync),
    ) -> Self {
        Self {
            settings,
            temp_files,
            service,
        }
    }

    /// Write a bundle to `output_path` from the stub at `stub_path`.
    ///
    /// Returns the manifest stored in the bundle.
    pub fn bind(
        &self,
        stub_path: &Path,
        output_path: &Path,
        bundle_guid: Uuid,
        ux_payloads: &[BundlePayload],
        attached_payloads: &[BundlePayload],
        messaging: &mut Messaging,
    ) -> BinderResult<BurnManifest> {
        let (ux_manifest, ux_files) = payload_entries("u", ux_payloads);
        let (attached_manifest, attached_files) = payload_entries("a", attached_payloads);

        let manifest = BurnManifest {
            ux_payloads: ux_manifest,
            payloads: attached_manifest,
        };

        let manifest_path = self.temp_files.add_extension("xml");
        {
            let mut writer = BufWriter::new(File::create(&manifest_path)?);
            manifest.write_xml(&mut writer)?;
            writer.flush()?;
        }

        let compression = self.settings.compression_level().cabinet_compression();
        let mut batch = CabinetBatch::new(self.service);

        let ux_cabinet = self.temp_files.add_extension("cab");
        let mut files = vec![CabinetFile::new(BURN_MANIFEST_CABINET_NAME, &manifest_path)];
        files.extend(ux_files);
        batch.enqueue(CabinetWorkItem {
            name: cabinet_cache_name(&format!("ux-{}", bundle_guid), &files)?,
            destination: ux_cabinet.clone(),
            files,
            compression,
        });

        let attached_cabinet = if attached_files.is_empty() {
            None
        } else {
            let path = self.temp_files.add_extension("cab");
            batch.enqueue(CabinetWorkItem {
                name: cabinet_cache_name(&format!("attached-{}", bundle_guid), &attached_files)?,
                destination: path.clone(),
                files: attached_files,
                compression,
            });
            Some(path)
        };

        batch.wait(self.settings, messaging)?;

        std::fs::copy(stub_path, output_path)?;

        let mut writer = BurnWriter::open(output_path, bundle_guid)?;
        writer.append_container(&ux_cabinet, ContainerKind::Ux)?;
        if let Some(path) = &attached_cabinet {
            writer.append_container(path, ContainerKind::Attached)?;
        }

        info!(
            "bound bundle {} with {} UX and {} attached payloads",
            output_path.display(),
            manifest.ux_payloads.len(),
            manifest.payloads.len()
        );

        Ok(manifest)
    }
}
