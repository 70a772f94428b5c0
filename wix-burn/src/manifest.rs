// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The Burn manifest.

The manifest is stored as the entry named `0` in the UX container. Only the
payload mappings matter here: `UX/Payload` elements describe files of the UX
container, top-level `Payload` elements describe files of the attached
container. Each maps a `SourcePath` (the cabinet entry name) to a `FilePath`
(where the file lives relative to the extraction directory).
*/

use {
    crate::{BurnError, BurnResult},
    std::io::{Read, Write},
    xml::{
        attribute::OwnedAttribute,
        common::XmlVersion,
        reader::{EventReader, XmlEvent as ReadEvent},
        writer::{EmitterConfig, XmlEvent as WriteEvent},
    },
};

pub const BURN_MANIFEST_NAMESPACE: &str = "http://schemas.microsoft.com/wix/2008/Burn";

/// Name of the manifest entry in the UX container.
pub const BURN_MANIFEST_CABINET_NAME: &str = "0";

/// Name the manifest is given once extracted.
pub const BURN_MANIFEST_FILE_NAME: &str = "manifest.xml";

/// A payload mapping from cabinet entry to relative file path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ManifestPayload {
    pub source_path: String,
    pub file_path: String,
}

impl ManifestPayload {
    pub fn new(source_path: impl ToString, file_path: impl ToString) -> Self {
        Self {
            source_path: source_path.to_string(),
            file_path: file_path.to_string(),
        }
    }
}

/// The payload mappings of a Burn manifest.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BurnManifest {
    /// `BurnManifest/UX/Payload` entries.
    pub ux_payloads: Vec<ManifestPayload>,
    /// `BurnManifest/Payload` entries.
    pub payloads: Vec<ManifestPayload>,
}

fn attribute<'a>(attributes: &'a [OwnedAttribute], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|a| a.name.local_name == name && a.name.namespace.is_none())
        .map(|a| a.value.as_str())
}

fn payload_from_attributes(attributes: &[OwnedAttribute]) -> BurnResult<ManifestPayload> {
    let source_path = attribute(attributes, "SourcePath")
        .ok_or(BurnError::ManifestMalformed("Payload lacks SourcePath"))?;
    let file_path = attribute(attributes, "FilePath")
        .ok_or(BurnError::ManifestMalformed("Payload lacks FilePath"))?;

    Ok(ManifestPayload::new(source_path, file_path))
}

impl BurnManifest {
    /// Parse a manifest from XML.
    ///
    /// Elements outside the Burn namespace are ignored, as is everything other
    /// than the two payload element sets.
    pub fn from_reader(reader: impl Read) -> BurnResult<Self> {
        let mut manifest = Self::default();
        let mut stack: Vec<Option<String>> = vec![];
        let mut seen_root = false;

        for event in EventReader::new(reader) {
            match event? {
                ReadEvent::StartElement {
                    name, attributes, ..
                } => {
                    let local = if name.namespace.as_deref() == Some(BURN_MANIFEST_NAMESPACE) {
                        Some(name.local_name)
                    } else {
                        None
                    };

                    if stack.is_empty() {
                        if local.as_deref() != Some("BurnManifest") {
                            return Err(BurnError::ManifestMalformed(
                                "root element is not a Burn manifest",
                            ));
                        }
                        seen_root = true;
                    }

                    stack.push(local);

                    let path = stack.iter().map(|e| e.as_deref()).collect::<Vec<_>>();
                    match path.as_slice() {
                        [Some("BurnManifest"), Some("UX"), Some("Payload")] => {
                            manifest
                                .ux_payloads
                                .push(payload_from_attributes(&attributes)?);
                        }
                        [Some("BurnManifest"), Some("Payload")] => {
                            manifest.payloads.push(payload_from_attributes(&attributes)?);
                        }
                        _ => {}
                    }
                }
                ReadEvent::EndElement { .. } => {
                    stack.pop();
                }
                _ => {}
            }
        }

        if !seen_root {
            return Err(BurnError::ManifestMalformed("no root element"));
        }

        Ok(manifest)
    }

    /// Serialize as XML.
    pub fn write_xml(&self, writer: impl Write) -> BurnResult<()> {
        let mut writer = EmitterConfig::new()
            .perform_indent(true)
            .create_writer(writer);

        writer.write(WriteEvent::StartDocument {
            version: XmlVersion::Version10,
            encoding: Some("utf-8"),
            standalone: None,
        })?;
        writer.write(WriteEvent::start_element("BurnManifest").default_ns(BURN_MANIFEST_NAMESPACE))?;

        writer.write(WriteEvent::start_element("UX"))?;
        for payload in &self.ux_payloads {
            writer.write(
                WriteEvent::start_element("Payload")
                    .attr("FilePath", &payload.file_path)
                    .attr("SourcePath", &payload.source_path),
            )?;
            writer.write(WriteEvent::end_element())?;
        }
        writer.write(WriteEvent::end_element())?;

        for payload in &self.payloads {
            writer.write(
                WriteEvent::start_element("Payload")
                    .attr("FilePath", &payload.file_path)
                    .attr("SourcePath", &payload.source_path),
            )?;
            writer.write(WriteEvent::end_element())?;
        }

        writer.write(WriteEvent::end_element())?;

        Ok(())
    }

    /// Serialize to an XML byte vector.
    pub fn to_xml_bytes(&self) -> BurnResult<Vec<u8>> {
        let mut data = vec![];
        self.write_xml(&mut data)?;

        Ok(data)
    }
}
