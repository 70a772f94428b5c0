// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! High-level binding context.

[Binder] owns the state shared by every binding step: settings, the
diagnostics sink and the temporary file collection. Each step borrows what it
needs from it.
*/

use {
    crate::{
        bundle::{BundleBinder, BundlePayload},
        differ::Differ,
        messaging::Messaging,
        output::Output,
        resolver::{FileResolver, VariableResolver},
        sequence::ensure_patch_files_actions,
        settings::BinderSettings,
        table::TableDefinitionCollection,
        temp_files::TempFileCollection,
        transform::Transform,
        transform_binder::{DatabaseEngine, FileComparer, TransformBinder},
        BinderError, BinderResult,
    },
    log::warn,
    std::path::Path,
    uuid::Uuid,
    wix_burn::{BurnManifest, CabinetService},
};

pub struct Binder {
    settings: BinderSettings,
    messaging: Messaging,
    temp_files: TempFileCollection,
    definitions: TableDefinitionCollection,
}

impl Binder {
    /// Construct an instance with temporary files in the system temp directory.
    pub fn new(settings: BinderSettings) -> BinderResult<Self> {
        Ok(Self::with_temp_files(settings, TempFileCollection::new()?))
    }

    /// Construct an instance with temporary files under `parent`.
    pub fn new_in(settings: BinderSettings, parent: impl AsRef<Path>) -> BinderResult<Self> {
        Ok(Self::with_temp_files(
            settings,
            TempFileCollection::new_in(parent)?,
        ))
    }

    fn with_temp_files(settings: BinderSettings, temp_files: TempFileCollection) -> Self {
        let mut messaging = Messaging::new();
        messaging.set_warnings_as_errors(settings.warnings_as_errors());

        Self {
            settings,
            messaging,
            temp_files,
            definitions: TableDefinitionCollection::standard(),
        }
    }

    pub fn settings(&self) -> &BinderSettings {
        &self.settings
    }

    pub fn messaging(&self) -> &Messaging {
        &self.messaging
    }

    pub fn messaging_mut(&mut self) -> &mut Messaging {
        &mut self.messaging
    }

    pub fn temp_files(&self) -> &TempFileCollection {
        &self.temp_files
    }

    /// Table definitions used when synthesizing rows.
    pub fn definitions(&self) -> &TableDefinitionCollection {
        &self.definitions
    }

    pub fn definitions_mut(&mut self) -> &mut TableDefinitionCollection {
        &mut self.definitions
    }

    /// Resolve variables and object fields of an output in place.
    ///
    /// Returns the number of object fields resolved to files.
    pub fn resolve(
        &mut self,
        output: &mut Output,
        variables: &VariableResolver,
        files: &FileResolver,
    ) -> usize {
        variables.resolve_output(output, &mut self.messaging);
        files.resolve_output(output, &mut self.messaging)
    }

    /// Compute the transform turning `target` into `updated`.
    pub fn diff(&mut self, target: &Output, updated: &Output) -> Transform {
        Differ::new(&self.settings).diff(target, updated, &mut self.messaging)
    }

    /// Write `transform` to `path` through `engine`.
    pub fn bind_transform(
        &mut self,
        transform: &Transform,
        path: &Path,
        engine: &dyn DatabaseEngine,
    ) -> BinderResult<()> {
        TransformBinder::new(&self.settings, &self.temp_files).bind(
            transform,
            path,
            engine,
            &mut self.messaging,
        )
    }

    /// Like [Self::bind_transform] with a custom file comparison.
    pub fn bind_transform_with_comparer(
        &mut self,
        transform: &Transform,
        path: &Path,
        engine: &dyn DatabaseEngine,
        comparer: Box<dyn FileComparer + '_>,
    ) -> BinderResult<()> {
        let mut binder = TransformBinder::new(&self.settings, &self.temp_files);
        binder.set_file_comparer(comparer);
        binder.bind(transform, path, engine, &mut self.messaging)
    }

    /// Prepare the paired transforms of a patch.
    ///
    /// When `main` changes files, `paired` gains the `PatchFiles` action in
    /// both execute sequences.
    pub fn bind_patch_transforms(
        &mut self,
        main: &Transform,
        paired: &mut Transform,
    ) -> BinderResult<()> {
        ensure_patch_files_actions(main, paired, &self.definitions)
    }

    /// Write a bundle executable.
    pub fn bind_bundle(
        &mut self,
        service: &(dyn CabinetService + Sync),
        stub_path: &Path,
        output_path: &Path,
        bundle_guid: Uuid,
        ux_payloads: &[BundlePayload],
        attached_payloads: &[BundlePayload],
    ) -> BinderResult<BurnManifest> {
        BundleBinder::new(&self.settings, &self.temp_files, service).bind(
            stub_path,
            output_path,
            bundle_guid,
            ux_payloads,
            attached_payloads,
            &mut self.messaging,
        )
    }

    /// Fail if any error diagnostic was emitted.
    pub fn check_errors(&self) -> BinderResult<()> {
        if self.messaging.encountered_error() {
            Err(BinderError::EncounteredErrors)
        } else {
            Ok(())
        }
    }

    /// Delete temporary files and hand back the collected diagnostics.
    pub fn finish(mut self) -> Messaging {
        if !self.temp_files.delete(&mut self.messaging) {
            warn!(
                "temporary files left behind in {}",
                self.temp_files.path().display()
            );
        }

        self.messaging
    }
}
