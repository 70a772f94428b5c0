// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Building batches of cabinets in parallel.

use {
    crate::{
        messaging::{Diagnostic, Messaging},
        settings::BinderSettings,
        BinderError, BinderResult,
    },
    log::info,
    rayon::prelude::*,
    sha2::Digest,
    std::{
        fs::File,
        path::{Path, PathBuf},
    },
    wix_burn::{BurnResult, CabinetFile, CabinetService, Compression},
};

/// A cabinet to build.
#[derive(Clone, Debug)]
pub struct CabinetWorkItem {
    /// File name of the cabinet, used as the cache key.
    pub name: String,
    pub destination: PathBuf,
    pub files: Vec<CabinetFile>,
    pub compression: Compression,
}

/// Cache name for a cabinet holding `files`.
///
/// The name embeds a SHA-256 digest of every entry name and its content, so
/// changed payloads never match a cached cabinet.
pub fn cabinet_cache_name(prefix: &str, files: &[CabinetFile]) -> BinderResult<String> {
    let mut hasher = sha2::Sha256::new();

    for file in files {
        hasher.update(file.name.as_bytes());
        hasher.update([0u8]);
        std::io::copy(&mut File::open(&file.source)?, &mut hasher)?;
        hasher.update([0u8]);
    }

    Ok(format!("{}-{}.cab", prefix, hex::encode(hasher.finalize())))
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CabinetOutcome {
    Created,
    Reused,
}

/// Queue of cabinets built together by [Self::wait].
pub struct CabinetBatch<'a> {
    service: &'a (dyn CabinetService + Sync),
    items: Vec<CabinetWorkItem>,
}

impl<'a> CabinetBatch<'a> {
    pub fn new(service: &'a (dyn CabinetService + Sync)) -> Self {
        Self {
            service,
            items: vec![],
        }
    }

    pub fn enqueue(&mut self, item: CabinetWorkItem) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Build every queued cabinet and empty the queue.
    ///
    /// Each failed cabinet is reported as a diagnostic. Returns the outcome of
    /// each item in queue order, or [BinderError::EncounteredErrors] if any
    /// cabinet failed.
    pub fn wait(
        &mut self,
        settings: &BinderSettings,
        messaging: &mut Messaging,
    ) -> BinderResult<Vec<CabinetOutcome>> {
        let items = std::mem::take(&mut self.items);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.cabinet_threads())
            .build()
            .map_err(|e| BinderError::ThreadPool(e.to_string()))?;

        let cache = if settings.reuse_cabinets() {
            settings.cabinet_cache_path()
        } else {
            None
        };
        let cache_store = settings.cabinet_cache_path();

        info!(
            "building {} cabinets with {} threads",
            items.len(),
            settings.cabinet_threads()
        );

        let results = pool.install(|| {
            items
                .par_iter()
                .map(|item| self.build(item, cache, cache_store))
                .collect::<Vec<_>>()
        });

        let mut outcomes = vec![];
        let mut failed = false;

        for (item, result) in items.iter().zip(results) {
            match result {
                Ok(outcome) => {
                    if outcome == CabinetOutcome::Reused {
                        messaging.emit(Diagnostic::ReusingCabinet(item.name.clone()));
                    }
                    outcomes.push(outcome);
                }
                Err(e) => {
                    messaging.emit(Diagnostic::CabinetCreationFailed {
                        name: item.name.clone(),
                        message: e.to_string(),
                    });
                    failed = true;
                }
            }
        }

        if failed {
            Err(BinderError::EncounteredErrors)
        } else {
            Ok(outcomes)
        }
    }

    fn build(
        &self,
        item: &CabinetWorkItem,
        cache: Option<&Path>,
        cache_store: Option<&Path>,
    ) -> BurnResult<CabinetOutcome> {
        if let Some(cached) = cache.map(|p| p.join(&item.name)) {
            if cached.is_file() {
                std::fs::copy(&cached, &item.destination)?;
                return Ok(CabinetOutcome::Reused);
            }
        }

        self.service
            .create_cabinet(&item.files, &item.destination, item.compression)?;

        if let Some(dir) = cache_store {
            std::fs::create_dir_all(dir)?;
            std::fs::copy(&item.destination, dir.join(&item.name))?;
        }

        Ok(CabinetOutcome::Created)
    }
}
