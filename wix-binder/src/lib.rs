// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Binding of WiX outputs.

This crate turns the relational model produced by the WiX linker into
artifacts:

* [differ] computes the row-level transform between two outputs.
* [transform_binder] splits a transform into target and updated databases
  and drives a [transform_binder::DatabaseEngine] to produce the transform file.
* [sequence] adds the `PatchFiles` action patch transforms need.
* [bundle] writes Burn bundle executables through the `wix-burn` crate.
* [wixout] persists outputs and transforms as `wixOutput` XML.

[binder::Binder] ties these together with shared settings, diagnostics and
temporary files.
*/

pub mod binder;
pub mod bundle;
pub mod cabinet;
pub mod differ;
mod error;
pub use error::*;
pub mod messaging;
pub mod output;
pub mod resolver;
pub mod row;
pub mod sequence;
pub mod settings;
pub mod table;
pub mod temp_files;
pub mod transform;
pub mod transform_binder;
pub mod wixout;

pub use {
    binder::Binder,
    differ::Differ,
    messaging::{Diagnostic, Messaging, Severity},
    output::{Output, OutputType},
    row::{Row, Value},
    settings::{BinderSettings, CompressionLevel},
    transform::{RowChange, Transform, TransformFlags},
};
