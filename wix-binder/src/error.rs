// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Unified error type for binding operations.
///
/// Recoverable problems with input data are reported as diagnostics through
/// [crate::Messaging]. This type covers failures that stop the current operation.
#[derive(Debug, Error)]
pub enum BinderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("burn error: {0}")]
    Burn(#[from] wix_burn::BurnError),

    #[error("XML read error: {0}")]
    XmlRead(#[from] xml::reader::Error),

    #[error("XML write error: {0}")]
    XmlWrite(#[from] xml::writer::Error),

    #[error("row in table {table} has {actual} fields; definition has {expected} columns")]
    FieldCountMismatch {
        table: String,
        expected: usize,
        actual: usize,
    },

    #[error("no definition for table {0}")]
    UnknownTable(String),

    #[error("column {column} not present in table {table}")]
    UnknownColumn { table: String, column: String },

    #[error("added file {0} has no sequence number")]
    MissingFileSequence(String),

    #[error("no room in {table} to insert {action} between {before} and {after}")]
    InsertSequenceNoSpace {
        table: String,
        action: String,
        before: String,
        after: String,
    },

    #[error("cannot insert {action} in {table}: {before} must precede {after}")]
    InsertInvalidSequenceActionOrder {
        table: String,
        action: String,
        before: String,
        after: String,
    },

    #[error("illegal cabinet thread count: {0}")]
    IllegalCabbingThreadCount(String),

    #[error("unknown compression level: {0}")]
    UnknownCompressionLevel(String),

    #[error("unable to create thread pool: {0}")]
    ThreadPool(String),

    #[error("malformed output: {0}")]
    OutputFormat(String),

    #[error("database engine error: {0}")]
    DatabaseEngine(String),

    #[error("errors were reported; see messages for details")]
    EncounteredErrors,
}

/// Result type for this crate.
pub type BinderResult<T> = std::result::Result<T, BinderError>;
