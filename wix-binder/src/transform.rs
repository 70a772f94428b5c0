// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Transforms: the difference between two outputs.

A [Transform] records, per table, whether the table is added or dropped and
which rows changed. Row changes are values of [RowChange]; nothing about a
change is stored by mutating the rows of the compared outputs.
*/

use {
    crate::{row::Row, table::TableDefinition},
    std::{
        collections::{BTreeMap, BTreeSet},
        sync::Arc,
    },
};

/// Property ids of the transform summary information stream.
pub mod summary {
    pub const CODEPAGE: i32 = 1;
    pub const TITLE: i32 = 2;
    pub const SUBJECT: i32 = 3;
    pub const AUTHOR: i32 = 4;
    pub const KEYWORDS: i32 = 5;
    pub const COMMENTS: i32 = 6;
    /// Target platform and language; the template property of a database.
    pub const TARGET_PLATFORM_AND_LANGUAGE: i32 = 7;
    /// Updated platform and language.
    pub const UPDATED_PLATFORM_AND_LANGUAGE: i32 = 8;
    /// Target product code, version, updated product code, version, upgrade code.
    pub const PRODUCT_CODES: i32 = 9;
    /// Minimum installer version of the target and updated databases.
    pub const INSTALLER_REQUIREMENT: i32 = 14;
    pub const VALIDATION_FLAGS: i32 = 16;
    pub const SECURITY: i32 = 19;
}

bitflags::bitflags! {
    /// Error suppression and validation flags of a transform.
    ///
    /// The low word suppresses errors when applying the transform. The high
    /// word holds validation conditions shifted left by 16.
    pub struct TransformFlags: u32 {
        const ERROR_ADD_EXISTING_ROW = 0x1;
        const ERROR_DELETE_MISSING_ROW = 0x2;
        const ERROR_ADD_EXISTING_TABLE = 0x4;
        const ERROR_DELETE_MISSING_TABLE = 0x8;
        const ERROR_UPDATE_MISSING_ROW = 0x10;
        const ERROR_CHANGE_CODEPAGE = 0x20;
        const VALIDATE_LANGUAGE = 0x1_0000;
        const VALIDATE_PRODUCT = 0x2_0000;
        const VALIDATE_PLATFORM = 0x4_0000;
        const VALIDATE_MAJOR_VERSION = 0x8_0000;
        const VALIDATE_MINOR_VERSION = 0x10_0000;
        const VALIDATE_UPDATE_VERSION = 0x20_0000;
        const VALIDATE_NEW_LESS_BASE_VERSION = 0x40_0000;
        const VALIDATE_NEW_LESS_EQUAL_BASE_VERSION = 0x80_0000;
        const VALIDATE_NEW_EQUAL_BASE_VERSION = 0x100_0000;
        const VALIDATE_NEW_GREATER_EQUAL_BASE_VERSION = 0x200_0000;
        const VALIDATE_NEW_GREATER_BASE_VERSION = 0x400_0000;
        const VALIDATE_UPGRADE_CODE = 0x800_0000;
    }
}

impl TransformFlags {
    /// Flags used for patch transforms when nothing else is configured.
    pub fn patch_default() -> Self {
        Self::ERROR_ADD_EXISTING_ROW
            | Self::ERROR_DELETE_MISSING_ROW
            | Self::ERROR_ADD_EXISTING_TABLE
            | Self::ERROR_DELETE_MISSING_TABLE
            | Self::ERROR_UPDATE_MISSING_ROW
            | Self::VALIDATE_PRODUCT
            | Self::VALIDATE_UPGRADE_CODE
    }
}

/// What happens to a whole table.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TableOperation {
    None,
    Add,
    Drop,
}

impl TableOperation {
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Add => Some("add"),
            Self::Drop => Some("drop"),
        }
    }
}

/// The change to a single row.
#[derive(Clone, Debug, PartialEq)]
pub enum RowChange {
    /// Row exists only in the updated output.
    Added(Row),
    /// Row exists only in the target output.
    Deleted(Row),
    /// Row exists in both with differing fields.
    Modified {
        row: Row,
        previous: Row,
        /// Indices of fields whose values differ. Never empty.
        modified: BTreeSet<usize>,
    },
    /// Row exists in both without differences but was kept anyway.
    Unchanged { row: Row, previous: Row },
}

impl RowChange {
    /// The row as it exists after the change, or the removed row.
    pub fn row(&self) -> &Row {
        match self {
            Self::Added(row)
            | Self::Deleted(row)
            | Self::Modified { row, .. }
            | Self::Unchanged { row, .. } => row,
        }
    }

    /// The target row of a change between matching rows.
    pub fn previous(&self) -> Option<&Row> {
        match self {
            Self::Modified { previous, .. } | Self::Unchanged { previous, .. } => Some(previous),
            _ => None,
        }
    }

    pub fn modified_fields(&self) -> Option<&BTreeSet<usize>> {
        match self {
            Self::Modified { modified, .. } => Some(modified),
            _ => None,
        }
    }

    /// Every row carried by this change.
    pub fn rows_mut(&mut self) -> Vec<&mut Row> {
        match self {
            Self::Added(row) | Self::Deleted(row) => vec![row],
            Self::Modified { row, previous, .. } | Self::Unchanged { row, previous } => {
                vec![row, previous]
            }
        }
    }

    pub fn is_added(&self) -> bool {
        matches!(self, Self::Added(_))
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted(_))
    }

    pub fn is_modified(&self) -> bool {
        matches!(self, Self::Modified { .. })
    }

    /// Name used when persisting the change.
    pub fn operation_name(&self) -> Option<&'static str> {
        match self {
            Self::Added(_) => Some("add"),
            Self::Deleted(_) => Some("delete"),
            Self::Modified { .. } => Some("modify"),
            Self::Unchanged { .. } => None,
        }
    }
}

/// Changes to one table.
#[derive(Clone, Debug)]
pub struct TableTransform {
    definition: Arc<TableDefinition>,
    pub operation: TableOperation,
    rows: Vec<RowChange>,
}

impl TableTransform {
    pub fn new(definition: Arc<TableDefinition>, operation: TableOperation) -> Self {
        Self {
            definition,
            operation,
            rows: vec![],
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &Arc<TableDefinition> {
        &self.definition
    }

    pub fn rows(&self) -> &[RowChange] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut Vec<RowChange> {
        &mut self.rows
    }

    pub fn push(&mut self, change: RowChange) {
        self.rows.push(change);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Counts of row changes by kind.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ChangeCounts {
    pub added: usize,
    pub deleted: usize,
    pub modified: usize,
    pub unchanged: usize,
}

/// A transform between a target and an updated output.
#[derive(Clone, Debug, Default)]
pub struct Transform {
    pub codepage: i32,
    tables: BTreeMap<String, TableTransform>,
    summary_information: BTreeMap<i32, String>,
}

impl Transform {
    pub fn new(codepage: i32) -> Self {
        Self {
            codepage,
            ..Default::default()
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableTransform> {
        self.tables.get(name)
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut TableTransform> {
        self.tables.get_mut(name)
    }

    /// Obtain the changes for a table, creating an empty entry if missing.
    pub fn ensure_table(&mut self, definition: &Arc<TableDefinition>) -> &mut TableTransform {
        self.tables
            .entry(definition.name.clone())
            .or_insert_with(|| TableTransform::new(definition.clone(), TableOperation::None))
    }

    pub fn insert_table(&mut self, table: TableTransform) {
        self.tables.insert(table.name().to_string(), table);
    }

    /// Tables in name order.
    pub fn tables(&self) -> impl Iterator<Item = &TableTransform> {
        self.tables.values()
    }

    pub fn tables_mut(&mut self) -> impl Iterator<Item = &mut TableTransform> {
        self.tables.values_mut()
    }

    pub fn summary_information(&self) -> &BTreeMap<i32, String> {
        &self.summary_information
    }

    pub fn set_summary_property(&mut self, id: i32, value: impl ToString) {
        self.summary_information.insert(id, value.to_string());
    }

    pub fn summary_property(&self, id: i32) -> Option<&str> {
        self.summary_information.get(&id).map(|s| s.as_str())
    }

    pub fn change_counts(&self) -> ChangeCounts {
        let mut counts = ChangeCounts::default();

        for change in self.tables.values().flat_map(|t| t.rows.iter()) {
            match change {
                RowChange::Added(_) => counts.added += 1,
                RowChange::Deleted(_) => counts.deleted += 1,
                RowChange::Modified { .. } => counts.modified += 1,
                RowChange::Unchanged { .. } => counts.unchanged += 1,
            }
        }

        counts
    }
}
