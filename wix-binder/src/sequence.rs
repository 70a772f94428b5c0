// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Action sequencing for patch transforms.

use {
    crate::{
        row::{Row, Value},
        table::{TableDefinitionCollection, FILE_TABLE},
        transform::{RowChange, TableOperation, TableTransform, Transform},
        BinderError, BinderResult,
    },
    log::info,
    once_cell::sync::Lazy,
    std::fmt::{Display, Formatter},
};

pub const INSTALL_FILES_ACTION: &str = "InstallFiles";
pub const DUPLICATE_FILES_ACTION: &str = "DuplicateFiles";
pub const PATCH_FILES_ACTION: &str = "PatchFiles";

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SequenceTable {
    AdminExecuteSequence,
    AdminUISequence,
    AdvtExecuteSequence,
    InstallExecuteSequence,
    InstallUISequence,
}

impl SequenceTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AdminExecuteSequence => "AdminExecuteSequence",
            Self::AdminUISequence => "AdminUISequence",
            Self::AdvtExecuteSequence => "AdvtExecuteSequence",
            Self::InstallExecuteSequence => "InstallExecuteSequence",
            Self::InstallUISequence => "InstallUISequence",
        }
    }
}

impl Display for SequenceTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A built-in action at its default position.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StandardAction {
    pub table: SequenceTable,
    pub action: &'static str,
    pub condition: Option<&'static str>,
    pub sequence: i32,
}

static STANDARD_ACTIONS: Lazy<Vec<StandardAction>> = Lazy::new(|| {
    let mut actions = vec![];

    for table in [
        SequenceTable::AdminExecuteSequence,
        SequenceTable::InstallExecuteSequence,
    ] {
        for (action, sequence) in [
            (INSTALL_FILES_ACTION, 4000),
            (PATCH_FILES_ACTION, 4090),
            (DUPLICATE_FILES_ACTION, 4210),
        ] {
            actions.push(StandardAction {
                table,
                action,
                condition: None,
                sequence,
            });
        }
    }

    actions
});

/// Look up a standard action.
pub fn standard_action(table: SequenceTable, action: &str) -> Option<&'static StandardAction> {
    STANDARD_ACTIONS
        .iter()
        .find(|a| a.table == table && a.action == action)
}

#[derive(Default)]
struct FileActions {
    has_patch_files: bool,
    install_files: i32,
    duplicate_files: i32,
}

impl FileActions {
    fn scan(&mut self, table: Option<&TableTransform>) {
        let table = match table {
            Some(table) => table,
            None => return,
        };

        for change in table.rows().iter().filter(|c| !c.is_deleted()) {
            let row = change.row();
            let sequence = || row.value(2).as_integer().unwrap_or(0);

            match row.value(0).as_str() {
                Some(PATCH_FILES_ACTION) => self.has_patch_files = true,
                Some(INSTALL_FILES_ACTION) => self.install_files = sequence(),
                Some(DUPLICATE_FILES_ACTION) => self.duplicate_files = sequence(),
                _ => {}
            }
        }
    }
}

/// Insert a `PatchFiles` action into the paired transform when needed.
///
/// Returns whether an action was inserted.
pub fn add_patch_files_action_to_sequence_table(
    table: SequenceTable,
    main: &Transform,
    paired: &mut Transform,
    definitions: &TableDefinitionCollection,
) -> BinderResult<bool> {
    let mut actions = FileActions::default();
    actions.scan(main.table(table.as_str()));
    actions.scan(paired.table(table.as_str()));

    if actions.has_patch_files {
        return Ok(false);
    }

    let standard = standard_action(table, PATCH_FILES_ACTION)
        .ok_or_else(|| BinderError::UnknownTable(table.to_string()))?;

    let sequence = if actions.duplicate_files != 0 {
        if actions.duplicate_files < actions.install_files {
            return Err(BinderError::InsertInvalidSequenceActionOrder {
                table: table.to_string(),
                action: PATCH_FILES_ACTION.to_string(),
                before: INSTALL_FILES_ACTION.to_string(),
                after: DUPLICATE_FILES_ACTION.to_string(),
            });
        }

        let midpoint = (actions.install_files + actions.duplicate_files) / 2;
        if midpoint == actions.install_files || midpoint == actions.duplicate_files {
            return Err(BinderError::InsertSequenceNoSpace {
                table: table.to_string(),
                action: PATCH_FILES_ACTION.to_string(),
                before: INSTALL_FILES_ACTION.to_string(),
                after: DUPLICATE_FILES_ACTION.to_string(),
            });
        }

        midpoint
    } else if actions.install_files != 0 {
        actions.install_files + 1
    } else {
        // Neither transform sequences the file actions.
        standard.sequence
    };

    // The target database lacks the table only when the main transform adds it.
    let table_added = main
        .table(table.as_str())
        .map(|t| t.operation == TableOperation::Add)
        .unwrap_or(false);
    let created = paired.table(table.as_str()).is_none();

    let definition = definitions.require(table.as_str())?;
    let changes = paired.ensure_table(&definition);
    if created && table_added {
        changes.operation = TableOperation::Add;
    }

    let row = Row::from_values(
        definition,
        vec![
            Value::from(standard.action),
            Value::from(standard.condition),
            Value::from(sequence),
        ],
    )?;
    changes.push(RowChange::Added(row));

    info!("sequenced {} in {} at {}", PATCH_FILES_ACTION, table, sequence);

    Ok(true)
}

/// Make sure both execute sequences run `PatchFiles` when files change.
pub fn ensure_patch_files_actions(
    main: &Transform,
    paired: &mut Transform,
    definitions: &TableDefinitionCollection,
) -> BinderResult<()> {
    let files_changed = main
        .table(FILE_TABLE)
        .map(|t| t.rows().iter().any(|c| c.is_added() || c.is_modified()))
        .unwrap_or(false);

    if !files_changed {
        return Ok(());
    }

    for table in [
        SequenceTable::AdminExecuteSequence,
        SequenceTable::InstallExecuteSequence,
    ] {
        add_patch_files_action_to_sequence_table(table, main, paired, definitions)?;
    }

    Ok(())
}
