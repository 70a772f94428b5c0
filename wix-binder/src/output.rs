// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Linked outputs: named tables of rows plus sub-storages.

use {
    crate::{row::Row, table::TableDefinition, transform::Transform, BinderError, BinderResult},
    std::{
        collections::BTreeMap,
        fmt::{Display, Formatter},
        sync::Arc,
    },
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutputType {
    Bundle,
    Module,
    Patch,
    PatchCreation,
    Product,
    Transform,
}

impl OutputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bundle => "Bundle",
            Self::Module => "Module",
            Self::Patch => "Patch",
            Self::PatchCreation => "PatchCreation",
            Self::Product => "Product",
            Self::Transform => "Transform",
        }
    }
}

impl Display for OutputType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for OutputType {
    type Error = BinderError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "Bundle" => Ok(Self::Bundle),
            "Module" => Ok(Self::Module),
            "Patch" => Ok(Self::Patch),
            "PatchCreation" => Ok(Self::PatchCreation),
            "Product" => Ok(Self::Product),
            "Transform" => Ok(Self::Transform),
            _ => Err(BinderError::OutputFormat(format!("unknown output type: {}", s))),
        }
    }
}

/// Rows belonging to one table definition.
#[derive(Clone, Debug)]
pub struct Table {
    definition: Arc<TableDefinition>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(definition: Arc<TableDefinition>) -> Self {
        Self {
            definition,
            rows: vec![],
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &Arc<TableDefinition> {
        &self.definition
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut Vec<Row> {
        &mut self.rows
    }

    /// Append a row, which must belong to this table.
    pub fn push_row(&mut self, row: Row) -> BinderResult<()> {
        if row.table_name() != self.name() {
            return Err(BinderError::OutputFormat(format!(
                "row for table {} added to table {}",
                row.table_name(),
                self.name()
            )));
        }

        self.rows.push(row);

        Ok(())
    }

    /// Append a row of nulls and return it for population.
    pub fn create_row(&mut self) -> &mut Row {
        self.rows.push(Row::new(self.definition.clone()));
        let index = self.rows.len() - 1;

        &mut self.rows[index]
    }
}

/// A transform embedded in an output, as used by patches.
#[derive(Clone, Debug)]
pub struct SubStorage {
    pub name: String,
    pub transform: Transform,
}

/// The linked representation of an installer database.
#[derive(Clone, Debug)]
pub struct Output {
    pub output_type: OutputType,
    pub codepage: i32,
    tables: BTreeMap<String, Table>,
    pub sub_storages: Vec<SubStorage>,
}

impl Output {
    pub fn new(output_type: OutputType) -> Self {
        Self {
            output_type,
            codepage: 0,
            tables: BTreeMap::new(),
            sub_storages: vec![],
        }
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(name)
    }

    /// Obtain the table for a definition, creating it if missing.
    pub fn ensure_table(&mut self, definition: &Arc<TableDefinition>) -> &mut Table {
        self.tables
            .entry(definition.name.clone())
            .or_insert_with(|| Table::new(definition.clone()))
    }

    pub fn add_table(&mut self, table: Table) {
        self.tables.insert(table.name().to_string(), table);
    }

    pub fn remove_table(&mut self, name: &str) -> Option<Table> {
        self.tables.remove(name)
    }

    /// Tables in name order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn tables_mut(&mut self) -> impl Iterator<Item = &mut Table> {
        self.tables.values_mut()
    }

    /// Find a row by table name and primary key.
    pub fn find_row(&self, table: &str, key: &str) -> Option<&Row> {
        self.tables
            .get(table)?
            .rows()
            .iter()
            .find(|r| r.primary_key().as_deref() == Some(key))
    }
}
