// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Table and column definitions.

use {
    crate::{BinderError, BinderResult},
    once_cell::sync::Lazy,
    std::{
        collections::BTreeMap,
        fmt::{Display, Formatter},
        sync::Arc,
    },
};

pub const SUMMARY_INFORMATION_TABLE: &str = "_SummaryInformation";
pub const PROPERTY_TABLE: &str = "Property";
pub const FILE_TABLE: &str = "File";
pub const WIX_ACTION_TABLE: &str = "WixAction";

/// Semantic type of a column.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ColumnType {
    Number,
    String,
    Localized,
    /// Value is kept for the binder even when unchanged.
    Preserved,
    /// References a file or stream.
    Object,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::String => "string",
            Self::Localized => "localized",
            Self::Preserved => "preserved",
            Self::Object => "object",
        }
    }
}

impl Display for ColumnType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ColumnType {
    type Error = BinderError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "number" => Ok(Self::Number),
            "string" => Ok(Self::String),
            "localized" => Ok(Self::Localized),
            "preserved" => Ok(Self::Preserved),
            "object" => Ok(Self::Object),
            _ => Err(BinderError::OutputFormat(format!("unknown column type: {}", s))),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: ColumnType,
    pub length: u32,
    pub primary_key: bool,
    pub nullable: bool,
    pub localizable: bool,
    pub min_value: Option<i32>,
    pub max_value: Option<i32>,
}

impl ColumnDefinition {
    pub fn new(name: impl ToString, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            length: 0,
            primary_key: false,
            nullable: false,
            localizable: false,
            min_value: None,
            max_value: None,
        }
    }

    /// A string column of the given length.
    pub fn string(name: impl ToString, length: u32) -> Self {
        Self::new(name, ColumnType::String).with_length(length)
    }

    /// A 4 byte integer column.
    pub fn number(name: impl ToString) -> Self {
        Self::new(name, ColumnType::Number).with_length(4)
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = length;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn localizable(mut self) -> Self {
        self.localizable = true;
        self
    }

    pub fn with_range(mut self, min: i32, max: i32) -> Self {
        self.min_value = Some(min);
        self.max_value = Some(max);
        self
    }

    /// Whether values are compared as integers.
    pub fn is_numeric(&self) -> bool {
        self.column_type == ColumnType::Number && !self.localizable
    }

    /// Whether data in this column can be compared against data in `other`.
    pub fn is_comparable_with(&self, other: &ColumnDefinition) -> bool {
        self.name == other.name
            && self.column_type == other.column_type
            && self.primary_key == other.primary_key
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    /// Table exists only in the intermediate model, never in a database.
    pub unreal: bool,
}

impl TableDefinition {
    pub fn new(name: impl ToString, columns: Vec<ColumnDefinition>) -> Self {
        Self {
            name: name.to_string(),
            columns,
            unreal: false,
        }
    }

    pub fn unreal(mut self) -> Self {
        self.unreal = true;
        self
    }

    /// Indices of primary key columns, in declared order.
    pub fn primary_key_indices(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter_map(|(i, c)| if c.primary_key { Some(i) } else { None })
            .collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Whether rows of `other` can be diffed against rows of this table.
    pub fn is_compatible_with(&self, other: &TableDefinition) -> bool {
        self.name == other.name
            && self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(other.columns.iter())
                .all(|(a, b)| a.is_comparable_with(b))
    }

    pub fn is_wix_action_table(&self) -> bool {
        self.name == WIX_ACTION_TABLE
    }
}

/// Definitions keyed by table name.
#[derive(Clone, Debug, Default)]
pub struct TableDefinitionCollection {
    definitions: BTreeMap<String, Arc<TableDefinition>>,
}

impl TableDefinitionCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Definitions for the tables the binder itself reasons about.
    pub fn standard() -> Self {
        STANDARD_TABLE_DEFINITIONS.clone()
    }

    /// Register a definition, replacing any existing one with the same name.
    pub fn add(&mut self, definition: TableDefinition) -> Arc<TableDefinition> {
        let definition = Arc::new(definition);
        self.definitions
            .insert(definition.name.clone(), definition.clone());

        definition
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TableDefinition>> {
        self.definitions.get(name)
    }

    /// Obtain a definition that must exist.
    pub fn require(&self, name: &str) -> BinderResult<Arc<TableDefinition>> {
        self.definitions
            .get(name)
            .cloned()
            .ok_or_else(|| BinderError::UnknownTable(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TableDefinition>> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Names of the tables holding action sequences.
pub const SEQUENCE_TABLES: [&str; 5] = [
    "AdminExecuteSequence",
    "AdminUISequence",
    "AdvtExecuteSequence",
    "InstallExecuteSequence",
    "InstallUISequence",
];

static STANDARD_TABLE_DEFINITIONS: Lazy<TableDefinitionCollection> = Lazy::new(|| {
    let mut defs = TableDefinitionCollection::new();

    defs.add(TableDefinition::new(
        SUMMARY_INFORMATION_TABLE,
        vec![
            ColumnDefinition::number("PropertyId")
                .primary_key()
                .with_range(1, 19),
            ColumnDefinition::string("Value", 255).localizable(),
        ],
    ));

    defs.add(TableDefinition::new(
        PROPERTY_TABLE,
        vec![
            ColumnDefinition::string("Property", 72).primary_key(),
            ColumnDefinition::new("Value", ColumnType::Localized),
        ],
    ));

    defs.add(TableDefinition::new(
        FILE_TABLE,
        vec![
            ColumnDefinition::string("File", 72).primary_key(),
            ColumnDefinition::string("Component_", 72),
            ColumnDefinition::string("FileName", 255).localizable(),
            ColumnDefinition::number("FileSize").with_range(0, i32::MAX),
            ColumnDefinition::string("Version", 72).nullable(),
            ColumnDefinition::string("Language", 20).nullable(),
            ColumnDefinition::number("Attributes")
                .nullable()
                .with_range(0, 32767),
            ColumnDefinition::number("Sequence")
                .nullable()
                .with_range(1, i32::MAX),
        ],
    ));

    defs.add(TableDefinition::new(
        "Binary",
        vec![
            ColumnDefinition::string("Name", 72).primary_key(),
            ColumnDefinition::new("Data", ColumnType::Object),
        ],
    ));

    defs.add(TableDefinition::new(
        "Patch",
        vec![
            ColumnDefinition::string("File_", 72).primary_key(),
            ColumnDefinition::number("Sequence")
                .primary_key()
                .with_range(0, i32::MAX),
            ColumnDefinition::number("PatchSize").with_range(0, i32::MAX),
            ColumnDefinition::number("Attributes").with_range(0, 1),
            ColumnDefinition::new("Header", ColumnType::Object).nullable(),
            ColumnDefinition::string("StreamRef_", 72).nullable(),
        ],
    ));

    defs.add(TableDefinition::new(
        "MsiPatchSequence",
        vec![
            ColumnDefinition::string("PatchFamily", 72).primary_key(),
            ColumnDefinition::string("ProductCode", 38)
                .primary_key()
                .nullable(),
            ColumnDefinition::string("Sequence", 72),
            ColumnDefinition::number("Attributes").nullable(),
        ],
    ));

    for name in SEQUENCE_TABLES {
        defs.add(TableDefinition::new(
            name,
            vec![
                ColumnDefinition::string("Action", 72).primary_key(),
                ColumnDefinition::string("Condition", 255).nullable(),
                ColumnDefinition::number("Sequence")
                    .nullable()
                    .with_range(-4, 32767),
            ],
        ));
    }

    defs.add(
        TableDefinition::new(
            WIX_ACTION_TABLE,
            vec![
                ColumnDefinition::string("SequenceTable", 62).primary_key(),
                ColumnDefinition::string("Action", 72).primary_key(),
                ColumnDefinition::string("Condition", 255).nullable(),
                ColumnDefinition::number("Sequence")
                    .nullable()
                    .with_range(-4, 32767),
                ColumnDefinition::string("Before", 72).nullable(),
                ColumnDefinition::string("After", 72).nullable(),
                ColumnDefinition::number("Overridable")
                    .nullable()
                    .with_range(0, 1),
            ],
        )
        .unreal(),
    );

    defs
});
