// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Rows and field values.

use {
    crate::{
        table::{ColumnType, TableDefinition},
        BinderError, BinderResult,
    },
    std::{
        fmt::{Display, Formatter},
        sync::Arc,
    },
};

/// Separator between primary key components.
pub const KEY_SEPARATOR: char = '/';

/// The value held by a field.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Value {
    Null,
    Integer(i32),
    String(String),
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The value as an integer, parsing strings when needed.
    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Self::Null => None,
            Self::Integer(v) => Some(*v),
            Self::String(s) => s.parse::<i32>().ok(),
        }
    }

    /// The value as a string, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Null renders as the empty string.
impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Integer(v) => write!(f, "{}", v),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(|v| v.into()).unwrap_or(Value::Null)
    }
}

/// Where the data of an object field came from.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ObjectSource {
    /// Name of the entry in an embedded cabinet holding the data.
    pub cabinet_file_id: Option<String>,
    /// Location the output was loaded from.
    pub base_uri: Option<String>,
    /// The authored value before file resolution.
    pub unresolved_data: Option<String>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Field {
    pub value: Value,
    pub object: Option<ObjectSource>,
}

impl Field {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            object: None,
        }
    }
}

/// A row of a table.
///
/// Rows always hold exactly one field per column of their definition.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    definition: Arc<TableDefinition>,
    section_id: Option<String>,
    source_line: Option<String>,
    fields: Vec<Field>,
}

impl Row {
    /// A row with every field null.
    pub fn new(definition: Arc<TableDefinition>) -> Self {
        let fields = vec![Field::default(); definition.columns.len()];

        Self {
            definition,
            section_id: None,
            source_line: None,
            fields,
        }
    }

    /// A row populated from values, one per column.
    pub fn from_values(definition: Arc<TableDefinition>, values: Vec<Value>) -> BinderResult<Self> {
        let fields = values.into_iter().map(Field::new).collect::<Vec<_>>();
        Self::from_fields(definition, fields)
    }

    pub fn from_fields(definition: Arc<TableDefinition>, fields: Vec<Field>) -> BinderResult<Self> {
        if fields.len() != definition.columns.len() {
            return Err(BinderError::FieldCountMismatch {
                table: definition.name.clone(),
                expected: definition.columns.len(),
                actual: fields.len(),
            });
        }

        Ok(Self {
            definition,
            section_id: None,
            source_line: None,
            fields,
        })
    }

    pub fn definition(&self) -> &Arc<TableDefinition> {
        &self.definition
    }

    pub fn table_name(&self) -> &str {
        &self.definition.name
    }

    pub fn section_id(&self) -> Option<&str> {
        self.section_id.as_deref()
    }

    pub fn set_section_id(&mut self, value: Option<String>) {
        self.section_id = value;
    }

    pub fn with_section_id(mut self, value: Option<String>) -> Self {
        self.section_id = value;
        self
    }

    pub fn source_line(&self) -> Option<&str> {
        self.source_line.as_deref()
    }

    pub fn set_source_line(&mut self, value: Option<String>) {
        self.source_line = value;
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut [Field] {
        &mut self.fields
    }

    pub fn field(&self, index: usize) -> &Field {
        &self.fields[index]
    }

    pub fn field_mut(&mut self, index: usize) -> &mut Field {
        &mut self.fields[index]
    }

    pub fn value(&self, index: usize) -> &Value {
        &self.fields[index].value
    }

    pub fn set_value(&mut self, index: usize, value: impl Into<Value>) {
        self.fields[index].value = value.into();
    }

    /// Value of the named column, if the column exists.
    pub fn value_by_name(&self, column: &str) -> Option<&Value> {
        self.definition
            .column_index(column)
            .map(|i| &self.fields[i].value)
    }

    pub fn set_value_by_name(&mut self, column: &str, value: impl Into<Value>) -> BinderResult<()> {
        let index =
            self.definition
                .column_index(column)
                .ok_or_else(|| BinderError::UnknownColumn {
                    table: self.definition.name.clone(),
                    column: column.to_string(),
                })?;
        self.set_value(index, value);

        Ok(())
    }

    /// Primary key column values joined by `/`.
    ///
    /// `None` when the table declares no primary key.
    pub fn primary_key(&self) -> Option<String> {
        let indices = self.definition.primary_key_indices();
        if indices.is_empty() {
            return None;
        }

        Some(self.join_fields(indices.into_iter()))
    }

    /// Every field joined by `/`.
    pub fn to_key_string(&self) -> String {
        self.join_fields(0..self.fields.len())
    }

    fn join_fields(&self, indices: impl Iterator<Item = usize>) -> String {
        indices
            .map(|i| self.fields[i].value.to_string())
            .collect::<Vec<_>>()
            .join(&KEY_SEPARATOR.to_string())
    }

    /// Whether this is a `WixAction` row that other definitions may replace.
    pub fn is_overridable(&self) -> bool {
        self.definition.is_wix_action_table()
            && self
                .value_by_name("Overridable")
                .and_then(|v| v.as_integer())
                .unwrap_or(0)
                == 1
    }

    /// Indices of columns holding object references.
    pub fn object_column_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.definition
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.column_type == ColumnType::Object)
            .map(|(i, _)| i)
    }
}
